//! Executed-trade records shared by the tape and by order fill histories

use crate::utils::format_fixed;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An executed trade.
///
/// The same record type serves two roles: rows of the historical tape fed
/// into the simulation, and fills produced by the simulation (appended to
/// the output tape and to the consumed orders). Prices and volumes are
/// fixed-point integers in units of 1/100,000; timestamps are milliseconds
/// since epoch.
///
/// `is_buyer_maker` follows the venue convention: `true` means the passive
/// (resting) side was the buyer, i.e. the aggressor was a seller.
///
/// Ordering is by timestamp first, so a sorted tape is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Trade {
    /// Execution timestamp in milliseconds since epoch
    pub timestamp: u64,
    /// Executed volume, fixed-point 1/100,000
    pub volume: u64,
    /// Execution price, fixed-point 1/100,000
    pub price: u64,
    /// True when the resting side was the buyer (the aggressor sold)
    pub is_buyer_maker: bool,
}

impl Trade {
    /// Create a new trade record.
    pub fn new(timestamp: u64, volume: u64, price: u64, is_buyer_maker: bool) -> Self {
        Self {
            timestamp,
            volume,
            price,
            is_buyer_maker,
        }
    }

    /// Notional value of this trade (`price × volume`), widened to avoid
    /// overflow of the fixed-point product.
    #[must_use]
    #[inline]
    pub fn notional(&self) -> u128 {
        self.price as u128 * self.volume as u128
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trade t={} volume={} price={} buyer_maker={}",
            self.timestamp,
            format_fixed(self.volume),
            format_fixed(self.price),
            self.is_buyer_maker
        )
    }
}
