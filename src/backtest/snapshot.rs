//! Historical depth snapshots fed into the book

use serde::{Deserialize, Serialize};

/// Aggregate resting volume at one price point of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price, fixed-point 1/100,000
    pub price: u64,
    /// Aggregate volume at that price, fixed-point 1/100,000
    pub volume: u64,
}

/// A timestamped top-of-book view: depth-N bids and asks sharing one
/// observation time. Levels arrive best-first as recorded by the venue;
/// the book does not require any particular order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Observation timestamp in milliseconds since epoch
    pub timestamp: u64,
    /// Ask-side levels
    pub asks: Vec<DepthLevel>,
    /// Bid-side levels
    pub bids: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Best (lowest) ask with non-zero volume.
    #[must_use]
    pub fn best_ask(&self) -> Option<DepthLevel> {
        self.asks
            .iter()
            .filter(|level| level.volume > 0)
            .min_by_key(|level| level.price)
            .copied()
    }

    /// Best (highest) bid with non-zero volume.
    #[must_use]
    pub fn best_bid(&self) -> Option<DepthLevel> {
        self.bids
            .iter()
            .filter(|level| level.volume > 0)
            .max_by_key(|level| level.price)
            .copied()
    }

    /// Midpoint of the best quotes, when both sides are present.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price as f64 + ask.price as f64) / 2.0),
            _ => None,
        }
    }
}
