//! Order records: the shared header plus the market/limit variants

use crate::backtest::error::BacktestError;
use crate::backtest::trade::Trade;
use crate::utils::format_fixed;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the book an order belongs to.
///
/// `Ask` is an intent to sell, `Bid` an intent to buy. Price priority runs
/// ascending for asks and descending for bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Sell side
    Ask,
    /// Buy side
    Bid,
}

impl Side {
    /// The side a matching counterparty rests on.
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Ask => Side::Bid,
            Side::Bid => Side::Ask,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Ask => write!(f, "ASK"),
            Side::Bid => write!(f, "BID"),
        }
    }
}

/// Identity of an order.
///
/// `User` ids are allocated sequentially at registration and belong to the
/// strategy under test. `Synthetic` marks resting liquidity manufactured
/// from depth snapshots; it is never owned by the user. The derived `Ord`
/// places every user id ahead of the synthetic sentinel, which is the
/// tie-break applied at equal (price, timestamp) ladder keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderId {
    /// A strategy-owned order, identified by its registration number
    User(u64),
    /// Snapshot-manufactured resting liquidity
    Synthetic,
}

impl OrderId {
    /// True for snapshot-manufactured liquidity.
    #[must_use]
    pub fn is_synthetic(self) -> bool {
        matches!(self, OrderId::Synthetic)
    }

    /// True for strategy-owned orders.
    #[must_use]
    pub fn is_user(self) -> bool {
        matches!(self, OrderId::User(_))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderId::User(id) => write!(f, "{id}"),
            OrderId::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Variant-specific order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fully filled at activation or rejected; never rests
    Market,
    /// Rests at `price` until filled or canceled
    Limit {
        /// Limit price, fixed-point 1/100,000
        price: u64,
        /// Set once a withdrawal takes effect
        canceled: bool,
    },
}

/// A user or synthetic order together with its fill history.
///
/// `remaining() + Σ fills().volume == volume()` holds at all times, and
/// every fill's timestamp is at or after `submit_timestamp()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    id: OrderId,
    submit_timestamp: u64,
    side: Side,
    volume: u64,
    remaining: u64,
    fills: Vec<Trade>,
    kind: OrderKind,
}

impl Order {
    /// Create a market order.
    pub fn market(id: OrderId, submit_timestamp: u64, side: Side, volume: u64) -> Self {
        Self {
            id,
            submit_timestamp,
            side,
            volume,
            remaining: volume,
            fills: Vec::new(),
            kind: OrderKind::Market,
        }
    }

    /// Create a limit order resting at `price`.
    pub fn limit(id: OrderId, submit_timestamp: u64, side: Side, volume: u64, price: u64) -> Self {
        Self {
            id,
            submit_timestamp,
            side,
            volume,
            remaining: volume,
            fills: Vec::new(),
            kind: OrderKind::Limit {
                price,
                canceled: false,
            },
        }
    }

    /// Order identity.
    #[must_use]
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// When the order reached the exchange, in ms since epoch.
    #[must_use]
    pub fn submit_timestamp(&self) -> u64 {
        self.submit_timestamp
    }

    /// Side of the book.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Initial volume.
    #[must_use]
    pub fn volume(&self) -> u64 {
        self.volume
    }

    /// Volume not yet filled.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Fills applied to this order, in execution order.
    #[must_use]
    pub fn fills(&self) -> &[Trade] {
        &self.fills
    }

    /// The market/limit variant.
    #[must_use]
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Limit price, or `None` for market orders.
    #[must_use]
    pub fn price_limit(&self) -> Option<u64> {
        match self.kind {
            OrderKind::Limit { price, .. } => Some(price),
            OrderKind::Market => None,
        }
    }

    /// Whether a withdrawal has taken effect. Always false for market orders.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, OrderKind::Limit { canceled: true, .. })
    }

    /// An order is closed once its remaining volume reaches zero.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.remaining == 0
    }

    /// Record a fill against this order.
    ///
    /// # Errors
    ///
    /// Fails without mutating when the fill volume exceeds the remaining
    /// volume, or when the fill predates the order's submission.
    pub fn add_fill(&mut self, fill: Trade) -> Result<(), BacktestError> {
        if fill.volume > self.remaining {
            return Err(BacktestError::FillExceedsRemaining {
                fill: fill.volume,
                remaining: self.remaining,
            });
        }
        if fill.timestamp < self.submit_timestamp {
            return Err(BacktestError::FillBeforeSubmit {
                fill_timestamp: fill.timestamp,
                submit_timestamp: self.submit_timestamp,
            });
        }
        self.remaining -= fill.volume;
        self.fills.push(fill);
        Ok(())
    }

    /// Replace both volumes with `volume` and clear the fill history.
    ///
    /// Snapshot reconciliation uses this when re-deriving synthetic depth;
    /// user orders are never reset.
    pub(crate) fn reset_volume(&mut self, volume: u64) {
        self.volume = volume;
        self.remaining = volume;
        self.fills.clear();
    }

    /// Mark a limit order canceled. No-op for market orders; callers
    /// validate the variant first.
    pub(crate) fn cancel(&mut self) {
        if let OrderKind::Limit { canceled, .. } = &mut self.kind {
            *canceled = true;
        }
    }

    /// Volume-weighted average fill price, `0.0` when nothing has filled.
    #[must_use]
    pub fn average_price(&self) -> f64 {
        if self.fills.is_empty() {
            return 0.0;
        }
        let mut notional: u128 = 0;
        let mut volume: u128 = 0;
        for fill in &self.fills {
            notional += fill.notional();
            volume += fill.volume as u128;
        }
        notional as f64 / volume as f64
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OrderKind::Market => write!(
                f,
                "market order id={} t={} side={} volume={} remaining={} fills={}",
                self.id,
                self.submit_timestamp,
                self.side,
                format_fixed(self.volume),
                format_fixed(self.remaining),
                self.fills.len()
            ),
            OrderKind::Limit { price, canceled } => write!(
                f,
                "limit order id={} t={} side={} volume={} remaining={} price={} canceled={} fills={}",
                self.id,
                self.submit_timestamp,
                self.side,
                format_fixed(self.volume),
                format_fixed(self.remaining),
                format_fixed(price),
                canceled,
                self.fills.len()
            ),
        }
    }
}
