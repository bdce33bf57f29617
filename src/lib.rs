//! # Deterministic Limit-Order-Book Backtesting Engine
//!
//! `tapebook` replays the historical market of a single instrument — a
//! stream of depth-N book snapshots plus the tape of executed trades —
//! in simulated time, while a strategy under test injects its own limit
//! and market orders subject to a realistic latency and call-frequency
//! model. The engine reports every fill and a running cash/asset position.
//!
//! ## How the simulation works
//!
//! - **Synthetic liquidity.** Each snapshot is reconciled into the book as
//!   resting "synthetic" orders standing in for third-party depth. User
//!   orders are never evicted by snapshots, and synthetic depth that
//!   persists across snapshots keeps its time priority.
//! - **The tape is authoritative.** Each historical trade drains the
//!   routed ladder in price–time priority, shrinking synthetic depth and
//!   filling any user limit orders within the aggressor's reach — which is
//!   how a resting user order gets executed in a backtest.
//! - **User market orders** cross against synthetic depth only, so the
//!   strategy never wash-trades against its own book.
//! - **Determinism.** Events merge in timestamp order with a fixed
//!   tie-break (snapshot, tape, order arrival, cancellation), so replaying
//!   the same inputs and actions yields bit-identical results.
//!
//! ## Example
//!
//! ```
//! use tapebook::prelude::*;
//!
//! let snapshots = vec![DepthSnapshot {
//!     timestamp: 1_000,
//!     asks: vec![DepthLevel { price: 407_520_000, volume: 10_000 }],
//!     bids: vec![DepthLevel { price: 407_510_000, volume: 10_000 }],
//! }];
//! let trades = vec![Trade::new(1_200, 12_000, 407_510_000, true)];
//!
//! let mut backtest = Backtest::new(snapshots, trades, BacktestConfig::default());
//! backtest.advance(1_000)?;
//!
//! // rest a bid at the touch; the tape trade at t=1200 drains the senior
//! // synthetic depth and then reaches this order
//! let id = backtest.send_limit(Side::Bid, 5_000, 407_510_000)?.unwrap();
//! backtest.advance(1_000)?;
//!
//! let order = backtest.order(id)?.unwrap();
//! assert_eq!(order.remaining(), 3_000);
//! assert_eq!(backtest.pnl().asset, 2_000);
//! # Ok::<(), tapebook::BacktestError>(())
//! ```
//!
//! Prices, volumes and notionals are fixed-point integers (1 unit =
//! 1/100,000); timestamps are milliseconds since epoch. See
//! [`Feed`](crate::Feed) for the on-disk input format.

pub mod backtest;

pub mod prelude;
mod utils;

pub use backtest::{
    Backtest, BacktestConfig, BacktestError, DepthLevel, DepthSnapshot, FEE_BASE, Feed, FeeSchedule,
    Order, OrderBook, OrderId, OrderKind, Pnl, Side, Trade,
};
pub use utils::{FIXED_POINT_SCALE, format_fixed};
