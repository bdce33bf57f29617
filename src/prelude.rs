//! Prelude module that re-exports the types a driver or strategy needs.
//!
//! ```rust
//! use tapebook::prelude::*;
//! ```

// The simulation kernel and its configuration
pub use crate::backtest::{Backtest, BacktestConfig, Pnl};

// Records and book state
pub use crate::backtest::{Order, OrderBook, OrderId, OrderKind, Side, Trade};

// Historical inputs
pub use crate::backtest::{DepthLevel, DepthSnapshot, Feed};

// Fees and errors
pub use crate::backtest::{BacktestError, FEE_BASE, FeeSchedule};

// Fixed-point helpers
pub use crate::utils::{FIXED_POINT_SCALE, format_fixed};
