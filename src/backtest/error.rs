//! Backtest error types

use crate::backtest::order::Side;
use thiserror::Error;

/// Errors that can occur while replaying a backtest.
///
/// Soft conditions (a rate-limited call, withdrawing an already closed
/// order) are not errors; the API reports them as `None`/`false`. Every
/// variant here is fatal to the current run: either the historical data is
/// inconsistent with the book, or the strategy asked for something the
/// market never offered.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BacktestError {
    /// A user market order asked for more synthetic depth than the opposite
    /// ladder held at activation time.
    #[error(
        "insufficient liquidity for {side} market order: requested {requested}, available {available}"
    )]
    InsufficientLiquidity {
        /// Side of the market order
        side: Side,
        /// Volume requested
        requested: u64,
        /// Synthetic volume available on the opposite ladder
        available: u64,
    },

    /// A historical trade carried more volume than the ladder it drains.
    #[error(
        "historical trade at {timestamp} exceeds {side} ladder depth: volume {volume}, available {available}"
    )]
    TradeExceedsDepth {
        /// Ladder the trade was routed to
        side: Side,
        /// Trade timestamp
        timestamp: u64,
        /// Trade volume
        volume: u64,
        /// Open volume available on that ladder
        available: u64,
    },

    /// A fill was recorded against an order with less remaining volume.
    #[error("fill volume {fill} exceeds remaining order volume {remaining}")]
    FillExceedsRemaining {
        /// Volume of the offending fill
        fill: u64,
        /// Remaining volume of the order
        remaining: u64,
    },

    /// A fill was recorded before its order was submitted.
    #[error("fill at {fill_timestamp} precedes order submission at {submit_timestamp}")]
    FillBeforeSubmit {
        /// Timestamp of the offending fill
        fill_timestamp: u64,
        /// Submission timestamp of the order
        submit_timestamp: u64,
    },

    /// An order id that was never issued by this book.
    #[error("unknown order id {0}")]
    UnknownOrder(u64),

    /// A best-price query on a side with no resting orders.
    #[error("{side} side of the book is empty")]
    EmptySide {
        /// The queried side
        side: Side,
    },

    /// Operation not permitted for the given order or argument.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the error
        message: String,
    },

    /// A feed row with the wrong number of fields.
    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    MalformedRow {
        /// Source file
        path: String,
        /// 1-based line number
        line: usize,
        /// Expected field count
        expected: usize,
        /// Actual field count
        found: usize,
    },

    /// A feed field that does not parse as a fixed-point number.
    #[error("{path}:{line}: malformed number {text:?}")]
    MalformedNumber {
        /// Source file
        path: String,
        /// 1-based line number
        line: usize,
        /// The offending token
        text: String,
    },

    /// A feed field that is neither `True` nor `False`.
    #[error("{path}:{line}: malformed boolean {text:?}, expected True or False")]
    MalformedBool {
        /// Source file
        path: String,
        /// 1-based line number
        line: usize,
        /// The offending token
        text: String,
    },

    /// An I/O failure while reading a feed file.
    #[error("failed to read {path}")]
    Io {
        /// Path of the file being read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
