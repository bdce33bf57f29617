//! The simulation kernel
//!
//! Advances simulated time over five time-keyed event sources — depth
//! snapshots, the historical tape, and the three queues of in-flight user
//! requests — applying each event to the book in timestamp order with a
//! fixed tie-break, and enforcing the latency and call-frequency model the
//! strategy trades under.

use crate::backtest::book::OrderBook;
use crate::backtest::error::BacktestError;
use crate::backtest::feed::Feed;
use crate::backtest::fees::FeeSchedule;
use crate::backtest::order::{Order, Side};
use crate::backtest::snapshot::DepthSnapshot;
use crate::backtest::trade::Trade;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Fixed parameters of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Fees charged on executed notional
    pub fees: FeeSchedule,
    /// Delay between submitting an order and it reaching the book, ms
    pub post_latency: u64,
    /// Delay between requesting a cancel and it taking effect, ms
    pub cancel_latency: u64,
    /// Minimum spacing between accepted user API calls, ms
    pub call_frequency: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::zero(),
            post_latency: 100,
            cancel_latency: 100,
            call_frequency: 100,
        }
    }
}

/// Running cash/asset position derived from user fills.
///
/// Cash is signed fixed-point notional (price × volume units), asset is
/// signed volume. Selling adds fee-netted notional and subtracts volume;
/// buying does the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pnl {
    /// Net cash, in price × volume fixed-point units
    pub cash: i128,
    /// Net asset volume, fixed-point 1/100,000
    pub asset: i64,
    /// Simulated time the position was computed at
    pub timestamp: u64,
}

impl fmt::Display for Pnl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pnl t={} cash={} asset={}",
            self.timestamp, self.cash, self.asset
        )
    }
}

#[derive(Debug, Clone)]
struct PendingLimit {
    id: u64,
    activation: u64,
    side: Side,
    volume: u64,
    price: u64,
}

#[derive(Debug, Clone)]
struct PendingMarket {
    id: u64,
    activation: u64,
    side: Side,
    volume: u64,
}

#[derive(Debug, Clone)]
struct PendingCancel {
    activation: u64,
    order_id: u64,
}

/// Event sources, in tie-break priority order: at an equal timestamp the
/// book is reconciled first, then the tape executes, then user orders
/// arrive, then cancels take effect — the order an exchange would have
/// served them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventSource {
    Snapshot,
    Trade,
    LimitActivation,
    MarketActivation,
    Cancel,
}

/// A deterministic backtest over one instrument's snapshot and tape
/// history.
///
/// The driver advances simulated time with [`advance`](Self::advance);
/// the strategy injects orders through [`send_limit`](Self::send_limit),
/// [`send_market`](Self::send_market) and
/// [`withdraw_limit`](Self::withdraw_limit), all subject to the configured
/// post/cancel latency and call-frequency gate.
#[derive(Debug, Clone)]
pub struct Backtest {
    config: BacktestConfig,
    book: OrderBook,
    snapshots: Vec<DepthSnapshot>,
    trades: Vec<Trade>,
    snapshot_cursor: usize,
    trade_cursor: usize,
    pending_limits: VecDeque<PendingLimit>,
    pending_markets: VecDeque<PendingMarket>,
    pending_cancels: VecDeque<PendingCancel>,
    now: u64,
    last_call: Option<u64>,
}

impl Backtest {
    /// Build a backtest over already-parsed history. Snapshots and trades
    /// must be chronological.
    #[must_use]
    pub fn new(
        snapshots: Vec<DepthSnapshot>,
        trades: Vec<Trade>,
        config: BacktestConfig,
    ) -> Self {
        Self {
            config,
            book: OrderBook::new(),
            snapshots,
            trades,
            snapshot_cursor: 0,
            trade_cursor: 0,
            pending_limits: VecDeque::new(),
            pending_markets: VecDeque::new(),
            pending_cancels: VecDeque::new(),
            now: 0,
            last_call: None,
        }
    }

    /// Build a backtest by reading both history files.
    ///
    /// # Errors
    ///
    /// Propagates feed I/O and parse failures.
    pub fn from_files(
        snapshot_path: impl AsRef<Path>,
        trades_path: impl AsRef<Path>,
        config: BacktestConfig,
    ) -> Result<Self, BacktestError> {
        let (snapshots, trades) = Feed::read(snapshot_path, trades_path)?.into_parts();
        Ok(Self::new(snapshots, trades, config))
    }

    /// Advance simulated time by `delta` milliseconds, applying every
    /// pending event with a timestamp at or before the new time, in
    /// timestamp order with the fixed source tie-break. Returns the new
    /// simulated time.
    ///
    /// # Errors
    ///
    /// Propagates fatal event failures: a historical trade exceeding
    /// ladder depth, a user market order exceeding synthetic depth, or a
    /// cancel naming an order that never activated.
    pub fn advance(&mut self, delta: u64) -> Result<u64, BacktestError> {
        self.now += delta;
        while self.apply_next_due()? {}
        Ok(self.now)
    }

    /// Apply the earliest due event, if any. Ties across sources break in
    /// [`EventSource`] order.
    fn apply_next_due(&mut self) -> Result<bool, BacktestError> {
        let heads = [
            (
                self.snapshots
                    .get(self.snapshot_cursor)
                    .map(|snapshot| snapshot.timestamp),
                EventSource::Snapshot,
            ),
            (
                self.trades.get(self.trade_cursor).map(|trade| trade.timestamp),
                EventSource::Trade,
            ),
            (
                self.pending_limits.front().map(|pending| pending.activation),
                EventSource::LimitActivation,
            ),
            (
                self.pending_markets.front().map(|pending| pending.activation),
                EventSource::MarketActivation,
            ),
            (
                self.pending_cancels.front().map(|pending| pending.activation),
                EventSource::Cancel,
            ),
        ];
        let Some(due) = heads
            .into_iter()
            .filter_map(|(timestamp, source)| timestamp.map(|t| (t, source)))
            .min()
        else {
            return Ok(false);
        };
        let (timestamp, source) = due;
        if timestamp > self.now {
            return Ok(false);
        }

        debug!(timestamp, ?source, "applying event");
        match source {
            EventSource::Snapshot => {
                let snapshot = &self.snapshots[self.snapshot_cursor];
                self.book
                    .update_book(snapshot.timestamp, &snapshot.asks, &snapshot.bids);
                self.snapshot_cursor += 1;
            }
            EventSource::Trade => {
                let trade = self.trades[self.trade_cursor];
                self.book.apply_historical_trade(&trade)?;
                self.trade_cursor += 1;
            }
            EventSource::LimitActivation => {
                let pending = self
                    .pending_limits
                    .pop_front()
                    .expect("limit queue emptied between peek and pop");
                self.book.insert_user_limit(
                    pending.id,
                    pending.activation,
                    pending.side,
                    pending.volume,
                    pending.price,
                )?;
            }
            EventSource::MarketActivation => {
                let pending = self
                    .pending_markets
                    .pop_front()
                    .expect("market queue emptied between peek and pop");
                self.book.execute_user_market(
                    pending.id,
                    pending.activation,
                    pending.side,
                    pending.volume,
                )?;
            }
            EventSource::Cancel => {
                let pending = self
                    .pending_cancels
                    .pop_front()
                    .expect("cancel queue emptied between peek and pop");
                self.book.cancel_order(pending.order_id)?;
            }
        }
        Ok(true)
    }

    /// Advance just far enough that the next API call clears the
    /// call-frequency gate, and return the resulting time. A no-op when
    /// the gate is already open.
    ///
    /// # Errors
    ///
    /// Propagates failures from the implied [`advance`](Self::advance).
    pub fn process_before_unlock(&mut self) -> Result<u64, BacktestError> {
        match self.last_call {
            Some(last_call) if last_call + self.config.call_frequency > self.now => {
                let delta = last_call + self.config.call_frequency - self.now;
                self.advance(delta)
            }
            _ => Ok(self.now),
        }
    }

    fn gate_open(&self) -> bool {
        self.last_call
            .is_none_or(|last_call| self.now >= last_call + self.config.call_frequency)
    }

    /// Submit a limit order. Returns the order id, or `None` when the call
    /// is rate-limited. The order reaches the book `post_latency` ms from
    /// now.
    ///
    /// # Errors
    ///
    /// [`BacktestError::InvalidOperation`] on zero volume or price.
    pub fn send_limit(
        &mut self,
        side: Side,
        volume: u64,
        price: u64,
    ) -> Result<Option<u64>, BacktestError> {
        if volume == 0 || price == 0 {
            return Err(BacktestError::InvalidOperation {
                message: format!("limit order needs positive volume and price, got {volume} @ {price}"),
            });
        }
        if !self.gate_open() {
            return Ok(None);
        }
        self.last_call = Some(self.now);
        let id = self.book.register_order();
        let activation = self.now + self.config.post_latency;
        self.pending_limits.push_back(PendingLimit {
            id,
            activation,
            side,
            volume,
            price,
        });
        debug!(order_id = id, %side, volume, price, activation, "limit order submitted");
        Ok(Some(id))
    }

    /// Submit a market order. Returns the order id, or `None` when the
    /// call is rate-limited. The order crosses the book `post_latency` ms
    /// from now; if the opposite synthetic depth cannot absorb it then,
    /// that `advance` fails.
    ///
    /// # Errors
    ///
    /// [`BacktestError::InvalidOperation`] on zero volume.
    pub fn send_market(&mut self, side: Side, volume: u64) -> Result<Option<u64>, BacktestError> {
        if volume == 0 {
            return Err(BacktestError::InvalidOperation {
                message: "market order needs positive volume".to_string(),
            });
        }
        if !self.gate_open() {
            return Ok(None);
        }
        self.last_call = Some(self.now);
        let id = self.book.register_order();
        let activation = self.now + self.config.post_latency;
        self.pending_markets.push_back(PendingMarket {
            id,
            activation,
            side,
            volume,
        });
        debug!(order_id = id, %side, volume, activation, "market order submitted");
        Ok(Some(id))
    }

    /// Request withdrawal of a limit order. Returns `false` when the call
    /// is rate-limited or the order has already closed. An accepted
    /// request takes effect `cancel_latency` ms from now; the order can
    /// still fill in between.
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] for an id that was never issued;
    /// [`BacktestError::InvalidOperation`] when the id names a market
    /// order.
    pub fn withdraw_limit(&mut self, id: u64) -> Result<bool, BacktestError> {
        if !self.gate_open() {
            return Ok(false);
        }
        if let Some(order) = self.book.order(id)? {
            if order.price_limit().is_none() {
                return Err(BacktestError::InvalidOperation {
                    message: format!("order {id} is not a limit order"),
                });
            }
            if order.is_closed() {
                return Ok(false);
            }
        }
        self.last_call = Some(self.now);
        let activation = self.now + self.config.cancel_latency;
        self.pending_cancels.push_back(PendingCancel {
            activation,
            order_id: id,
        });
        debug!(order_id = id, activation, "withdrawal requested");
        Ok(true)
    }

    /// Running position from every user fill so far.
    ///
    /// The limit fee applies to ASK-side fills and the market fee to
    /// BID-side fills, whichever kind of user order produced them; both
    /// legs are fee-netted.
    #[must_use]
    pub fn pnl(&self) -> Pnl {
        let fees = self.config.fees;
        let mut cash: i128 = 0;
        let mut asset: i64 = 0;
        for order in self
            .book
            .user_limit_asks()
            .chain(self.book.user_market_asks())
        {
            for fill in order.fills() {
                cash += fees.limit_net(fill.notional()) as i128;
                asset -= fill.volume as i64;
            }
        }
        for order in self
            .book
            .user_limit_bids()
            .chain(self.book.user_market_bids())
        {
            for fill in order.fills() {
                cash -= fees.market_net(fill.notional()) as i128;
                asset += fill.volume as i64;
            }
        }
        Pnl {
            cash,
            asset,
            timestamp: self.now,
        }
    }

    /// Best ask price.
    ///
    /// # Errors
    ///
    /// [`BacktestError::EmptySide`] when no asks rest.
    pub fn best_ask(&self) -> Result<u64, BacktestError> {
        self.book
            .best_ask()
            .ok_or(BacktestError::EmptySide { side: Side::Ask })
    }

    /// Best bid price.
    ///
    /// # Errors
    ///
    /// [`BacktestError::EmptySide`] when no bids rest.
    pub fn best_bid(&self) -> Result<u64, BacktestError> {
        self.book
            .best_bid()
            .ok_or(BacktestError::EmptySide { side: Side::Bid })
    }

    /// Look up a user order by id; `Ok(None)` while it is still in flight.
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] for an id that was never issued.
    pub fn order(&self, id: u64) -> Result<Option<&Order>, BacktestError> {
        self.book.order(id)
    }

    /// Queue position of a resting user limit order; see
    /// [`OrderBook::order_position`].
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] for an id that was never issued.
    pub fn order_position(&self, id: u64) -> Result<Option<usize>, BacktestError> {
        self.book.order_position(id)
    }

    /// Current simulated time in ms since epoch.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Timestamp of the most recent accepted API call, if any.
    #[must_use]
    pub fn last_call(&self) -> Option<u64> {
        self.last_call
    }

    /// The run's fixed configuration.
    #[must_use]
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// The underlying book, for ladder and user-order views.
    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Every trade produced so far.
    #[must_use]
    pub fn tape(&self) -> &[Trade] {
        self.book.tape()
    }

    /// Ask-side resting orders in priority order.
    pub fn asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.book.asks()
    }

    /// Bid-side resting orders in priority order.
    pub fn bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.book.bids()
    }

    /// User limit asks in submission order.
    pub fn user_limit_asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.book.user_limit_asks()
    }

    /// User limit bids in submission order.
    pub fn user_limit_bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.book.user_limit_bids()
    }

    /// User market asks in submission order.
    pub fn user_market_asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.book.user_market_asks()
    }

    /// User market bids in submission order.
    pub fn user_market_bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.book.user_market_bids()
    }
}
