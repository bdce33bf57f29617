//! Core order book: two price–time ladders plus the order arena

use crate::backtest::error::BacktestError;
use crate::backtest::ladder::{Ladder, LadderSlot};
use crate::backtest::order::{Order, Side};
use crate::backtest::trade::Trade;

/// The simulated book for a single instrument.
///
/// Synthetic resting liquidity is derived from depth snapshots and lives
/// inside the ladders; user orders live in an arena indexed by their
/// registration id, with ladders and the per-side lists referring to them
/// by id. The tape collects every trade the simulation produces, both from
/// replaying the historical tape and from user market orders.
///
/// Ladders hold only open, non-canceled limit orders: entries are removed
/// the moment an order closes or a cancellation takes effect.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub(crate) asks: Ladder,
    pub(crate) bids: Ladder,
    /// Arena of user orders; a `None` slot is registered but not yet active.
    pub(crate) users: Vec<Option<Order>>,
    pub(crate) user_limit_asks: Vec<u64>,
    pub(crate) user_limit_bids: Vec<u64>,
    pub(crate) user_market_asks: Vec<u64>,
    pub(crate) user_market_bids: Vec<u64>,
    pub(crate) tape: Vec<Trade>,
    /// Allocation sequence for synthetic ladder entries.
    pub(crate) synthetic_seq: u64,
}

impl OrderBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self {
            asks: Ladder::new(Side::Ask),
            bids: Ladder::new(Side::Bid),
            users: Vec::new(),
            user_limit_asks: Vec::new(),
            user_limit_bids: Vec::new(),
            user_market_asks: Vec::new(),
            user_market_bids: Vec::new(),
            tape: Vec::new(),
            synthetic_seq: 0,
        }
    }

    pub(crate) fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    pub(crate) fn ladder_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        }
    }

    /// Resolve a ladder slot to its canonical order record.
    pub(crate) fn resolve<'a>(&'a self, slot: &'a LadderSlot) -> &'a Order {
        match slot {
            LadderSlot::Synthetic(order) => order,
            LadderSlot::User(id) => self.users[*id as usize]
                .as_ref()
                .expect("ladder references an order that never activated"),
        }
    }

    /// Best (lowest) ask price, `None` when the side is empty.
    #[must_use]
    pub fn best_ask(&self) -> Option<u64> {
        self.asks.best_price()
    }

    /// Best (highest) bid price, `None` when the side is empty.
    #[must_use]
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.best_price()
    }

    /// Look up a user order by id.
    ///
    /// Returns `Ok(None)` for an id that has been issued but whose order
    /// has not activated yet.
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] for an id this book never issued.
    pub fn order(&self, id: u64) -> Result<Option<&Order>, BacktestError> {
        self.users
            .get(id as usize)
            .map(Option::as_ref)
            .ok_or(BacktestError::UnknownOrder(id))
    }

    /// Ask-side resting orders in price–time priority order.
    pub fn asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.asks.iter().map(|(_, _, slot)| self.resolve(slot))
    }

    /// Bid-side resting orders in price–time priority order.
    pub fn bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.bids.iter().map(|(_, _, slot)| self.resolve(slot))
    }

    /// User limit asks in submission order.
    pub fn user_limit_asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.user_orders(&self.user_limit_asks)
    }

    /// User limit bids in submission order.
    pub fn user_limit_bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.user_orders(&self.user_limit_bids)
    }

    /// User market asks in submission order.
    pub fn user_market_asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.user_orders(&self.user_market_asks)
    }

    /// User market bids in submission order.
    pub fn user_market_bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.user_orders(&self.user_market_bids)
    }

    fn user_orders<'a>(&'a self, ids: &'a [u64]) -> impl Iterator<Item = &'a Order> + 'a {
        ids.iter().map(|id| {
            self.users[*id as usize]
                .as_ref()
                .expect("user-order list references an order that never activated")
        })
    }

    /// Every trade produced so far, in application order.
    #[must_use]
    pub fn tape(&self) -> &[Trade] {
        &self.tape
    }

    /// Queue position of a resting user limit order on its own side: the
    /// number of ladder entries strictly senior to it. `None` when the
    /// order is not resting (pending, closed, canceled, or a market order).
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] for an id this book never issued.
    pub fn order_position(&self, id: u64) -> Result<Option<usize>, BacktestError> {
        let Some(order) = self.order(id)? else {
            return Ok(None);
        };
        if order.price_limit().is_none() || order.is_closed() || order.is_canceled() {
            return Ok(None);
        }
        let position = self
            .ladder(order.side())
            .iter()
            .position(|(_, _, slot)| matches!(slot, LadderSlot::User(user) if *user == id));
        Ok(position)
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
