//! Crossing logic: user market orders against synthetic depth, and
//! replay of the historical tape against the whole ladder
//!
//! Both operations plan the full drain against an immutable view of the
//! ladder and only then mutate, so a failing event leaves the book
//! untouched.

use crate::backtest::book::OrderBook;
use crate::backtest::error::BacktestError;
use crate::backtest::ladder::{EntryKey, LadderSlot};
use crate::backtest::order::{Order, OrderId, Side};
use crate::backtest::trade::Trade;
use tracing::trace;

/// One planned fill: which ladder entry to drain and by how much.
struct DrainStep {
    price: u64,
    key: EntryKey,
    take: u64,
}

impl OrderBook {
    /// Activate a user market order: cross the opposite ladder in priority
    /// order, draining synthetic depth only, until the order closes.
    ///
    /// Each drained entry produces a trade at the resting price with
    /// `is_buyer_maker = (side == Ask)`, recorded on both orders and on
    /// the tape. User limit orders on the opposite side are skipped; only
    /// snapshot-derived liquidity is executable, so the user never trades
    /// against their own book.
    ///
    /// # Errors
    ///
    /// [`BacktestError::InsufficientLiquidity`] when the opposite ladder
    /// does not hold enough open synthetic volume — the strategy asked for
    /// more than the market historically offered. The book is unchanged.
    pub fn execute_user_market(
        &mut self,
        id: u64,
        submit_timestamp: u64,
        side: Side,
        volume: u64,
    ) -> Result<(), BacktestError> {
        if id as usize >= self.users.len() {
            return Err(BacktestError::UnknownOrder(id));
        }
        let opposite = side.opposite();
        let plan = self.plan_drain(opposite, volume, true).map_err(|available| {
            BacktestError::InsufficientLiquidity {
                side,
                requested: volume,
                available,
            }
        })?;

        let mut order = Order::market(OrderId::User(id), submit_timestamp, side, volume);
        let is_buyer_maker = side == Side::Ask;
        for step in &plan {
            let fill = Trade::new(submit_timestamp, step.take, step.price, is_buyer_maker);
            self.fill_resting(opposite, step, fill)?;
            order.add_fill(fill)?;
            self.tape.push(fill);
        }
        self.users[id as usize] = Some(order);
        match side {
            Side::Ask => self.user_market_asks.push(id),
            Side::Bid => self.user_market_bids.push(id),
        }
        trace!(order_id = id, side = %side, volume, steps = plan.len(), "user market order executed");
        Ok(())
    }

    /// Replay one historical trade against the book.
    ///
    /// The aggressor sold into the bid ladder when `is_buyer_maker` is
    /// true, else bought from the ask ladder. The routed ladder drains in
    /// priority order across both synthetic and user orders, producing one
    /// trade per consumed entry at that entry's limit price with the
    /// original timestamp and aggressor flag. This is how the tape both
    /// keeps synthetic depth honest and realizes user limit fills.
    ///
    /// # Errors
    ///
    /// [`BacktestError::TradeExceedsDepth`] when the trade carries more
    /// volume than the ladder holds — the feed is inconsistent with the
    /// book. The book is unchanged.
    pub fn apply_historical_trade(&mut self, trade: &Trade) -> Result<(), BacktestError> {
        let side = if trade.is_buyer_maker {
            Side::Bid
        } else {
            Side::Ask
        };
        let plan = self
            .plan_drain(side, trade.volume, false)
            .map_err(|available| BacktestError::TradeExceedsDepth {
                side,
                timestamp: trade.timestamp,
                volume: trade.volume,
                available,
            })?;

        for step in &plan {
            let fill = Trade::new(trade.timestamp, step.take, step.price, trade.is_buyer_maker);
            self.fill_resting(side, step, fill)?;
            self.tape.push(fill);
        }
        trace!(
            timestamp = trade.timestamp,
            volume = trade.volume,
            side = %side,
            steps = plan.len(),
            "historical trade replayed"
        );
        Ok(())
    }

    /// Plan how `volume` drains from `side`'s ladder in priority order.
    /// `Err(available)` reports the total eligible depth when it cannot
    /// absorb the full volume.
    fn plan_drain(
        &self,
        side: Side,
        volume: u64,
        synthetic_only: bool,
    ) -> Result<Vec<DrainStep>, u64> {
        let mut steps = Vec::new();
        let mut need = volume;
        let mut available: u64 = 0;
        for (price, key, slot) in self.ladder(side).iter() {
            if synthetic_only && matches!(slot, LadderSlot::User(_)) {
                continue;
            }
            if need == 0 {
                break;
            }
            let remaining = self.resolve(slot).remaining();
            available = available.saturating_add(remaining);
            let take = need.min(remaining);
            steps.push(DrainStep {
                price,
                key: *key,
                take,
            });
            need -= take;
        }
        if need > 0 { Err(available) } else { Ok(steps) }
    }

    /// Apply one planned fill to its resting order, dropping the ladder
    /// entry once the order closes.
    fn fill_resting(
        &mut self,
        side: Side,
        step: &DrainStep,
        fill: Trade,
    ) -> Result<(), BacktestError> {
        let Self {
            asks, bids, users, ..
        } = self;
        let ladder = match side {
            Side::Ask => asks,
            Side::Bid => bids,
        };
        let slot = ladder
            .get_mut(step.price, &step.key)
            .expect("planned ladder entry disappeared before apply");
        let closed = match slot {
            LadderSlot::Synthetic(order) => {
                order.add_fill(fill)?;
                order.is_closed()
            }
            LadderSlot::User(uid) => {
                let order = users[*uid as usize]
                    .as_mut()
                    .expect("ladder references an order that never activated");
                order.add_fill(fill)?;
                order.is_closed()
            }
        };
        if closed {
            ladder.remove(step.price, &step.key);
        }
        Ok(())
    }
}
