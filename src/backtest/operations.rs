//! Book mutations: registration, activation, cancellation, and snapshot
//! reconciliation

use crate::backtest::book::OrderBook;
use crate::backtest::error::BacktestError;
use crate::backtest::ladder::{EntryId, Ladder, LadderSlot};
use crate::backtest::order::{Order, OrderId, Side};
use crate::backtest::snapshot::DepthLevel;
use tracing::trace;

impl OrderBook {
    /// Allocate the next user order id and reserve its arena slot.
    ///
    /// The slot stays empty until the order activates; this lets a
    /// submitter receive its id synchronously while the order itself is
    /// still in flight.
    pub fn register_order(&mut self) -> u64 {
        self.users.push(None);
        let id = (self.users.len() - 1) as u64;
        trace!(order_id = id, "registered order id");
        id
    }

    /// Activate a user limit order: store it under its id and rest it in
    /// the ladder. No crossing happens here; a marketable limit waits for
    /// the tape to reach its price.
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] when `id` was never registered.
    pub fn insert_user_limit(
        &mut self,
        id: u64,
        submit_timestamp: u64,
        side: Side,
        volume: u64,
        price: u64,
    ) -> Result<(), BacktestError> {
        if id as usize >= self.users.len() {
            return Err(BacktestError::UnknownOrder(id));
        }
        self.users[id as usize] = Some(Order::limit(
            OrderId::User(id),
            submit_timestamp,
            side,
            volume,
            price,
        ));
        match side {
            Side::Ask => self.user_limit_asks.push(id),
            Side::Bid => self.user_limit_bids.push(id),
        }
        self.ladder_mut(side)
            .insert(price, (submit_timestamp, EntryId::User(id)), LadderSlot::User(id));
        trace!(order_id = id, side = %side, price, volume, "user limit order resting");
        Ok(())
    }

    /// Make a cancellation effective: mark the order canceled and remove
    /// its ladder entry. An order that already closed keeps its fills and
    /// just gains the canceled flag.
    ///
    /// # Errors
    ///
    /// [`BacktestError::UnknownOrder`] when `id` was never registered or
    /// has not activated yet; [`BacktestError::InvalidOperation`] when it
    /// names a market order.
    pub fn cancel_order(&mut self, id: u64) -> Result<(), BacktestError> {
        let order = self
            .users
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(BacktestError::UnknownOrder(id))?;
        let Some(price) = order.price_limit() else {
            return Err(BacktestError::InvalidOperation {
                message: format!("order {id} is not a limit order"),
            });
        };
        let side = order.side();
        let key = (order.submit_timestamp(), EntryId::User(id));
        let was_open = !order.is_closed();
        order.cancel();
        if was_open {
            self.ladder_mut(side).remove(price, &key);
        }
        trace!(order_id = id, "limit order canceled");
        Ok(())
    }

    /// Reconcile the book with a depth snapshot taken at `timestamp`.
    ///
    /// Per side: user orders survive untouched; a synthetic order whose
    /// price appears in the snapshot is replaced by a fresh synthetic order
    /// for `min(incoming volume, existing volume)` that keeps the old
    /// submit timestamp (time priority survives), consuming that much of
    /// the incoming level; synthetic depth at prices the snapshot no longer
    /// quotes is dropped; whatever incoming volume is left after the merge
    /// is appended as brand-new synthetic orders stamped with the snapshot
    /// time. Zero-volume incoming levels are ignored.
    pub fn update_book(&mut self, timestamp: u64, new_asks: &[DepthLevel], new_bids: &[DepthLevel]) {
        self.reconcile_side(Side::Ask, timestamp, new_asks);
        self.reconcile_side(Side::Bid, timestamp, new_bids);
        trace!(
            timestamp,
            asks = new_asks.len(),
            bids = new_bids.len(),
            "applied depth snapshot"
        );
    }

    fn reconcile_side(&mut self, side: Side, timestamp: u64, incoming: &[DepthLevel]) {
        let mut budget: Vec<DepthLevel> = incoming.to_vec();
        let old = std::mem::replace(self.ladder_mut(side), Ladder::new(side));
        let mut fresh = Ladder::new(side);

        for (price, key, slot) in old.into_entries() {
            match slot {
                LadderSlot::User(id) => {
                    fresh.insert(price, key, LadderSlot::User(id));
                }
                LadderSlot::Synthetic(existing) => {
                    match budget.iter_mut().find(|level| level.price == price) {
                        Some(level) if level.volume > 0 => {
                            let shared = level.volume.min(existing.volume());
                            level.volume -= shared;
                            let seq = self.next_synthetic_seq();
                            fresh.insert(
                                price,
                                (existing.submit_timestamp(), EntryId::Synthetic(seq)),
                                LadderSlot::Synthetic(Order::limit(
                                    OrderId::Synthetic,
                                    existing.submit_timestamp(),
                                    side,
                                    shared,
                                    price,
                                )),
                            );
                        }
                        // price no longer quoted, or its volume is spoken for
                        _ => {}
                    }
                }
            }
        }

        for level in budget {
            if level.volume == 0 {
                continue;
            }
            let seq = self.next_synthetic_seq();
            fresh.insert(
                level.price,
                (timestamp, EntryId::Synthetic(seq)),
                LadderSlot::Synthetic(Order::limit(
                    OrderId::Synthetic,
                    timestamp,
                    side,
                    level.volume,
                    level.price,
                )),
            );
        }

        *self.ladder_mut(side) = fresh;
    }

    fn next_synthetic_seq(&mut self) -> u64 {
        let seq = self.synthetic_seq;
        self.synthetic_seq += 1;
        seq
    }
}
