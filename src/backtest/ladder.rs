//! Price–time priority ladders
//!
//! A [`Ladder`] is one side of the book: an ordered map from price to the
//! level resting there, each level a time-ordered queue of entries. Entries
//! own synthetic orders inline; user orders live in the book's arena and
//! are referenced by id, so a single canonical record backs the ladder, the
//! user-order lists and the fill history.

use crate::backtest::order::{Order, Side};
use either::Either;
use std::collections::BTreeMap;

/// Ladder-internal identity used for the time-priority tie-break.
///
/// At an equal (price, submit timestamp) key, user orders rank ahead of
/// synthetic entries; synthetic entries rank among themselves by allocation
/// sequence, which keeps key-equal snapshot levels distinct and their
/// relative order deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum EntryId {
    /// A user order, by registration id
    User(u64),
    /// A synthetic order, by book-wide allocation sequence
    Synthetic(u64),
}

/// Position of an entry within a level: submit timestamp, then identity.
pub(crate) type EntryKey = (u64, EntryId);

/// A ladder entry: synthetic orders are owned here, user orders by the
/// book's arena.
#[derive(Debug, Clone)]
pub(crate) enum LadderSlot {
    /// Snapshot-manufactured resting order, owned by the ladder
    Synthetic(Order),
    /// A user limit order, stored in the arena under this id
    User(u64),
}

#[derive(Debug, Clone, Default)]
struct PriceLevel {
    entries: BTreeMap<EntryKey, LadderSlot>,
}

/// One side's priority structure.
///
/// Iteration yields entries best-first: ascending prices for asks,
/// descending for bids, and within a price by (submit timestamp, entry id).
#[derive(Debug, Clone)]
pub(crate) struct Ladder {
    side: Side,
    levels: BTreeMap<u64, PriceLevel>,
}

impl Ladder {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Best price on this side, if any.
    pub(crate) fn best_price(&self) -> Option<u64> {
        match self.side {
            Side::Ask => self.levels.keys().next().copied(),
            Side::Bid => self.levels.keys().next_back().copied(),
        }
    }

    pub(crate) fn insert(&mut self, price: u64, key: EntryKey, slot: LadderSlot) {
        self.levels
            .entry(price)
            .or_default()
            .entries
            .insert(key, slot);
    }

    /// Remove one entry; empty levels are dropped with it.
    pub(crate) fn remove(&mut self, price: u64, key: &EntryKey) -> Option<LadderSlot> {
        let level = self.levels.get_mut(&price)?;
        let slot = level.entries.remove(key);
        if level.entries.is_empty() {
            self.levels.remove(&price);
        }
        slot
    }

    pub(crate) fn get_mut(&mut self, price: u64, key: &EntryKey) -> Option<&mut LadderSlot> {
        self.levels.get_mut(&price)?.entries.get_mut(key)
    }

    /// Consume the ladder, yielding entries in ascending price and time
    /// order. Snapshot reconciliation rebuilds sides from this; priority
    /// direction is irrelevant there because every price meets its own
    /// incoming level.
    pub(crate) fn into_entries(self) -> impl Iterator<Item = (u64, EntryKey, LadderSlot)> {
        self.levels.into_iter().flat_map(|(price, level)| {
            level
                .entries
                .into_iter()
                .map(move |(key, slot)| (price, key, slot))
        })
    }

    /// Entries in price–time priority order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &EntryKey, &LadderSlot)> + '_ {
        let directed = match self.side {
            Side::Ask => Either::Left(self.levels.iter()),
            Side::Bid => Either::Right(self.levels.iter().rev()),
        };
        directed.flat_map(|(price, level)| {
            level
                .entries
                .iter()
                .map(move |(key, slot)| (*price, key, slot))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::order::OrderId;

    fn synthetic(ts: u64, side: Side, volume: u64, price: u64) -> Order {
        Order::limit(OrderId::Synthetic, ts, side, volume, price)
    }

    #[test]
    fn test_ask_priority_is_price_ascending() {
        let mut ladder = Ladder::new(Side::Ask);
        ladder.insert(10, (100, EntryId::Synthetic(0)), LadderSlot::Synthetic(synthetic(100, Side::Ask, 1, 10)));
        ladder.insert(5, (100, EntryId::Synthetic(1)), LadderSlot::Synthetic(synthetic(100, Side::Ask, 1, 5)));
        ladder.insert(7, (100, EntryId::Synthetic(2)), LadderSlot::Synthetic(synthetic(100, Side::Ask, 1, 7)));

        let prices: Vec<u64> = ladder.iter().map(|(price, _, _)| price).collect();
        assert_eq!(prices, vec![5, 7, 10]);
        assert_eq!(ladder.best_price(), Some(5));
    }

    #[test]
    fn test_bid_priority_is_price_descending() {
        let mut ladder = Ladder::new(Side::Bid);
        ladder.insert(4, (100, EntryId::Synthetic(0)), LadderSlot::Synthetic(synthetic(100, Side::Bid, 1, 4)));
        ladder.insert(3, (100, EntryId::Synthetic(1)), LadderSlot::Synthetic(synthetic(100, Side::Bid, 1, 3)));

        let prices: Vec<u64> = ladder.iter().map(|(price, _, _)| price).collect();
        assert_eq!(prices, vec![4, 3]);
        assert_eq!(ladder.best_price(), Some(4));
    }

    #[test]
    fn test_time_priority_within_level() {
        let mut ladder = Ladder::new(Side::Ask);
        ladder.insert(5, (200, EntryId::Synthetic(0)), LadderSlot::Synthetic(synthetic(200, Side::Ask, 1, 5)));
        ladder.insert(5, (100, EntryId::Synthetic(1)), LadderSlot::Synthetic(synthetic(100, Side::Ask, 1, 5)));
        // same timestamp: the user entry outranks the synthetic one
        ladder.insert(5, (100, EntryId::User(3)), LadderSlot::User(3));

        let keys: Vec<EntryKey> = ladder.iter().map(|(_, key, _)| *key).collect();
        assert_eq!(
            keys,
            vec![
                (100, EntryId::User(3)),
                (100, EntryId::Synthetic(1)),
                (200, EntryId::Synthetic(0)),
            ]
        );
    }

    #[test]
    fn test_remove_drops_empty_level() {
        let mut ladder = Ladder::new(Side::Ask);
        let key = (100, EntryId::Synthetic(0));
        ladder.insert(5, key, LadderSlot::Synthetic(synthetic(100, Side::Ask, 1, 5)));
        assert_eq!(ladder.iter().count(), 1);

        assert!(ladder.remove(5, &key).is_some());
        assert_eq!(ladder.iter().count(), 0);
        assert_eq!(ladder.best_price(), None);
    }
}
