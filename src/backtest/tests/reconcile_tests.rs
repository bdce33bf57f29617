//! Tests for snapshot reconciliation

#[cfg(test)]
mod tests {
    use crate::backtest::{DepthLevel, Order, OrderBook, Side, Trade};

    fn level(price: u64, volume: u64) -> DepthLevel {
        DepthLevel { price, volume }
    }

    fn collect<'a>(orders: impl Iterator<Item = &'a Order>) -> Vec<(u64, u64, u64, bool)> {
        orders
            .map(|order| {
                (
                    order.price_limit().unwrap(),
                    order.remaining(),
                    order.submit_timestamp(),
                    order.id().is_synthetic(),
                )
            })
            .collect()
    }

    #[test]
    fn test_first_snapshot_populates_both_sides() {
        let mut book = OrderBook::new();
        book.update_book(
            100,
            &[level(5, 10), level(10, 15)],
            &[level(4, 8), level(3, 11)],
        );

        assert_eq!(
            collect(book.asks()),
            vec![(5, 10, 100, true), (10, 15, 100, true)]
        );
        assert_eq!(
            collect(book.bids()),
            vec![(4, 8, 100, true), (3, 11, 100, true)]
        );
        assert_eq!(book.best_ask(), Some(5));
        assert_eq!(book.best_bid(), Some(4));
    }

    #[test]
    fn test_empty_snapshot_clears_synthetic_but_keeps_user_orders() {
        let mut book = OrderBook::new();
        book.update_book(100, &[level(5, 10)], &[level(4, 8)]);

        let id = book.register_order();
        book.insert_user_limit(id, 150, Side::Ask, 3, 6).unwrap();

        book.update_book(200, &[], &[]);

        assert_eq!(collect(book.asks()), vec![(6, 3, 150, false)]);
        assert_eq!(book.bids().count(), 0);
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_shrinking_level_keeps_time_priority() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[level(5, 10)], &[]);
        book.update_book(2_000, &[level(5, 3)], &[]);

        // volume shrank to the snapshot bound, the timestamp did not move
        assert_eq!(collect(book.asks()), vec![(5, 3, 1_000, true)]);
    }

    #[test]
    fn test_growing_level_appends_residual_with_snapshot_timestamp() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[level(5, 10)], &[]);
        book.update_book(2_000, &[level(5, 15)], &[]);

        // the shared quantity keeps seniority, the growth queues behind it
        assert_eq!(
            collect(book.asks()),
            vec![(5, 10, 1_000, true), (5, 5, 2_000, true)]
        );
    }

    #[test]
    fn test_omitted_price_drops_synthetic_but_not_user_depth() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[], &[level(4, 8)]);

        let id = book.register_order();
        book.insert_user_limit(id, 1_100, Side::Bid, 2, 4).unwrap();

        // the new snapshot no longer quotes price 4
        book.update_book(2_000, &[], &[level(3, 5)]);

        assert_eq!(
            collect(book.bids()),
            vec![(4, 2, 1_100, false), (3, 5, 2_000, true)]
        );
    }

    #[test]
    fn test_zero_volume_levels_are_ignored() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[level(5, 0), level(6, 7)], &[level(4, 0)]);

        assert_eq!(collect(book.asks()), vec![(6, 7, 1_000, true)]);
        assert_eq!(book.bids().count(), 0);
    }

    #[test]
    fn test_merge_is_bounded_by_initial_volume_not_remaining() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[level(5, 10)], &[]);

        // the tape drains 6 of the 10 resting units
        book.apply_historical_trade(&Trade::new(1_100, 6, 5, false))
            .unwrap();
        assert_eq!(collect(book.asks()), vec![(5, 4, 1_000, true)]);

        // the next snapshot quotes 8 at that price: the fresh shared
        // quantity is min(8, 10), not min(8, 4)
        book.update_book(2_000, &[level(5, 8)], &[]);
        assert_eq!(collect(book.asks()), vec![(5, 8, 1_000, true)]);
    }

    #[test]
    fn test_user_order_does_not_consume_snapshot_volume() {
        let mut book = OrderBook::new();
        let id = book.register_order();
        book.insert_user_limit(id, 1_100, Side::Ask, 5, 7).unwrap();

        book.update_book(2_000, &[level(7, 10)], &[]);

        // the user order and the full snapshot level coexist at price 7
        assert_eq!(
            collect(book.asks()),
            vec![(7, 5, 1_100, false), (7, 10, 2_000, true)]
        );
    }

    #[test]
    fn test_snapshot_level_splits_across_same_price_synthetics() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[level(5, 4)], &[]);
        book.update_book(1_500, &[level(5, 10)], &[]);
        // now two synthetics rest at 5: (4 @ t=1000) and (6 @ t=1500)
        assert_eq!(
            collect(book.asks()),
            vec![(5, 4, 1_000, true), (5, 6, 1_500, true)]
        );

        // a snapshot of 7 at that price is consumed oldest-first
        book.update_book(2_000, &[level(5, 7)], &[]);
        assert_eq!(
            collect(book.asks()),
            vec![(5, 4, 1_000, true), (5, 3, 1_500, true)]
        );
    }
}
