//! Tests for user market crossing and tape replay

#[cfg(test)]
mod tests {
    use crate::backtest::{BacktestError, DepthLevel, OrderBook, Side, Trade};

    fn level(price: u64, volume: u64) -> DepthLevel {
        DepthLevel { price, volume }
    }

    fn ask_book(levels: &[DepthLevel]) -> OrderBook {
        let mut book = OrderBook::new();
        book.update_book(1_000, levels, &[]);
        book
    }

    #[test]
    fn test_market_order_walks_priority_and_records_tape() {
        let mut book = ask_book(&[level(100, 5), level(110, 10)]);
        let id = book.register_order();
        book.execute_user_market(id, 1_100, Side::Bid, 8).unwrap();

        let order = book.order(id).unwrap().unwrap();
        assert!(order.is_closed());
        assert_eq!(order.fills().len(), 2);
        assert_eq!(
            book.tape(),
            &[
                Trade::new(1_100, 5, 100, false),
                Trade::new(1_100, 3, 110, false),
            ]
        );
        // (5*100 + 3*110) / 8 = 103.75
        assert_eq!(order.average_price(), 103.75);
        // the partially drained level keeps the rest
        assert_eq!(book.asks().map(|o| o.remaining()).sum::<u64>(), 7);
    }

    #[test]
    fn test_ask_market_order_crosses_bids_as_seller() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[], &[level(90, 10)]);
        let id = book.register_order();
        book.execute_user_market(id, 1_100, Side::Ask, 4).unwrap();

        // the aggressor sold, so the resting buyer was the maker
        assert_eq!(book.tape(), &[Trade::new(1_100, 4, 90, true)]);
        assert_eq!(book.bids().map(|o| o.remaining()).sum::<u64>(), 6);
    }

    #[test]
    fn test_market_order_skips_user_limits() {
        let mut book = ask_book(&[level(100, 10)]);
        // a user ask resting at a better price than the synthetic depth
        let resting = book.register_order();
        book.insert_user_limit(resting, 1_050, Side::Ask, 5, 90)
            .unwrap();

        let id = book.register_order();
        book.execute_user_market(id, 1_100, Side::Bid, 6).unwrap();

        // the cross ignored the user's own ask and paid the synthetic price
        assert_eq!(book.tape(), &[Trade::new(1_100, 6, 100, false)]);
        let user = book.order(resting).unwrap().unwrap();
        assert_eq!(user.remaining(), 5);
        assert!(user.fills().is_empty());
    }

    #[test]
    fn test_market_order_insufficient_depth_is_fatal_and_atomic() {
        let mut book = ask_book(&[level(100, 5)]);
        // a user ask does not count toward executable depth
        let resting = book.register_order();
        book.insert_user_limit(resting, 1_050, Side::Ask, 50, 90)
            .unwrap();

        let id = book.register_order();
        let err = book
            .execute_user_market(id, 1_100, Side::Bid, 6)
            .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::InsufficientLiquidity {
                side: Side::Bid,
                requested: 6,
                available: 5,
            }
        ));

        // nothing was applied
        assert!(book.tape().is_empty());
        assert!(book.order(id).unwrap().is_none());
        assert_eq!(
            book.asks()
                .filter(|o| o.id().is_synthetic())
                .map(|o| o.remaining())
                .sum::<u64>(),
            5
        );
    }

    #[test]
    fn test_market_order_equal_to_depth_closes_at_last_level() {
        let mut book = ask_book(&[level(100, 5), level(110, 10)]);
        let id = book.register_order();
        book.execute_user_market(id, 1_100, Side::Bid, 15).unwrap();

        assert!(book.order(id).unwrap().unwrap().is_closed());
        assert_eq!(book.asks().count(), 0);

        // one unit more than the whole side is fatal
        let mut book = ask_book(&[level(100, 5), level(110, 10)]);
        let id = book.register_order();
        assert!(matches!(
            book.execute_user_market(id, 1_100, Side::Bid, 16),
            Err(BacktestError::InsufficientLiquidity { available: 15, .. })
        ));
    }

    #[test]
    fn test_tape_replay_fills_synthetic_then_user() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[], &[level(90, 10)]);
        let id = book.register_order();
        book.insert_user_limit(id, 1_100, Side::Bid, 5, 90).unwrap();

        // the aggressor sells 12 into the bids: 10 synthetic, then 2 user
        book.apply_historical_trade(&Trade::new(1_200, 12, 90, true))
            .unwrap();

        let user = book.order(id).unwrap().unwrap();
        assert_eq!(user.remaining(), 3);
        assert_eq!(user.fills(), &[Trade::new(1_200, 2, 90, true)]);
        assert_eq!(
            book.tape(),
            &[
                Trade::new(1_200, 10, 90, true),
                Trade::new(1_200, 2, 90, true),
            ]
        );
        // the closed synthetic entry left the ladder
        assert_eq!(book.bids().count(), 1);
    }

    #[test]
    fn test_tape_replay_inherits_price_of_each_consumed_order() {
        let mut book = ask_book(&[level(100, 5), level(110, 10)]);
        book.apply_historical_trade(&Trade::new(1_200, 8, 104, false))
            .unwrap();

        // per-consumed-order records price at the resting order, not the
        // tape row
        assert_eq!(
            book.tape(),
            &[
                Trade::new(1_200, 5, 100, false),
                Trade::new(1_200, 3, 110, false),
            ]
        );
    }

    #[test]
    fn test_tape_replay_excess_volume_is_fatal_and_atomic() {
        let mut book = ask_book(&[level(100, 5)]);
        let err = book
            .apply_historical_trade(&Trade::new(1_200, 6, 100, false))
            .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::TradeExceedsDepth {
                side: Side::Ask,
                volume: 6,
                available: 5,
                ..
            }
        ));
        assert!(book.tape().is_empty());
        assert_eq!(book.asks().map(|o| o.remaining()).sum::<u64>(), 5);
    }

    #[test]
    fn test_tape_replay_ignores_canceled_orders() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[], &[level(90, 10)]);
        // a user bid at a better price would be first in line...
        let id = book.register_order();
        book.insert_user_limit(id, 1_100, Side::Bid, 5, 95).unwrap();
        // ...but it is withdrawn before the tape arrives
        book.cancel_order(id).unwrap();

        book.apply_historical_trade(&Trade::new(1_200, 10, 90, true))
            .unwrap();

        let user = book.order(id).unwrap().unwrap();
        assert!(user.fills().is_empty());
        assert!(user.is_canceled());
        assert_eq!(book.bids().count(), 0);
    }

    #[test]
    fn test_tape_replay_routes_by_aggressor_flag() {
        let mut book = OrderBook::new();
        book.update_book(1_000, &[level(100, 5)], &[level(90, 5)]);

        // buyer-maker: the aggressor sold into the bids
        book.apply_historical_trade(&Trade::new(1_100, 2, 90, true))
            .unwrap();
        assert_eq!(book.bids().map(|o| o.remaining()).sum::<u64>(), 3);
        assert_eq!(book.asks().map(|o| o.remaining()).sum::<u64>(), 5);

        // seller-maker: the aggressor bought from the asks
        book.apply_historical_trade(&Trade::new(1_150, 4, 100, false))
            .unwrap();
        assert_eq!(book.asks().map(|o| o.remaining()).sum::<u64>(), 1);
    }
}
