//! Trading-fee schedule

use crate::backtest::error::BacktestError;
use serde::{Deserialize, Serialize};

/// Denominator of the fee fixed-point: fees are expressed in units of
/// 1/10,000 of notional (a tenth of a basis point times ten — 1 unit =
/// 0.01%).
pub const FEE_BASE: u64 = 10_000;

/// Per-order-kind fees charged on executed notional.
///
/// The accounting convention is inherited from the venue being modeled:
/// the *limit* fee applies to every ASK-side fill and the *market* fee to
/// every BID-side fill, regardless of which kind of user order produced
/// the fill. Both legs of a round trip pay their fee, a deliberately
/// conservative choice.
///
/// # Examples
///
/// ```
/// use tapebook::FeeSchedule;
///
/// // 10/10,000 = 0.1% on each side
/// let fees = FeeSchedule::new(10, 10).unwrap();
/// // a 1,000,000-unit notional nets 999,000 after the limit fee
/// assert_eq!(fees.limit_net(1_000_000), 999_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee applied to ASK-side fills, units of 1/10,000
    pub limit_order_fee: u64,
    /// Fee applied to BID-side fills, units of 1/10,000
    pub market_order_fee: u64,
}

impl FeeSchedule {
    /// Create a fee schedule.
    ///
    /// # Errors
    ///
    /// [`BacktestError::InvalidOperation`] when either fee exceeds
    /// [`FEE_BASE`] — a fee above 100% would drive net proceeds negative.
    pub fn new(limit_order_fee: u64, market_order_fee: u64) -> Result<Self, BacktestError> {
        if limit_order_fee > FEE_BASE || market_order_fee > FEE_BASE {
            return Err(BacktestError::InvalidOperation {
                message: format!(
                    "fee exceeds base {FEE_BASE}: limit {limit_order_fee}, market {market_order_fee}"
                ),
            });
        }
        Ok(Self {
            limit_order_fee,
            market_order_fee,
        })
    }

    /// A schedule that charges nothing.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            limit_order_fee: 0,
            market_order_fee: 0,
        }
    }

    /// True when no fee applies on either side.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.limit_order_fee == 0 && self.market_order_fee == 0
    }

    /// Notional net of the limit-side fee:
    /// `notional × (FEE_BASE − fee) / FEE_BASE`, integer arithmetic.
    #[must_use]
    #[inline]
    pub fn limit_net(&self, notional: u128) -> u128 {
        notional * (FEE_BASE - self.limit_order_fee) as u128 / FEE_BASE as u128
    }

    /// Notional net of the market-side fee.
    #[must_use]
    #[inline]
    pub fn market_net(&self, notional: u128) -> u128 {
        notional * (FEE_BASE - self.market_order_fee) as u128 / FEE_BASE as u128
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::zero()
    }
}
