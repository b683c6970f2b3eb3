// 3.3: streaming (time-based) manager fee. accrues an annual rate over elapsed time by
// minting inflation shares to the fee recipient. no components move, so the position
// multiplier is rebased to keep each holder's real claim from being overstated.

use crate::precise::{mul_div_round_down, MathError, PRECISE_SCALE};
use crate::types::{AccountId, Timestamp, MILLIS_PER_YEAR};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingFeeParams {
    /// Annual fee as a fraction of supply (0.02 = 2% per year).
    pub annual_rate: Decimal,
    pub max_annual_rate: Decimal,
}

impl Default for StreamingFeeParams {
    fn default() -> Self {
        Self {
            annual_rate: dec!(0.01),
            max_annual_rate: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingFeeState {
    pub params: StreamingFeeParams,
    pub fee_recipient: AccountId,
    pub last_accrual: Timestamp,
}

impl StreamingFeeState {
    pub fn new(params: StreamingFeeParams, fee_recipient: AccountId, timestamp: Timestamp) -> Self {
        Self {
            params,
            fee_recipient,
            last_accrual: timestamp,
        }
    }
}

// 3.4: fraction of supply owed since the last accrual. rate * years elapsed
pub fn accrued_fee_fraction(annual_rate: Decimal, last: Timestamp, now: Timestamp) -> Result<Decimal, MathError> {
    let elapsed = Decimal::from(last.millis_until(&now));
    mul_div_round_down(annual_rate, elapsed, MILLIS_PER_YEAR, PRECISE_SCALE)
}

/// Shares to mint so the recipient ends up owning `fee_fraction` of the new supply.
/// `supply * f / (1 - f)`
pub fn inflation_shares(total_supply: Decimal, fee_fraction: Decimal) -> Result<Decimal, MathError> {
    if fee_fraction.is_zero() || total_supply.is_zero() {
        return Ok(Decimal::ZERO);
    }
    mul_div_round_down(total_supply, fee_fraction, Decimal::ONE - fee_fraction, PRECISE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_year_accrues_full_rate() {
        let start = Timestamp::from_millis(0);
        let year = Timestamp::from_millis(31_536_000_000);
        assert_eq!(accrued_fee_fraction(dec!(0.02), start, year).unwrap(), dec!(0.02));
    }

    #[test]
    fn no_time_no_fee() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(accrued_fee_fraction(dec!(0.02), t, t).unwrap(), Decimal::ZERO);
        assert_eq!(inflation_shares(dec!(100), Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn inflation_gives_recipient_the_fee_fraction() {
        // 10% of the post-mint supply
        let minted = inflation_shares(dec!(90), dec!(0.1)).unwrap();
        assert_eq!(minted, dec!(10));
        assert_eq!(minted / (dec!(90) + minted), dec!(0.1));
    }
}
