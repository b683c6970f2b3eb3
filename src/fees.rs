// 3.0: issuance and redemption fees. pure functions, no state.
// issue fees are added on top of the requested quantity, redeem fees come out of it.
// every cut floors at share precision; manager takes whatever the protocol share leaves.

use crate::precise::{mul_round_down, MathError, PRECISE_SCALE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeDirection {
    Issue,
    Redeem,
}

/// Result of charging a fee on one settlement.
///
/// For issues `total_quantity` is the gross amount minted (requested + fees).
/// For redeems it is the net amount whose components are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub total_quantity: Decimal,
    pub manager_fee: Decimal,
    pub protocol_fee: Decimal,
}

impl FeeBreakdown {
    pub fn total_fee(&self) -> Decimal {
        self.manager_fee + self.protocol_fee
    }
}

// 3.1: net -> gross for issuance
pub fn gross_quantity(net_quantity: Decimal, issue_fee: Decimal) -> Result<Decimal, FeeError> {
    validate_fee_rate(issue_fee)?;
    Ok(mul_round_down(net_quantity, Decimal::ONE + issue_fee, PRECISE_SCALE)?)
}

// 3.2: requested -> net for redemption
pub fn net_quantity(requested_quantity: Decimal, redeem_fee: Decimal) -> Result<Decimal, FeeError> {
    validate_fee_rate(redeem_fee)?;
    Ok(mul_round_down(requested_quantity, Decimal::ONE - redeem_fee, PRECISE_SCALE)?)
}

/// Returns (manager portion, protocol portion).
pub fn split_fee(fee_quantity: Decimal, protocol_share: Decimal) -> Result<(Decimal, Decimal), FeeError> {
    if protocol_share < Decimal::ZERO || protocol_share > Decimal::ONE {
        return Err(FeeError::InvalidProtocolShare(protocol_share));
    }
    let protocol = mul_round_down(fee_quantity, protocol_share, PRECISE_SCALE)?;
    Ok((fee_quantity - protocol, protocol))
}

pub fn total_fees(
    quantity: Decimal,
    fee_rate: Decimal,
    protocol_share: Decimal,
    direction: FeeDirection,
) -> Result<FeeBreakdown, FeeError> {
    let (total_quantity, fee) = match direction {
        FeeDirection::Issue => {
            let gross = gross_quantity(quantity, fee_rate)?;
            (gross, gross - quantity)
        }
        FeeDirection::Redeem => {
            let net = net_quantity(quantity, fee_rate)?;
            (net, quantity - net)
        }
    };
    let (manager_fee, protocol_fee) = split_fee(fee, protocol_share)?;

    Ok(FeeBreakdown {
        total_quantity,
        manager_fee,
        protocol_fee,
    })
}

pub fn validate_fee_rate(rate: Decimal) -> Result<(), FeeError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(FeeError::InvalidFeeRate(rate));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeeError {
    #[error("Fee rate must be in [0, 1), got {0}")]
    InvalidFeeRate(Decimal),

    #[error("Protocol fee share must be in [0, 1], got {0}")]
    InvalidProtocolShare(Decimal),

    #[error("Fee {fee} exceeds maximum {max}")]
    AboveMaximum { fee: Decimal, max: Decimal },

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gross_adds_issue_fee() {
        assert_eq!(gross_quantity(dec!(1), dec!(0.005)).unwrap(), dec!(1.005));
        assert_eq!(gross_quantity(dec!(2), Decimal::ZERO).unwrap(), dec!(2));
    }

    #[test]
    fn net_subtracts_redeem_fee() {
        assert_eq!(net_quantity(dec!(1), dec!(0.002)).unwrap(), dec!(0.998));
        assert_eq!(net_quantity(dec!(5), Decimal::ZERO).unwrap(), dec!(5));
    }

    #[test]
    fn split_floors_protocol_portion() {
        let (manager, protocol) = split_fee(dec!(0.000000000000000003), dec!(0.5)).unwrap();
        assert_eq!(protocol, dec!(0.000000000000000001));
        assert_eq!(manager, dec!(0.000000000000000002));
    }

    #[test]
    fn issue_breakdown_conserves_quantity() {
        let fees = total_fees(dec!(10), dec!(0.01), dec!(0.2), FeeDirection::Issue).unwrap();
        assert_eq!(fees.total_quantity, dec!(10.1));
        assert_eq!(fees.protocol_fee, dec!(0.02));
        assert_eq!(fees.manager_fee, dec!(0.08));
        assert_eq!(fees.total_quantity - fees.total_fee(), dec!(10));
    }

    #[test]
    fn redeem_breakdown_conserves_quantity() {
        let fees = total_fees(dec!(10), dec!(0.01), Decimal::ZERO, FeeDirection::Redeem).unwrap();
        assert_eq!(fees.total_quantity, dec!(9.9));
        assert_eq!(fees.manager_fee, dec!(0.1));
        assert_eq!(fees.protocol_fee, Decimal::ZERO);
    }

    #[test]
    fn invalid_rates_rejected() {
        assert!(matches!(gross_quantity(dec!(1), dec!(-0.1)), Err(FeeError::InvalidFeeRate(_))));
        assert!(matches!(net_quantity(dec!(1), dec!(1)), Err(FeeError::InvalidFeeRate(_))));
        assert!(matches!(split_fee(dec!(1), dec!(1.5)), Err(FeeError::InvalidProtocolShare(_))));
    }
}
