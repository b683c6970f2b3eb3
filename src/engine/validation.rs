// 5.4 engine/validation.rs: collateralization and supply floor checks.
// a token is collateralized in a component when it holds at least ceil(supply * default unit)
// of it, less the variant's tolerance. external units are settled off-ledger and are not counted.

use super::core::Engine;
use super::results::{CollateralStatus, EngineError};
use crate::config::SettlementVariant;
use crate::custody::Custody;
use crate::position::StructuredToken;
use crate::precise::{mul_round_up, PRECISE_SCALE};
use crate::types::{Holder, TokenId};
use rust_decimal::Decimal;

pub(super) fn collateral_status(
    token: &StructuredToken,
    custody: &Custody,
    variant: SettlementVariant,
) -> Result<Vec<CollateralStatus>, EngineError> {
    let supply = token.total_supply();
    token
        .components()
        .iter()
        .map(|&component| {
            let decimals = custody.decimals(component)?;
            Ok(CollateralStatus {
                component,
                held: custody.balance(Holder::Token(token.id), component),
                required: mul_round_up(supply, token.default_real_unit(component)?, decimals)?,
                tolerance: variant.tolerance(decimals),
            })
        })
        .collect()
}

pub(super) fn ensure_collateralized(
    token: &StructuredToken,
    custody: &Custody,
    variant: SettlementVariant,
) -> Result<(), EngineError> {
    for status in collateral_status(token, custody, variant)? {
        if !status.is_covered() {
            return Err(EngineError::Undercollateralized {
                token: token.id,
                component: status.component,
                held: status.held,
                required: status.required,
            });
        }
    }
    Ok(())
}

/// Share quantities carry at most 18 decimal places.
pub(super) fn ensure_share_precision(quantity: Decimal) -> Result<(), EngineError> {
    if quantity.normalize().scale() > PRECISE_SCALE {
        return Err(EngineError::QuantityTooPrecise {
            quantity,
            max_decimals: PRECISE_SCALE,
        });
    }
    Ok(())
}

/// A non-zero supply may not sit below the floor. Redeeming everything is allowed.
pub(super) fn ensure_supply_floor(supply: Decimal, floor: Option<Decimal>) -> Result<(), EngineError> {
    match floor {
        Some(floor) if !supply.is_zero() && supply < floor => Err(EngineError::SupplyBelowFloor { supply, floor }),
        _ => Ok(()),
    }
}

impl Engine {
    /// Coverage of every component under the token's settlement variant.
    pub fn collateral_report(&self, token: TokenId) -> Result<Vec<CollateralStatus>, EngineError> {
        collateral_status(self.token(token)?, &self.custody, self.variant_of(token))
    }

    pub fn is_collateralized(&self, token: TokenId) -> Result<bool, EngineError> {
        Ok(self.collateral_report(token)?.iter().all(CollateralStatus::is_covered))
    }
}
