//! Component flow calculation.
//!
//! One rounding policy covers every flow: whatever the direction, the token
//! comes out ahead. Equity coming in and debt being repaid round up. Equity
//! going out and debt being handed to an issuer round down. Amounts are cut at
//! the component's own decimals, not at share precision.

use super::core::Engine;
use super::results::{ComponentFlows, EngineError};
use super::validation::ensure_share_precision;
use crate::config::SettlementVariant;
use crate::controller::{ISSUE_FEE_INDEX, REDEEM_FEE_INDEX};
use crate::custody::Custody;
use crate::fees::{total_fees, FeeBreakdown, FeeDirection};
use crate::position::StructuredToken;
use crate::precise::{mul_div_round_up, mul_rounded, MathError, Rounding};
use crate::types::{AssetId, Holder, TokenId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    Equity,
    Debt,
}

/// Rounding direction for one flow, chosen so the token never loses.
pub fn flow_rounding(direction: FeeDirection, kind: FlowKind) -> Rounding {
    match (direction, kind) {
        (FeeDirection::Issue, FlowKind::Equity) | (FeeDirection::Redeem, FlowKind::Debt) => Rounding::Up,
        (FeeDirection::Issue, FlowKind::Debt) | (FeeDirection::Redeem, FlowKind::Equity) => Rounding::Down,
    }
}

/// `quantity * |unit|` at `decimals`, rounded per [`flow_rounding`].
pub fn flow_amount(
    unit: Decimal,
    quantity: Decimal,
    decimals: u32,
    direction: FeeDirection,
    kind: FlowKind,
) -> Result<Decimal, MathError> {
    mul_rounded(unit.abs(), quantity, decimals, flow_rounding(direction, kind))
}

/// Default unit plus every positive external unit.
pub fn equity_unit(token: &StructuredToken, component: AssetId) -> Result<Decimal, MathError> {
    let external: Decimal = token
        .external_modules(component)
        .iter()
        .map(|m| token.external_unit(component, *m))
        .filter(|u| *u > Decimal::ZERO)
        .sum();
    Ok(token.default_real_unit(component)? + external)
}

/// Magnitude of every negative external unit.
pub fn debt_unit(token: &StructuredToken, component: AssetId) -> Decimal {
    token
        .external_modules(component)
        .iter()
        .map(|m| token.external_unit(component, *m))
        .filter(|u| *u < Decimal::ZERO)
        .map(|u| u.abs())
        .sum()
}

// 5.3: flows for `quantity` shares. in the deficit-tolerant variant an issue prices the
// default part off what the token actually holds, ceil(quantity * held / supply), but never
// below the stored-unit amount, so a deficit already present does not grow with supply.
pub(super) fn compute_flows(
    token: &StructuredToken,
    custody: &Custody,
    quantity: Decimal,
    direction: FeeDirection,
    variant: SettlementVariant,
) -> Result<ComponentFlows, EngineError> {
    let supply = token.total_supply();
    let use_balances =
        variant == SettlementVariant::DeficitTolerant && direction == FeeDirection::Issue && !supply.is_zero();

    let components = token.components().to_vec();
    let mut equity = Vec::with_capacity(components.len());
    let mut debt = Vec::with_capacity(components.len());

    for &component in &components {
        let decimals = custody.decimals(component)?;

        let equity_flow = if use_balances {
            let held = custody.balance(Holder::Token(token.id), component);
            let default_unit = token.default_real_unit(component)?;
            let from_balance = mul_div_round_up(quantity, held, supply, decimals)?;
            let from_units = flow_amount(default_unit, quantity, decimals, direction, FlowKind::Equity)?;
            let external = equity_unit(token, component)? - default_unit;
            from_balance.max(from_units) + flow_amount(external, quantity, decimals, direction, FlowKind::Equity)?
        } else {
            flow_amount(equity_unit(token, component)?, quantity, decimals, direction, FlowKind::Equity)?
        };

        equity.push(equity_flow);
        debt.push(flow_amount(
            debt_unit(token, component),
            quantity,
            decimals,
            direction,
            FlowKind::Debt,
        )?);
    }

    Ok(ComponentFlows {
        components,
        equity,
        debt,
    })
}

impl Engine {
    /// Components an issuer must deliver (equity) and will receive (debt) to
    /// issue `quantity` net of fees. Hooks are not run.
    pub fn required_component_issuance_units(
        &self,
        token: TokenId,
        quantity: Decimal,
    ) -> Result<ComponentFlows, EngineError> {
        let settings = self.issuance_settings(token)?;
        let fees = self.calculate_total_fees(token, quantity, true)?;
        compute_flows(
            self.token(token)?,
            &self.custody,
            fees.total_quantity,
            FeeDirection::Issue,
            settings.variant,
        )
    }

    /// Components a redeemer must repay (debt) and will receive (equity) for
    /// redeeming `quantity`. Hooks are not run.
    pub fn required_component_redemption_units(
        &self,
        token: TokenId,
        quantity: Decimal,
    ) -> Result<ComponentFlows, EngineError> {
        let settings = self.issuance_settings(token)?;
        let fees = self.calculate_total_fees(token, quantity, false)?;
        compute_flows(
            self.token(token)?,
            &self.custody,
            fees.total_quantity,
            FeeDirection::Redeem,
            settings.variant,
        )
    }

    /// Fee split for an issue or redeem of `quantity`.
    pub fn calculate_total_fees(
        &self,
        token: TokenId,
        quantity: Decimal,
        is_issue: bool,
    ) -> Result<FeeBreakdown, EngineError> {
        ensure_share_precision(quantity)?;
        let settings = self.issuance_settings(token)?;
        let (direction, rate, index) = if is_issue {
            (FeeDirection::Issue, settings.issue_fee, ISSUE_FEE_INDEX)
        } else {
            (FeeDirection::Redeem, settings.redeem_fee, REDEEM_FEE_INDEX)
        };
        Ok(total_fees(quantity, rate, self.protocol_share(index), direction)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, ModuleId};
    use rust_decimal_macros::dec;

    #[test]
    fn rounding_favours_the_token() {
        assert_eq!(flow_rounding(FeeDirection::Issue, FlowKind::Equity), Rounding::Up);
        assert_eq!(flow_rounding(FeeDirection::Issue, FlowKind::Debt), Rounding::Down);
        assert_eq!(flow_rounding(FeeDirection::Redeem, FlowKind::Equity), Rounding::Down);
        assert_eq!(flow_rounding(FeeDirection::Redeem, FlowKind::Debt), Rounding::Up);
    }

    #[test]
    fn flow_amount_cuts_at_asset_decimals() {
        let unit = dec!(1.0000005);
        assert_eq!(
            flow_amount(unit, dec!(1), 6, FeeDirection::Issue, FlowKind::Equity).unwrap(),
            dec!(1.000001)
        );
        assert_eq!(
            flow_amount(unit, dec!(1), 6, FeeDirection::Redeem, FlowKind::Equity).unwrap(),
            dec!(1.000000)
        );
        // sign of a debt unit is ignored
        assert_eq!(
            flow_amount(dec!(-2.5), dec!(2), 0, FeeDirection::Redeem, FlowKind::Debt).unwrap(),
            dec!(5)
        );
    }

    #[test]
    fn equity_and_debt_units_split_external_signs() {
        let usdc = AssetId(1);
        let mut token =
            StructuredToken::with_components(TokenId(1), "Basket", "BSKT", AccountId(1), &[(usdc, dec!(100))]).unwrap();
        token.external_writer(ModuleId(2)).set_unit(usdc, dec!(-40)).unwrap();
        token.external_writer(ModuleId(3)).set_unit(usdc, dec!(5)).unwrap();

        assert_eq!(equity_unit(&token, usdc).unwrap(), dec!(105));
        assert_eq!(debt_unit(&token, usdc), dec!(40));
    }

    #[test]
    fn deficit_tolerant_issue_prices_off_balances() {
        let mut custody = Custody::new();
        let usdc = custody.register_asset("USDC", 6).unwrap();
        let mut token =
            StructuredToken::with_components(TokenId(1), "Basket", "BSKT", AccountId(1), &[(usdc, dec!(1))]).unwrap();
        token.mint(AccountId(5), dec!(10));
        // one unit short of 10 * 1
        custody.mint(Holder::Token(TokenId(1)), usdc, dec!(9.999999)).unwrap();

        let strict = compute_flows(&token, &custody, dec!(1), FeeDirection::Issue, SettlementVariant::Strict).unwrap();
        let tolerant =
            compute_flows(&token, &custody, dec!(1), FeeDirection::Issue, SettlementVariant::DeficitTolerant).unwrap();

        assert_eq!(strict.equity_of(usdc), dec!(1));
        // ceil(1 * 9.999999 / 10) at 6dp
        assert_eq!(tolerant.equity_of(usdc), dec!(1));
        assert_eq!(tolerant.debt_of(usdc), Decimal::ZERO);

        // a short token never charges below the stored unit
        let large =
            compute_flows(&token, &custody, dec!(10), FeeDirection::Issue, SettlementVariant::DeficitTolerant).unwrap();
        assert_eq!(large.equity_of(usdc), dec!(10));

        // a token holding a surplus charges its share of it
        custody.mint(Holder::Token(TokenId(1)), usdc, dec!(0.500001)).unwrap();
        let surplus =
            compute_flows(&token, &custody, dec!(1), FeeDirection::Issue, SettlementVariant::DeficitTolerant).unwrap();
        assert_eq!(surplus.equity_of(usdc), dec!(1.05));
    }

    #[test]
    fn quotes_include_fees_without_moving_anything() {
        let mut engine = Engine::new(crate::engine::EngineConfig::default()).unwrap();
        let usdc = engine.register_asset("USDC", 6).unwrap();
        let token = engine
            .create_token(&[usdc], &[dec!(1.5)], AccountId(1), "Basket", "BSKT")
            .unwrap();
        let config = crate::config::IssuanceConfig {
            issue_fee: dec!(0.01),
            redeem_fee: dec!(0.002),
            ..crate::config::IssuanceConfig::fee_free()
        };
        engine.initialize_issuance(token, AccountId(1), &config, AccountId(90), None).unwrap();

        let fees = engine.calculate_total_fees(token, dec!(10), true).unwrap();
        assert_eq!(fees.total_quantity, dec!(10.1));
        assert_eq!(fees.manager_fee, dec!(0.1));

        // 10.1 gross shares at 1.5
        let issue = engine.required_component_issuance_units(token, dec!(10)).unwrap();
        assert_eq!(issue.equity_of(usdc), dec!(15.15));
        // 9.98 net shares at 1.5
        let redeem = engine.required_component_redemption_units(token, dec!(10)).unwrap();
        assert_eq!(redeem.equity_of(usdc), dec!(14.97));

        assert!(engine.events().iter().all(|e| !matches!(e.payload, crate::events::EventPayload::Issued(_))));
        assert_eq!(engine.token(token).unwrap().total_supply(), Decimal::ZERO);
    }
}
