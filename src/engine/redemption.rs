//! Redemption.

use super::core::{Engine, IssuanceSettings};
use super::flows::compute_flows;
use super::results::{EngineError, RedeemResult};
use super::validation::{ensure_collateralized, ensure_supply_floor};
use crate::controller::REDEEM_FEE_INDEX;
use crate::events::{EventPayload, SettlementEvent};
use crate::fees::{total_fees, FeeDirection};
use crate::hooks::HookDispatcher;
use crate::position::StructuredToken;
use crate::settlement::{SettlementInstruction, SettlementRecord, SettlementStage, TransferReason};
use crate::types::{AccountId, Holder, TokenId};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Redeem `quantity` of the redeemer's shares. The redeemer repays the debt
    /// flows and `to` receives the equity flows of the quantity net of fees.
    pub fn redeem(
        &mut self,
        token: TokenId,
        quantity: Decimal,
        redeemer: AccountId,
        to: AccountId,
    ) -> Result<RedeemResult, EngineError> {
        let settings = self.settlement_preconditions(token, quantity)?;
        let mut staged = self.token(token)?.clone();
        self.custody.begin()?;

        let mut stage = SettlementStage::Requested;
        match self.settle_redeem(&mut staged, &settings, quantity, redeemer, to, &mut stage) {
            Ok(result) => {
                self.custody.commit();
                self.commit_staged(staged);
                info!(
                    token = %token,
                    %redeemer,
                    %quantity,
                    net = %result.fees.total_quantity,
                    "redeemed"
                );
                self.emit_event(EventPayload::Redeemed(SettlementEvent {
                    token,
                    sender: redeemer,
                    recipient: to,
                    manager_hook: settings.manager_hook,
                    quantity,
                    manager_fee: result.fees.manager_fee,
                    protocol_fee: result.fees.protocol_fee,
                }));
                Ok(result)
            }
            Err(err) => Err(self.abort_settlement(token, redeemer, quantity, stage, err)),
        }
    }

    fn settle_redeem(
        &mut self,
        token: &mut StructuredToken,
        settings: &IssuanceSettings,
        quantity: Decimal,
        redeemer: AccountId,
        to: AccountId,
        stage: &mut SettlementStage,
    ) -> Result<RedeemResult, EngineError> {
        // 5.3.1: hooks see the pre-burn supply so debt units are synced against it
        if let Some(hook_id) = settings.manager_hook {
            let hook = self
                .manager_hooks
                .get(&hook_id)
                .ok_or(EngineError::UnknownManagerHook(hook_id))?;
            hook.pre_redeem(token, quantity, redeemer, to)?;
        }
        let protocol_share = self.protocol_share(REDEEM_FEE_INDEX);
        let protocol_recipient = self.controller.fee_recipient();
        let dispatcher = HookDispatcher::new(&self.debt_modules, &settings.registered_modules, &self.controller);
        dispatcher.module_redeem_hooks(token, &mut self.custody, quantity)?;
        *stage = SettlementStage::HooksRun;

        // 5.3.2: burn the full quantity, mint the fee cuts back out of it
        let mut record = SettlementRecord::new(token.id, FeeDirection::Redeem);
        token.burn(redeemer, quantity)?;
        record.add(SettlementInstruction::BurnShares {
            from: redeemer,
            amount: quantity,
        });

        let fees = total_fees(quantity, settings.redeem_fee, protocol_share, FeeDirection::Redeem)?;
        for (account, amount, reason) in [
            (settings.fee_recipient, fees.manager_fee, TransferReason::ManagerFee),
            (protocol_recipient, fees.protocol_fee, TransferReason::ProtocolFee),
        ] {
            if amount > Decimal::ZERO {
                token.mint(account, amount);
                record.add(SettlementInstruction::MintShares {
                    to: account,
                    amount,
                    reason,
                });
            }
        }

        let net_quantity = fees.total_quantity;
        let flows = compute_flows(token, &self.custody, net_quantity, FeeDirection::Redeem, settings.variant)?;
        *stage = SettlementStage::FlowsComputed;

        let token_holder = Holder::Token(token.id);
        let redeemer_holder = Holder::Account(redeemer);
        let recipient_holder = Holder::Account(to);

        // 5.3.3: debt repaid into the token, then owning modules settle it with their venue
        for (index, &component) in flows.components.iter().enumerate() {
            let amount = flows.debt[index];
            if amount > Decimal::ZERO {
                self.custody.transfer(redeemer_holder, token_holder, component, amount)?;
                record.add(SettlementInstruction::Transfer {
                    from: redeemer_holder,
                    to: token_holder,
                    asset: component,
                    amount,
                    reason: TransferReason::DebtRepaid,
                });
            }
            dispatcher.component_redeem_hooks(token, &mut self.custody, net_quantity, component, false)?;
        }

        // 5.3.4: owning modules release equity, then it leaves the token
        for (index, &component) in flows.components.iter().enumerate() {
            dispatcher.component_redeem_hooks(token, &mut self.custody, net_quantity, component, true)?;
            let amount = flows.equity[index];
            if amount > Decimal::ZERO {
                self.custody.transfer(token_holder, recipient_holder, component, amount)?;
                record.add(SettlementInstruction::Transfer {
                    from: token_holder,
                    to: recipient_holder,
                    asset: component,
                    amount,
                    reason: TransferReason::EquityWithdrawal,
                });
            }
        }

        ensure_supply_floor(token.total_supply(), settings.min_supply)?;
        ensure_collateralized(token, &self.custody, settings.variant)?;
        *stage = SettlementStage::Settled;

        Ok(RedeemResult {
            quantity,
            fees,
            flows,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{IssuanceConfig, SettlementVariant};
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::settlement::TransferReason;
    use crate::types::{AccountId, AssetId, Holder, TokenId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const MANAGER: AccountId = AccountId(1);
    const ALICE: AccountId = AccountId(10);
    const BOB: AccountId = AccountId(11);
    const FEES: AccountId = AccountId(90);

    fn issued_basket(config: IssuanceConfig) -> (Engine, TokenId, AssetId) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let usdc = engine.register_asset("USDC", 6).unwrap();
        engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(10_000)).unwrap();
        let token = engine.create_token(&[usdc], &[dec!(100)], MANAGER, "Basket", "BSKT").unwrap();
        engine.initialize_issuance(token, MANAGER, &config, FEES, None).unwrap();
        engine.issue(token, dec!(10), ALICE, ALICE).unwrap();
        (engine, token, usdc)
    }

    #[test]
    fn redeem_releases_equity_to_recipient() {
        let (mut engine, token, usdc) = issued_basket(IssuanceConfig::fee_free());
        let result = engine.redeem(token, dec!(4), ALICE, BOB).unwrap();

        assert_eq!(result.flows.equity_of(usdc), dec!(400));
        assert_eq!(engine.custody().balance(Holder::Account(BOB), usdc), dec!(400));
        assert_eq!(engine.token(token).unwrap().total_supply(), dec!(6));
        assert_eq!(result.record.transferred(usdc, TransferReason::EquityWithdrawal), dec!(400));
    }

    #[test]
    fn redeem_fee_reduces_payout_and_mints_fee_shares() {
        let config = IssuanceConfig {
            redeem_fee: dec!(0.01),
            ..IssuanceConfig::fee_free()
        };
        let (mut engine, token, usdc) = issued_basket(config);
        let result = engine.redeem(token, dec!(1), ALICE, ALICE).unwrap();

        assert_eq!(result.fees.total_quantity, dec!(0.99));
        assert_eq!(result.flows.equity_of(usdc), dec!(99));
        let state = engine.token(token).unwrap();
        assert_eq!(state.balance_of(FEES), dec!(0.01));
        assert_eq!(state.total_supply(), dec!(9.01));
        assert!(engine.is_collateralized(token).unwrap());
    }

    #[test]
    fn cannot_redeem_more_than_held() {
        let (mut engine, token, _) = issued_basket(IssuanceConfig::fee_free());
        let err = engine.redeem(token, dec!(11), ALICE, ALICE).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientShares { .. }));
        assert_eq!(engine.token(token).unwrap().balance_of(ALICE), dec!(10));
    }

    fn one_unit_short(variant: SettlementVariant) -> (Engine, TokenId) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let usdc = engine.register_asset("USDC", 6).unwrap();
        engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(100)).unwrap();
        let token = engine.create_token(&[usdc], &[dec!(1)], MANAGER, "Basket", "BSKT").unwrap();
        let config = IssuanceConfig {
            redeem_fee: dec!(0.002),
            variant,
            ..IssuanceConfig::fee_free()
        };
        engine.initialize_issuance(token, MANAGER, &config, FEES, None).unwrap();
        engine.issue(token, dec!(10), ALICE, ALICE).unwrap();
        // leaves 9.999999 held against a supply of 10
        engine
            .custody_mut()
            .transfer(Holder::Token(token), Holder::Account(BOB), usdc, dec!(0.000001))
            .unwrap();
        (engine, token)
    }

    #[test]
    fn strict_redeem_rejects_inherited_deficit() {
        let (mut engine, token) = one_unit_short(SettlementVariant::Strict);
        let err = engine.redeem(token, dec!(1), ALICE, ALICE).unwrap_err();
        assert!(matches!(err, EngineError::Undercollateralized { .. }));
        assert_eq!(engine.token(token).unwrap().total_supply(), dec!(10));
    }

    #[test]
    fn tolerant_redeem_absorbs_one_unit_deficit() {
        let (mut engine, token) = one_unit_short(SettlementVariant::DeficitTolerant);
        let result = engine.redeem(token, dec!(1), ALICE, ALICE).unwrap();
        assert_eq!(result.fees.total_quantity, dec!(0.998));
        assert_eq!(engine.token(token).unwrap().total_supply(), dec!(9.002));
    }

    #[test]
    fn full_exit_allowed_under_floor() {
        let config = IssuanceConfig {
            min_supply: Some(dec!(5)),
            ..IssuanceConfig::fee_free()
        };
        let (mut engine, token, _) = issued_basket(config);
        assert!(matches!(
            engine.redeem(token, dec!(6), ALICE, ALICE),
            Err(EngineError::SupplyBelowFloor { .. })
        ));
        engine.redeem(token, dec!(10), ALICE, ALICE).unwrap();
        assert_eq!(engine.token(token).unwrap().total_supply(), Decimal::ZERO);
    }
}
