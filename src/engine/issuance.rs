//! Issuance.
//!
//! One issue runs against a staged copy of the token inside an open custody
//! transaction. Only a fully successful settlement is committed.

use super::core::{Engine, IssuanceSettings};
use super::flows::compute_flows;
use super::results::{EngineError, IssueResult};
use super::validation::{ensure_collateralized, ensure_supply_floor};
use crate::config::SettlementVariant;
use crate::controller::ISSUE_FEE_INDEX;
use crate::events::{EventPayload, SettlementEvent};
use crate::fees::{total_fees, FeeDirection};
use crate::hooks::HookDispatcher;
use crate::position::StructuredToken;
use crate::settlement::{SettlementInstruction, SettlementRecord, SettlementStage, TransferReason};
use crate::types::{AccountId, Holder, TokenId};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Issue `quantity` shares to `to`. The issuer deposits the equity flows and
    /// receives the debt flows; fee shares are minted on top of `quantity`.
    pub fn issue(
        &mut self,
        token: TokenId,
        quantity: Decimal,
        issuer: AccountId,
        to: AccountId,
    ) -> Result<IssueResult, EngineError> {
        let settings = self.settlement_preconditions(token, quantity)?;
        let mut staged = self.token(token)?.clone();
        self.custody.begin()?;

        let mut stage = SettlementStage::Requested;
        match self.settle_issue(&mut staged, &settings, quantity, issuer, to, &mut stage) {
            Ok(result) => {
                self.custody.commit();
                self.commit_staged(staged);
                info!(
                    token = %token,
                    %issuer,
                    %quantity,
                    manager_fee = %result.fees.manager_fee,
                    protocol_fee = %result.fees.protocol_fee,
                    "issued"
                );
                self.emit_event(EventPayload::Issued(SettlementEvent {
                    token,
                    sender: issuer,
                    recipient: to,
                    manager_hook: settings.manager_hook,
                    quantity,
                    manager_fee: result.fees.manager_fee,
                    protocol_fee: result.fees.protocol_fee,
                }));
                Ok(result)
            }
            Err(err) => Err(self.abort_settlement(token, issuer, quantity, stage, err)),
        }
    }

    fn settle_issue(
        &mut self,
        token: &mut StructuredToken,
        settings: &IssuanceSettings,
        quantity: Decimal,
        issuer: AccountId,
        to: AccountId,
        stage: &mut SettlementStage,
    ) -> Result<IssueResult, EngineError> {
        // 5.2.1: hooks. manager first, then modules in registration order
        if let Some(hook_id) = settings.manager_hook {
            let hook = self
                .manager_hooks
                .get(&hook_id)
                .ok_or(EngineError::UnknownManagerHook(hook_id))?;
            hook.pre_issue(token, quantity, issuer, to)?;
        }
        let protocol_share = self.protocol_share(ISSUE_FEE_INDEX);
        let protocol_recipient = self.controller.fee_recipient();
        let dispatcher = HookDispatcher::new(&self.debt_modules, &settings.registered_modules, &self.controller);
        dispatcher.module_issue_hooks(token, &mut self.custody, quantity)?;
        *stage = SettlementStage::HooksRun;

        // 5.2.2: flows on the post-hook ledger, priced at the gross quantity
        let fees = total_fees(quantity, settings.issue_fee, protocol_share, FeeDirection::Issue)?;
        let mint_quantity = fees.total_quantity;
        if settings.variant == SettlementVariant::DeficitTolerant {
            ensure_collateralized(token, &self.custody, settings.variant)?;
        }
        let flows = compute_flows(token, &self.custody, mint_quantity, FeeDirection::Issue, settings.variant)?;
        *stage = SettlementStage::FlowsComputed;

        let mut record = SettlementRecord::new(token.id, FeeDirection::Issue);
        let token_holder = Holder::Token(token.id);
        let issuer_holder = Holder::Account(issuer);

        // 5.2.3: equity in, then each owning module sees it
        for (index, &component) in flows.components.iter().enumerate() {
            let amount = flows.equity[index];
            if amount > Decimal::ZERO {
                self.custody.transfer(issuer_holder, token_holder, component, amount)?;
                record.add(SettlementInstruction::Transfer {
                    from: issuer_holder,
                    to: token_holder,
                    asset: component,
                    amount,
                    reason: TransferReason::EquityDeposit,
                });
            }
            dispatcher.component_issue_hooks(token, &mut self.custody, mint_quantity, component, true)?;
        }

        // 5.2.4: modules draw debt into the token, which hands it to the issuer
        for (index, &component) in flows.components.iter().enumerate() {
            dispatcher.component_issue_hooks(token, &mut self.custody, mint_quantity, component, false)?;
            let amount = flows.debt[index];
            if amount > Decimal::ZERO {
                self.custody.transfer(token_holder, issuer_holder, component, amount)?;
                record.add(SettlementInstruction::Transfer {
                    from: token_holder,
                    to: issuer_holder,
                    asset: component,
                    amount,
                    reason: TransferReason::DebtDrawn,
                });
            }
        }

        // 5.2.5: shares. the issuer's quantity plus both fee cuts equals the gross quantity
        for (account, amount, reason) in [
            (to, quantity, TransferReason::Shares),
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

        ensure_supply_floor(token.total_supply(), settings.min_supply)?;
        ensure_collateralized(token, &self.custody, settings.variant)?;
        *stage = SettlementStage::Settled;

        Ok(IssueResult {
            quantity,
            fees,
            flows,
            record,
        })
    }
}
