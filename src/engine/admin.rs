// 5.5 engine/admin.rs: manager-gated issuance settings. initialize, fee updates, removal.

use super::core::{Engine, IssuanceSettings};
use super::results::EngineError;
use crate::config::{ConfigError, IssuanceConfig};
use crate::events::{EventPayload, FeeRecipientUpdatedEvent, FeeUpdatedEvent, IssuanceInitializedEvent};
use crate::hooks::ModuleRegistry;
use crate::types::{AccountId, HookId, TokenId};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Manager turns issuance on for a token. The issuance module must still be
    /// pending on it; afterwards it is initialized and the settings are live.
    pub fn initialize_issuance(
        &mut self,
        token: TokenId,
        caller: AccountId,
        config: &IssuanceConfig,
        fee_recipient: AccountId,
        manager_hook: Option<HookId>,
    ) -> Result<(), EngineError> {
        self.require_manager(token, caller)?;
        for fee in [config.issue_fee, config.redeem_fee] {
            if fee > config.max_manager_fee {
                return Err(EngineError::FeeAboveMaximum {
                    fee,
                    max: config.max_manager_fee,
                });
            }
        }
        config.validate()?;
        if let Some(hook) = manager_hook {
            if !self.manager_hooks.contains_key(&hook) {
                return Err(EngineError::UnknownManagerHook(hook));
            }
        }
        if self.issuance.contains_key(&token) {
            return Err(EngineError::IssuanceAlreadyInitialized(token));
        }

        let issuance = self.config.issuance_module;
        self.initialize_module(token, issuance)?;
        self.issuance.insert(
            token,
            IssuanceSettings {
                max_manager_fee: config.max_manager_fee,
                issue_fee: config.issue_fee,
                redeem_fee: config.redeem_fee,
                fee_recipient,
                manager_hook,
                registered_modules: ModuleRegistry::new(),
                variant: config.variant,
                min_supply: config.min_supply,
            },
        );

        info!(token = %token, variant = ?config.variant, issue_fee = %config.issue_fee, redeem_fee = %config.redeem_fee, "issuance initialized");
        self.emit_event(EventPayload::IssuanceInitialized(IssuanceInitializedEvent {
            token,
            fee_recipient,
            issue_fee: config.issue_fee,
            redeem_fee: config.redeem_fee,
            manager_hook,
        }));
        Ok(())
    }

    pub fn update_fee_recipient(
        &mut self,
        token: TokenId,
        caller: AccountId,
        fee_recipient: AccountId,
    ) -> Result<(), EngineError> {
        self.settings_for_manager(token, caller)?.fee_recipient = fee_recipient;
        self.emit_event(EventPayload::FeeRecipientUpdated(FeeRecipientUpdatedEvent {
            token,
            fee_recipient,
        }));
        Ok(())
    }

    pub fn update_issue_fee(&mut self, token: TokenId, caller: AccountId, new_fee: Decimal) -> Result<(), EngineError> {
        let settings = self.settings_for_manager(token, caller)?;
        check_fee(new_fee, settings.max_manager_fee)?;
        let old_fee = std::mem::replace(&mut settings.issue_fee, new_fee);
        info!(token = %token, %old_fee, %new_fee, "issue fee updated");
        self.emit_event(EventPayload::IssueFeeUpdated(FeeUpdatedEvent { token, old_fee, new_fee }));
        Ok(())
    }

    pub fn update_redeem_fee(&mut self, token: TokenId, caller: AccountId, new_fee: Decimal) -> Result<(), EngineError> {
        let settings = self.settings_for_manager(token, caller)?;
        check_fee(new_fee, settings.max_manager_fee)?;
        let old_fee = std::mem::replace(&mut settings.redeem_fee, new_fee);
        info!(token = %token, %old_fee, %new_fee, "redeem fee updated");
        self.emit_event(EventPayload::RedeemFeeUpdated(FeeUpdatedEvent { token, old_fee, new_fee }));
        Ok(())
    }

    /// Manager turns issuance off. Every debt module has to be unregistered first.
    pub fn remove_issuance_module(&mut self, token: TokenId, caller: AccountId) -> Result<(), EngineError> {
        let settings = self.settings_for_manager(token, caller)?;
        if !settings.registered_modules.is_empty() {
            return Err(EngineError::RegisteredModulesRemain(token));
        }
        let issuance = self.config.issuance_module;
        self.token_mut(token)?.remove_module(issuance)?;
        self.issuance.remove(&token);

        info!(token = %token, "issuance removed");
        self.emit_event(EventPayload::IssuanceRemoved { token });
        Ok(())
    }

    pub(super) fn settings_for_manager(
        &mut self,
        token: TokenId,
        caller: AccountId,
    ) -> Result<&mut IssuanceSettings, EngineError> {
        self.require_manager(token, caller)?;
        let issuance = self.config.issuance_module;
        self.issuance
            .get_mut(&token)
            .ok_or(EngineError::ModuleNotInitialized { token, module: issuance })
    }
}

fn check_fee(fee: Decimal, max: Decimal) -> Result<(), EngineError> {
    if fee < Decimal::ZERO {
        return Err(ConfigError::InvalidFees {
            reason: format!("fee {fee} is negative"),
        }
        .into());
    }
    if fee > max {
        return Err(EngineError::FeeAboveMaximum { fee, max });
    }
    Ok(())
}
