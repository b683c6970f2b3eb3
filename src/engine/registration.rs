//! Debt module registration with a token's issuance.

use super::core::Engine;
use super::results::EngineError;
use crate::controller::ControllerError;
use crate::events::{EventPayload, ModuleRegistrationEvent};
use crate::hooks::HookError;
use crate::types::{ModuleId, TokenId};
use tracing::info;

impl Engine {
    /// Called by a debt module to have its hooks run on every issue and redeem
    /// of `token`. The module must be enabled and initialized on the token.
    pub fn register_to_issuance_module(&mut self, token: TokenId, module: ModuleId) -> Result<(), EngineError> {
        self.issuance_settings(token)?;
        if !self.controller.is_module(module) {
            return Err(ControllerError::ModuleNotEnabled(module).into());
        }
        if !self.debt_modules.contains_key(&module) {
            return Err(HookError::UnknownModule(module).into());
        }
        if !self.token(token)?.is_initialized_module(module) {
            return Err(EngineError::ModuleNotInitialized { token, module });
        }

        let inserted = self
            .issuance
            .get_mut(&token)
            .map(|s| s.registered_modules.insert(module))
            .unwrap_or(false);
        if !inserted {
            return Err(EngineError::AlreadyRegistered { token, module });
        }

        info!(token = %token, module = %module, "module registered");
        self.emit_event(EventPayload::ModuleRegistered(ModuleRegistrationEvent { token, module }));
        Ok(())
    }

    pub fn unregister_from_issuance_module(&mut self, token: TokenId, module: ModuleId) -> Result<(), EngineError> {
        self.issuance_settings(token)?;
        let removed = self
            .issuance
            .get_mut(&token)
            .map(|s| s.registered_modules.remove(module))
            .unwrap_or(false);
        if !removed {
            return Err(EngineError::NotRegistered { token, module });
        }

        info!(token = %token, module = %module, "module unregistered");
        self.emit_event(EventPayload::ModuleUnregistered(ModuleRegistrationEvent { token, module }));
        Ok(())
    }

    /// Debt modules registered on `token`, in hook order.
    pub fn registered_modules(&self, token: TokenId) -> Result<&[ModuleId], EngineError> {
        Ok(self.issuance_settings(token)?.registered_modules.modules())
    }
}
