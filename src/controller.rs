// 8.0 controller.rs: system-wide registry. which tokens and modules are live, where protocol
// fees go and what share of each module's fees the protocol keeps.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{AccountId, ModuleId, TokenId};

/// Fee slot for the protocol's share of issue fees.
pub const ISSUE_FEE_INDEX: usize = 0;
/// Fee slot for the protocol's share of redeem fees.
pub const REDEEM_FEE_INDEX: usize = 1;
/// Fee slot for the protocol's share of streaming fees.
pub const STREAMING_FEE_INDEX: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Controller {
    tokens: HashSet<TokenId>,
    modules: HashSet<ModuleId>,
    fee_recipient: AccountId,
    module_fees: HashMap<ModuleId, Vec<Decimal>>,
}

impl Controller {
    pub fn new(fee_recipient: AccountId) -> Self {
        Self {
            tokens: HashSet::new(),
            modules: HashSet::new(),
            fee_recipient,
            module_fees: HashMap::new(),
        }
    }

    pub fn add_token(&mut self, token: TokenId) -> Result<(), ControllerError> {
        if !self.tokens.insert(token) {
            return Err(ControllerError::TokenAlreadyEnabled(token));
        }
        Ok(())
    }

    pub fn remove_token(&mut self, token: TokenId) -> Result<(), ControllerError> {
        if !self.tokens.remove(&token) {
            return Err(ControllerError::TokenNotEnabled(token));
        }
        Ok(())
    }

    pub fn is_token(&self, token: TokenId) -> bool {
        self.tokens.contains(&token)
    }

    pub fn add_module(&mut self, module: ModuleId) -> Result<(), ControllerError> {
        if !self.modules.insert(module) {
            return Err(ControllerError::ModuleAlreadyEnabled(module));
        }
        Ok(())
    }

    pub fn remove_module(&mut self, module: ModuleId) -> Result<(), ControllerError> {
        if !self.modules.remove(&module) {
            return Err(ControllerError::ModuleNotEnabled(module));
        }
        self.module_fees.remove(&module);
        Ok(())
    }

    pub fn is_module(&self, module: ModuleId) -> bool {
        self.modules.contains(&module)
    }

    pub fn fee_recipient(&self) -> AccountId {
        self.fee_recipient
    }

    pub fn set_fee_recipient(&mut self, recipient: AccountId) {
        self.fee_recipient = recipient;
    }

    /// Protocol share of a module's fee at `index`; zero when unset.
    pub fn module_fee(&self, module: ModuleId, index: usize) -> Decimal {
        self.module_fees
            .get(&module)
            .and_then(|fees| fees.get(index))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn set_module_fee(&mut self, module: ModuleId, index: usize, share: Decimal) -> Result<(), ControllerError> {
        if !self.is_module(module) {
            return Err(ControllerError::ModuleNotEnabled(module));
        }
        if share < Decimal::ZERO || share > Decimal::ONE {
            return Err(ControllerError::InvalidFeeShare(share));
        }
        let fees = self.module_fees.entry(module).or_default();
        if fees.len() <= index {
            fees.resize(index + 1, Decimal::ZERO);
        }
        fees[index] = share;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    #[error("Token {0} is already enabled")]
    TokenAlreadyEnabled(TokenId),

    #[error("Token {0} is not enabled")]
    TokenNotEnabled(TokenId),

    #[error("Module {0} is already enabled")]
    ModuleAlreadyEnabled(ModuleId),

    #[error("Module {0} is not enabled")]
    ModuleNotEnabled(ModuleId),

    #[error("Protocol fee share must be in [0, 1], got {0}")]
    InvalidFeeShare(Decimal),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn token_and_module_registration() {
        let mut controller = Controller::new(AccountId(99));
        controller.add_token(TokenId(1)).unwrap();
        controller.add_module(ModuleId(1)).unwrap();

        assert!(controller.is_token(TokenId(1)));
        assert!(controller.is_module(ModuleId(1)));
        assert!(matches!(controller.add_token(TokenId(1)), Err(ControllerError::TokenAlreadyEnabled(_))));

        controller.remove_module(ModuleId(1)).unwrap();
        assert!(!controller.is_module(ModuleId(1)));
    }

    #[test]
    fn module_fee_slots() {
        let mut controller = Controller::new(AccountId(99));
        controller.add_module(ModuleId(1)).unwrap();
        controller.set_module_fee(ModuleId(1), REDEEM_FEE_INDEX, dec!(0.25)).unwrap();

        assert_eq!(controller.module_fee(ModuleId(1), ISSUE_FEE_INDEX), Decimal::ZERO);
        assert_eq!(controller.module_fee(ModuleId(1), REDEEM_FEE_INDEX), dec!(0.25));
        assert_eq!(controller.module_fee(ModuleId(2), ISSUE_FEE_INDEX), Decimal::ZERO);
    }

    #[test]
    fn fee_share_validation() {
        let mut controller = Controller::new(AccountId(99));
        assert!(matches!(
            controller.set_module_fee(ModuleId(1), ISSUE_FEE_INDEX, dec!(0.1)),
            Err(ControllerError::ModuleNotEnabled(_))
        ));
        controller.add_module(ModuleId(1)).unwrap();
        assert!(matches!(
            controller.set_module_fee(ModuleId(1), ISSUE_FEE_INDEX, dec!(1.1)),
            Err(ControllerError::InvalidFeeShare(_))
        ));
    }
}
