// 5.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::custody::CustodyError;
use crate::fees::{FeeBreakdown, FeeError};
use crate::hooks::HookError;
use crate::position::PositionError;
use crate::precise::MathError;
use crate::settlement::SettlementRecord;
use crate::types::{AccountId, AssetId, Holder, HookId, ModuleId, TokenId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-component flows, index-aligned with `components`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentFlows {
    pub components: Vec<AssetId>,
    pub equity: Vec<Decimal>,
    pub debt: Vec<Decimal>,
}

impl ComponentFlows {
    pub fn equity_of(&self, component: AssetId) -> Decimal {
        self.position(component).map(|i| self.equity[i]).unwrap_or(Decimal::ZERO)
    }

    pub fn debt_of(&self, component: AssetId) -> Decimal {
        self.position(component).map(|i| self.debt[i]).unwrap_or(Decimal::ZERO)
    }

    fn position(&self, component: AssetId) -> Option<usize> {
        self.components.iter().position(|c| *c == component)
    }
}

#[derive(Debug, Clone)]
pub struct IssueResult {
    pub quantity: Decimal,
    pub fees: FeeBreakdown,
    pub flows: ComponentFlows,
    pub record: SettlementRecord,
}

#[derive(Debug, Clone)]
pub struct RedeemResult {
    pub quantity: Decimal,
    pub fees: FeeBreakdown,
    pub flows: ComponentFlows,
    pub record: SettlementRecord,
}

#[derive(Debug, Clone)]
pub struct StreamingFeeResult {
    pub fee_fraction: Decimal,
    pub manager_fee: Decimal,
    pub protocol_fee: Decimal,
    pub new_multiplier: Decimal,
}

/// Collateral coverage of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralStatus {
    pub component: AssetId,
    pub held: Decimal,
    pub required: Decimal,
    pub tolerance: Decimal,
}

impl CollateralStatus {
    pub fn is_covered(&self) -> bool {
        self.held + self.tolerance >= self.required
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    // input validation
    #[error("Quantity must be greater than zero")]
    ZeroQuantity,

    #[error("Quantity {quantity} has more than {max_decimals} decimal places")]
    QuantityTooPrecise { quantity: Decimal, max_decimals: u32 },

    #[error("Component {0} is not a registered asset")]
    UnknownComponent(AssetId),

    #[error("{caller} is not the manager of {token}")]
    NotManager { token: TokenId, caller: AccountId },

    #[error("Components and units differ in length: {components} vs {units}")]
    LengthMismatch { components: usize, units: usize },

    // state preconditions
    #[error("Token {0} not found")]
    TokenNotFound(TokenId),

    #[error("Token {0} is not enabled on the controller")]
    TokenNotEnabled(TokenId),

    #[error("Module {module} is not initialized on {token}")]
    ModuleNotInitialized { token: TokenId, module: ModuleId },

    #[error("Module id {0} is already in use")]
    ModuleIdTaken(ModuleId),

    #[error("Manager hook {0:?} is not installed")]
    UnknownManagerHook(HookId),

    #[error("Issuance is already initialized on {0}")]
    IssuanceAlreadyInitialized(TokenId),

    #[error("Module {module} is already registered on {token}")]
    AlreadyRegistered { token: TokenId, module: ModuleId },

    #[error("Module {module} is not registered on {token}")]
    NotRegistered { token: TokenId, module: ModuleId },

    #[error("Debt modules are still registered on {0}")]
    RegisteredModulesRemain(TokenId),

    #[error("Streaming fee is not initialized on {0}")]
    StreamingFeeNotInitialized(TokenId),

    #[error("Streaming fee is already initialized on {0}")]
    StreamingFeeAlreadyInitialized(TokenId),

    // economic invariants
    #[error("Fee {fee} exceeds maximum {max}")]
    FeeAboveMaximum { fee: Decimal, max: Decimal },

    #[error("Supply {supply} would sit below floor {floor}")]
    SupplyBelowFloor { supply: Decimal, floor: Decimal },

    #[error("Insufficient {asset} balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        holder: Holder,
        asset: AssetId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient shares for {account}: available {available}, requested {requested}")]
    InsufficientShares {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("{token} is under-collateralized in {component}: holds {held}, owes {required}")]
    Undercollateralized {
        token: TokenId,
        component: AssetId,
        held: Decimal,
        required: Decimal,
    },

    // hook failure
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Position error: {0}")]
    Position(PositionError),

    #[error("Custody error: {0}")]
    Custody(CustodyError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Fee error: {0}")]
    Fee(FeeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

impl From<CustodyError> for EngineError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::InsufficientBalance {
                holder,
                asset,
                available,
                requested,
            } => EngineError::InsufficientBalance {
                holder,
                asset,
                available,
                requested,
            },
            other => EngineError::Custody(other),
        }
    }
}

impl From<PositionError> for EngineError {
    fn from(err: PositionError) -> Self {
        match err {
            PositionError::InsufficientShares {
                account,
                requested,
                available,
            } => EngineError::InsufficientShares {
                account,
                available,
                requested,
            },
            other => EngineError::Position(other),
        }
    }
}

impl From<FeeError> for EngineError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::AboveMaximum { fee, max } => EngineError::FeeAboveMaximum { fee, max },
            other => EngineError::Fee(other),
        }
    }
}
