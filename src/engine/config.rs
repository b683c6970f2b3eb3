//! Engine configuration options.

use crate::config::{BasketConfig, ProtocolFeeConfig};
use crate::types::{AccountId, ModuleId};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Receives the protocol's cut of every fee.
    pub protocol_fee_recipient: AccountId,
    /// Protocol cut of issue, redeem and streaming fees.
    pub protocol_fees: ProtocolFeeConfig,
    /// Id the issuance module itself occupies on every token.
    pub issuance_module: ModuleId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            protocol_fee_recipient: AccountId(0),
            protocol_fees: ProtocolFeeConfig::default(),
            issuance_module: ModuleId(1),
        }
    }
}

impl EngineConfig {
    pub fn from_basket(config: &BasketConfig, protocol_fee_recipient: AccountId) -> Self {
        Self {
            protocol_fee_recipient,
            protocol_fees: config.protocol_fees.clone(),
            ..Self::default()
        }
    }
}
