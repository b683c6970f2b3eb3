// 7.0 config.rs: all settings in one place. issuance fees, settlement variant, protocol shares.
// 7.1 IssuanceConfig is the per-token template applied by initialize_issuance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::fees::validate_fee_rate;
use crate::precise::smallest_unit;
use crate::streaming_fee::StreamingFeeParams;

/// How much rounding deficit the collateralization check forgives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementVariant {
    /// Held balances must cover every default claim exactly.
    #[default]
    Strict,
    /// Forgives one smallest unit per component, for assets whose transfers
    /// can land a unit short.
    DeficitTolerant,
}

impl SettlementVariant {
    /// Allowed shortfall for a component with `decimals` places.
    pub fn tolerance(self, decimals: u32) -> Decimal {
        match self {
            SettlementVariant::Strict => Decimal::ZERO,
            SettlementVariant::DeficitTolerant => smallest_unit(decimals),
        }
    }
}

// Per-token issuance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    // Ceiling for both issue and redeem fees
    pub max_manager_fee: Decimal,
    // Fee on top of the issued quantity (0.005 = 0.5%)
    pub issue_fee: Decimal,
    // Fee taken out of the redeemed quantity
    pub redeem_fee: Decimal,
    pub variant: SettlementVariant,
    // Non-zero supply may never sit below this after a settlement
    pub min_supply: Option<Decimal>,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            max_manager_fee: dec!(0.05),
            issue_fee: dec!(0.005),
            redeem_fee: dec!(0.005),
            variant: SettlementVariant::Strict,
            min_supply: None,
        }
    }
}

impl IssuanceConfig {
    /// No fees at all. Used for plain baskets and most tests.
    pub fn fee_free() -> Self {
        Self {
            issue_fee: Decimal::ZERO,
            redeem_fee: Decimal::ZERO,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if validate_fee_rate(self.max_manager_fee).is_err() {
            return Err(ConfigError::InvalidFees {
                reason: format!("max manager fee {} must be in [0, 1)", self.max_manager_fee),
            });
        }
        if self.issue_fee < Decimal::ZERO || self.issue_fee > self.max_manager_fee {
            return Err(ConfigError::InvalidFees {
                reason: format!("issue fee {} outside [0, {}]", self.issue_fee, self.max_manager_fee),
            });
        }
        if self.redeem_fee < Decimal::ZERO || self.redeem_fee > self.max_manager_fee {
            return Err(ConfigError::InvalidFees {
                reason: format!("redeem fee {} outside [0, {}]", self.redeem_fee, self.max_manager_fee),
            });
        }
        if let Some(floor) = self.min_supply {
            if floor <= Decimal::ZERO {
                return Err(ConfigError::InvalidSupplyFloor {
                    reason: format!("supply floor must be positive, got {floor}"),
                });
            }
        }
        Ok(())
    }
}

/** 7.2: protocol cut of each manager fee. 0.2 = protocol keeps 20% */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolFeeConfig {
    pub issue_fee_share: Decimal,
    pub redeem_fee_share: Decimal,
    pub streaming_fee_share: Decimal,
}

impl Default for ProtocolFeeConfig {
    fn default() -> Self {
        Self {
            issue_fee_share: Decimal::ZERO,
            redeem_fee_share: Decimal::ZERO,
            streaming_fee_share: Decimal::ZERO,
        }
    }
}

impl ProtocolFeeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, share) in [
            ("issue", self.issue_fee_share),
            ("redeem", self.redeem_fee_share),
            ("streaming", self.streaming_fee_share),
        ] {
            if share < Decimal::ZERO || share > Decimal::ONE {
                return Err(ConfigError::InvalidProtocolShare {
                    reason: format!("{name} share {share} outside [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

// The complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasketConfig {
    pub issuance: IssuanceConfig,
    pub protocol_fees: ProtocolFeeConfig,
    pub streaming_fee: StreamingFeeParams,
}

impl BasketConfig {
    // Testnet: free issuance, protocol keeps nothing
    pub fn testnet() -> Self {
        Self {
            issuance: IssuanceConfig::fee_free(),
            ..Self::default()
        }
    }

    // Mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.issuance.max_manager_fee = dec!(0.02);
        config.issuance.issue_fee = dec!(0.001);
        config.issuance.redeem_fee = dec!(0.001);
        config.protocol_fees.issue_fee_share = dec!(0.2);
        config.protocol_fees.redeem_fee_share = dec!(0.2);
        config.protocol_fees.streaming_fee_share = dec!(0.15);
        config
    }

    // Tokens carrying venue debt, whose components can land a unit short on transfer
    pub fn leveraged() -> Self {
        let mut config = Self::mainnet_conservative();
        config.issuance.variant = SettlementVariant::DeficitTolerant;
        config.issuance.min_supply = Some(dec!(0.0001));
        config.issuance.redeem_fee = dec!(0.002);
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.issuance.validate()?;
        self.protocol_fees.validate()?;

        let streaming = &self.streaming_fee;
        if validate_fee_rate(streaming.max_annual_rate).is_err() {
            return Err(ConfigError::InvalidStreamingFee {
                reason: format!("max annual rate {} must be in [0, 1)", streaming.max_annual_rate),
            });
        }
        if streaming.annual_rate < Decimal::ZERO || streaming.annual_rate > streaming.max_annual_rate {
            return Err(ConfigError::InvalidStreamingFee {
                reason: format!("annual rate {} above max {}", streaming.annual_rate, streaming.max_annual_rate),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("Invalid protocol fee share: {reason}")]
    InvalidProtocolShare { reason: String },

    #[error("Invalid streaming fee: {reason}")]
    InvalidStreamingFee { reason: String },

    #[error("Invalid supply floor: {reason}")]
    InvalidSupplyFloor { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> BasketConfig {
        match self {
            Environment::Development => BasketConfig::default(),
            Environment::Testnet => BasketConfig::testnet(),
            Environment::Mainnet => BasketConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = BasketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.issuance.variant, SettlementVariant::Strict);
    }

    #[test]
    fn test_presets_valid() {
        assert!(BasketConfig::testnet().validate().is_ok());
        assert!(BasketConfig::mainnet_conservative().validate().is_ok());

        let leveraged = BasketConfig::leveraged();
        assert!(leveraged.validate().is_ok());
        assert_eq!(leveraged.issuance.variant, SettlementVariant::DeficitTolerant);
    }

    #[test]
    fn test_fee_above_max() {
        let mut config = BasketConfig::default();
        config.issuance.issue_fee = dec!(0.06);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFees { .. })));
    }

    #[test]
    fn test_invalid_protocol_share() {
        let mut config = BasketConfig::default();
        config.protocol_fees.redeem_fee_share = dec!(1.5);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidProtocolShare { .. })));
    }

    #[test]
    fn test_invalid_streaming_fee() {
        let mut config = BasketConfig::default();
        config.streaming_fee.annual_rate = dec!(0.2);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidStreamingFee { .. })));
    }

    #[test]
    fn test_supply_floor_must_be_positive() {
        let mut config = BasketConfig::default();
        config.issuance.min_supply = Some(Decimal::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSupplyFloor { .. })));
    }

    #[test]
    fn test_variant_tolerance() {
        assert_eq!(SettlementVariant::Strict.tolerance(6), Decimal::ZERO);
        assert_eq!(SettlementVariant::DeficitTolerant.tolerance(6), dec!(0.000001));
        assert_eq!(SettlementVariant::DeficitTolerant.tolerance(18), dec!(0.000000000000000001));
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = BasketConfig::leveraged();
        let json = serde_json::to_string(&config).unwrap();
        let back: BasketConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.issuance.variant, config.issuance.variant);
        assert_eq!(back.issuance.min_supply, config.issuance.min_supply);
    }
}
