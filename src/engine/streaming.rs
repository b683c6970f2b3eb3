// 5.6 engine/streaming.rs: time-based manager fee. inflation shares go to the fee recipient
// (less the protocol cut) and the position multiplier is rebased against the new supply.

use super::core::Engine;
use super::results::{EngineError, StreamingFeeResult};
use super::validation::ensure_collateralized;
use crate::config::ConfigError;
use crate::controller::STREAMING_FEE_INDEX;
use crate::events::{EventPayload, StreamingFeeAccruedEvent};
use crate::fees::{split_fee, validate_fee_rate};
use crate::position::rebased_multiplier;
use crate::streaming_fee::{accrued_fee_fraction, inflation_shares, StreamingFeeParams, StreamingFeeState};
use crate::types::{AccountId, Timestamp, TokenId};
use rust_decimal::Decimal;
use tracing::{debug, info};

impl Engine {
    /// Manager starts the streaming fee clock at the current time.
    pub fn initialize_streaming_fee(
        &mut self,
        token: TokenId,
        caller: AccountId,
        params: StreamingFeeParams,
        fee_recipient: AccountId,
    ) -> Result<(), EngineError> {
        self.require_manager(token, caller)?;
        if self.streaming.contains_key(&token) {
            return Err(EngineError::StreamingFeeAlreadyInitialized(token));
        }
        if validate_fee_rate(params.max_annual_rate).is_err() {
            return Err(ConfigError::InvalidStreamingFee {
                reason: format!("max annual rate {} must be in [0, 1)", params.max_annual_rate),
            }
            .into());
        }
        if params.annual_rate < Decimal::ZERO || params.annual_rate > params.max_annual_rate {
            return Err(EngineError::FeeAboveMaximum {
                fee: params.annual_rate,
                max: params.max_annual_rate,
            });
        }

        info!(token = %token, rate = %params.annual_rate, "streaming fee initialized");
        self.streaming
            .insert(token, StreamingFeeState::new(params, fee_recipient, self.current_time));
        Ok(())
    }

    pub fn streaming_fee(&self, token: TokenId) -> Option<&StreamingFeeState> {
        self.streaming.get(&token)
    }

    /// Mints the fee owed since the last accrual and rebases the multiplier so
    /// the holders' claims shrink by the same fraction. Anyone may call it.
    pub fn accrue_streaming_fee(&mut self, token: TokenId) -> Result<StreamingFeeResult, EngineError> {
        let state = self
            .streaming
            .get(&token)
            .ok_or(EngineError::StreamingFeeNotInitialized(token))?
            .clone();
        let now = self.current_time;
        let fee_fraction = accrued_fee_fraction(state.params.annual_rate, state.last_accrual, now)?;
        validate_fee_rate(fee_fraction)?;

        let mut staged = self.token(token)?.clone();
        let old_multiplier = staged.position_multiplier();
        let supply = staged.total_supply();
        let minted = inflation_shares(supply, fee_fraction)?;

        if minted.is_zero() {
            self.set_last_accrual(token, now);
            debug!(token = %token, "nothing to accrue");
            return Ok(StreamingFeeResult {
                fee_fraction,
                manager_fee: Decimal::ZERO,
                protocol_fee: Decimal::ZERO,
                new_multiplier: old_multiplier,
            });
        }

        let (manager_fee, protocol_fee) = split_fee(minted, self.protocol_share(STREAMING_FEE_INDEX))?;
        staged.mint(state.fee_recipient, manager_fee);
        if protocol_fee > Decimal::ZERO {
            staged.mint(self.controller.fee_recipient(), protocol_fee);
        }

        let new_multiplier = rebased_multiplier(old_multiplier, supply, staged.total_supply())?;
        staged.edit_position_multiplier(new_multiplier)?;
        ensure_collateralized(&staged, &self.custody, self.variant_of(token))?;

        self.commit_staged(staged);
        self.set_last_accrual(token, now);

        info!(token = %token, %fee_fraction, %manager_fee, %protocol_fee, %new_multiplier, "streaming fee accrued");
        self.emit_event(EventPayload::StreamingFeeAccrued(StreamingFeeAccruedEvent {
            token,
            fee_fraction,
            manager_fee,
            protocol_fee,
        }));

        Ok(StreamingFeeResult {
            fee_fraction,
            manager_fee,
            protocol_fee,
            new_multiplier,
        })
    }

    /// Accrues at the old rate, then switches to `annual_rate`.
    pub fn update_streaming_fee(
        &mut self,
        token: TokenId,
        caller: AccountId,
        annual_rate: Decimal,
    ) -> Result<(), EngineError> {
        self.require_manager(token, caller)?;
        let max = self
            .streaming
            .get(&token)
            .ok_or(EngineError::StreamingFeeNotInitialized(token))?
            .params
            .max_annual_rate;
        if annual_rate < Decimal::ZERO || annual_rate > max {
            return Err(EngineError::FeeAboveMaximum { fee: annual_rate, max });
        }

        self.accrue_streaming_fee(token)?;
        if let Some(state) = self.streaming.get_mut(&token) {
            state.params.annual_rate = annual_rate;
        }
        info!(token = %token, %annual_rate, "streaming fee updated");
        Ok(())
    }

    pub fn update_streaming_fee_recipient(
        &mut self,
        token: TokenId,
        caller: AccountId,
        fee_recipient: AccountId,
    ) -> Result<(), EngineError> {
        self.require_manager(token, caller)?;
        let state = self
            .streaming
            .get_mut(&token)
            .ok_or(EngineError::StreamingFeeNotInitialized(token))?;
        state.fee_recipient = fee_recipient;
        Ok(())
    }

    fn set_last_accrual(&mut self, token: TokenId, now: Timestamp) {
        if let Some(state) = self.streaming.get_mut(&token) {
            state.last_accrual = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::IssuanceConfig;
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::events::EventPayload;
    use crate::streaming_fee::StreamingFeeParams;
    use crate::types::{AccountId, AssetId, Holder, TokenId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const MANAGER: AccountId = AccountId(1);
    const ALICE: AccountId = AccountId(10);
    const FEES: AccountId = AccountId(90);
    const YEAR_MS: i64 = 31_536_000_000;

    fn streaming_basket(annual_rate: Decimal) -> (Engine, TokenId, AssetId) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let usdc = engine.register_asset("USDC", 6).unwrap();
        engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(1_000)).unwrap();
        let token = engine.create_token(&[usdc], &[dec!(100)], MANAGER, "Basket", "BSKT").unwrap();
        engine
            .initialize_issuance(token, MANAGER, &IssuanceConfig::fee_free(), FEES, None)
            .unwrap();
        engine.issue(token, dec!(10), ALICE, ALICE).unwrap();
        let params = StreamingFeeParams {
            annual_rate,
            max_annual_rate: dec!(0.1),
        };
        engine.initialize_streaming_fee(token, MANAGER, params, FEES).unwrap();
        (engine, token, usdc)
    }

    #[test]
    fn one_year_at_ten_percent() {
        let (mut engine, token, usdc) = streaming_basket(dec!(0.1));
        engine.advance_time(YEAR_MS);
        let result = engine.accrue_streaming_fee(token).unwrap();

        assert_eq!(result.fee_fraction, dec!(0.1));
        assert_eq!(result.manager_fee, dec!(1.111111111111111111));
        assert_eq!(result.new_multiplier, dec!(0.9));

        let state = engine.token(token).unwrap();
        assert_eq!(state.balance_of(FEES), dec!(1.111111111111111111));
        assert_eq!(state.default_real_unit(usdc).unwrap(), dec!(90));
        assert!(engine.is_collateralized(token).unwrap());
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e.payload, EventPayload::PositionMultiplierEdited(_))));
    }

    #[test]
    fn accrual_twice_at_same_time_mints_once() {
        let (mut engine, token, _) = streaming_basket(dec!(0.05));
        engine.advance_time(YEAR_MS / 2);
        engine.accrue_streaming_fee(token).unwrap();
        let supply = engine.token(token).unwrap().total_supply();

        let again = engine.accrue_streaming_fee(token).unwrap();
        assert_eq!(again.manager_fee, Decimal::ZERO);
        assert_eq!(engine.token(token).unwrap().total_supply(), supply);
    }

    #[test]
    fn rate_updates_are_capped_and_accrue_first() {
        let (mut engine, token, _) = streaming_basket(dec!(0.02));
        assert!(matches!(
            engine.update_streaming_fee(token, MANAGER, dec!(0.2)),
            Err(EngineError::FeeAboveMaximum { .. })
        ));

        engine.advance_time(YEAR_MS);
        engine.update_streaming_fee(token, MANAGER, dec!(0.05)).unwrap();
        assert!(engine.token(token).unwrap().balance_of(FEES) > Decimal::ZERO);
        let state = engine.streaming_fee(token).unwrap();
        assert_eq!(state.params.annual_rate, dec!(0.05));
        assert_eq!(state.last_accrual, engine.time());
    }

    #[test]
    fn uninitialized_token_cannot_accrue() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let usdc = engine.register_asset("USDC", 6).unwrap();
        let token = engine.create_token(&[usdc], &[dec!(1)], MANAGER, "Basket", "BSKT").unwrap();
        assert!(matches!(
            engine.accrue_streaming_fee(token),
            Err(EngineError::StreamingFeeNotInitialized(_))
        ));
    }

    #[test]
    fn recipient_update_is_manager_gated() {
        let (mut engine, token, _) = streaming_basket(dec!(0.02));
        assert!(engine.update_streaming_fee_recipient(token, ALICE, ALICE).is_err());
        engine.update_streaming_fee_recipient(token, MANAGER, AccountId(91)).unwrap();
        assert_eq!(engine.streaming_fee(token).unwrap().fee_recipient, AccountId(91));
    }
}
