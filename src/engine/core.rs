// 5.0 engine/core.rs: main engine. holds the controller, custody book, every token and
// its issuance settings, installed modules and hooks.

use super::config::EngineConfig;
use super::results::EngineError;
use super::validation::ensure_share_precision;
use crate::config::SettlementVariant;
use crate::controller::{Controller, ControllerError, ISSUE_FEE_INDEX, REDEEM_FEE_INDEX, STREAMING_FEE_INDEX};
use crate::custody::Custody;
use crate::events::{
    ComponentEvent, Event, EventId, EventPayload, ModuleRegistrationEvent, MultiplierEditedEvent,
    SettlementRejectedEvent, TokenCreatedEvent,
};
use crate::hooks::{DebtModule, HookContext, HookError, ManagerIssuanceHook, ModuleRegistry};
use crate::position::StructuredToken;
use crate::settlement::SettlementStage;
use crate::streaming_fee::StreamingFeeState;
use crate::types::{AccountId, AssetId, HookId, ModuleId, Timestamp, TokenId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Issuance state of one token, created by `initialize_issuance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceSettings {
    pub max_manager_fee: Decimal,
    pub issue_fee: Decimal,
    pub redeem_fee: Decimal,
    pub fee_recipient: AccountId,
    pub manager_hook: Option<HookId>,
    pub registered_modules: ModuleRegistry,
    pub variant: SettlementVariant,
    pub min_supply: Option<Decimal>,
}

/** 5.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) controller: Controller,
    pub(super) custody: Custody,
    pub(super) tokens: HashMap<TokenId, StructuredToken>,
    pub(super) issuance: HashMap<TokenId, IssuanceSettings>,
    pub(super) streaming: HashMap<TokenId, StreamingFeeState>,
    pub(super) debt_modules: HashMap<ModuleId, Box<dyn DebtModule>>,
    pub(super) manager_hooks: HashMap<HookId, Box<dyn ManagerIssuanceHook>>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) next_token_id: u32,
    pub(super) next_hook_id: u32,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.protocol_fees.validate()?;

        let mut controller = Controller::new(config.protocol_fee_recipient);
        let issuance = config.issuance_module;
        controller.add_module(issuance)?;
        controller.set_module_fee(issuance, ISSUE_FEE_INDEX, config.protocol_fees.issue_fee_share)?;
        controller.set_module_fee(issuance, REDEEM_FEE_INDEX, config.protocol_fees.redeem_fee_share)?;
        controller.set_module_fee(issuance, STREAMING_FEE_INDEX, config.protocol_fees.streaming_fee_share)?;

        Ok(Self {
            config,
            controller,
            custody: Custody::new(),
            tokens: HashMap::new(),
            issuance: HashMap::new(),
            streaming: HashMap::new(),
            debt_modules: HashMap::new(),
            manager_hooks: HashMap::new(),
            events: Vec::new(),
            next_event_id: 1,
            next_token_id: 1,
            next_hook_id: 1,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn issuance_module(&self) -> ModuleId {
        self.config.issuance_module
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn custody(&self) -> &Custody {
        &self.custody
    }

    /// Direct access to the asset book, for funding accounts and venues.
    pub fn custody_mut(&mut self) -> &mut Custody {
        &mut self.custody
    }

    pub fn register_asset(&mut self, symbol: &str, decimals: u32) -> Result<AssetId, EngineError> {
        Ok(self.custody.register_asset(symbol, decimals)?)
    }

    // 5.1.1: tokens

    /// Creates a token with initial default positions and enables it on the controller.
    /// The issuance module is added to it as pending.
    pub fn create_token(
        &mut self,
        components: &[AssetId],
        units: &[Decimal],
        manager: AccountId,
        name: &str,
        symbol: &str,
    ) -> Result<TokenId, EngineError> {
        if components.len() != units.len() {
            return Err(EngineError::LengthMismatch {
                components: components.len(),
                units: units.len(),
            });
        }
        for component in components {
            if self.custody.asset(*component).is_err() {
                return Err(EngineError::UnknownComponent(*component));
            }
        }

        let id = TokenId(self.next_token_id);
        let pairs: Vec<(AssetId, Decimal)> = components.iter().copied().zip(units.iter().copied()).collect();
        let mut token = StructuredToken::with_components(id, name, symbol, manager, &pairs)?;
        token.add_module(self.config.issuance_module)?;
        self.controller.add_token(id)?;
        self.next_token_id += 1;
        self.tokens.insert(id, token);

        info!(token = %id, %manager, symbol, components = components.len(), "token created");
        self.emit_event(EventPayload::TokenCreated(TokenCreatedEvent {
            token: id,
            manager,
            components: components.to_vec(),
            units: units.to_vec(),
        }));
        Ok(id)
    }

    pub fn token(&self, token: TokenId) -> Result<&StructuredToken, EngineError> {
        self.tokens.get(&token).ok_or(EngineError::TokenNotFound(token))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &StructuredToken> {
        self.tokens.values()
    }

    /// Takes the token off the controller. It can no longer settle.
    pub fn disable_token(&mut self, token: TokenId) -> Result<(), EngineError> {
        self.token(token)?;
        self.controller.remove_token(token)?;
        warn!(token = %token, "token disabled");
        Ok(())
    }

    pub fn settings(&self, token: TokenId) -> Option<&IssuanceSettings> {
        self.issuance.get(&token)
    }

    // 5.1.2: modules and hooks

    /// Installs a debt module under its own id and enables it on the controller.
    pub fn install_debt_module(&mut self, module: Box<dyn DebtModule>) -> Result<ModuleId, EngineError> {
        let id = module.id();
        if id == self.config.issuance_module || self.debt_modules.contains_key(&id) {
            return Err(EngineError::ModuleIdTaken(id));
        }
        self.controller.add_module(id)?;
        info!(module = %id, name = module.name(), "debt module installed");
        self.debt_modules.insert(id, module);
        Ok(id)
    }

    /// Takes a module off the controller. Tokens that still register it can no
    /// longer settle until it is unregistered.
    pub fn disable_module(&mut self, module: ModuleId) -> Result<(), EngineError> {
        self.controller.remove_module(module)?;
        warn!(module = %module, "module disabled");
        Ok(())
    }

    pub fn install_manager_hook(&mut self, hook: Box<dyn ManagerIssuanceHook>) -> HookId {
        let id = HookId(self.next_hook_id);
        self.next_hook_id += 1;
        self.manager_hooks.insert(id, hook);
        id
    }

    /// Manager adds an enabled module to the token; it stays pending until initialized.
    pub fn add_module(&mut self, token: TokenId, caller: AccountId, module: ModuleId) -> Result<(), EngineError> {
        self.require_manager(token, caller)?;
        if !self.controller.is_module(module) {
            return Err(ControllerError::ModuleNotEnabled(module).into());
        }
        self.token_mut(token)?.add_module(module)?;
        debug!(token = %token, module = %module, "module added");
        Ok(())
    }

    /// The module accepts a pending invitation.
    pub fn initialize_module(&mut self, token: TokenId, module: ModuleId) -> Result<(), EngineError> {
        if !self.controller.is_module(module) {
            return Err(ControllerError::ModuleNotEnabled(module).into());
        }
        self.token_mut(token)?.initialize_module(module)?;
        debug!(token = %token, module = %module, "module initialized");
        Ok(())
    }

    /// Manager removes a module. A registered debt module is unregistered first;
    /// the issuance module goes through `remove_issuance_module`.
    pub fn remove_module(&mut self, token: TokenId, caller: AccountId, module: ModuleId) -> Result<(), EngineError> {
        if module == self.config.issuance_module {
            return self.remove_issuance_module(token, caller);
        }
        self.require_manager(token, caller)?;
        let unregistered = self
            .issuance
            .get_mut(&token)
            .map(|s| s.registered_modules.remove(module))
            .unwrap_or(false);
        self.token_mut(token)?.remove_module(module)?;

        if unregistered {
            self.emit_event(EventPayload::ModuleUnregistered(ModuleRegistrationEvent { token, module }));
        }
        debug!(token = %token, module = %module, "module removed");
        Ok(())
    }

    /// Runs `action` as `module` against the token, all-or-nothing. This is how
    /// a module's own manager actions (borrow, repay, ...) reach the ledger.
    pub fn invoke_module<T>(
        &mut self,
        token: TokenId,
        module: ModuleId,
        action: impl FnOnce(&mut HookContext<'_>) -> Result<T, HookError>,
    ) -> Result<T, EngineError> {
        if !self.controller.is_module(module) {
            return Err(HookError::ModuleDisabled(module).into());
        }
        let current = self.token(token)?;
        if !current.is_initialized_module(module) {
            return Err(EngineError::ModuleNotInitialized { token, module });
        }

        let scope = self
            .debt_modules
            .get(&module)
            .map(|m| m.custody_scope())
            .unwrap_or_default();
        let mut staged = current.clone();
        self.custody.begin()?;
        let outcome = action(&mut HookContext::new(&mut staged, &mut self.custody, module, scope));
        match outcome {
            Ok(value) => {
                self.custody.commit();
                self.commit_staged(staged);
                Ok(value)
            }
            Err(err) => {
                self.custody.rollback();
                warn!(token = %token, module = %module, error = %err, "module action reverted");
                Err(err.into())
            }
        }
    }

    // 5.1.3: events

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        debug!(event = event.id.0, payload = ?event.payload, "event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }

    // 5.1.4: shared helpers

    pub(super) fn token_mut(&mut self, token: TokenId) -> Result<&mut StructuredToken, EngineError> {
        self.tokens.get_mut(&token).ok_or(EngineError::TokenNotFound(token))
    }

    pub(super) fn require_manager(&self, token: TokenId, caller: AccountId) -> Result<&StructuredToken, EngineError> {
        let state = self.token(token)?;
        if state.manager != caller {
            return Err(EngineError::NotManager { token, caller });
        }
        Ok(state)
    }

    pub(super) fn issuance_settings(&self, token: TokenId) -> Result<&IssuanceSettings, EngineError> {
        self.token(token)?;
        self.issuance.get(&token).ok_or(EngineError::ModuleNotInitialized {
            token,
            module: self.config.issuance_module,
        })
    }

    pub(super) fn variant_of(&self, token: TokenId) -> SettlementVariant {
        self.issuance.get(&token).map(|s| s.variant).unwrap_or_default()
    }

    /// Protocol share of the issuance module's fee at `index`.
    pub(super) fn protocol_share(&self, index: usize) -> Decimal {
        self.controller.module_fee(self.config.issuance_module, index)
    }

    /// Checks shared by issue and redeem; returns a copy of the settings to settle against.
    pub(super) fn settlement_preconditions(
        &self,
        token: TokenId,
        quantity: Decimal,
    ) -> Result<IssuanceSettings, EngineError> {
        if quantity <= Decimal::ZERO {
            return Err(EngineError::ZeroQuantity);
        }
        ensure_share_precision(quantity)?;
        let state = self.token(token)?;
        if !self.controller.is_token(token) {
            return Err(EngineError::TokenNotEnabled(token));
        }
        let issuance = self.config.issuance_module;
        if !state.is_initialized_module(issuance) {
            return Err(EngineError::ModuleNotInitialized { token, module: issuance });
        }
        Ok(self.issuance_settings(token)?.clone())
    }

    /// Swaps in a staged copy of a token, emitting ledger events for what changed.
    pub(super) fn commit_staged(&mut self, staged: StructuredToken) {
        let id = staged.id;
        let Some(previous) = self.tokens.get(&id) else {
            return;
        };

        let added: Vec<AssetId> = staged
            .components()
            .iter()
            .filter(|c| !previous.is_component(**c))
            .copied()
            .collect();
        let removed: Vec<AssetId> = previous
            .components()
            .iter()
            .filter(|c| !staged.is_component(**c))
            .copied()
            .collect();
        let old_multiplier = previous.position_multiplier();
        let new_multiplier = staged.position_multiplier();

        self.tokens.insert(id, staged);

        for component in added {
            self.emit_event(EventPayload::ComponentAdded(ComponentEvent { token: id, component }));
        }
        for component in removed {
            self.emit_event(EventPayload::ComponentRemoved(ComponentEvent { token: id, component }));
        }
        if old_multiplier != new_multiplier {
            self.emit_event(EventPayload::PositionMultiplierEdited(MultiplierEditedEvent {
                token: id,
                old_multiplier,
                new_multiplier,
            }));
        }
    }

    /// Undoes a failed settlement and records why it failed.
    pub(super) fn abort_settlement(
        &mut self,
        token: TokenId,
        sender: AccountId,
        quantity: Decimal,
        stage: SettlementStage,
        err: EngineError,
    ) -> EngineError {
        self.custody.rollback();
        warn!(token = %token, %sender, %quantity, ?stage, error = %err, "settlement reverted");
        self.emit_event(EventPayload::SettlementRejected(SettlementRejectedEvent {
            token,
            sender,
            quantity,
            stage,
            reason: err.to_string(),
        }));
        err
    }
}
