//! Issuance hooks and their dispatch.
//!
//! Debt modules own external (usually negative) positions and settle them
//! inside the same issuance or redemption through the [`DebtModule`] hooks.
//! A manager may also attach a single [`ManagerIssuanceHook`] that observes
//! every request before any flow is computed.
//!
//! Dispatch order for one issue: manager hook, then every registered
//! module's `module_issue_hook` in registration order, then flows are
//! computed, then per-component hooks run while assets move.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::controller::Controller;
use crate::custody::{Custody, CustodyError};
use crate::position::{ExternalPositionWriter, PositionError, StructuredToken};
use crate::precise::{div_round_down, MathError, PRECISE_SCALE};
use crate::types::{AccountId, AssetId, Holder, ModuleId, TokenId};

/// Custody a debt module may move through its hook context: liquidity
/// between its venue and the hook's token, and its own debt assets minted to
/// or burned from that token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyScope {
    pub venue: Option<AccountId>,
    pub debt_assets: Vec<AssetId>,
}

/// What a debt module can see and touch while one of its hooks runs.
///
/// External positions are writable only under the calling module's key, and
/// balances only within the module's [`CustodyScope`].
pub struct HookContext<'a> {
    token: &'a mut StructuredToken,
    custody: &'a mut Custody,
    module: ModuleId,
    scope: CustodyScope,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        token: &'a mut StructuredToken,
        custody: &'a mut Custody,
        module: ModuleId,
        scope: CustodyScope,
    ) -> Self {
        Self {
            token,
            custody,
            module,
            scope,
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn token_id(&self) -> TokenId {
        self.token.id
    }

    pub fn token(&self) -> &StructuredToken {
        &*self.token
    }

    pub fn custody(&self) -> &Custody {
        &*self.custody
    }

    /// Venue -> token.
    pub fn draw_from_venue(&mut self, asset: AssetId, amount: Decimal) -> Result<(), HookError> {
        let venue = self.venue()?;
        self.custody.transfer(venue, Holder::Token(self.token.id), asset, amount)?;
        Ok(())
    }

    /// Token -> venue.
    pub fn repay_venue(&mut self, asset: AssetId, amount: Decimal) -> Result<(), HookError> {
        let venue = self.venue()?;
        self.custody.transfer(Holder::Token(self.token.id), venue, asset, amount)?;
        Ok(())
    }

    pub fn mint_debt(&mut self, debt_asset: AssetId, amount: Decimal) -> Result<(), HookError> {
        self.ensure_debt_asset(debt_asset)?;
        self.custody.mint(Holder::Token(self.token.id), debt_asset, amount)?;
        Ok(())
    }

    pub fn burn_debt(&mut self, debt_asset: AssetId, amount: Decimal) -> Result<(), HookError> {
        self.ensure_debt_asset(debt_asset)?;
        self.custody.burn(Holder::Token(self.token.id), debt_asset, amount)?;
        Ok(())
    }

    fn venue(&self) -> Result<Holder, HookError> {
        self.scope.venue.map(Holder::Account).ok_or_else(|| HookError::OutOfScope {
            module: self.module,
            reason: "no venue".to_string(),
        })
    }

    // a component is never a debt asset, or a module could mint collateral
    fn ensure_debt_asset(&self, asset: AssetId) -> Result<(), HookError> {
        if !self.scope.debt_assets.contains(&asset) || self.token.is_component(asset) {
            return Err(HookError::OutOfScope {
                module: self.module,
                reason: format!("{asset} is not one of its debt assets"),
            });
        }
        Ok(())
    }

    pub fn positions(&mut self) -> ExternalPositionWriter<'_> {
        self.token.external_writer(self.module)
    }

    /// Re-derives the default unit of `component` from what the token actually
    /// holds: `floor(balance / supply)`. Leaves the unit alone while supply is zero.
    pub fn sync_default_position(&mut self, component: AssetId) -> Result<Decimal, HookError> {
        let supply = self.token.total_supply();
        if supply.is_zero() {
            return Ok(self.token.default_real_unit(component)?);
        }
        let balance = self.custody.balance(Holder::Token(self.token.id), component);
        let unit = div_round_down(balance, supply, PRECISE_SCALE)?;
        self.token.set_default_real_unit(component, unit)?;
        Ok(unit)
    }
}

/// Contract for modules that carry debt on a token.
///
/// A module keeps its external units current in the module hooks. On issue the
/// debt component hook draws debt into the token, which then hands it to the
/// issuer; on redeem the token has already collected the redeemer's share and
/// the hook repays the venue out of it.
pub trait DebtModule: fmt::Debug {
    fn id(&self) -> ModuleId;

    fn name(&self) -> &str {
        "debt-module"
    }

    /// Venue and debt assets this module may move through its hook context.
    fn custody_scope(&self) -> CustodyScope {
        CustodyScope::default()
    }

    fn module_issue_hook(&self, ctx: &mut HookContext<'_>, quantity: Decimal) -> Result<(), HookError>;

    fn module_redeem_hook(&self, ctx: &mut HookContext<'_>, quantity: Decimal) -> Result<(), HookError>;

    fn component_issue_hook(
        &self,
        ctx: &mut HookContext<'_>,
        quantity: Decimal,
        component: AssetId,
        is_equity: bool,
    ) -> Result<(), HookError>;

    fn component_redeem_hook(
        &self,
        ctx: &mut HookContext<'_>,
        quantity: Decimal,
        component: AssetId,
        is_equity: bool,
    ) -> Result<(), HookError>;
}

/// Optional manager callback run once before flows are computed. It only ever
/// sees the token immutably.
pub trait ManagerIssuanceHook: fmt::Debug {
    fn pre_issue(
        &self,
        token: &StructuredToken,
        quantity: Decimal,
        sender: AccountId,
        to: AccountId,
    ) -> Result<(), HookError>;

    fn pre_redeem(
        &self,
        _token: &StructuredToken,
        _quantity: Decimal,
        _sender: AccountId,
        _to: AccountId,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

/// Caps total supply after issuance.
#[derive(Debug, Clone)]
pub struct SupplyCapHook {
    pub max_supply: Decimal,
}

impl ManagerIssuanceHook for SupplyCapHook {
    fn pre_issue(
        &self,
        token: &StructuredToken,
        quantity: Decimal,
        _sender: AccountId,
        _to: AccountId,
    ) -> Result<(), HookError> {
        let projected = token.total_supply() + quantity;
        if projected > self.max_supply {
            return Err(HookError::ManagerRejected(format!(
                "supply {} would exceed cap {}",
                projected, self.max_supply
            )));
        }
        Ok(())
    }
}

/// Restricts issuance to an allow-list of issuers.
#[derive(Debug, Clone, Default)]
pub struct AllowListHook {
    pub allowed: HashSet<AccountId>,
}

impl ManagerIssuanceHook for AllowListHook {
    fn pre_issue(
        &self,
        _token: &StructuredToken,
        _quantity: Decimal,
        sender: AccountId,
        _to: AccountId,
    ) -> Result<(), HookError> {
        if !self.allowed.contains(&sender) {
            return Err(HookError::ManagerRejected(format!("{sender} is not allowed to issue")));
        }
        Ok(())
    }
}

// 4.1: registered debt modules per token. order of registration is hook order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRegistry {
    order: Vec<ModuleId>,
    members: HashSet<ModuleId>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// False if already present.
    pub fn insert(&mut self, module: ModuleId) -> bool {
        if !self.members.insert(module) {
            return false;
        }
        self.order.push(module);
        true
    }

    /// False if absent.
    pub fn remove(&mut self, module: ModuleId) -> bool {
        if !self.members.remove(&module) {
            return false;
        }
        self.order.retain(|m| *m != module);
        true
    }

    pub fn contains(&self, module: ModuleId) -> bool {
        self.members.contains(&module)
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// 4.2: dispatch. checks every module is still live on the controller and initialized
// on the token before running it.
pub struct HookDispatcher<'a> {
    modules: &'a HashMap<ModuleId, Box<dyn DebtModule>>,
    registry: &'a ModuleRegistry,
    controller: &'a Controller,
}

impl<'a> HookDispatcher<'a> {
    pub fn new(
        modules: &'a HashMap<ModuleId, Box<dyn DebtModule>>,
        registry: &'a ModuleRegistry,
        controller: &'a Controller,
    ) -> Self {
        Self {
            modules,
            registry,
            controller,
        }
    }

    pub fn module_issue_hooks(
        &self,
        token: &mut StructuredToken,
        custody: &mut Custody,
        quantity: Decimal,
    ) -> Result<(), HookError> {
        for &id in self.registry.modules() {
            let module = self.resolve(token, id)?;
            debug!(token = %token.id, module = %id, %quantity, "module issue hook");
            module.module_issue_hook(&mut HookContext::new(token, custody, id, module.custody_scope()), quantity)?;
        }
        Ok(())
    }

    pub fn module_redeem_hooks(
        &self,
        token: &mut StructuredToken,
        custody: &mut Custody,
        quantity: Decimal,
    ) -> Result<(), HookError> {
        for &id in self.registry.modules() {
            let module = self.resolve(token, id)?;
            debug!(token = %token.id, module = %id, %quantity, "module redeem hook");
            module.module_redeem_hook(&mut HookContext::new(token, custody, id, module.custody_scope()), quantity)?;
        }
        Ok(())
    }

    /// Runs `component_issue_hook` on every registered module that owns an
    /// external position on `component`.
    pub fn component_issue_hooks(
        &self,
        token: &mut StructuredToken,
        custody: &mut Custody,
        quantity: Decimal,
        component: AssetId,
        is_equity: bool,
    ) -> Result<(), HookError> {
        for id in self.component_modules(token, component) {
            let module = self.resolve(token, id)?;
            let mut ctx = HookContext::new(token, custody, id, module.custody_scope());
            module.component_issue_hook(&mut ctx, quantity, component, is_equity)?;
        }
        Ok(())
    }

    pub fn component_redeem_hooks(
        &self,
        token: &mut StructuredToken,
        custody: &mut Custody,
        quantity: Decimal,
        component: AssetId,
        is_equity: bool,
    ) -> Result<(), HookError> {
        for id in self.component_modules(token, component) {
            let module = self.resolve(token, id)?;
            let mut ctx = HookContext::new(token, custody, id, module.custody_scope());
            module.component_redeem_hook(&mut ctx, quantity, component, is_equity)?;
        }
        Ok(())
    }

    fn component_modules(&self, token: &StructuredToken, component: AssetId) -> Vec<ModuleId> {
        token
            .external_modules(component)
            .iter()
            .copied()
            .filter(|m| self.registry.contains(*m))
            .collect()
    }

    fn resolve(&self, token: &StructuredToken, id: ModuleId) -> Result<&'a dyn DebtModule, HookError> {
        if !self.controller.is_module(id) || !token.is_initialized_module(id) {
            return Err(HookError::ModuleDisabled(id));
        }
        self.modules
            .get(&id)
            .map(|m| &**m)
            .ok_or(HookError::UnknownModule(id))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    #[error("Hook of {module} rejected: {reason}")]
    Rejected { module: ModuleId, reason: String },

    #[error("Manager hook rejected: {0}")]
    ManagerRejected(String),

    #[error("Module {0} is not enabled on the controller and token")]
    ModuleDisabled(ModuleId),

    #[error("No debt module installed under {0}")]
    UnknownModule(ModuleId),

    #[error("Module {module} acted outside its custody scope: {reason}")]
    OutOfScope { module: ModuleId, reason: String },

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}
