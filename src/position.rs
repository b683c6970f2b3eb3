// 2.0: the position ledger. one StructuredToken per token id: share balances, the ordered
// component set, default units (scaled by the position multiplier) and external units per owning module.
// 2.1 is the external-position writer capability, 2.2 the multiplier rebase at the bottom.

use crate::precise::{div_round_down, mul_div_round_down, mul_round_down, MathError, PRECISE_SCALE};
use crate::types::{AccountId, AssetId, ModuleId, TokenId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Default,
    External,
}

/// Enumeration form of one position. `unit` is the real per-share unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub component: AssetId,
    pub module: Option<ModuleId>,
    pub unit: Decimal,
    pub state: PositionState,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalPosition {
    pub unit: Decimal,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ComponentPosition {
    // stored unit; real unit = virtual_unit * position_multiplier
    virtual_unit: Decimal,
    external_modules: Vec<ModuleId>,
    external: HashMap<ModuleId, ExternalPosition>,
}

impl ComponentPosition {
    fn is_empty(&self) -> bool {
        self.virtual_unit.is_zero() && self.external_modules.is_empty()
    }
}

/// Module lifecycle on a token: the manager adds a module, the module initializes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    Pending,
    Initialized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredToken {
    pub id: TokenId,
    pub name: String,
    pub symbol: String,
    pub manager: AccountId,
    total_supply: Decimal,
    balances: HashMap<AccountId, Decimal>,
    components: Vec<AssetId>,
    positions: HashMap<AssetId, ComponentPosition>,
    position_multiplier: Decimal,
    modules: Vec<(ModuleId, ModuleState)>,
}

impl StructuredToken {
    pub fn new(id: TokenId, name: impl Into<String>, symbol: impl Into<String>, manager: AccountId) -> Self {
        Self {
            id,
            name: name.into(),
            symbol: symbol.into(),
            manager,
            total_supply: Decimal::ZERO,
            balances: HashMap::new(),
            components: Vec::new(),
            positions: HashMap::new(),
            position_multiplier: Decimal::ONE,
            modules: Vec::new(),
        }
    }

    /// Token with an initial set of default positions, each unit > 0.
    pub fn with_components(
        id: TokenId,
        name: impl Into<String>,
        symbol: impl Into<String>,
        manager: AccountId,
        units: &[(AssetId, Decimal)],
    ) -> Result<Self, PositionError> {
        let mut token = Self::new(id, name, symbol, manager);
        for &(component, unit) in units {
            if unit <= Decimal::ZERO {
                return Err(PositionError::NonPositiveInitialUnit { component, unit });
            }
            token.add_component(component)?;
            token.set_default_real_unit(component, unit)?;
        }
        Ok(token)
    }

    // share ledger

    pub fn total_supply(&self) -> Decimal {
        self.total_supply
    }

    pub fn balance_of(&self, account: AccountId) -> Decimal {
        self.balances.get(&account).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, &Decimal)> {
        self.balances.iter().filter(|(_, b)| !b.is_zero())
    }

    pub(crate) fn mint(&mut self, to: AccountId, amount: Decimal) {
        if amount.is_zero() {
            return;
        }
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount;
        self.total_supply += amount;
    }

    pub(crate) fn burn(&mut self, from: AccountId, amount: Decimal) -> Result<(), PositionError> {
        let available = self.balance_of(from);
        if amount > available {
            return Err(PositionError::InsufficientShares {
                account: from,
                requested: amount,
                available,
            });
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.balances.insert(from, available - amount);
        self.total_supply -= amount;
        Ok(())
    }

    // components and positions

    pub fn components(&self) -> &[AssetId] {
        &self.components
    }

    pub fn is_component(&self, component: AssetId) -> bool {
        self.positions.contains_key(&component)
    }

    pub fn position_multiplier(&self) -> Decimal {
        self.position_multiplier
    }

    pub fn default_real_unit(&self, component: AssetId) -> Result<Decimal, MathError> {
        match self.positions.get(&component) {
            Some(position) => self.virtual_to_real(position.virtual_unit),
            None => Ok(Decimal::ZERO),
        }
    }

    pub fn external_unit(&self, component: AssetId, module: ModuleId) -> Decimal {
        self.positions
            .get(&component)
            .and_then(|p| p.external.get(&module))
            .map(|e| e.unit)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn external_data(&self, component: AssetId, module: ModuleId) -> Option<&[u8]> {
        self.positions
            .get(&component)
            .and_then(|p| p.external.get(&module))
            .map(|e| e.data.as_slice())
    }

    /// Owning modules of a component's external positions, in the order they were first written.
    pub fn external_modules(&self, component: AssetId) -> &[ModuleId] {
        self.positions
            .get(&component)
            .map(|p| p.external_modules.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_external_module(&self, component: AssetId, module: ModuleId) -> bool {
        self.external_modules(component).contains(&module)
    }

    /// Default real unit plus every external unit, signed.
    pub fn total_real_unit(&self, component: AssetId) -> Result<Decimal, MathError> {
        let external: Decimal = self
            .external_modules(component)
            .iter()
            .map(|m| self.external_unit(component, *m))
            .sum();
        Ok(self.default_real_unit(component)? + external)
    }

    pub fn positions(&self) -> Result<Vec<Position>, MathError> {
        let mut out = Vec::new();
        for component in &self.components {
            let Some(position) = self.positions.get(component) else {
                continue;
            };
            if !position.virtual_unit.is_zero() {
                out.push(Position {
                    component: *component,
                    module: None,
                    unit: self.virtual_to_real(position.virtual_unit)?,
                    state: PositionState::Default,
                    data: Vec::new(),
                });
            }
            for module in &position.external_modules {
                if let Some(external) = position.external.get(module) {
                    out.push(Position {
                        component: *component,
                        module: Some(*module),
                        unit: external.unit,
                        state: PositionState::External,
                        data: external.data.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn add_component(&mut self, component: AssetId) -> Result<(), PositionError> {
        if self.is_component(component) {
            return Err(PositionError::DuplicateComponent(component));
        }
        self.components.push(component);
        self.positions.insert(component, ComponentPosition::default());
        Ok(())
    }

    pub fn remove_component(&mut self, component: AssetId) -> Result<(), PositionError> {
        let position = self
            .positions
            .get(&component)
            .ok_or(PositionError::UnknownComponent(component))?;
        if !position.is_empty() {
            return Err(PositionError::ComponentInUse(component));
        }
        self.positions.remove(&component);
        self.components.retain(|c| *c != component);
        Ok(())
    }

    /// Overwrites the default unit. Listing follows the unit: a non-zero unit
    /// on an unlisted component adds it, a zero unit drops a component that
    /// has no external positions left.
    pub fn set_default_real_unit(&mut self, component: AssetId, real_unit: Decimal) -> Result<(), PositionError> {
        if real_unit < Decimal::ZERO {
            return Err(PositionError::NegativeDefaultUnit { component, unit: real_unit });
        }
        if !self.is_component(component) {
            if real_unit.is_zero() {
                return Ok(());
            }
            self.add_component(component)?;
        }

        let virtual_unit = self.real_to_virtual(real_unit)?;
        if let Some(position) = self.positions.get_mut(&component) {
            position.virtual_unit = virtual_unit;
        }
        self.drop_if_empty(component);
        Ok(())
    }

    /// Write handle over one module's external keys.
    pub(crate) fn external_writer(&mut self, module: ModuleId) -> ExternalPositionWriter<'_> {
        ExternalPositionWriter { token: self, module }
    }

    /// Only the settlement engine moves the multiplier.
    pub(crate) fn edit_position_multiplier(&mut self, new_multiplier: Decimal) -> Result<(), PositionError> {
        if new_multiplier <= Decimal::ZERO {
            return Err(PositionError::InvalidMultiplier(new_multiplier));
        }
        for component in &self.components {
            if let Some(position) = self.positions.get(component) {
                if position.virtual_unit.is_zero() {
                    continue;
                }
                let real = mul_round_down(position.virtual_unit, new_multiplier, PRECISE_SCALE)?;
                if real.is_zero() {
                    return Err(PositionError::MultiplierZeroesPosition {
                        component: *component,
                        multiplier: new_multiplier,
                    });
                }
            }
        }
        self.position_multiplier = new_multiplier;
        Ok(())
    }

    // module lifecycle

    pub fn modules(&self) -> &[(ModuleId, ModuleState)] {
        &self.modules
    }

    pub fn module_state(&self, module: ModuleId) -> Option<ModuleState> {
        self.modules.iter().find(|(m, _)| *m == module).map(|(_, s)| *s)
    }

    pub fn is_initialized_module(&self, module: ModuleId) -> bool {
        self.module_state(module) == Some(ModuleState::Initialized)
    }

    pub(crate) fn add_module(&mut self, module: ModuleId) -> Result<(), PositionError> {
        if self.module_state(module).is_some() {
            return Err(PositionError::ModuleAlreadyAdded(module));
        }
        self.modules.push((module, ModuleState::Pending));
        Ok(())
    }

    pub(crate) fn initialize_module(&mut self, module: ModuleId) -> Result<(), PositionError> {
        match self.modules.iter_mut().find(|(m, _)| *m == module) {
            Some((_, state)) if *state == ModuleState::Pending => {
                *state = ModuleState::Initialized;
                Ok(())
            }
            _ => Err(PositionError::ModuleNotPending(module)),
        }
    }

    pub(crate) fn remove_module(&mut self, module: ModuleId) -> Result<(), PositionError> {
        if self.module_state(module).is_none() {
            return Err(PositionError::ModuleNotFound(module));
        }
        self.modules.retain(|(m, _)| *m != module);
        Ok(())
    }

    fn virtual_to_real(&self, virtual_unit: Decimal) -> Result<Decimal, MathError> {
        mul_round_down(virtual_unit, self.position_multiplier, PRECISE_SCALE)
    }

    fn real_to_virtual(&self, real_unit: Decimal) -> Result<Decimal, MathError> {
        div_round_down(real_unit, self.position_multiplier, PRECISE_SCALE)
    }

    fn drop_if_empty(&mut self, component: AssetId) {
        if self.positions.get(&component).map(|p| p.is_empty()).unwrap_or(false) {
            self.positions.remove(&component);
            self.components.retain(|c| *c != component);
        }
    }
}

// 2.1: the only way to touch an external position. a writer is bound to one module,
// so module A can never write module B's (component, module) key.
pub struct ExternalPositionWriter<'a> {
    token: &'a mut StructuredToken,
    module: ModuleId,
}

impl<'a> ExternalPositionWriter<'a> {
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn unit(&self, component: AssetId) -> Decimal {
        self.token.external_unit(component, self.module)
    }

    /// Overwrites the unit. Zero removes the key.
    pub fn set_unit(&mut self, component: AssetId, unit: Decimal) -> Result<(), PositionError> {
        if unit.is_zero() {
            self.remove(component);
            return Ok(());
        }
        if !self.token.is_component(component) {
            self.token.add_component(component)?;
        }
        if let Some(position) = self.token.positions.get_mut(&component) {
            if !position.external_modules.contains(&self.module) {
                position.external_modules.push(self.module);
            }
            position.external.entry(self.module).or_default().unit = unit;
        }
        Ok(())
    }

    pub fn set_data(&mut self, component: AssetId, data: Vec<u8>) -> Result<(), PositionError> {
        let module = self.module;
        let external = self
            .token
            .positions
            .get_mut(&component)
            .and_then(|p| p.external.get_mut(&module))
            .ok_or(PositionError::UnknownExternalPosition { component, module })?;
        external.data = data;
        Ok(())
    }

    pub fn remove(&mut self, component: AssetId) {
        let module = self.module;
        if let Some(position) = self.token.positions.get_mut(&component) {
            position.external.remove(&module);
            position.external_modules.retain(|m| *m != module);
        }
        self.token.drop_if_empty(component);
    }
}

// 2.2: multiplier rebase. keeps stored_unit * multiplier * supply constant when supply
// changes without a matching change in holdings. always floors so real claims never
// exceed what the token holds.
pub fn rebased_multiplier(
    old_multiplier: Decimal,
    old_supply: Decimal,
    new_supply: Decimal,
) -> Result<Decimal, MathError> {
    mul_div_round_down(old_multiplier, old_supply, new_supply, PRECISE_SCALE)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("Component {0} is already listed")]
    DuplicateComponent(AssetId),

    #[error("Component {0} is not listed")]
    UnknownComponent(AssetId),

    #[error("Component {0} still carries positions")]
    ComponentInUse(AssetId),

    #[error("Default unit for {component} must be non-negative, got {unit}")]
    NegativeDefaultUnit { component: AssetId, unit: Decimal },

    #[error("Initial unit for {component} must be positive, got {unit}")]
    NonPositiveInitialUnit { component: AssetId, unit: Decimal },

    #[error("No external position for {component} owned by {module}")]
    UnknownExternalPosition { component: AssetId, module: ModuleId },

    #[error("Position multiplier must be positive, got {0}")]
    InvalidMultiplier(Decimal),

    #[error("Multiplier {multiplier} would floor the default position of {component} to zero")]
    MultiplierZeroesPosition { component: AssetId, multiplier: Decimal },

    #[error("Insufficient shares for {account}: requested {requested}, available {available}")]
    InsufficientShares {
        account: AccountId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Module {0} is already added")]
    ModuleAlreadyAdded(ModuleId),

    #[error("Module {0} is not pending")]
    ModuleNotPending(ModuleId),

    #[error("Module {0} is not on the token")]
    ModuleNotFound(ModuleId),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}
