// 9.0 lending.rs: MOCKED. reference debt module against an in-memory lending venue.
// the venue is a plain account holding liquidity; debt is a variable-debt asset minted to the
// borrowing token, so interest shows up as a growing debt balance.
// external units are negative: -(debt per share), rounded up so the token never under-reports.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::hooks::{CustodyScope, DebtModule, HookContext, HookError};
use crate::precise::{div_round_up, mul_round_down, mul_round_up, PRECISE_SCALE};
use crate::types::{AccountId, AssetId, Holder, ModuleId};

#[derive(Debug, Clone)]
pub struct LendingDebtModule {
    id: ModuleId,
    venue: AccountId,
    // underlying -> variable debt asset
    markets: BTreeMap<AssetId, AssetId>,
}

impl LendingDebtModule {
    pub fn new(id: ModuleId, venue: AccountId) -> Self {
        Self {
            id,
            venue,
            markets: BTreeMap::new(),
        }
    }

    pub fn with_market(mut self, underlying: AssetId, debt_asset: AssetId) -> Self {
        self.markets.insert(underlying, debt_asset);
        self
    }

    pub fn venue(&self) -> AccountId {
        self.venue
    }

    pub fn debt_asset(&self, underlying: AssetId) -> Option<AssetId> {
        self.markets.get(&underlying).copied()
    }

    /// Outstanding debt of the hook's token in `underlying`.
    pub fn debt_of(&self, ctx: &HookContext<'_>, underlying: AssetId) -> Decimal {
        match self.debt_asset(underlying) {
            Some(debt_asset) => ctx.custody().balance(Holder::Token(ctx.token_id()), debt_asset),
            None => Decimal::ZERO,
        }
    }

    // 9.1: manager actions. run through Engine::invoke_module so they settle atomically.

    /// Borrow `amount` of `underlying` into the token and re-sync its positions.
    pub fn borrow(&self, ctx: &mut HookContext<'_>, underlying: AssetId, amount: Decimal) -> Result<(), HookError> {
        self.require_supply(ctx)?;
        self.draw(ctx, underlying, amount)?;
        self.sync_market(ctx, underlying)
    }

    /// Repay `amount` of `underlying` out of the token's holdings and re-sync.
    pub fn repay(&self, ctx: &mut HookContext<'_>, underlying: AssetId, amount: Decimal) -> Result<(), HookError> {
        self.require_supply(ctx)?;
        self.settle(ctx, underlying, amount)?;
        self.sync_market(ctx, underlying)
    }

    /// Grow the debt by `rate` of itself. Returns the interest charged.
    pub fn accrue_interest(
        &self,
        ctx: &mut HookContext<'_>,
        underlying: AssetId,
        rate: Decimal,
    ) -> Result<Decimal, HookError> {
        let debt_asset = self.market(underlying)?;
        let decimals = ctx.custody().decimals(debt_asset)?;
        let interest = mul_round_up(self.debt_of(ctx, underlying), rate, decimals)?;
        ctx.mint_debt(debt_asset, interest)?;
        debug!(module = %self.id, asset = %underlying, %interest, "interest accrued");
        Ok(interest)
    }

    /// Recompute the external unit of every market from the debt actually owed.
    pub fn sync(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        for &underlying in self.markets.keys() {
            self.sync_market(ctx, underlying)?;
        }
        Ok(())
    }

    fn sync_market(&self, ctx: &mut HookContext<'_>, underlying: AssetId) -> Result<(), HookError> {
        let supply = ctx.token().total_supply();
        if supply.is_zero() {
            return Ok(());
        }
        let debt = self.debt_of(ctx, underlying);
        let unit = -div_round_up(debt, supply, PRECISE_SCALE)?;
        ctx.positions().set_unit(underlying, unit)?;
        if ctx.token().default_real_unit(underlying)? > Decimal::ZERO || !debt.is_zero() {
            ctx.sync_default_position(underlying)?;
        }
        debug!(module = %self.id, asset = %underlying, %debt, %unit, "debt position synced");
        Ok(())
    }

    // venue -> token, debt minted to the token
    fn draw(&self, ctx: &mut HookContext<'_>, underlying: AssetId, amount: Decimal) -> Result<(), HookError> {
        let debt_asset = self.market(underlying)?;
        if amount.is_zero() {
            return Ok(());
        }
        ctx.draw_from_venue(underlying, amount)?;
        ctx.mint_debt(debt_asset, amount)
    }

    // token -> venue, debt burned up to what is owed
    fn settle(&self, ctx: &mut HookContext<'_>, underlying: AssetId, amount: Decimal) -> Result<(), HookError> {
        let debt_asset = self.market(underlying)?;
        if amount.is_zero() {
            return Ok(());
        }
        let owed = ctx.custody().balance(Holder::Token(ctx.token_id()), debt_asset);
        ctx.repay_venue(underlying, amount)?;
        ctx.burn_debt(debt_asset, amount.min(owed))
    }

    fn market(&self, underlying: AssetId) -> Result<AssetId, HookError> {
        self.debt_asset(underlying).ok_or_else(|| HookError::Rejected {
            module: self.id,
            reason: format!("no lending market for {underlying}"),
        })
    }

    fn require_supply(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        if ctx.token().total_supply().is_zero() {
            return Err(HookError::Rejected {
                module: self.id,
                reason: "token has no supply to lever".to_string(),
            });
        }
        Ok(())
    }
}

impl DebtModule for LendingDebtModule {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "lending"
    }

    fn custody_scope(&self) -> CustodyScope {
        CustodyScope {
            venue: Some(self.venue),
            debt_assets: self.markets.values().copied().collect(),
        }
    }

    fn module_issue_hook(&self, ctx: &mut HookContext<'_>, _quantity: Decimal) -> Result<(), HookError> {
        self.sync(ctx)
    }

    fn module_redeem_hook(&self, ctx: &mut HookContext<'_>, _quantity: Decimal) -> Result<(), HookError> {
        self.sync(ctx)
    }

    /// Borrows this module's share of the debt flow into the token, rounded up.
    fn component_issue_hook(
        &self,
        ctx: &mut HookContext<'_>,
        quantity: Decimal,
        component: AssetId,
        is_equity: bool,
    ) -> Result<(), HookError> {
        if is_equity || self.debt_asset(component).is_none() {
            return Ok(());
        }
        let unit = ctx.positions().unit(component);
        if unit >= Decimal::ZERO {
            return Ok(());
        }
        let decimals = ctx.custody().decimals(component)?;
        let amount = mul_round_up(-unit, quantity, decimals)?;
        debug!(module = %self.id, asset = %component, %amount, "borrowing for issuance");
        self.draw(ctx, component, amount)
    }

    /// Repays this module's share of the debt the redeemer paid in, rounded down.
    fn component_redeem_hook(
        &self,
        ctx: &mut HookContext<'_>,
        quantity: Decimal,
        component: AssetId,
        is_equity: bool,
    ) -> Result<(), HookError> {
        if is_equity || self.debt_asset(component).is_none() {
            return Ok(());
        }
        let unit = ctx.positions().unit(component);
        if unit >= Decimal::ZERO {
            return Ok(());
        }
        let decimals = ctx.custody().decimals(component)?;
        let amount = mul_round_down(-unit, quantity, decimals)?;
        debug!(module = %self.id, asset = %component, %amount, "repaying on redemption");
        self.settle(ctx, component, amount)
    }
}
