//! Structured token issuance simulation.
//!
//! Walks the settlement engine through plain baskets, leveraged tokens backed
//! by a lending venue, streaming fees, and the two settlement variants.

use basket_core::*;
use rust_decimal_macros::dec;

const MANAGER: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);
const FEES: AccountId = AccountId(90);
const PROTOCOL: AccountId = AccountId(99);
const VENUE: AccountId = AccountId(500);
const YEAR_MS: i64 = 31_536_000_000;

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("Structured Token Issuance Simulation");
    println!("Equity and debt flows, strict and deficit-tolerant settlement\n");

    scenario_1_basket_lifecycle()?;
    scenario_2_leveraged_token()?;
    scenario_3_streaming_fee()?;
    scenario_4_settlement_variants()?;
    scenario_5_hook_rollback()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn engine_with_protocol_fees() -> Result<Engine, EngineError> {
    let basket = BasketConfig::mainnet_conservative();
    Engine::new(EngineConfig::from_basket(&basket, PROTOCOL))
}

/// Issue and redeem a two-asset basket with manager and protocol fees.
fn scenario_1_basket_lifecycle() -> Result<(), EngineError> {
    println!("Scenario 1: Basket Issue and Redeem\n");

    let mut engine = engine_with_protocol_fees()?;
    let usdc = engine.register_asset("USDC", 6)?;
    let weth = engine.register_asset("WETH", 18)?;
    engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(100_000))?;
    engine.custody_mut().mint(Holder::Account(ALICE), weth, dec!(50))?;

    let token = engine.create_token(&[usdc, weth], &[dec!(100), dec!(0.05)], MANAGER, "Blue Chip", "BLUE")?;
    let config = BasketConfig::mainnet_conservative().issuance;
    engine.initialize_issuance(token, MANAGER, &config, FEES, None)?;

    let quote = engine.required_component_issuance_units(token, dec!(10))?;
    println!("  Quote for 10 BLUE: {} USDC, {} WETH", quote.equity_of(usdc), quote.equity_of(weth));

    let issued = engine.issue(token, dec!(10), ALICE, ALICE)?;
    println!(
        "  Alice issues 10 BLUE, manager fee {} / protocol fee {}",
        issued.fees.manager_fee, issued.fees.protocol_fee
    );

    let redeemed = engine.redeem(token, dec!(4), ALICE, BOB)?;
    println!(
        "  Alice redeems 4 BLUE to Bob: {} USDC, {} WETH",
        redeemed.flows.equity_of(usdc),
        redeemed.flows.equity_of(weth)
    );

    let state = engine.token(token)?;
    println!("  Supply: {}, collateralized: {}\n", state.total_supply(), engine.is_collateralized(token)?);
    Ok(())
}

/// A token that borrows USDC against its own holdings through a lending venue.
fn scenario_2_leveraged_token() -> Result<(), EngineError> {
    println!("Scenario 2: Leveraged Token\n");

    let mut engine = Engine::new(EngineConfig::default())?;
    let usdc = engine.register_asset("USDC", 6)?;
    let vd_usdc = engine.register_asset("vdUSDC", 6)?;
    engine.custody_mut().mint(Holder::Account(VENUE), usdc, dec!(10_000_000))?;
    engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(100_000))?;

    let token = engine.create_token(&[usdc], &[dec!(100)], MANAGER, "Levered USDC", "LUSD")?;
    engine.initialize_issuance(token, MANAGER, &BasketConfig::leveraged().issuance, FEES, None)?;
    engine.issue(token, dec!(10), ALICE, ALICE)?;

    let lending = LendingDebtModule::new(ModuleId(2), VENUE).with_market(usdc, vd_usdc);
    let lender = engine.install_debt_module(Box::new(lending.clone()))?;
    engine.add_module(token, MANAGER, lender)?;
    engine.initialize_module(token, lender)?;
    engine.register_to_issuance_module(token, lender)?;

    engine.invoke_module(token, lender, |ctx| lending.borrow(ctx, usdc, dec!(400)))?;
    let state = engine.token(token)?;
    println!(
        "  Borrowed 400 USDC: default unit {}, debt unit {}",
        state.default_real_unit(usdc)?,
        state.external_unit(usdc, lender)
    );

    let issued = engine.issue(token, dec!(5), ALICE, ALICE)?;
    println!(
        "  Alice issues 5 LUSD: deposits {} USDC, receives {} USDC of debt",
        issued.flows.equity_of(usdc),
        issued.flows.debt_of(usdc)
    );

    let interest = engine.invoke_module(token, lender, |ctx| lending.accrue_interest(ctx, usdc, dec!(0.01)))?;
    println!("  Venue charges {} USDC interest", interest);

    let redeemed = engine.redeem(token, dec!(5), ALICE, ALICE)?;
    println!(
        "  Alice redeems 5 LUSD: repays {} USDC of debt, receives {} USDC",
        redeemed.flows.debt_of(usdc),
        redeemed.flows.equity_of(usdc)
    );
    println!(
        "  Outstanding debt: {} vdUSDC, collateralized: {}\n",
        engine.custody().balance(Holder::Token(token), vd_usdc),
        engine.is_collateralized(token)?
    );
    Ok(())
}

/// One year of a 2% streaming fee, with the protocol taking its cut.
fn scenario_3_streaming_fee() -> Result<(), EngineError> {
    println!("Scenario 3: Streaming Fee\n");

    let mut engine = engine_with_protocol_fees()?;
    let usdc = engine.register_asset("USDC", 6)?;
    engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(10_000))?;

    let token = engine.create_token(&[usdc], &[dec!(100)], MANAGER, "Index", "IDX")?;
    engine.initialize_issuance(token, MANAGER, &IssuanceConfig::fee_free(), FEES, None)?;
    engine.issue(token, dec!(50), ALICE, ALICE)?;

    let params = StreamingFeeParams {
        annual_rate: dec!(0.02),
        ..StreamingFeeParams::default()
    };
    engine.initialize_streaming_fee(token, MANAGER, params, FEES)?;
    engine.advance_time(YEAR_MS);

    let accrued = engine.accrue_streaming_fee(token)?;
    let state = engine.token(token)?;
    println!(
        "  After one year: manager {} / protocol {} shares minted",
        accrued.manager_fee, accrued.protocol_fee
    );
    println!(
        "  Multiplier {}, USDC per share {}\n",
        accrued.new_multiplier,
        state.default_real_unit(usdc)?
    );
    Ok(())
}

/// A token holding one unit less than it owes, redeemed under both variants.
fn scenario_4_settlement_variants() -> Result<(), EngineError> {
    println!("Scenario 4: Strict vs Deficit-Tolerant Settlement\n");

    for variant in [SettlementVariant::Strict, SettlementVariant::DeficitTolerant] {
        let mut engine = Engine::new(EngineConfig::default())?;
        let usdc = engine.register_asset("USDC", 6)?;
        engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(100))?;

        let token = engine.create_token(&[usdc], &[dec!(1)], MANAGER, "Short", "SHRT")?;
        let config = IssuanceConfig {
            redeem_fee: dec!(0.002),
            variant,
            ..IssuanceConfig::fee_free()
        };
        engine.initialize_issuance(token, MANAGER, &config, FEES, None)?;
        engine.issue(token, dec!(10), ALICE, ALICE)?;
        // a rebasing transfer lands one unit short
        engine
            .custody_mut()
            .transfer(Holder::Token(token), Holder::Account(BOB), usdc, dec!(0.000001))?;

        match engine.redeem(token, dec!(1), ALICE, ALICE) {
            Ok(result) => println!("  {:?}: redeemed, paid out {} USDC", variant, result.flows.equity_of(usdc)),
            Err(err) => println!("  {:?}: rejected, {}", variant, err),
        }
    }
    println!();
    Ok(())
}

/// A manager supply cap vetoes an issue; nothing moves.
fn scenario_5_hook_rollback() -> Result<(), EngineError> {
    println!("Scenario 5: Manager Hook Rollback\n");

    let mut engine = Engine::new(EngineConfig::default())?;
    let usdc = engine.register_asset("USDC", 6)?;
    engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(1_000))?;

    let token = engine.create_token(&[usdc], &[dec!(10)], MANAGER, "Capped", "CAP")?;
    let cap = engine.install_manager_hook(Box::new(SupplyCapHook { max_supply: dec!(20) }));
    engine.initialize_issuance(token, MANAGER, &IssuanceConfig::fee_free(), FEES, Some(cap))?;

    engine.issue(token, dec!(20), ALICE, ALICE)?;
    let before = engine.custody().balance(Holder::Account(ALICE), usdc);
    if let Err(err) = engine.issue(token, dec!(1), ALICE, ALICE) {
        println!("  Issue past the cap rejected: {}", err);
    }
    let after = engine.custody().balance(Holder::Account(ALICE), usdc);

    println!("  Alice USDC unchanged: {}", before == after);
    let rejected = engine
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::SettlementRejected(_)))
        .count();
    println!("  Rejections recorded: {}, supply still {}\n", rejected, engine.token(token)?.total_supply());
    Ok(())
}
