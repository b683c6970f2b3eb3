//! Solvency invariant tests.
//!
//! These tests verify that every settlement leaves a token holding at least
//! what its default positions promise, with and without venue debt.

use basket_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MANAGER: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(10);
const FEES: AccountId = AccountId(90);
const PROTOCOL: AccountId = AccountId(99);
const VENUE: AccountId = AccountId(500);

#[derive(Debug, Clone)]
enum Op {
    Issue(Decimal),
    Redeem(Decimal),
    Interest,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..5_000i64).prop_map(|x| Op::Issue(Decimal::new(x, 3))),
        (1i64..5_000i64).prop_map(|x| Op::Redeem(Decimal::new(x, 3))),
        Just(Op::Interest),
    ]
}

fn fee_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=50i64).prop_map(|x| Decimal::new(x, 4)) // 0 to 0.5%
}

fn basket_engine(issue_fee: Decimal, redeem_fee: Decimal) -> (Engine, TokenId, AssetId, AssetId) {
    let engine_config = EngineConfig {
        protocol_fee_recipient: PROTOCOL,
        protocol_fees: ProtocolFeeConfig {
            issue_fee_share: dec!(0.2),
            redeem_fee_share: dec!(0.3),
            streaming_fee_share: Decimal::ZERO,
        },
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(engine_config).unwrap();
    let usdc = engine.register_asset("USDC", 6).unwrap();
    let wbtc = engine.register_asset("WBTC", 8).unwrap();
    engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(1_000_000_000)).unwrap();
    engine.custody_mut().mint(Holder::Account(ALICE), wbtc, dec!(1_000_000)).unwrap();

    // awkward units so every flow has to round
    let token = engine
        .create_token(&[usdc, wbtc], &[dec!(1.2345678), dec!(0.000123456789)], MANAGER, "Odd", "ODD")
        .unwrap();
    let config = IssuanceConfig {
        issue_fee,
        redeem_fee,
        ..IssuanceConfig::default()
    };
    engine.initialize_issuance(token, MANAGER, &config, FEES, None).unwrap();
    (engine, token, usdc, wbtc)
}

fn precise_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..9_000_000_000_000_000_000i64).prop_map(|x| Decimal::new(x, 18)) // 1e-18 to 9, all 18 places
}

/// `a * b` cut to `scale` places on the raw mantissas. Both operands carry 18 places.
fn exact_product(a: Decimal, b: Decimal, scale: u32, up: bool) -> Decimal {
    assert_eq!((a.scale(), b.scale()), (18, 18));
    let product = a.mantissa() as u128 * b.mantissa() as u128;
    let step = 10u128.pow(36 - scale);
    let mut cut = product / step;
    if up && product % step != 0 {
        cut += 1;
    }
    Decimal::from_i128_with_scale(cut as i128, scale)
}

fn levered_engine(borrow: Decimal) -> (Engine, TokenId, AssetId, AssetId, LendingDebtModule, ModuleId) {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let usdc = engine.register_asset("USDC", 6).unwrap();
    let vd_usdc = engine.register_asset("vdUSDC", 6).unwrap();
    engine.custody_mut().mint(Holder::Account(VENUE), usdc, dec!(1_000_000_000)).unwrap();
    engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(1_000_000_000)).unwrap();

    let token = engine.create_token(&[usdc], &[dec!(100)], MANAGER, "Levered", "LEV").unwrap();
    engine
        .initialize_issuance(token, MANAGER, &IssuanceConfig::fee_free(), FEES, None)
        .unwrap();
    engine.issue(token, dec!(10), ALICE, ALICE).unwrap();

    let lending = LendingDebtModule::new(ModuleId(2), VENUE).with_market(usdc, vd_usdc);
    let lender = engine.install_debt_module(Box::new(lending.clone())).unwrap();
    engine.add_module(token, MANAGER, lender).unwrap();
    engine.initialize_module(token, lender).unwrap();
    engine.register_to_issuance_module(token, lender).unwrap();
    engine
        .invoke_module(token, lender, |ctx| lending.borrow(ctx, usdc, borrow))
        .unwrap();

    (engine, token, usdc, vd_usdc, lending, lender)
}

proptest! {
    /// A plain basket stays fully collateralized through any issue/redeem sequence.
    #[test]
    fn basket_collateralized_after_every_settlement(
        issue_fee in fee_strategy(),
        redeem_fee in fee_strategy(),
        ops in proptest::collection::vec(op_strategy(), 1..25),
    ) {
        let (mut engine, token, _, _) = basket_engine(issue_fee, redeem_fee);

        for op in ops {
            match op {
                Op::Issue(quantity) => {
                    let result = engine.issue(token, quantity, ALICE, ALICE);
                    prop_assert!(result.is_ok(), "issue {} failed: {:?}", quantity, result.err());
                }
                Op::Redeem(quantity) => {
                    let held = engine.token(token).unwrap().balance_of(ALICE);
                    let quantity = quantity.min(held);
                    if quantity.is_zero() { continue; }
                    let result = engine.redeem(token, quantity, ALICE, ALICE);
                    prop_assert!(result.is_ok(), "redeem {} failed: {:?}", quantity, result.err());
                }
                Op::Interest => {}
            }

            for status in engine.collateral_report(token).unwrap() {
                prop_assert!(
                    status.is_covered(),
                    "component {} short: held={}, required={}",
                    status.component,
                    status.held,
                    status.required
                );
            }
        }
    }

    /// Issuer shares plus both fee cuts equal the gross quantity; redeemed
    /// quantity splits into net plus both cuts.
    #[test]
    fn fee_shares_conserved(
        issue_fee in fee_strategy(),
        redeem_fee in fee_strategy(),
        quantity in (1i64..10_000i64).prop_map(|x| Decimal::new(x, 3)),
    ) {
        let (mut engine, token, _, _) = basket_engine(issue_fee, redeem_fee);

        let issued = engine.issue(token, quantity, ALICE, ALICE).unwrap();
        let fees = issued.fees;
        prop_assert_eq!(quantity + fees.manager_fee + fees.protocol_fee, fees.total_quantity);
        prop_assert_eq!(engine.token(token).unwrap().total_supply(), fees.total_quantity);

        let supply_before = engine.token(token).unwrap().total_supply();
        let redeemed = engine.redeem(token, quantity, ALICE, ALICE).unwrap();
        let fees = redeemed.fees;
        prop_assert_eq!(fees.total_quantity + fees.manager_fee + fees.protocol_fee, quantity);
        prop_assert_eq!(
            engine.token(token).unwrap().total_supply(),
            supply_before - fees.total_quantity
        );
    }

    /// A token carrying lending debt stays collateralized while it is issued,
    /// redeemed and charged interest.
    #[test]
    fn levered_token_collateralized(
        borrow in (1i64..900i64).prop_map(Decimal::from),
        ops in proptest::collection::vec(op_strategy(), 1..20),
    ) {
        let (mut engine, token, usdc, vd_usdc, lending, lender) = levered_engine(borrow);

        for op in ops {
            match op {
                Op::Issue(quantity) => {
                    let result = engine.issue(token, quantity, ALICE, ALICE);
                    prop_assert!(result.is_ok(), "issue {} failed: {:?}", quantity, result.err());
                }
                Op::Redeem(quantity) => {
                    let held = engine.token(token).unwrap().balance_of(ALICE);
                    let quantity = quantity.min(held);
                    if quantity.is_zero() { continue; }
                    let result = engine.redeem(token, quantity, ALICE, ALICE);
                    prop_assert!(result.is_ok(), "redeem {} failed: {:?}", quantity, result.err());
                }
                Op::Interest => {
                    if engine.token(token).unwrap().total_supply().is_zero() { continue; }
                    engine
                        .invoke_module(token, lender, |ctx| lending.accrue_interest(ctx, usdc, dec!(0.001)))
                        .unwrap();
                }
            }

            prop_assert!(engine.is_collateralized(token).unwrap());
            prop_assert!(engine.custody().balance(Holder::Token(token), vd_usdc) >= Decimal::ZERO);
        }
    }

    /// The debt a redeemer repays is never less than what the lending venue
    /// is repaid, and the dust stays with the token.
    #[test]
    fn debt_rounding_favours_token(
        borrow in (1i64..900i64).prop_map(Decimal::from),
        quantity in (1i64..9_999i64).prop_map(|x| Decimal::new(x, 3)),
    ) {
        let (mut engine, token, usdc, _, _, _) = levered_engine(borrow);
        let venue_before = engine.custody().balance(Holder::Account(VENUE), usdc);

        let result = engine.redeem(token, quantity, ALICE, ALICE).unwrap();
        let venue_gain = engine.custody().balance(Holder::Account(VENUE), usdc) - venue_before;
        let repaid = result.record.transferred(usdc, TransferReason::DebtRepaid);

        prop_assert!(repaid >= venue_gain, "repaid {} < venue gain {}", repaid, venue_gain);
        prop_assert!(repaid - venue_gain <= dec!(0.000001));
    }

    /// A fee-free issue and full redeem hands back the deposit less at most
    /// one smallest unit per component, priced exactly even when the product
    /// of two 18-place operands runs past 28 digits.
    #[test]
    fn fee_free_round_trip_returns_deposit(
        usdc_unit in precise_strategy(),
        weth_unit in precise_strategy(),
        quantity in precise_strategy(),
    ) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let usdc = engine.register_asset("USDC", 6).unwrap();
        let weth = engine.register_asset("WETH", 18).unwrap();
        engine.custody_mut().mint(Holder::Account(ALICE), usdc, dec!(1_000)).unwrap();
        engine.custody_mut().mint(Holder::Account(ALICE), weth, dec!(1_000)).unwrap();
        let token = engine
            .create_token(&[usdc, weth], &[usdc_unit, weth_unit], MANAGER, "Precise", "PRC")
            .unwrap();
        engine
            .initialize_issuance(token, MANAGER, &IssuanceConfig::fee_free(), FEES, None)
            .unwrap();

        let issued = engine.issue(token, quantity, ALICE, ALICE).unwrap();
        prop_assert_eq!(issued.flows.equity_of(usdc), exact_product(quantity, usdc_unit, 6, true));
        prop_assert_eq!(issued.flows.equity_of(weth), exact_product(quantity, weth_unit, 18, true));
        prop_assert_eq!(engine.token(token).unwrap().position_multiplier(), Decimal::ONE);
        prop_assert!(engine.is_collateralized(token).unwrap());

        let redeemed = engine.redeem(token, quantity, ALICE, ALICE).unwrap();
        prop_assert_eq!(redeemed.flows.equity_of(usdc), exact_product(quantity, usdc_unit, 6, false));
        prop_assert_eq!(redeemed.flows.equity_of(weth), exact_product(quantity, weth_unit, 18, false));
        prop_assert_eq!(engine.token(token).unwrap().position_multiplier(), Decimal::ONE);
        prop_assert_eq!(engine.token(token).unwrap().total_supply(), Decimal::ZERO);

        for (asset, decimals) in [(usdc, 6), (weth, 18)] {
            let deposit = issued.flows.equity_of(asset);
            let returned = redeemed.flows.equity_of(asset);
            prop_assert!(returned <= deposit);
            prop_assert!(deposit - returned <= smallest_unit(decimals));
        }
    }
}
