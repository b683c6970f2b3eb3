//! Fixed-point rounding.
//!
//! Every quantity in the crate is a `Decimal`. Whenever a product or quotient
//! has to be cut back to a fixed number of decimal places the direction of
//! that cut is a solvency decision, so it happens here and nowhere else.
//! Callers pick `*_round_down` or `*_round_up`; see `engine::flows` for the
//! policy that maps settlement direction to one of the two.

use primitive_types::U512;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimal places carried by share quantities, per-share units and the
/// position multiplier.
pub const PRECISE_SCALE: u32 = 18;

/// Largest component precision the custody book accepts.
pub const MAX_ASSET_DECIMALS: u32 = PRECISE_SCALE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,
}

/// One unit in the last place at `scale` decimals.
pub fn smallest_unit(scale: u32) -> Decimal {
    Decimal::new(1, scale)
}

pub fn mul_round_down(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, MathError> {
    mul_rounded(a, b, scale, Rounding::Down)
}

pub fn mul_round_up(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, MathError> {
    mul_rounded(a, b, scale, Rounding::Up)
}

pub fn mul_rounded(a: Decimal, b: Decimal, scale: u32, rounding: Rounding) -> Result<Decimal, MathError> {
    mul_div_rounded(a, b, Decimal::ONE, scale, rounding)
}

pub fn div_round_down(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, MathError> {
    mul_div_rounded(a, Decimal::ONE, b, scale, Rounding::Down)
}

pub fn div_round_up(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal, MathError> {
    mul_div_rounded(a, Decimal::ONE, b, scale, Rounding::Up)
}

fn mantissa(value: Decimal) -> U512 {
    U512::from(value.mantissa().unsigned_abs())
}

/// `a * b / c` cut to `scale` places.
///
/// `Decimal` multiplication and division keep 28 significant digits, which
/// silently drops the tail of long products. The quotient is instead taken on
/// the integer mantissas in 512-bit arithmetic and the remainder decides the
/// last place.
pub fn mul_div_rounded(
    a: Decimal,
    b: Decimal,
    c: Decimal,
    scale: u32,
    rounding: Rounding,
) -> Result<Decimal, MathError> {
    if c.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    if a.is_zero() || b.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let negative = a.is_sign_negative() ^ b.is_sign_negative() ^ c.is_sign_negative();

    // result mantissa = ma * mb * 10^(scale + sc - sa - sb) / mc
    let raise = scale + c.scale();
    let lower = a.scale() + b.scale();
    let mut numerator = mantissa(a)
        .checked_mul(mantissa(b))
        .ok_or(MathError::Overflow)?;
    let mut denominator = mantissa(c);
    if raise >= lower {
        numerator = numerator
            .checked_mul(U512::exp10((raise - lower) as usize))
            .ok_or(MathError::Overflow)?;
    } else {
        denominator = denominator
            .checked_mul(U512::exp10((lower - raise) as usize))
            .ok_or(MathError::Overflow)?;
    }

    let (mut quotient, remainder) = numerator.div_mod(denominator);
    // away from zero when rounding toward the result's sign
    let away = match rounding {
        Rounding::Up => !negative,
        Rounding::Down => negative,
    };
    if away && !remainder.is_zero() {
        quotient = quotient.checked_add(U512::one()).ok_or(MathError::Overflow)?;
    }
    // too many significant digits for a Decimal: give up places, same direction
    let mut scale = scale;
    let ten = U512::from(10u8);
    while quotient.bits() > 96 && scale > 0 {
        let (coarser, dropped) = quotient.div_mod(ten);
        quotient = if away && !dropped.is_zero() { coarser + U512::one() } else { coarser };
        scale -= 1;
    }
    if quotient.bits() > 96 {
        return Err(MathError::Overflow);
    }

    let magnitude = quotient.low_u128() as i128;
    let signed = if negative { -magnitude } else { magnitude };
    let value = Decimal::try_from_i128_with_scale(signed, scale).map_err(|_| MathError::Overflow)?;
    Ok(value.normalize())
}

pub fn mul_div_round_down(a: Decimal, b: Decimal, c: Decimal, scale: u32) -> Result<Decimal, MathError> {
    mul_div_rounded(a, b, c, scale, Rounding::Down)
}

pub fn mul_div_round_up(a: Decimal, b: Decimal, c: Decimal, scale: u32) -> Result<Decimal, MathError> {
    mul_div_rounded(a, b, c, scale, Rounding::Up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mul_rounds_in_requested_direction() {
        assert_eq!(mul_round_down(dec!(1.005), dec!(0.333), 3).unwrap(), dec!(0.334));
        assert_eq!(mul_round_down(dec!(1.005), dec!(0.3333), 3).unwrap(), dec!(0.334));
        assert_eq!(mul_round_up(dec!(1.005), dec!(0.3333), 3).unwrap(), dec!(0.335));
        // exact products are untouched
        assert_eq!(mul_round_up(dec!(2), dec!(100), 6).unwrap(), dec!(200));
        assert_eq!(mul_round_down(dec!(2), dec!(100), 6).unwrap(), dec!(200));
    }

    #[test]
    fn division_is_exact_at_scale() {
        assert_eq!(div_round_down(dec!(1), dec!(3), 6).unwrap(), dec!(0.333333));
        assert_eq!(div_round_up(dec!(1), dec!(3), 6).unwrap(), dec!(0.333334));
        assert_eq!(div_round_up(dec!(9), dec!(3), 6).unwrap(), dec!(3));
        assert_eq!(div_round_down(dec!(9), dec!(3), 6).unwrap(), dec!(3));
    }

    #[test]
    fn mul_div_bounds_the_exact_quotient() {
        let down = mul_div_round_down(dec!(1), dec!(10), dec!(11), 18).unwrap();
        let up = mul_div_round_up(dec!(1), dec!(10), dec!(11), 18).unwrap();
        assert!(down * dec!(11) <= dec!(10));
        assert!(up * dec!(11) >= dec!(10));
        assert_eq!(up - down, smallest_unit(18));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(div_round_down(dec!(1), Decimal::ZERO, 6), Err(MathError::DivisionByZero));
    }

    #[test]
    fn smallest_unit_matches_scale() {
        assert_eq!(smallest_unit(6), dec!(0.000001));
        assert_eq!(smallest_unit(0), dec!(1));
    }

    #[test]
    fn long_products_round_on_the_full_value() {
        let one_wei_over = dec!(1.000000000000000001);
        // exact product is 1.000000000000000002000000000000000001
        assert_eq!(mul_round_up(one_wei_over, one_wei_over, 18).unwrap(), dec!(1.000000000000000003));
        assert_eq!(mul_round_down(one_wei_over, one_wei_over, 18).unwrap(), dec!(1.000000000000000002));

        // 1000001111111.2330437424665005313... has more digits than a Decimal
        // holds, so the last places go in the requested direction
        let unit = dec!(1000000.987654321987654321);
        let quantity = dec!(1000000.123456789123456789);
        assert_eq!(mul_round_up(unit, quantity, 18).unwrap(), dec!(1000001111111.2330437424665006));
        assert_eq!(mul_round_down(unit, quantity, 18).unwrap(), dec!(1000001111111.2330437424665005));
    }

    #[test]
    fn negative_operands_round_toward_the_requested_infinity() {
        assert_eq!(mul_round_down(dec!(-1.5), dec!(0.333), 2).unwrap(), dec!(-0.50));
        assert_eq!(mul_round_up(dec!(-1.5), dec!(0.333), 2).unwrap(), dec!(-0.49));
        assert_eq!(div_round_down(dec!(1), dec!(-3), 2).unwrap(), dec!(-0.34));
    }

    #[test]
    fn results_past_decimal_range_overflow() {
        assert_eq!(mul_round_down(Decimal::MAX, dec!(2), 0), Err(MathError::Overflow));
    }
}
