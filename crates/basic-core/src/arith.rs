//! Numeric arithmetic with integer/float promotion (spec §4.A).
//!
//! String concatenation and lexicographic string comparison are not here:
//! they need to resolve a [`StrRef`](crate::StrRef) against the heap, so
//! they live in `basic-eval`, which has both a `MemorySpace` and a heap to
//! hand. This module only ever sees already-numeric [`Value`]s.

use crate::{BasicError, ErrorCode, Value};
use num_traits::{CheckedAdd, CheckedMul, CheckedSub};

type ArithResult = Result<Value, BasicError>;

fn both_numeric(op: &str, a: Value, b: Value) -> Result<(), BasicError> {
    if a.is_numeric() && b.is_numeric() {
        Ok(())
    } else {
        Err(BasicError::with_message(
            ErrorCode::TYPE_MISMATCH,
            format!("{op}: expected numeric operands, got {}/{}", a.type_name(), b.type_name()),
        ))
    }
}

/// `a + b` on numerics: checked integer add, promoting to float on overflow.
pub fn add(a: Value, b: Value) -> ArithResult {
    both_numeric("+", a, b)?;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match x.checked_add(&y) {
            Some(sum) => Value::Int(sum),
            None => Value::Float(x as f64 + y as f64),
        }),
        _ => Ok(Value::Float(a.as_f64().unwrap() + b.as_f64().unwrap())),
    }
}

/// `a - b`, same promotion rule as [`add`].
pub fn sub(a: Value, b: Value) -> ArithResult {
    both_numeric("-", a, b)?;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match x.checked_sub(&y) {
            Some(diff) => Value::Int(diff),
            None => Value::Float(x as f64 - y as f64),
        }),
        _ => Ok(Value::Float(a.as_f64().unwrap() - b.as_f64().unwrap())),
    }
}

/// `a * b`, same promotion rule as [`add`].
pub fn mul(a: Value, b: Value) -> ArithResult {
    both_numeric("*", a, b)?;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match x.checked_mul(&y) {
            Some(prod) => Value::Int(prod),
            None => Value::Float(x as f64 * y as f64),
        }),
        _ => Ok(Value::Float(a.as_f64().unwrap() * b.as_f64().unwrap())),
    }
}

/// `a / b`: always promotes to float, per spec (integer division uses
/// `DIV`, not `/`).
pub fn div(a: Value, b: Value) -> ArithResult {
    both_numeric("/", a, b)?;
    let (x, y) = (a.as_f64().unwrap(), b.as_f64().unwrap());
    if y == 0.0 {
        return Err(BasicError::new(ErrorCode::DIVISION_BY_ZERO));
    }
    Ok(Value::Float(x / y))
}

fn to_integer_operand(v: Value) -> Result<i64, BasicError> {
    match v {
        Value::Int(n) => Ok(n),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(&f) => {
            Ok(f as i64)
        }
        Value::Float(_) => Err(BasicError::with_message(
            ErrorCode::TYPE_MISMATCH,
            "DIV/MOD require whole-number operands",
        )),
        Value::Str(_) => Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
    }
}

/// `a DIV b`: truncating integer division, rejecting non-whole float
/// operands and failing on a zero divisor.
pub fn int_div(a: Value, b: Value) -> ArithResult {
    let x = to_integer_operand(a)?;
    let y = to_integer_operand(b)?;
    if y == 0 {
        return Err(BasicError::new(ErrorCode::DIVISION_BY_ZERO));
    }
    Ok(Value::Int(x.wrapping_div(y)))
}

/// `a MOD b`: truncating integer remainder (sign follows the dividend, as
/// Rust's `%` already does), failing on a zero divisor.
pub fn int_mod(a: Value, b: Value) -> ArithResult {
    let x = to_integer_operand(a)?;
    let y = to_integer_operand(b)?;
    if y == 0 {
        return Err(BasicError::new(ErrorCode::DIVISION_BY_ZERO));
    }
    Ok(Value::Int(x.wrapping_rem(y)))
}

/// `a ^ b`: repeated squaring for an integer exponent (promoting to float
/// only if the running product would overflow), `f64::powf` otherwise.
pub fn pow(a: Value, b: Value) -> ArithResult {
    both_numeric("^", a, b)?;
    if let (Value::Int(base), Value::Int(exp)) = (a, b) {
        if exp >= 0 {
            if let Some(v) = checked_ipow(base, exp as u64) {
                return Ok(Value::Int(v));
            }
        }
    }
    let result = a.as_f64().unwrap().powf(b.as_f64().unwrap());
    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(BasicError::new(ErrorCode::LOGARITHM_RANGE))
    }
}

fn checked_ipow(mut base: i64, mut exp: u64) -> Option<i64> {
    let mut acc: i64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.checked_mul(base)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = base.checked_mul(base)?;
        }
    }
    Some(acc)
}

fn cmp_numeric(a: Value, b: Value) -> Result<std::cmp::Ordering, BasicError> {
    both_numeric("comparison", a, b)?;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(&y)),
        _ => a
            .as_f64()
            .unwrap()
            .partial_cmp(&b.as_f64().unwrap())
            .ok_or_else(|| BasicError::with_message(ErrorCode::TYPE_MISMATCH, "NaN comparison")),
    }
}

macro_rules! numeric_cmp_fn {
    ($name:ident, $ord:pat) => {
        pub fn $name(a: Value, b: Value) -> ArithResult {
            Ok(Value::truth(matches!(cmp_numeric(a, b)?, $ord)))
        }
    };
}

numeric_cmp_fn!(lt, std::cmp::Ordering::Less);
numeric_cmp_fn!(gt, std::cmp::Ordering::Greater);
numeric_cmp_fn!(le, std::cmp::Ordering::Less | std::cmp::Ordering::Equal);
numeric_cmp_fn!(ge, std::cmp::Ordering::Greater | std::cmp::Ordering::Equal);

/// `a = b` for two numerics (string equality is handled in `basic-eval`).
pub fn eq(a: Value, b: Value) -> ArithResult {
    Ok(Value::truth(cmp_numeric(a, b)? == std::cmp::Ordering::Equal))
}

/// `a <> b` for two numerics.
pub fn ne(a: Value, b: Value) -> ArithResult {
    Ok(Value::truth(cmp_numeric(a, b)? != std::cmp::Ordering::Equal))
}

fn bitwise(op: &str, a: Value, b: Value, f: impl Fn(i64, i64) -> i64) -> ArithResult {
    both_numeric(op, a, b)?;
    let x = to_integer_operand(a)?;
    let y = to_integer_operand(b)?;
    Ok(Value::Int(f(x, y)))
}

pub fn and(a: Value, b: Value) -> ArithResult {
    bitwise("AND", a, b, |x, y| x & y)
}

pub fn or(a: Value, b: Value) -> ArithResult {
    bitwise("OR", a, b, |x, y| x | y)
}

pub fn eor(a: Value, b: Value) -> ArithResult {
    bitwise("EOR", a, b, |x, y| x ^ y)
}

/// Whether 64-bit shifts are enabled; when `false`, operands and results are
/// truncated to 32 bits first, matching classic BBC BASIC's default integer
/// width (the `*OPT`-style option `basic-exec` reads as part of `liston`).
#[derive(Clone, Copy, Debug, Default)]
pub struct ShiftMode {
    pub arith64: bool,
}

fn shift_operand(v: Value, mode: ShiftMode) -> Result<i64, BasicError> {
    let n = to_integer_operand(v)?;
    Ok(if mode.arith64 { n } else { n as i32 as i64 })
}

/// `a << b`.
pub fn shl(a: Value, b: Value, mode: ShiftMode) -> ArithResult {
    let x = shift_operand(a, mode)?;
    let y = shift_operand(b, mode)? & 63;
    let r = x.wrapping_shl(y as u32);
    Ok(Value::Int(if mode.arith64 { r } else { r as i32 as i64 }))
}

/// `a >> b` (arithmetic, sign-extending).
pub fn shr(a: Value, b: Value, mode: ShiftMode) -> ArithResult {
    let x = shift_operand(a, mode)?;
    let y = shift_operand(b, mode)? & 63;
    let r = x.wrapping_shr(y as u32);
    Ok(Value::Int(if mode.arith64 { r } else { r as i32 as i64 }))
}

/// `a >>> b` (logical, zero-filling).
pub fn shr_logical(a: Value, b: Value, mode: ShiftMode) -> ArithResult {
    let x = shift_operand(a, mode)? as u64;
    let y = shift_operand(b, mode)? & 63;
    let r = x.wrapping_shr(y as u32);
    Ok(Value::Int(if mode.arith64 { r as i64 } else { r as u32 as i64 }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_add_stays_integer() {
        assert_eq!(add(Value::Int(2), Value::Int(3)).unwrap(), Value::Int(5));
    }

    #[test]
    fn integer_add_promotes_on_overflow() {
        let v = add(Value::Int(i64::MAX), Value::Int(1)).unwrap();
        match v {
            Value::Float(f) => assert!((f - (i64::MAX as f64 + 1.0)).abs() < 1.0),
            _ => panic!("expected float promotion"),
        }
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let e = div(Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(e.code, ErrorCode::DIVISION_BY_ZERO);
    }

    #[test]
    fn division_always_promotes_to_float() {
        assert_eq!(div(Value::Int(4), Value::Int(2)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn int_div_truncates_toward_zero() {
        assert_eq!(int_div(Value::Int(-7), Value::Int(2)).unwrap(), Value::Int(-3));
    }

    #[test]
    fn mod_by_zero_is_an_error() {
        assert_eq!(int_mod(Value::Int(1), Value::Int(0)).unwrap_err().code, ErrorCode::DIVISION_BY_ZERO);
    }

    #[test]
    fn pow_with_integer_exponent_stays_integer() {
        assert_eq!(pow(Value::Int(2), Value::Int(10)).unwrap(), Value::Int(1024));
    }

    #[test]
    fn pow_promotes_on_overflow() {
        let v = pow(Value::Int(2), Value::Int(100)).unwrap();
        assert!(matches!(v, Value::Float(_)));
    }

    #[test]
    fn comparisons_yield_basic_booleans() {
        assert_eq!(lt(Value::Int(1), Value::Int(2)).unwrap(), Value::Int(-1));
        assert_eq!(lt(Value::Int(2), Value::Int(1)).unwrap(), Value::Int(0));
    }

    #[test]
    fn shift_left_is_64_bit_by_default_mode_off() {
        let mode = ShiftMode { arith64: false };
        // 1 << 31 overflows i32, wraps to i32::MIN when truncated to 32 bits.
        let v = shl(Value::Int(1), Value::Int(31), mode).unwrap();
        assert_eq!(v, Value::Int(i32::MIN as i64));
    }

    #[test]
    fn shift_left_64_bit_mode_keeps_full_width() {
        let mode = ShiftMode { arith64: true };
        let v = shl(Value::Int(1), Value::Int(40), mode).unwrap();
        assert_eq!(v, Value::Int(1i64 << 40));
    }

    proptest::proptest! {
        #[test]
        fn add_matches_math_when_representable(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let v = add(Value::Int(a), Value::Int(b)).unwrap();
            proptest::prop_assert_eq!(v, Value::Int(a + b));
        }
    }
}
