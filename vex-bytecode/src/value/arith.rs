//! Numeric and string-concatenation semantics (spec.md §6.5).

use std::rc::Rc;

use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use thiserror::Error;

use super::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("`{op}` is not defined between `{lhs}` and `{rhs}`")]
    TypeMismatch { op: &'static str, lhs: &'static str, rhs: &'static str },
}

fn mismatch(op: &'static str, lhs: &Value, rhs: &Value) -> ArithError {
    ArithError::TypeMismatch { op, lhs: lhs.type_name(), rhs: rhs.type_name() }
}

fn to_bigint(v: &Value) -> Option<BigInt> {
    match v {
        Value::Integer(i) => Some(BigInt::from(*i)),
        Value::BigInt(b) => Some((**b).clone()),
        _ => None,
    }
}

fn narrow(b: BigInt) -> Value {
    match b.to_i64() {
        Some(i) => Value::Integer(i),
        None => Value::BigInt(Rc::new(b)),
    }
}

fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::BigInt(b) => b.to_f64(),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Floor division: rounds toward negative infinity regardless of operand
/// signs, unlike Euclidean division which instead pins the remainder's sign
/// to non-negative. The two agree only when `b` is positive.
fn floor_div_bigint(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a - &q * b;
    if !r.is_zero() && (r.sign() == Sign::Minus) != (b.sign() == Sign::Minus) {
        q - BigInt::from(1)
    } else {
        q
    }
}

fn rem_euclid_bigint(a: &BigInt, b: &BigInt) -> BigInt {
    let r = a % b;
    if r.sign() == Sign::Minus {
        if b.sign() == Sign::Plus { r + b } else { r - b }
    } else {
        r
    }
}

macro_rules! numeric_binop {
    ($name:ident, $op_str:expr, $int_checked:ident, $bigint_op:tt) => {
        pub fn $name(a: &Value, b: &Value) -> Result<Value, ArithError> {
            match (a, b) {
                (Value::Integer(x), Value::Integer(y)) => match x.$int_checked(*y) {
                    Some(r) => Ok(Value::Integer(r)),
                    None => Ok(narrow(BigInt::from(*x) $bigint_op BigInt::from(*y))),
                },
                (Value::Float(_), _) | (_, Value::Float(_)) if is_numeric(a) && is_numeric(b) => {
                    let x = to_f64(a).expect("numeric");
                    let y = to_f64(b).expect("numeric");
                    Ok(Value::Float(x $bigint_op y))
                }
                _ if is_integral(a) && is_integral(b) => {
                    let x = to_bigint(a).expect("integral");
                    let y = to_bigint(b).expect("integral");
                    Ok(narrow(x $bigint_op y))
                }
                _ => Err(mismatch($op_str, a, b)),
            }
        }
    };
}

fn is_integral(v: &Value) -> bool {
    matches!(v, Value::Integer(_) | Value::BigInt(_))
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Integer(_) | Value::BigInt(_) | Value::Float(_))
}

numeric_binop!(add, "+", checked_add, +);
numeric_binop!(sub, "-", checked_sub, -);
numeric_binop!(mul, "*", checked_mul, *);

/// `/`: exact integer division yields an integer, inexact yields a float
/// (int+float always promotes to float).
pub fn div(a: &Value, b: &Value) -> Result<Value, ArithError> {
    if !is_numeric(a) || !is_numeric(b) {
        return Err(mismatch("/", a, b));
    }
    if matches!(a, Value::Float(_)) || matches!(b, Value::Float(_)) {
        let y = to_f64(b).expect("numeric");
        if y == 0.0 {
            return Err(ArithError::DivisionByZero);
        }
        return Ok(Value::Float(to_f64(a).expect("numeric") / y));
    }
    let x = to_bigint(a).expect("integral");
    let y = to_bigint(b).expect("integral");
    if y.is_zero() {
        return Err(ArithError::DivisionByZero);
    }
    if (&x % &y).is_zero() {
        Ok(narrow(x / y))
    } else {
        Ok(Value::Float(x.to_f64().unwrap_or(f64::NAN) / y.to_f64().unwrap_or(f64::NAN)))
    }
}

/// `//`: floor division toward negative infinity.
pub fn floor_div(a: &Value, b: &Value) -> Result<Value, ArithError> {
    if !is_integral(a) || !is_integral(b) {
        return Err(mismatch("//", a, b));
    }
    let x = to_bigint(a).expect("integral");
    let y = to_bigint(b).expect("integral");
    if y.is_zero() {
        return Err(ArithError::DivisionByZero);
    }
    Ok(narrow(floor_div_bigint(&x, &y)))
}

/// `%`: Euclidean remainder, always non-negative.
pub fn rem(a: &Value, b: &Value) -> Result<Value, ArithError> {
    if !is_integral(a) || !is_integral(b) {
        return Err(mismatch("%", a, b));
    }
    let x = to_bigint(a).expect("integral");
    let y = to_bigint(b).expect("integral");
    if y.is_zero() {
        return Err(ArithError::DivisionByZero);
    }
    Ok(narrow(rem_euclid_bigint(&x, &y)))
}

/// `++`: string concatenation. `+` between a string and a non-string is a
/// type error raised by the caller before reaching here (arith only handles
/// the numeric operators).
pub fn concat(a: &Value, b: &Value) -> Result<Value, ArithError> {
    match (a.as_string(), b.as_string()) {
        (Some(x), Some(y)) => Ok(Value::string(x + &y)),
        _ => Err(mismatch("++", a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_overflow_promotes_to_bigint() {
        let result = mul(&Value::Integer(i64::MAX), &Value::Integer(2)).expect("promotes");
        assert!(matches!(result, Value::BigInt(_)));
    }

    #[test]
    fn exact_integer_division_stays_integer() {
        assert!(matches!(div(&Value::Integer(10), &Value::Integer(2)).expect("exact"), Value::Integer(5)));
    }

    #[test]
    fn inexact_integer_division_yields_float() {
        assert!(matches!(div(&Value::Integer(7), &Value::Integer(2)).expect("inexact"), Value::Float(_)));
    }

    #[test]
    fn mixed_int_float_promotes_integer() {
        assert!(matches!(add(&Value::Integer(1), &Value::Float(0.5)).expect("ok"), Value::Float(f) if f == 1.5));
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        let result = floor_div(&Value::Integer(-7), &Value::Integer(2)).expect("floors");
        assert!(matches!(result, Value::Integer(-4)));
    }

    #[test]
    fn floor_division_with_negative_divisor_differs_from_euclidean() {
        // -7 / -2 = 3.5, floors to 3; Euclidean division (remainder pinned
        // non-negative) would instead give 4.
        let result = floor_div(&Value::Integer(-7), &Value::Integer(-2)).expect("floors");
        assert!(matches!(result, Value::Integer(3)));
    }

    #[test]
    fn euclidean_remainder_is_always_non_negative() {
        let result = rem(&Value::Integer(-7), &Value::Integer(2)).expect("rem");
        assert!(matches!(result, Value::Integer(1)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(div(&Value::Integer(1), &Value::Integer(0)), Err(ArithError::DivisionByZero));
    }

    #[test]
    fn string_concat_joins() {
        let result = concat(&Value::string("foo"), &Value::string("bar")).expect("concat");
        assert_eq!(result.as_string(), Some("foobar".to_string()));
    }
}
