//! Literal folding kernels: the pure-value arithmetic and string primitives
//! `partial_eval` reaches for once every operand is a constant.
//!
//! String positions are counted in characters, 0-based and half-open, to
//! match the expression semantics; the `sql_*` kernels mirror the 1-based
//! SQL built-ins instead.

use std::cmp::Ordering;

use crate::ast::{BinaryOperator, InequalityOperator};
use crate::value::{value_cmp, Value};

/// Two-operand arithmetic over values; anything non-numeric folds to `Null`.
pub fn eval_binary(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    use BinaryOperator::*;
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        match op {
            Sub => {
                if let Some(v) = a.checked_sub(*b) {
                    return Value::Integer(v);
                }
            }
            Mul => {
                if let Some(v) = a.checked_mul(*b) {
                    return Value::Integer(v);
                }
            }
            Mod => {
                if *b != 0 {
                    return Value::Integer(a % b);
                }
                return Value::Null;
            }
            Exp => {
                if (0..=32).contains(b) {
                    if let Some(v) = a.checked_pow(*b as u32) {
                        return Value::Integer(v);
                    }
                }
            }
            Div => {}
        }
    }
    let (a, b) = match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Value::Null,
    };
    match op {
        Sub => Value::Float(a - b),
        Mul => Value::Float(a * b),
        Div => {
            if b == 0.0 {
                Value::Null
            } else {
                Value::Float(a / b)
            }
        }
        Exp => Value::Float(a.powf(b)),
        Mod => {
            if b == 0.0 {
                Value::Null
            } else {
                Value::Float(a % b)
            }
        }
    }
}

/// One folding step of a commutative [MultiOperator](crate::ast::MultiOperator).
pub fn eval_multi(op: crate::ast::MultiOperator, left: &Value, right: &Value) -> Value {
    use crate::ast::MultiOperator::*;
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let folded = match op {
            Add => a.checked_add(*b),
            Mul => a.checked_mul(*b),
        };
        if let Some(v) = folded {
            return Value::Integer(v);
        }
    }
    let (a, b) = match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Value::Null,
    };
    match op {
        Add => Value::Float(a + b),
        Mul => Value::Float(a * b),
    }
}

/// Ordered comparison; `None` when the operands are not comparable
/// (cross-kind, or not ordered at all).
pub fn eval_inequality(op: InequalityOperator, left: &Value, right: &Value) -> Option<bool> {
    let ord = value_cmp(left, right)?;
    Some(match op {
        InequalityOperator::Gt => ord == Ordering::Greater,
        InequalityOperator::Gte => ord != Ordering::Less,
        InequalityOperator::Lt => ord == Ordering::Less,
        InequalityOperator::Lte => ord != Ordering::Greater,
    })
}

/// Round `value` down to a multiple of `modulo`; `Null` on a zero or
/// non-numeric modulus.
pub fn eval_floor(value: &Value, modulo: &Value) -> Value {
    if let (Value::Integer(a), Value::Integer(m)) = (value, modulo) {
        if *m != 0 {
            return Value::Integer(a.div_euclid(*m) * m);
        }
        return Value::Null;
    }
    match (value.as_number(), modulo.as_number()) {
        (Some(a), Some(m)) if m != 0.0 => Value::Float((a / m).floor() * m),
        _ => Value::Null,
    }
}

/// Render a scalar the way string operators see it; `None` for values with
/// no string form (or no value at all).
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(format!("{f}")),
        Value::Decimal(d) => Some(d.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Date(s) | Value::Duration(s) => Some(format!("{s}")),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// 0-based character index of `find` within `value` at or after `start`;
/// `-1` when absent.
pub fn index_of(value: &str, find: &str, start: i64) -> i64 {
    let chars: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = find.chars().collect();
    let start = start.max(0) as usize;
    if pattern.is_empty() {
        return start.min(chars.len()) as i64;
    }
    if start + pattern.len() > chars.len() {
        return -1;
    }
    for i in start..=(chars.len() - pattern.len()) {
        if chars[i..i + pattern.len()] == pattern[..] {
            return i as i64;
        }
    }
    -1
}

/// 0-based, half-open, clamped character slice.
pub fn substring(value: &str, start: i64, end: i64) -> String {
    let chars: Vec<char> = value.chars().collect();
    let start = start.clamp(0, chars.len() as i64) as usize;
    let end = end.clamp(start as i64, chars.len() as i64) as usize;
    chars[start..end].iter().collect()
}

pub fn left(value: &str, length: i64) -> String {
    substring(value, 0, length.max(0))
}

pub fn right(value: &str, length: i64) -> String {
    let n = value.chars().count() as i64;
    substring(value, n - length.max(0), n)
}

pub fn not_left(value: &str, length: i64) -> String {
    let n = value.chars().count() as i64;
    substring(value, length.max(0), n)
}

pub fn not_right(value: &str, length: i64) -> String {
    let n = value.chars().count() as i64;
    substring(value, 0, n - length.max(0))
}

/// The substring strictly between `prefix` and `suffix`, searching from
/// `start`; `None` when either bound is absent.
pub fn between(value: &str, prefix: &str, suffix: &str, start: i64) -> Option<String> {
    let begin = index_of(value, prefix, start);
    if begin < 0 {
        return None;
    }
    let content = begin + prefix.chars().count() as i64;
    let end = index_of(value, suffix, content);
    if end < 0 {
        return None;
    }
    Some(substring(value, content, end))
}

/// SQL `INSTR`: 1-based, 0 when absent.
pub fn sql_instr(value: &str, find: &str) -> i64 {
    index_of(value, find, 0) + 1
}

/// SQL `SUBSTR`: 1-based `start`, `length` characters (`None` for the rest
/// of the string).
pub fn sql_substr(value: &str, start: i64, length: Option<i64>) -> String {
    let begin = (start - 1).max(0);
    match length {
        Some(len) => substring(value, begin, begin + len.max(0)),
        None => substring(value, begin, value.chars().count() as i64),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binary_folding_keeps_integers_where_it_can() {
        assert_eq!(
            eval_binary(BinaryOperator::Sub, &Value::Integer(5), &Value::Integer(3)),
            Value::Integer(2)
        );
        assert_eq!(
            eval_binary(BinaryOperator::Div, &Value::Integer(1), &Value::Integer(2)),
            Value::Float(0.5)
        );
        assert_eq!(
            eval_binary(BinaryOperator::Div, &Value::Integer(1), &Value::Integer(0)),
            Value::Null
        );
        assert_eq!(
            eval_binary(
                BinaryOperator::Mul,
                &Value::Integer(2),
                &Value::String("x".to_string())
            ),
            Value::Null
        );
    }

    #[test]
    fn character_counting_not_bytes() {
        assert_eq!(index_of("naïveté", "té", 0), 5);
        assert_eq!(substring("naïveté", 0, 3), "naï");
    }

    #[test]
    fn slices_clamp_negative_lengths_to_empty() {
        assert_eq!(left("hello", 2), "he");
        assert_eq!(left("hello", -2), "");
        assert_eq!(right("hello", 2), "lo");
        assert_eq!(right("hello", 99), "hello");
        assert_eq!(not_left("hello", 2), "llo");
        assert_eq!(not_right("hello", 2), "hel");
        assert_eq!(not_right("hello", -1), "hello");
    }

    #[test]
    fn between_extracts_the_enclosed_span() {
        assert_eq!(between("a<b>c", "<", ">", 0), Some("b".to_string()));
        assert_eq!(between("a<b>c", "[", "]", 0), None);
        assert_eq!(between("x<1><2>", "<", ">", 3), Some("2".to_string()));
    }

    #[test]
    fn sql_kernels_are_one_based() {
        assert_eq!(sql_instr("hello", "ll"), 3);
        assert_eq!(sql_instr("hello", "zz"), 0);
        assert_eq!(sql_substr("hello", 2, Some(3)), "ell");
        assert_eq!(sql_substr("hello", 2, None), "ello");
    }
}
