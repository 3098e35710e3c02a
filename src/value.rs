//! The value model: JSON values plus dates, durations and decimals, with the
//! nullish conventions the whole crate is built on.
//!
//! Two conventions to keep in mind everywhere:
//! - `Null` means *absence of value*, not a value.
//! - The empty string is missing. `Value::is_missing` is the single place
//!   that encodes this.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use enum_as_inner::EnumAsInner;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::error::{Error, Reason};

#[derive(Debug, Clone, PartialEq, EnumAsInner, strum::AsRefStr)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    /// An absolute instant, in Unix seconds.
    Date(f64),
    /// A span of time, in seconds.
    Duration(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Back to plain JSON. Dates and durations come out as their numeric
    /// encoding (Unix seconds / seconds).
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(f) => number_json(*f),
            Value::Decimal(d) => number_json(d.to_f64().unwrap_or(f64::NAN)),
            Value::Date(seconds) | Value::Duration(seconds) => number_json(*seconds),
            Value::String(s) => Json::from(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Missing is `Null` or the empty string.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::Boolean(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::Date(s) | Value::Duration(s) => Some(*s),
            _ => None,
        }
    }
}

/// Integer-valued floats serialize as integers, so that folded arithmetic
/// round-trips to the JSON it came from.
fn number_json(f: f64) -> Json {
    if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
        Json::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

/// Equality by underlying value: numbers compare numerically across numeric
/// variants, everything else structurally. Values of different (non-numeric)
/// kinds are simply not equal.
pub fn value_eq(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
        return l == r;
    }
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| value_eq(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .zip(r)
                    .all(|((lk, lv), (rk, rv))| lk == rk && value_eq(lv, rv))
        }
        _ => false,
    }
}

/// The total order used for literal folding: numbers numerically, strings by
/// Unicode code point, booleans false-before-true. Cross-kind comparison is
/// undefined (`None`); only `eq`/`ne` are defined across kinds.
pub fn value_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
        return l.partial_cmp(&r);
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Parse the operand of `{"date": …}` down to Unix seconds.
///
/// Numbers are already Unix seconds; strings are tried as RFC 3339, then as
/// the common unzoned formats, all read as UTC.
pub fn parse_date(json: &Json) -> Result<f64> {
    match json {
        Json::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_millis()) / 1e3);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Ok(dt.and_utc().timestamp() as f64);
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                let midnight = d.and_hms_opt(0, 0, 0).expect("midnight is always valid");
                return Ok(midnight.and_utc().timestamp() as f64);
            }
            Err(anyhow!(Error::new(Reason::Expected {
                who: Some("date".to_string()),
                expected: "Unix seconds or an ISO date".to_string(),
                found: format!("{s:?}"),
            })))
        }
        _ => Err(anyhow!(Error::new(Reason::Expected {
            who: Some("date".to_string()),
            expected: "Unix seconds or an ISO date".to_string(),
            found: json.to_string(),
        }))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_values() {
        assert!(Value::Null.is_missing());
        assert!(Value::String("".to_string()).is_missing());
        assert!(!Value::String("x".to_string()).is_missing());
        assert!(!Value::Boolean(false).is_missing());
        assert!(!Value::Integer(0).is_missing());
    }

    #[test]
    fn cross_kind_equality() {
        assert!(value_eq(&Value::Integer(1), &Value::Float(1.0)));
        assert!(!value_eq(&Value::Integer(1), &Value::String("1".to_string())));
        assert!(!value_eq(&Value::Boolean(true), &Value::Integer(1)));
        assert!(value_eq(&Value::Null, &Value::Null));
    }

    #[test]
    fn ordering_is_within_kind() {
        assert_eq!(
            value_cmp(&Value::Integer(2), &Value::Float(10.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            value_cmp(
                &Value::String("a".to_string()),
                &Value::String("b".to_string())
            ),
            Some(Ordering::Less)
        );
        assert_eq!(value_cmp(&Value::Integer(1), &Value::String("b".to_string())), None);
    }

    #[test]
    fn date_parsing() {
        assert_eq!(parse_date(&serde_json::json!(1429747200)).unwrap(), 1429747200.0);
        assert_eq!(parse_date(&serde_json::json!("2015-04-23")).unwrap(), 1429747200.0);
        assert_eq!(
            parse_date(&serde_json::json!("2015-04-23T00:00:00Z")).unwrap(),
            1429747200.0
        );
        assert!(parse_date(&serde_json::json!("not a date")).is_err());
    }

    #[test]
    fn integral_floats_round_trip_as_integers() {
        assert_eq!(Value::Float(3.0).to_json(), serde_json::json!(3));
        assert_eq!(Value::Float(3.5).to_json(), serde_json::json!(3.5));
        assert_eq!(Value::Date(1429747200.0).to_json(), serde_json::json!(1429747200));
    }
}
