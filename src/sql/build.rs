//! SQL snippet assembly.
//!
//! Emitters never splice raw strings together; they go through [Sql] and the
//! helpers here, which track whether a snippet is self-delimiting so infix
//! composition can parenthesize exactly where precedence demands it.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sql {
    text: String,
    /// Self-delimiting: an identifier, a quoted literal, a function call, a
    /// parenthesized group; anything safe to embed without parentheses.
    atomic: bool,
}

impl Sql {
    /// A self-delimiting snippet.
    pub fn atom<S: Into<String>>(text: S) -> Sql {
        Sql {
            text: text.into(),
            atomic: true,
        }
    }

    /// A compound snippet that may need parentheses when embedded.
    pub fn raw<S: Into<String>>(text: S) -> Sql {
        Sql {
            text: text.into(),
            atomic: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The snippet as an infix operand: parenthesized unless atomic.
    fn operand(&self) -> String {
        if self.atomic {
            self.text.clone()
        } else {
            format!("({})", self.text)
        }
    }
}

impl Display for Sql {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `"name"`, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> Sql {
    Sql::atom(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// `'text'`, doubling any embedded quote.
pub fn quote_string(text: &str) -> Sql {
    Sql::atom(format!("'{}'", text.replace('\'', "''")))
}

/// Integer-valued numbers print without a fraction.
pub fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < (i64::MAX as f64) {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// The SQL spelling of a constant. Booleans are `1`/`0`; sequences and
/// mappings are carried as JSON text.
pub fn quote_value(value: &Value) -> Sql {
    match value {
        Value::Null => Sql::atom("NULL"),
        Value::Boolean(true) => Sql::atom("1"),
        Value::Boolean(false) => Sql::atom("0"),
        Value::Integer(i) => Sql::atom(i.to_string()),
        Value::Float(f) => Sql::atom(number_text(*f)),
        Value::Decimal(d) => Sql::atom(d.to_string()),
        Value::Date(s) | Value::Duration(s) => Sql::atom(number_text(*s)),
        Value::String(s) => quote_string(s),
        Value::Array(_) | Value::Object(_) => quote_string(&value.to_json().to_string()),
    }
}

/// `left op right`, parenthesizing compound operands.
pub fn infix(left: &Sql, op: &str, right: &Sql) -> Sql {
    Sql::raw(format!("{} {op} {}", left.operand(), right.operand()))
}

/// Wrap in parentheses, making the snippet atomic.
pub fn sql_iso(sql: &Sql) -> Sql {
    Sql::atom(format!("({sql})"))
}

/// Parenthesize only when the snippet is compound.
pub fn isolate(sql: &Sql) -> Sql {
    if sql.atomic {
        sql.clone()
    } else {
        sql_iso(sql)
    }
}

/// `FUNC(arg, arg, …)`.
pub fn sql_call(func: &str, args: &[Sql]) -> Sql {
    Sql::atom(format!("{func}({})", args.iter().join(", ")))
}

/// Join snippets as-is; the caller isolates parts where precedence needs it.
pub fn join_sql(separator: &str, parts: &[Sql]) -> Sql {
    Sql::raw(parts.iter().join(separator))
}

/// `CASE WHEN cond THEN then [ELSE els] END`; self-delimiting.
pub fn case_when(cond: &Sql, then: &Sql, els: Option<&Sql>) -> Sql {
    match els {
        Some(els) => Sql::atom(format!("CASE WHEN {cond} THEN {then} ELSE {els} END")),
        None => Sql::atom(format!("CASE WHEN {cond} THEN {then} END")),
    }
}

/// `CAST(x AS type)`.
pub fn cast(sql: &Sql, as_type: &str) -> Sql {
    Sql::atom(format!("CAST({sql} AS {as_type})"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_identifier("a.~n~").as_str(), "\"a.~n~\"");
        assert_eq!(quote_string("it's").as_str(), "'it''s'");
        assert_eq!(quote_value(&Value::Boolean(true)).as_str(), "1");
        assert_eq!(quote_value(&Value::Float(3.0)).as_str(), "3");
        assert_eq!(quote_value(&Value::Float(0.5)).as_str(), "0.5");
    }

    #[test]
    fn infix_parenthesizes_compound_operands() {
        let a = Sql::atom("\"a\"");
        let b = Sql::atom("\"b\"");
        let sum = infix(&a, "+", &b);
        assert_eq!(sum.as_str(), "\"a\" + \"b\"");
        let nested = infix(&sum, "*", &a);
        assert_eq!(nested.as_str(), "(\"a\" + \"b\") * \"a\"");
    }

    #[test]
    fn calls_are_atomic() {
        let call = sql_call("MAX", &[Sql::atom("0"), Sql::atom("\"n\"")]);
        assert_eq!(call.as_str(), "MAX(0, \"n\")");
        assert_eq!(infix(&call, "+", &Sql::atom("1")).as_str(), "MAX(0, \"n\") + 1");
    }
}
