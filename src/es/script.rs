//! Script emission for positions the filter DSL cannot express.
//!
//! `to_ruby` is a plain string-builder pass producing the Groovy-flavored
//! scripts ES 1.x executes. Its contract is semantic equivalence to the AST
//! on non-missing inputs; missing propagation is arranged upstream by
//! wrapping with a conditional during partial evaluation.

use anyhow::{anyhow, Result};
use itertools::Itertools;

use crate::ast::{BinaryOperator, Expr, ExprKind, InequalityOperator, MultiOperator};
use crate::error::{Error, Reason};
use crate::value::Value;

use super::Context;

pub fn to_ruby(expr: &Expr, ctx: &Context<'_>) -> Result<String> {
    use ExprKind::*;
    Ok(match &expr.kind {
        Variable(name) => format!("doc[{}].value", quote(&super::es_field(ctx, name))),
        Literal(value) => value_script(value),
        Date(seconds) => number(*seconds),
        // the whole point of the script operator
        Script(source) => source.clone(),

        Eq { left, right } => binary_script(left, right, "==", ctx)?,
        Ne { left, right } => binary_script(left, right, "!=", ctx)?,
        Inequality { op, left, right } => {
            let symbol = match op {
                InequalityOperator::Gt => ">",
                InequalityOperator::Gte => ">=",
                InequalityOperator::Lt => "<",
                InequalityOperator::Lte => "<=",
            };
            binary_script(left, right, symbol, ctx)?
        }
        In { value, superset } => format!(
            "({}).contains({})",
            to_ruby(superset, ctx)?,
            to_ruby(value, ctx)?
        ),

        And(terms) => nary_script(terms, " && ", "true", ctx)?,
        Or(terms) => nary_script(terms, " || ", "false", ctx)?,
        Not(term) => format!("!({})", to_ruby(term, ctx)?),
        Missing(term) => match &term.kind {
            Variable(name) => format!("doc[{}].isEmpty()", quote(&super::es_field(ctx, name))),
            _ => format!("(({}) == null)", to_ruby(term, ctx)?),
        },
        Exists(term) => match &term.kind {
            Variable(name) => format!("!doc[{}].isEmpty()", quote(&super::es_field(ctx, name))),
            _ => format!("(({}) != null)", to_ruby(term, ctx)?),
        },

        Binary { op, left, right } => {
            let (l, r) = (to_ruby(left, ctx)?, to_ruby(right, ctx)?);
            match op {
                BinaryOperator::Sub => format!("({l} - {r})"),
                BinaryOperator::Mul => format!("({l} * {r})"),
                BinaryOperator::Div => format!("((double)({l}) / ({r}))"),
                BinaryOperator::Mod => format!("({l} % {r})"),
                BinaryOperator::Exp => format!("Math.pow({l}, {r})"),
            }
        }
        Multi { op, terms, .. } => {
            let symbol = match op {
                MultiOperator::Add => " + ",
                MultiOperator::Mul => " * ",
            };
            nary_script(terms, symbol, "0", ctx)?
        }
        Div { numer, denom, default } => {
            let base = format!(
                "((double)({}) / ({}))",
                to_ruby(numer, ctx)?,
                to_ruby(denom, ctx)?
            );
            if default.is_null_literal() {
                base
            } else {
                format!("(({base}) ?: ({}))", to_ruby(default, ctx)?)
            }
        }
        Abs(term) => format!("Math.abs({})", to_ruby(term, ctx)?),
        Floor { term, modulo } => format!(
            "(Math.floor(({}) / ({m})) * ({m}))",
            to_ruby(term, ctx)?,
            m = to_ruby(modulo, ctx)?
        ),
        Number(term) | Unix(term) | FromUnix(term) => to_ruby(term, ctx)?,

        Length(term) => format!("({}).length()", to_ruby(term, ctx)?),
        String(term) => format!("String.valueOf({})", to_ruby(term, ctx)?),
        Prefix { value, prefix } => format!(
            "({}).startsWith({})",
            to_ruby(value, ctx)?,
            to_ruby(prefix, ctx)?
        ),
        Suffix { value, suffix } => format!(
            "({}).endsWith({})",
            to_ruby(value, ctx)?,
            to_ruby(suffix, ctx)?
        ),
        BasicIndexOf { value, find, start } => format!(
            "({}).indexOf({}, {})",
            to_ruby(value, ctx)?,
            to_ruby(find, ctx)?,
            to_ruby(start, ctx)?
        ),
        BasicStartsWith { value, prefix } => format!(
            "({}).startsWith({})",
            to_ruby(value, ctx)?,
            to_ruby(prefix, ctx)?
        ),
        BasicSubstring { value, start, end } => format!(
            "({}).substring({}, {})",
            to_ruby(value, ctx)?,
            to_ruby(start, ctx)?,
            to_ruby(end, ctx)?
        ),
        BasicEq { left, right } => binary_script(left, right, "==", ctx)?,

        Get { container, index } => format!(
            "({})[{}]",
            to_ruby(container, ctx)?,
            to_ruby(index, ctx)?
        ),
        RegExp { value, pattern } => {
            format!("(({}) ==~ /{}/)", to_ruby(value, ctx)?, pattern)
        }

        When { cond, then, els } => format!(
            "(({}) ? ({}) : ({}))",
            to_ruby(cond, ctx)?,
            to_ruby(then, ctx)?,
            to_ruby(els, ctx)?
        ),
        Coalesce(terms) => {
            let mut script = "null".to_string();
            for term in terms.iter().rev() {
                script = format!("(({t}) != null ? ({t}) : {script})", t = to_ruby(term, ctx)?);
            }
            script
        }

        _ => {
            return Err(anyhow!(Error::new(Reason::Unsupported {
                op: expr.op_tag().to_string(),
                language: "es script".to_string(),
            })
            .with_cause(expr.to_json())))
        }
    })
}

fn binary_script(left: &Expr, right: &Expr, symbol: &str, ctx: &Context<'_>) -> Result<String> {
    Ok(format!(
        "({} {symbol} {})",
        to_ruby(left, ctx)?,
        to_ruby(right, ctx)?
    ))
}

fn nary_script(terms: &[Expr], symbol: &str, empty: &str, ctx: &Context<'_>) -> Result<String> {
    if terms.is_empty() {
        return Ok(empty.to_string());
    }
    let parts: Vec<String> = terms.iter().map(|t| to_ruby(t, ctx)).try_collect()?;
    Ok(format!("({})", parts.join(symbol)))
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < (i64::MAX as f64) {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn value_script(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => number(*f),
        Value::Decimal(d) => d.to_string(),
        Value::Date(s) | Value::Duration(s) => number(*s),
        Value::String(s) => quote(s),
        Value::Array(items) => format!("[{}]", items.iter().map(value_script).join(", ")),
        Value::Object(_) => quote(&value.to_json().to_string()),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::parser::parse_expr;
    use crate::schema::SimpleSchema;

    fn ruby(json: serde_json::Value) -> String {
        let schema = SimpleSchema::default();
        let ctx = Context::new(&schema);
        let expr = parse_expr(&json).unwrap().partial_eval().unwrap();
        to_ruby(&expr, &ctx).unwrap()
    }

    #[test]
    fn variables_read_from_doc() {
        assert_eq!(ruby(json!("a.b")), "doc[\"a.b\"].value");
        assert_eq!(ruby(json!({"missing": "a"})), "doc[\"a\"].isEmpty()");
    }

    #[test]
    fn arithmetic_inside_comparison() {
        assert_eq!(
            ruby(json!({"gt": [{"sub": ["a", "b"]}, 0]})),
            "((doc[\"a\"].value - doc[\"b\"].value) > 0)"
        );
    }

    #[test]
    fn conditionals_become_ternaries() {
        assert_eq!(
            ruby(json!({"when": {"missing": "a"}, "then": 0, "else": "a"})),
            "((doc[\"a\"].isEmpty()) ? (0) : (doc[\"a\"].value))"
        );
    }
}
