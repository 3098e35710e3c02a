//! Partial evaluation: compile-time simplification.
//!
//! `partial_eval` recurses child-first, then applies one per-operator rule;
//! because every rule's output is already at its own fixpoint, a single pass
//! suffices and the `simplified` flag short-circuits re-entry. The result is
//! semantically equal to the input on every record outside its `missing()`
//! region, and the call is idempotent.

pub mod literals;

use anyhow::{anyhow, Result};
use log::debug;

use crate::ast::{Expr, ExprKind, MultiOperator};
use crate::error::{Error, Reason};
use crate::value::{value_cmp, value_eq, Value};
use literals::*;

impl Expr {
    pub fn partial_eval(&self) -> Result<Expr> {
        if self.simplified {
            return Ok(self.clone());
        }
        eval(self)
    }
}

/// Mark a node as being at its fixpoint.
fn done(kind: ExprKind) -> Expr {
    Expr {
        kind,
        simplified: true,
    }
}

fn null() -> Expr {
    done(ExprKind::Literal(Value::Null))
}

fn boolean(b: bool) -> Expr {
    done(ExprKind::Literal(Value::Boolean(b)))
}

fn literal(v: Value) -> Expr {
    if v.is_missing() {
        null()
    } else {
        done(ExprKind::Literal(v))
    }
}

/// The `default` clause, or NULL when it was never given.
fn default_of(default: &Expr) -> Expr {
    if default.is_null_literal() {
        null()
    } else {
        default.clone()
    }
}

fn eval(expr: &Expr) -> Result<Expr> {
    use ExprKind::*;

    // child-first
    let node = Expr::new(expr.try_map_children(|child| child.partial_eval())?);

    let out = match &node.kind {
        Variable(_) | Offset(_) | Literal(_) | Date(_) | Script(_) | Tuple(_) | Leaves(_)
        | Get { .. } | Rows { .. } => done(node.kind.clone()),

        Not(term) => match term.literal_value() {
            Some(Value::Null) => null(),
            Some(Value::Boolean(b)) => boolean(!b),
            Some(other) => {
                return Err(anyhow!(Error::new(Reason::NotBoolean {
                    found: other.as_ref().to_string(),
                })
                .with_cause(node.to_json())));
            }
            None => match &term.kind {
                // double negation
                Not(inner) => (**inner).clone(),
                _ => done(node.kind.clone()),
            },
        },

        And(terms) => {
            let mut kept = Vec::with_capacity(terms.len());
            for term in flatten_and(terms) {
                match term.literal_value() {
                    // TRUE and NULL terms are identities of a conjunction
                    Some(v) if v.is_true() || v.is_missing() => continue,
                    Some(v) if v.is_false() => {
                        debug!("and short-circuits to FALSE");
                        return Ok(boolean(false));
                    }
                    _ => kept.push(term),
                }
            }
            match kept.len() {
                0 => boolean(true),
                1 => kept.pop().expect("one term"),
                _ => done(And(kept)),
            }
        }

        Or(terms) => {
            let mut kept = Vec::with_capacity(terms.len());
            for term in flatten_or(terms) {
                match term.literal_value() {
                    Some(v) if v.is_false() || v.is_missing() => continue,
                    Some(v) if v.is_true() => {
                        debug!("or short-circuits to TRUE");
                        return Ok(boolean(true));
                    }
                    _ => kept.push(term),
                }
            }
            match kept.len() {
                0 => boolean(false),
                1 => kept.pop().expect("one term"),
                _ => done(Or(kept)),
            }
        }

        Eq { left, right } => {
            // equality against a list is membership
            if let Some(v @ Value::Array(_)) = right.literal_value() {
                return Expr::is_in((**left).clone(), Expr::literal(v.clone())).partial_eval();
            }
            // equality against nothing is missingness
            if right.is_null_literal() {
                return left.missing().partial_eval();
            }
            if left.is_null_literal() {
                return right.missing().partial_eval();
            }
            if left == right {
                return Ok(boolean(true));
            }
            match (left.literal_value(), right.literal_value()) {
                (Some(l), Some(r)) => boolean(value_eq(l, r)),
                _ => done(node.kind.clone()),
            }
        }

        Ne { left, right } => match (left.literal_value(), right.literal_value()) {
            (Some(l), _) if l.is_missing() => null(),
            (_, Some(r)) if r.is_missing() => null(),
            (Some(l), Some(r)) => boolean(!value_eq(l, r)),
            _ => done(node.kind.clone()),
        },

        Inequality { op, left, right } => match (left.literal_value(), right.literal_value()) {
            (Some(l), _) if l.is_missing() => null(),
            (_, Some(r)) if r.is_missing() => null(),
            (Some(l), Some(r)) => match eval_inequality(*op, l, r) {
                Some(b) => boolean(b),
                // cross-kind order is undefined; leave it to the emitter
                None => done(node.kind.clone()),
            },
            _ => done(node.kind.clone()),
        },

        In { value, superset } => match superset.literal_value() {
            Some(Value::Null) => boolean(false),
            Some(Value::Array(items)) if items.is_empty() => boolean(false),
            Some(Value::Array(items)) => {
                if let Some(v) = value.literal_value() {
                    boolean(items.iter().any(|item| value_eq(v, item)))
                } else if items.len() == 1 {
                    return Expr::eq((**value).clone(), Expr::literal(items[0].clone()))
                        .partial_eval();
                } else {
                    done(node.kind.clone())
                }
            }
            // a scalar superset is a one-element set
            Some(scalar) => {
                return Expr::eq((**value).clone(), Expr::literal(scalar.clone())).partial_eval();
            }
            None => done(node.kind.clone()),
        },

        Missing(term) => {
            let missing = term.missing();
            if missing.kind == node.kind {
                done(node.kind.clone())
            } else {
                return missing.partial_eval();
            }
        }

        Exists(term) => return term.exists().partial_eval(),

        Binary { op, left, right } => match (left.literal_value(), right.literal_value()) {
            (Some(l), Some(r)) => literal(eval_binary(*op, l, r)),
            (Some(l), _) if l.is_missing() => null(),
            (_, Some(r)) if r.is_missing() => null(),
            _ => done(node.kind.clone()),
        },

        Multi {
            op,
            terms,
            nulls,
            default,
        } => eval_multi_op(*op, terms, *nulls, default),

        Div {
            numer,
            denom,
            default,
        } => match (numer.literal_value(), denom.literal_value()) {
            (Some(n), Some(d)) => match (n.as_number(), d.as_number()) {
                (Some(n), Some(d)) if d != 0.0 => literal(Value::Float(n / d)),
                _ => default_of(default),
            },
            (Some(n), _) if n.is_missing() => default_of(default),
            (_, Some(d)) if d.is_missing() => default_of(default),
            _ => done(node.kind.clone()),
        },

        Floor { term, modulo } => match (term.literal_value(), modulo.literal_value()) {
            (Some(t), Some(m)) => literal(eval_floor(t, m)),
            _ => done(node.kind.clone()),
        },

        Abs(term) => match term.literal_value() {
            Some(Value::Integer(i)) => literal(Value::Integer(i.abs())),
            Some(v) => match v.as_number() {
                Some(n) => literal(Value::Float(n.abs())),
                None => null(),
            },
            None => done(node.kind.clone()),
        },

        Number(term) => match &term.kind {
            ExprKind::Date(seconds) => literal(Value::Float(*seconds)),
            ExprKind::Literal(v) => match v {
                Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => literal(v.clone()),
                Value::Date(s) | Value::Duration(s) => literal(Value::Float(*s)),
                Value::Boolean(b) => literal(Value::Integer(i64::from(*b))),
                Value::String(s) => match s.parse::<f64>() {
                    Ok(f) => literal(Value::Float(f)),
                    Err(_) => null(),
                },
                Value::Null | Value::Array(_) | Value::Object(_) => null(),
            },
            _ => done(node.kind.clone()),
        },

        Unix(term) => match &term.kind {
            ExprKind::Date(seconds) => literal(Value::Float(*seconds)),
            ExprKind::Literal(v) => match v.as_number() {
                Some(n) => literal(Value::Float(n)),
                None => null(),
            },
            _ => done(node.kind.clone()),
        },

        FromUnix(term) => match term.literal_value() {
            Some(v) => match v.as_number() {
                Some(n) => done(ExprKind::Date(n)),
                None => null(),
            },
            None => done(node.kind.clone()),
        },

        Length(term) => match term.literal_value() {
            Some(Value::String(s)) if !s.is_empty() => {
                literal(Value::Integer(s.chars().count() as i64))
            }
            Some(_) => null(),
            None => done(node.kind.clone()),
        },

        String(term) => match term.literal_value() {
            Some(v) => match value_to_string(v) {
                Some(s) => literal(Value::String(s)),
                None => null(),
            },
            None => done(node.kind.clone()),
        },

        Prefix { value, prefix } => match (value.literal_value(), prefix.literal_value()) {
            // everything starts with nothing
            (_, Some(p)) if p.is_missing() => boolean(true),
            (Some(v), _) if v.is_missing() => boolean(false),
            (Some(Value::String(v)), Some(Value::String(p))) => boolean(v.starts_with(p)),
            _ => done(node.kind.clone()),
        },

        Suffix { value, suffix } => match (value.literal_value(), suffix.literal_value()) {
            (_, Some(s)) if s.is_missing() => boolean(true),
            (Some(v), _) if v.is_missing() => boolean(false),
            (Some(Value::String(v)), Some(Value::String(s))) => boolean(v.ends_with(s)),
            _ => done(node.kind.clone()),
        },

        Concat {
            terms,
            separator,
            default,
        } => {
            let all_literal = terms.iter().all(|t| t.kind.is_literal())
                && (separator.kind.is_literal());
            if !all_literal {
                return Ok(done(node.kind.clone()));
            }
            let sep = separator
                .literal_value()
                .and_then(value_to_string)
                .unwrap_or_default();
            let parts: Vec<std::string::String> = terms
                .iter()
                .filter_map(|t| t.literal_value().and_then(value_to_string))
                .collect();
            if parts.is_empty() {
                default_of(default)
            } else {
                literal(Value::String(parts.join(&sep)))
            }
        }

        Left { value, length } => fold_slice(value, length, left, &node),
        Right { value, length } => fold_slice(value, length, right, &node),
        NotLeft { value, length } => fold_slice(value, length, not_left, &node),
        NotRight { value, length } => fold_slice(value, length, not_right, &node),

        Find {
            value,
            find,
            start,
            default,
        } => {
            match (
                string_literal(value),
                string_literal(find),
                number_literal(start),
            ) {
                (Some(v), Some(f), Some(s)) => match index_of(&v, &f, s as i64) {
                    -1 => default_of(default),
                    i => literal(Value::Integer(i)),
                },
                _ => {
                    if value.is_null_literal() || find.is_null_literal() {
                        default_of(default)
                    } else {
                        done(node.kind.clone())
                    }
                }
            }
        }

        Split { value, separator } => match (string_literal(value), string_literal(separator)) {
            (Some(v), Some(s)) => literal(Value::Array(
                v.split(&s)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            )),
            _ => {
                if value.is_null_literal() {
                    null()
                } else {
                    done(node.kind.clone())
                }
            }
        },

        Between {
            value,
            prefix,
            suffix,
            start,
            default,
        } => {
            match (
                string_literal(value),
                string_literal(prefix),
                string_literal(suffix),
                number_literal(start),
            ) {
                (Some(v), Some(p), Some(s), Some(at)) => {
                    match between(&v, &p, &s, at as i64) {
                        Some(found) => literal(Value::String(found)),
                        None => default_of(default),
                    }
                }
                _ => {
                    if value.is_null_literal() {
                        default_of(default)
                    } else {
                        done(node.kind.clone())
                    }
                }
            }
        }

        RegExp { value, pattern } => match value.literal_value() {
            Some(v) if v.is_missing() => boolean(false),
            Some(Value::String(s)) => {
                let re = regex::Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    anyhow!(Error::new(Reason::Simple(format!(
                        "invalid regular expression: {e}"
                    )))
                    .with_cause(node.to_json()))
                })?;
                boolean(re.is_match(s))
            }
            _ => done(node.kind.clone()),
        },

        BasicIndexOf { value, find, start } => {
            match (
                string_literal(value),
                string_literal(find),
                number_literal(start),
            ) {
                (Some(v), Some(f), Some(s)) => literal(Value::Integer(index_of(&v, &f, s as i64))),
                _ => done(node.kind.clone()),
            }
        }

        BasicStartsWith { value, prefix } => {
            match (string_literal(value), string_literal(prefix)) {
                (Some(v), Some(p)) => boolean(v.starts_with(&p)),
                _ => done(node.kind.clone()),
            }
        }

        BasicSubstring { value, start, end } => {
            match (
                string_literal(value),
                number_literal(start),
                number_literal(end),
            ) {
                (Some(v), Some(s), Some(e)) => {
                    literal(Value::String(substring(&v, s as i64, e as i64)))
                }
                _ => done(node.kind.clone()),
            }
        }

        BasicEq { left, right } => match (left.literal_value(), right.literal_value()) {
            (Some(l), Some(r)) => boolean(value_eq(l, r)),
            _ => done(node.kind.clone()),
        },

        SqlInstr { value, find } => match (string_literal(value), string_literal(find)) {
            (Some(v), Some(f)) => literal(Value::Integer(sql_instr(&v, &f))),
            _ => {
                if value.is_null_literal() || find.is_null_literal() {
                    null()
                } else {
                    done(node.kind.clone())
                }
            }
        },

        SqlSubstr {
            value,
            start,
            length,
        } => match (string_literal(value), number_literal(start)) {
            (Some(v), Some(s)) => {
                if length.is_null_literal() {
                    literal(Value::String(sql_substr(&v, s as i64, None)))
                } else {
                    match number_literal(length) {
                        Some(l) => literal(Value::String(sql_substr(&v, s as i64, Some(l as i64)))),
                        None => done(node.kind.clone()),
                    }
                }
            }
            _ => done(node.kind.clone()),
        },

        When { cond, then, els } => match cond.literal_value() {
            Some(v) if v.is_true() => (**then).clone(),
            Some(_) => (**els).clone(),
            None => done(node.kind.clone()),
        },

        Case { whens, default } => {
            let mut kept = Vec::with_capacity(whens.len());
            let mut default = (**default).clone();
            for when in whens {
                let (cond, then, _) = when.kind.as_when().expect("case holds when clauses");
                match cond.literal_value() {
                    Some(v) if v.is_true() => {
                        // this clause always fires; later ones are dead
                        default = (**then).clone();
                        break;
                    }
                    Some(_) => continue,
                    None => kept.push(when.clone()),
                }
            }
            if kept.is_empty() {
                default
            } else {
                done(ExprKind::Case {
                    whens: kept,
                    default: Box::new(default),
                })
            }
        }

        Count(terms) => {
            let mut known = 0i64;
            let mut symbolic = Vec::new();
            for term in terms {
                match term.literal_value() {
                    Some(v) if v.is_missing() => continue,
                    Some(_) => known += 1,
                    None => symbolic.push(term.clone()),
                }
            }
            if symbolic.is_empty() {
                literal(Value::Integer(known))
            } else if known == 0 {
                done(Count(symbolic))
            } else {
                done(ExprKind::Multi {
                    op: MultiOperator::Add,
                    terms: vec![done(Count(symbolic)), literal(Value::Integer(known))],
                    nulls: true,
                    default: Box::new(null()),
                })
            }
        }

        Max(terms) => fold_extreme(terms, true),
        Min(terms) => fold_extreme(terms, false),

        Coalesce(terms) => {
            let mut kept = Vec::with_capacity(terms.len());
            for term in terms {
                match term.literal_value() {
                    Some(v) if v.is_missing() => continue,
                    Some(_) => {
                        // a present constant ends the search
                        kept.push(term.clone());
                        break;
                    }
                    None => kept.push(term.clone()),
                }
            }
            match kept.len() {
                0 => null(),
                1 => kept.pop().expect("one term"),
                _ => done(Coalesce(kept)),
            }
        }
    };
    Ok(out)
}

fn flatten_and(terms: &[Expr]) -> Vec<Expr> {
    let mut out = Vec::with_capacity(terms.len());
    for term in terms {
        match &term.kind {
            ExprKind::And(inner) => out.extend(flatten_and(inner)),
            _ => out.push(term.clone()),
        }
    }
    out
}

fn flatten_or(terms: &[Expr]) -> Vec<Expr> {
    let mut out = Vec::with_capacity(terms.len());
    for term in terms {
        match &term.kind {
            ExprKind::Or(inner) => out.extend(flatten_or(inner)),
            _ => out.push(term.clone()),
        }
    }
    out
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr.literal_value() {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn number_literal(expr: &Expr) -> Option<f64> {
    expr.literal_value().and_then(Value::as_number)
}

fn fold_slice(value: &Expr, length: &Expr, slice: fn(&str, i64) -> String, node: &Expr) -> Expr {
    if value.is_null_literal() || length.is_null_literal() {
        return null();
    }
    match (string_literal(value), number_literal(length)) {
        (Some(v), Some(n)) => literal(Value::String(slice(&v, n as i64))),
        _ => done(node.kind.clone()),
    }
}

/// Fold the literal extremes of `max`/`min`, keeping symbolic terms.
fn fold_extreme(terms: &[Expr], is_max: bool) -> Expr {
    use std::cmp::Ordering;
    let mut best: Option<Value> = None;
    let mut symbolic = Vec::new();
    for term in terms {
        match term.literal_value() {
            Some(v) if v.is_missing() => continue,
            Some(v) => {
                best = Some(match best {
                    None => v.clone(),
                    Some(b) => match value_cmp(v, &b) {
                        Some(Ordering::Greater) if is_max => v.clone(),
                        Some(Ordering::Less) if !is_max => v.clone(),
                        Some(_) => b,
                        // not comparable; keep the term symbolic
                        None => {
                            symbolic.push(term.clone());
                            b
                        }
                    },
                });
            }
            None => symbolic.push(term.clone()),
        }
    }
    match (symbolic.is_empty(), best) {
        (true, None) => null(),
        (true, Some(v)) => literal(v),
        (false, best) => {
            let mut kept = symbolic;
            if let Some(v) = best {
                kept.push(literal(v));
            }
            if kept.len() == 1 {
                kept.pop().expect("one term")
            } else if is_max {
                done(ExprKind::Max(kept))
            } else {
                done(ExprKind::Min(kept))
            }
        }
    }
}

fn eval_multi_op(
    op: MultiOperator,
    terms: &[Expr],
    nulls: bool,
    default: &Expr,
) -> Expr {
    let mut acc: Option<Value> = None;
    let mut symbolic = Vec::new();
    let mut saw_missing = false;
    for term in terms {
        match term.literal_value() {
            Some(v) if v.is_missing() || v.as_number().is_none() => saw_missing = true,
            Some(v) => {
                acc = Some(match acc {
                    None => v.clone(),
                    Some(a) => eval_multi(op, &a, v),
                });
            }
            None => symbolic.push(term.clone()),
        }
    }
    if saw_missing && !nulls {
        // a missing term sinks the whole thing
        return default_of(default);
    }
    if symbolic.is_empty() {
        return match acc {
            None => default_of(default),
            Some(v) => literal(v),
        };
    }
    let mut kept = symbolic;
    if let Some(v) = acc {
        // fold identities away
        if v.as_number() != Some(op.identity()) {
            kept.push(literal(v));
        }
    }
    if kept.len() == 1 && default.is_null_literal() {
        return kept.pop().expect("one term");
    }
    done(ExprKind::Multi {
        op,
        terms: kept,
        nulls,
        default: Box::new(default.clone()),
    })
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::parser::parse_expr;

    fn simplified(json: serde_json::Value) -> Expr {
        parse_expr(&json).unwrap().partial_eval().unwrap()
    }

    #[test]
    fn boolean_identities() {
        assert!(simplified(serde_json::json!({"and": []})).is_true());
        assert!(simplified(serde_json::json!({"or": []})).is_false());
        assert!(simplified(serde_json::json!({"not": true})).is_false());
        assert!(simplified(serde_json::json!({"not": false})).is_true());
        assert!(simplified(serde_json::json!({"not": null})).is_null_literal());
        assert!(
            simplified(serde_json::json!({"and": [{"eq": {"a": 1}}, false]})).is_false()
        );
        assert!(simplified(serde_json::json!({"or": [{"eq": {"a": 1}}, true]})).is_true());
    }

    #[test]
    fn not_of_a_number_is_a_type_error() {
        let err = parse_expr(&serde_json::json!({"not": 5}))
            .unwrap()
            .partial_eval()
            .unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err.reason, Reason::NotBoolean { .. }));
    }

    #[test]
    fn conjunction_drops_identities_and_flattens() {
        let e = simplified(serde_json::json!(
            {"and": [true, {"eq": {"a": 1}}, null, {"and": [{"eq": {"b": 2}}]}]}
        ));
        assert_eq!(
            e,
            Expr::and(vec![
                Expr::eq(Expr::variable("a").unwrap(), Expr::integer(1)),
                Expr::eq(Expr::variable("b").unwrap(), Expr::integer(2)),
            ])
        );
    }

    #[test]
    fn literal_comparisons_fold() {
        assert!(simplified(serde_json::json!({"eq": [3, 3]})).is_true());
        assert!(simplified(serde_json::json!({"eq": [3, 3.0]})).is_true());
        assert!(simplified(serde_json::json!({"eq": [3, {"literal": "3"}]})).is_false());
        assert!(simplified(serde_json::json!({"ne": [3, 4]})).is_true());
        assert!(simplified(serde_json::json!({"gt": [4, 3]})).is_true());
        assert!(simplified(serde_json::json!({"lte": [4, 3]})).is_false());
        assert!(
            simplified(serde_json::json!({"lt": [{"literal": "a"}, {"literal": "b"}]})).is_true()
        );
    }

    #[test]
    fn eq_with_null_becomes_missing() {
        let e = simplified(serde_json::json!({"eq": ["a", null]}));
        assert_eq!(e, Expr::missing_of(Expr::variable("a").unwrap()));
    }

    #[test]
    fn membership_folds() {
        assert!(simplified(serde_json::json!({"in": [2, {"literal": [1, 2, 3]}]})).is_true());
        assert!(simplified(serde_json::json!({"in": [9, {"literal": [1, 2, 3]}]})).is_false());
        // a one-element set is an equality
        let e = simplified(serde_json::json!({"in": ["a", {"literal": [7]}]}));
        assert_eq!(e, Expr::eq(Expr::variable("a").unwrap(), Expr::integer(7)));
    }

    #[test]
    fn arithmetic_folds() {
        assert_eq!(
            simplified(serde_json::json!({"add": [1, 2, 3]})),
            Expr::integer(6)
        );
        assert_eq!(
            simplified(serde_json::json!({"sub": [5, 3]})),
            Expr::integer(2)
        );
        assert_eq!(
            simplified(serde_json::json!({"div": [1, 2]})),
            Expr::float(0.5)
        );
        // div by zero is missing
        assert!(simplified(serde_json::json!({"div": [1, 0]})).is_null_literal());
        // add propagates missing, sum ignores it
        assert!(simplified(serde_json::json!({"add": [1, null]})).is_null_literal());
        assert_eq!(
            simplified(serde_json::json!({"sum": [1, null, 2]})),
            Expr::integer(3)
        );
    }

    #[test]
    fn sum_keeps_symbolic_terms_and_folds_the_rest() {
        let e = simplified(serde_json::json!({"sum": ["a", 1, 2]}));
        assert_eq!(
            e,
            Expr::multi(
                MultiOperator::Add,
                vec![Expr::variable("a").unwrap(), Expr::integer(3)],
                true,
                Expr::null()
            )
        );
        // the identity folds away entirely
        let e = simplified(serde_json::json!({"sum": ["a", 1, -1]}));
        assert_eq!(e, Expr::variable("a").unwrap());
    }

    #[test]
    fn max_folds_literal_extremes() {
        assert_eq!(
            simplified(serde_json::json!({"max": [1, 5, 3]})),
            Expr::integer(5)
        );
        let e = simplified(serde_json::json!({"max": ["a", 1, 5]}));
        assert_eq!(
            e,
            Expr::max(vec![Expr::variable("a").unwrap(), Expr::integer(5)])
        );
        assert!(simplified(serde_json::json!({"max": [null]})).is_null_literal());
    }

    #[test]
    fn conditionals_collapse_on_literal_conditions() {
        assert_eq!(
            simplified(serde_json::json!({"when": true, "then": 1, "else": 2})),
            Expr::integer(1)
        );
        assert_eq!(
            simplified(serde_json::json!({"when": false, "then": 1, "else": 2})),
            Expr::integer(2)
        );
        assert_eq!(
            simplified(serde_json::json!({"when": null, "then": 1, "else": 2})),
            Expr::integer(2)
        );
        assert_eq!(
            simplified(serde_json::json!(
                {"case": [{"when": false, "then": 1}, {"when": true, "then": 2}, 9]}
            )),
            Expr::integer(2)
        );
    }

    #[test]
    fn string_operators_fold() {
        assert_eq!(
            simplified(serde_json::json!({"left": [{"literal": "hello"}, 2]})),
            Expr::string("he")
        );
        assert_eq!(
            simplified(serde_json::json!({"left": [{"literal": "hello"}, -2]})),
            Expr::null()
        );
        assert_eq!(
            simplified(serde_json::json!({"instr": [{"literal": "hello"}, {"literal": "llo"}]})),
            Expr::integer(2)
        );
        assert!(simplified(
            serde_json::json!({"instr": [{"literal": "hello"}, {"literal": "zz"}]})
        )
        .is_null_literal());
        assert_eq!(
            simplified(serde_json::json!(
                {"concat": [{"literal": "a"}, null, {"literal": "b"}], "separator": {"literal": "-"}}
            )),
            Expr::string("a-b")
        );
        assert!(
            simplified(serde_json::json!({"prefix": [{"literal": "hello"}, {"literal": "he"}]}))
                .is_true()
        );
        assert_eq!(
            simplified(serde_json::json!(
                {"between": [{"literal": "a<b>c"}, {"literal": "<"}, {"literal": ">"}]}
            )),
            Expr::string("b")
        );
    }

    #[test]
    fn regex_folds_as_a_full_match() {
        assert!(
            simplified(serde_json::json!({"regex": [{"literal": "v1.2"}, {"literal": "v1\\..*"}]}))
                .is_true()
        );
        assert!(
            simplified(serde_json::json!({"regex": [{"literal": "xv1.2"}, {"literal": "v1\\..*"}]}))
                .is_false()
        );
    }

    #[test]
    fn partial_eval_is_idempotent() {
        for json in [
            serde_json::json!({"and": [{"gt": {"a": 20}}, {"lt": {"a": 40}}, true]}),
            serde_json::json!({"sum": ["a", 1, 2]}),
            serde_json::json!({"missing": "a"}),
            serde_json::json!({"exists": "a"}),
            serde_json::json!({"coalesce": ["a", "b", 3]}),
            serde_json::json!({"case": [{"when": {"eq": {"x": 1}}, "then": 1}, 9]}),
        ] {
            let once = parse_expr(&json).unwrap().partial_eval().unwrap();
            let twice = once.partial_eval().unwrap();
            assert_eq!(once, twice, "{json}");
        }
    }

    #[test]
    fn missing_and_exists_normalize() {
        // missing of a literal is constant
        assert!(simplified(serde_json::json!({"missing": {"literal": "x"}})).is_false());
        assert!(simplified(serde_json::json!({"missing": null})).is_true());
        // missing of a variable stays symbolic
        let e = simplified(serde_json::json!({"missing": "a"}));
        assert_eq!(e, Expr::missing_of(Expr::variable("a").unwrap()));
        // exists is not-missing
        let e = simplified(serde_json::json!({"exists": "a"}));
        assert_eq!(
            e,
            Expr::not(Expr::missing_of(Expr::variable("a").unwrap()))
        );
    }

    #[test]
    fn coalesce_short_circuits_at_the_first_constant() {
        let e = simplified(serde_json::json!({"coalesce": [null, "a", 3, "b"]}));
        assert_eq!(
            e,
            Expr::coalesce(vec![Expr::variable("a").unwrap(), Expr::integer(3)])
        );
        assert!(simplified(serde_json::json!({"coalesce": [null, null]})).is_null_literal());
    }
}
