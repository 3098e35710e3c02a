//! Filter-DSL emission and canonicalization.
//!
//! Schema-shaped operators (`eq`/`ne`/inequalities/`in`/`missing`/`exists`/
//! `prefix`/`regex` over a variable and a literal) map onto native filters;
//! everything else falls back to a script filter. `simplify_esfilter`
//! normalizes the resulting tree: flattening `and`/`or`, collapsing
//! singletons, merging adjacent ranges, and treating `match_all` as the
//! identity and `{"not": {"match_all": {}}}` as the absurdity.

use anyhow::Result;
use serde_json::{json, Map, Value as Json};

use crate::ast::{Expr, ExprKind, InequalityOperator, OpTag};
use crate::translate::Language;
use crate::value::Value;

use super::{es_field, script_filter, to_esfilter, Context, FilterEmitter};

pub(super) fn es14() -> Language<FilterEmitter> {
    use OpTag::*;
    Language::base("es14").register([
        (Literal, emit_literal as FilterEmitter),
        (And, emit_and as FilterEmitter),
        (Or, emit_or as FilterEmitter),
        (Not, emit_not as FilterEmitter),
        (Eq, emit_eq as FilterEmitter),
        (Ne, emit_ne as FilterEmitter),
        (Gt, emit_inequality as FilterEmitter),
        (Gte, emit_inequality as FilterEmitter),
        (Lt, emit_inequality as FilterEmitter),
        (Lte, emit_inequality as FilterEmitter),
        (In, emit_in as FilterEmitter),
        (Missing, emit_missing as FilterEmitter),
        (Exists, emit_exists as FilterEmitter),
        (Prefix, emit_prefix as FilterEmitter),
        (RegExp, emit_regexp as FilterEmitter),
    ])
}

/// ES 1.7 inherits everything from 1.4 and reshapes two filters.
pub(super) fn es17(parent: &'static Language<FilterEmitter>) -> Language<FilterEmitter> {
    use OpTag::*;
    Language::extend("es17", parent).register([
        (Missing, emit_missing_17 as FilterEmitter),
        (RegExp, emit_regexp_17 as FilterEmitter),
    ])
}

fn match_all() -> Json {
    json!({"match_all": {}})
}

fn match_none() -> Json {
    json!({"not": {"match_all": {}}})
}

fn emit_literal(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Literal(value) = &expr.kind else {
        unreachable!("registered for literal")
    };
    match value {
        Value::Boolean(true) => Ok(match_all()),
        Value::Boolean(false) | Value::Null => Ok(match_none()),
        _ => script_filter(expr, ctx),
    }
}

fn emit_and(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::And(terms) = &expr.kind else {
        unreachable!("registered for and")
    };
    if terms.is_empty() {
        return Ok(match_all());
    }
    let filters: Vec<Json> = terms
        .iter()
        .map(|t| to_esfilter(t, ctx))
        .collect::<Result<_>>()?;
    Ok(json!({ "and": filters }))
}

fn emit_or(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Or(terms) = &expr.kind else {
        unreachable!("registered for or")
    };
    if terms.is_empty() {
        return Ok(match_none());
    }
    let filters: Vec<Json> = terms
        .iter()
        .map(|t| to_esfilter(t, ctx))
        .collect::<Result<_>>()?;
    Ok(json!({ "or": filters }))
}

fn emit_not(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Not(term) = &expr.kind else {
        unreachable!("registered for not")
    };
    Ok(json!({ "not": to_esfilter(term, ctx)? }))
}

/// `(variable, literal)` in either order, or `None`.
fn var_and_literal<'e>(left: &'e Expr, right: &'e Expr) -> Option<(&'e str, &'e Value)> {
    match (&left.kind, &right.kind) {
        (ExprKind::Variable(name), ExprKind::Literal(value)) => Some((name, value)),
        (ExprKind::Literal(value), ExprKind::Variable(name)) => Some((name, value)),
        _ => None,
    }
}

fn emit_eq(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Eq { left, right } = &expr.kind else {
        unreachable!("registered for eq")
    };
    match var_and_literal(left, right) {
        Some((name, Value::Array(items))) => {
            let values: Vec<Json> = items.iter().map(Value::to_json).collect();
            Ok(json!({"terms": {es_field(ctx, name): values}}))
        }
        Some((name, value)) => Ok(json!({"term": {es_field(ctx, name): value.to_json()}})),
        None => script_filter(expr, ctx),
    }
}

fn emit_ne(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Ne { left, right } = &expr.kind else {
        unreachable!("registered for ne")
    };
    match var_and_literal(left, right) {
        Some((name, Value::Array(items))) => {
            let values: Vec<Json> = items.iter().map(Value::to_json).collect();
            Ok(json!({"not": {"terms": {es_field(ctx, name): values}}}))
        }
        Some((name, value)) => {
            Ok(json!({"not": {"term": {es_field(ctx, name): value.to_json()}}}))
        }
        None => script_filter(expr, ctx),
    }
}

fn emit_inequality(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Inequality { op, left, right } = &expr.kind else {
        unreachable!("registered for inequality")
    };
    match (&left.kind, &right.kind) {
        (ExprKind::Variable(name), ExprKind::Literal(value)) => {
            Ok(json!({"range": {es_field(ctx, name): {op.tag().to_string(): value.to_json()}}}))
        }
        // a literal on the left flips around the comparison
        (ExprKind::Literal(value), ExprKind::Variable(name)) => {
            let flipped = match op {
                InequalityOperator::Gt => InequalityOperator::Lt,
                InequalityOperator::Gte => InequalityOperator::Lte,
                InequalityOperator::Lt => InequalityOperator::Gt,
                InequalityOperator::Lte => InequalityOperator::Gte,
            };
            Ok(json!(
                {"range": {es_field(ctx, name): {flipped.tag().to_string(): value.to_json()}}}
            ))
        }
        _ => script_filter(expr, ctx),
    }
}

fn emit_in(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::In { value, superset } = &expr.kind else {
        unreachable!("registered for in")
    };
    match (&value.kind, superset.literal_value()) {
        (ExprKind::Variable(name), Some(Value::Array(items))) => {
            let values: Vec<Json> = items.iter().map(Value::to_json).collect();
            Ok(json!({"terms": {es_field(ctx, name): values}}))
        }
        _ => script_filter(expr, ctx),
    }
}

fn emit_missing(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Missing(term) = &expr.kind else {
        unreachable!("registered for missing")
    };
    match &term.kind {
        ExprKind::Variable(name) => Ok(json!({"missing": {"field": es_field(ctx, name)}})),
        _ => script_filter(expr, ctx),
    }
}

fn emit_missing_17(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Missing(term) = &expr.kind else {
        unreachable!("registered for missing")
    };
    match &term.kind {
        ExprKind::Variable(name) => Ok(json!(
            {"bool": {"must_not": {"exists": {"field": es_field(ctx, name)}}}}
        )),
        _ => script_filter(expr, ctx),
    }
}

fn emit_exists(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Exists(term) = &expr.kind else {
        unreachable!("registered for exists")
    };
    match &term.kind {
        ExprKind::Variable(name) => Ok(json!({"exists": {"field": es_field(ctx, name)}})),
        _ => script_filter(expr, ctx),
    }
}

fn emit_prefix(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::Prefix { value, prefix } = &expr.kind else {
        unreachable!("registered for prefix")
    };
    match (&value.kind, prefix.literal_value()) {
        (ExprKind::Variable(name), Some(Value::String(p))) => {
            Ok(json!({"prefix": {es_field(ctx, name): p}}))
        }
        _ => script_filter(expr, ctx),
    }
}

fn emit_regexp(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::RegExp { value, pattern } = &expr.kind else {
        unreachable!("registered for regex")
    };
    match &value.kind {
        ExprKind::Variable(name) => Ok(json!({"regexp": {es_field(ctx, name): pattern}})),
        _ => script_filter(expr, ctx),
    }
}

fn emit_regexp_17(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    let ExprKind::RegExp { value, pattern } = &expr.kind else {
        unreachable!("registered for regex")
    };
    match &value.kind {
        ExprKind::Variable(name) => {
            Ok(json!({"regexp": {es_field(ctx, name): {"value": pattern}}}))
        }
        _ => script_filter(expr, ctx),
    }
}

// --- canonicalization ----------------------------------------------------

fn is_match_all(filter: &Json) -> bool {
    filter
        .as_object()
        .map(|o| o.len() == 1 && o.contains_key("match_all"))
        .unwrap_or(false)
}

fn is_match_none(filter: &Json) -> bool {
    filter
        .get("not")
        .map(is_match_all)
        .unwrap_or(false)
}

/// Normalize a filter tree. Pure and idempotent; cheap enough to re-enter.
pub fn simplify_esfilter(filter: &Json) -> Json {
    let Some(entries) = filter.as_object() else {
        return filter.clone();
    };
    if entries.len() != 1 {
        return filter.clone();
    }
    let (key, inner) = entries.iter().next().expect("one entry");
    match (key.as_str(), inner) {
        ("and", Json::Array(terms)) => {
            let mut out: Vec<Json> = Vec::with_capacity(terms.len());
            for term in terms {
                let term = simplify_esfilter(term);
                if is_match_all(&term) {
                    continue;
                }
                if is_match_none(&term) {
                    return match_none();
                }
                match term.get("and").and_then(Json::as_array) {
                    Some(nested) => out.extend(nested.iter().cloned()),
                    None => out.push(term),
                }
            }
            merge_ranges(&mut out);
            match out.len() {
                0 => match_all(),
                1 => out.pop().expect("one filter"),
                _ => json!({ "and": out }),
            }
        }
        ("or", Json::Array(terms)) => {
            let mut out: Vec<Json> = Vec::with_capacity(terms.len());
            for term in terms {
                let term = simplify_esfilter(term);
                if is_match_none(&term) {
                    continue;
                }
                if is_match_all(&term) {
                    return match_all();
                }
                match term.get("or").and_then(Json::as_array) {
                    Some(nested) => out.extend(nested.iter().cloned()),
                    None => out.push(term),
                }
            }
            match out.len() {
                0 => match_none(),
                1 => out.pop().expect("one filter"),
                _ => json!({ "or": out }),
            }
        }
        ("not", inner) => {
            // the absurdity is canonical; leave it alone
            if is_match_all(inner) {
                return filter.clone();
            }
            let inner = simplify_esfilter(inner);
            match inner.get("not") {
                Some(cancelled) => cancelled.clone(),
                None => json!({ "not": inner }),
            }
        }
        // a one-element set is a term filter
        ("terms", Json::Object(fields)) if fields.len() == 1 => {
            let (field, values) = fields.iter().next().expect("one entry");
            match values.as_array() {
                Some(values) if values.len() == 1 => {
                    json!({"term": {field.clone(): values[0].clone()}})
                }
                _ => filter.clone(),
            }
        }
        _ => filter.clone(),
    }
}

/// Merge adjacent `range` filters over the same field into one entry.
fn merge_ranges(filters: &mut Vec<Json>) {
    let mut merged: Vec<Json> = Vec::with_capacity(filters.len());
    for filter in filters.drain(..) {
        let field = filter
            .get("range")
            .and_then(Json::as_object)
            .filter(|o| o.len() == 1)
            .and_then(|o| o.keys().next().cloned());
        let Some(field) = field else {
            merged.push(filter);
            continue;
        };
        let existing = merged.iter_mut().find_map(|candidate| {
            candidate
                .get_mut("range")
                .and_then(Json::as_object_mut)
                .and_then(|o| o.get_mut(&field))
                .and_then(Json::as_object_mut)
        });
        match existing {
            Some(bounds) => {
                log::debug!("merging adjacent range filters on `{field}`");
                let incoming = filter["range"][&field]
                    .as_object()
                    .cloned()
                    .unwrap_or_else(Map::new);
                bounds.extend(incoming);
            }
            None => merged.push(filter),
        }
    }
    *filters = merged;
}
