//! Round-trip back to the JSON that produced an expression.
//!
//! `to_json` emits the *canonical* form: list-form children, canonical
//! operator tags, clauses omitted when they hold the defaults. Parsing the
//! result reproduces a structurally equal tree.

use serde_json::{Map, Value as Json};

use super::{Expr, ExprKind, OpTag};
use crate::value::Value;

fn op(tag: OpTag, term: Json) -> Json {
    let mut entries = Map::new();
    entries.insert(tag.to_string(), term);
    Json::Object(entries)
}

fn op_with(tag: OpTag, term: Json, clauses: &[(&str, Option<Json>)]) -> Json {
    let mut entries = Map::new();
    entries.insert(tag.to_string(), term);
    for (name, value) in clauses {
        if let Some(value) = value {
            entries.insert(name.to_string(), value.clone());
        }
    }
    Json::Object(entries)
}

/// A clause value, `None` when it still holds its default.
fn clause(expr: &Expr) -> Option<Json> {
    if expr.is_null_literal() {
        None
    } else {
        Some(expr.to_json())
    }
}

fn start_clause(expr: &Expr) -> Option<Json> {
    match expr.literal_value() {
        Some(Value::Integer(0)) | Some(Value::Null) => None,
        _ => Some(expr.to_json()),
    }
}

fn list(terms: &[Expr]) -> Json {
    Json::Array(terms.iter().map(Expr::to_json).collect())
}

fn pair(left: &Expr, right: &Expr) -> Json {
    Json::Array(vec![left.to_json(), right.to_json()])
}

impl Expr {
    pub fn to_json(&self) -> Json {
        use ExprKind::*;
        match &self.kind {
            Variable(name) => Json::String(name.clone()),
            Offset(i) => op(OpTag::Offset, Json::from(*i)),
            Literal(value) => match value {
                // bare scalars are unambiguous
                Value::Null => Json::Null,
                Value::Boolean(b) => Json::Bool(*b),
                Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => value.to_json(),
                Value::Date(_) | Value::Duration(_) => value.to_json(),
                // strings would read back as variables, arrays as tuples
                Value::String(_) | Value::Array(_) | Value::Object(_) => {
                    op(OpTag::Literal, value.to_json())
                }
            },
            Date(seconds) => op(OpTag::Date, Value::Date(*seconds).to_json()),
            Script(source) => op(OpTag::Script, Json::String(source.clone())),
            Tuple(terms) => list(terms),
            Leaves(t) => op(OpTag::Leaves, t.to_json()),
            Coalesce(terms) => op(OpTag::Coalesce, list(terms)),
            Get { container, index } => op(OpTag::Get, pair(container, index)),
            Rows { var, offset } => op(OpTag::Rows, pair(var, offset)),
            Binary { op: o, left, right } => op(o.tag(), pair(left, right)),
            Multi { terms, default, .. } => {
                let nulls = match &self.kind {
                    // `add`/`sum` encode the nulls flag in the tag
                    Multi { op: super::MultiOperator::Mul, nulls: true, .. } => {
                        Some(Json::Bool(true))
                    }
                    _ => None,
                };
                op_with(
                    self.op_tag(),
                    list(terms),
                    &[("nulls", nulls), ("default", clause(default))],
                )
            }
            Div {
                numer,
                denom,
                default,
            } => op_with(
                OpTag::Div,
                pair(numer, denom),
                &[("default", clause(default))],
            ),
            Floor { term, modulo } => op(OpTag::Floor, pair(term, modulo)),
            Abs(t) => op(OpTag::Abs, t.to_json()),
            Number(t) => op(OpTag::Number, t.to_json()),
            Unix(t) => op(OpTag::Unix, t.to_json()),
            FromUnix(t) => op(OpTag::FromUnix, t.to_json()),
            Eq { left, right } => op(OpTag::Eq, pair(left, right)),
            Ne { left, right } => op(OpTag::Ne, pair(left, right)),
            Inequality { op: o, left, right } => op(o.tag(), pair(left, right)),
            In { value, superset } => op(OpTag::In, pair(value, superset)),
            And(terms) => op(OpTag::And, list(terms)),
            Or(terms) => op(OpTag::Or, list(terms)),
            Not(t) => op(OpTag::Not, t.to_json()),
            Missing(t) => op(OpTag::Missing, t.to_json()),
            Exists(t) => op(OpTag::Exists, t.to_json()),
            Length(t) => op(OpTag::Length, t.to_json()),
            String(t) => op(OpTag::String, t.to_json()),
            Prefix { value, prefix } => op(OpTag::Prefix, pair(value, prefix)),
            Suffix { value, suffix } => op(OpTag::Suffix, pair(value, suffix)),
            Concat {
                terms,
                separator,
                default,
            } => op_with(
                OpTag::Concat,
                list(terms),
                &[
                    ("separator", clause(separator)),
                    ("default", clause(default)),
                ],
            ),
            Left { value, length } => op(OpTag::Left, pair(value, length)),
            Right { value, length } => op(OpTag::Right, pair(value, length)),
            NotLeft { value, length } => op(OpTag::NotLeft, pair(value, length)),
            NotRight { value, length } => op(OpTag::NotRight, pair(value, length)),
            Find {
                value,
                find,
                start,
                default,
            } => op_with(
                OpTag::Find,
                pair(value, find),
                &[("start", start_clause(start)), ("default", clause(default))],
            ),
            Split { value, separator } => op(OpTag::Split, pair(value, separator)),
            Between {
                value,
                prefix,
                suffix,
                start,
                default,
            } => op_with(
                OpTag::Between,
                Json::Array(vec![value.to_json(), prefix.to_json(), suffix.to_json()]),
                &[("start", start_clause(start)), ("default", clause(default))],
            ),
            RegExp { value, pattern } => op(
                OpTag::RegExp,
                Json::Array(vec![
                    value.to_json(),
                    op(OpTag::Literal, Json::String(pattern.clone())),
                ]),
            ),
            BasicIndexOf { value, find, start } => op(
                OpTag::BasicIndexOf,
                Json::Array(vec![value.to_json(), find.to_json(), start.to_json()]),
            ),
            BasicStartsWith { value, prefix } => op(OpTag::BasicStartsWith, pair(value, prefix)),
            BasicSubstring { value, start, end } => op(
                OpTag::BasicSubstring,
                Json::Array(vec![value.to_json(), start.to_json(), end.to_json()]),
            ),
            BasicEq { left, right } => op(OpTag::BasicEq, pair(left, right)),
            SqlInstr { value, find } => op(OpTag::SqlInstr, pair(value, find)),
            SqlSubstr {
                value,
                start,
                length,
            } => op(
                OpTag::SqlSubstr,
                Json::Array(vec![value.to_json(), start.to_json(), length.to_json()]),
            ),
            When { cond, then, els } => op_with(
                OpTag::When,
                cond.to_json(),
                &[("then", clause(then)), ("else", clause(els))],
            ),
            Case { whens, default } => {
                let mut clauses: Vec<Json> = whens.iter().map(Expr::to_json).collect();
                if !default.is_null_literal() {
                    clauses.push(default.to_json());
                }
                op(OpTag::Case, Json::Array(clauses))
            }
            Count(terms) => op(OpTag::Count, list(terms)),
            Max(terms) => op(OpTag::Max, list(terms)),
            Min(terms) => op(OpTag::Min, list(terms)),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_stay_bare_where_unambiguous() {
        assert_eq!(Expr::null().to_json(), json!(null));
        assert_eq!(Expr::boolean(true).to_json(), json!(true));
        assert_eq!(Expr::integer(7).to_json(), json!(7));
        assert_eq!(Expr::string("x").to_json(), json!({"literal": "x"}));
        assert_eq!(Expr::variable("a.b").unwrap().to_json(), json!("a.b"));
    }

    #[test]
    fn operators_emit_canonical_tags() {
        let e = Expr::eq(Expr::variable("a").unwrap(), Expr::integer(1));
        assert_eq!(e.to_json(), json!({"eq": ["a", 1]}));

        let f = Expr::find(
            Expr::variable("a").unwrap(),
            Expr::string("x"),
            Expr::integer(0),
            Expr::null(),
        );
        assert_eq!(f.to_json(), json!({"instr": ["a", {"literal": "x"}]}));
    }

    #[test]
    fn clauses_are_omitted_at_their_defaults() {
        let c = Expr::concat(
            vec![Expr::variable("first").unwrap()],
            Expr::string(" "),
            Expr::null(),
        );
        assert_eq!(
            c.to_json(),
            json!({"concat": ["first"], "separator": {"literal": " "}})
        );

        let w = Expr::when(Expr::variable("a").unwrap(), Expr::integer(1), Expr::null());
        assert_eq!(w.to_json(), json!({"when": "a", "then": 1}));
    }

    #[test]
    fn dates_round_trip_numerically() {
        assert_eq!(
            Expr::date(1429747200.0).to_json(),
            json!({"date": 1429747200})
        );
    }
}
