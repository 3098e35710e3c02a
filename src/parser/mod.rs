//! JSON → AST.
//!
//! The wire format is deliberately loose (short forms, aliases, sequence or
//! mapping children) and this module owns all of that flexibility: the AST
//! it produces has exactly one representation per operator.
//!
//! Dispatch walks an object's entries in insertion order and lets the first
//! key that names a registered operator select the constructor; the sibling
//! keys become clauses (`default`, `separator`, `start`, …).

use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde_json::{Map, Value as Json};

use crate::ast::{BinaryOperator, Expr, InequalityOperator, MultiOperator, OpTag};
use crate::error::{Error, Reason};
use crate::value::{parse_date, Value};

pub fn parse_expr(json: &Json) -> Result<Expr> {
    match json {
        Json::Null => Ok(Expr::null()),
        Json::Bool(b) => Ok(Expr::boolean(*b)),
        Json::Number(_) => Ok(Expr::literal(Value::from_json(json))),
        Json::String(s) if s.is_empty() => Err(perr(
            Reason::Simple("expression is an empty string".to_string()),
            json,
        )),
        Json::String(s) => Expr::variable(s.as_str()),
        Json::Array(items) => Ok(Expr::tuple(
            items.iter().map(parse_expr).collect::<Result<_>>()?,
        )),
        Json::Object(entries) => parse_object(entries, json),
    }
}

fn perr(reason: Reason, cause: &Json) -> anyhow::Error {
    anyhow!(Error::new(reason).with_cause(cause.clone()))
}

/// Operator keys the registry resolves beyond [OpTag] proper.
enum Tag {
    Op(OpTag),
    /// `match_all` is the TRUE constant in filter clothing.
    MatchAll,
    /// `null` is the NULL constant.
    Null,
}

fn resolve_tag(key: &str) -> Option<Tag> {
    match key {
        "match_all" => Some(Tag::MatchAll),
        "null" => Some(Tag::Null),
        _ => OpTag::from_str(key).ok().map(Tag::Op),
    }
}

fn parse_object(entries: &Map<String, Json>, json: &Json) -> Result<Expr> {
    if entries.is_empty() {
        return Err(perr(Reason::Simple("expression is empty".to_string()), json));
    }
    // Every key naming an operator contributes a term; several operator keys
    // in one mapping ({"gte": …, "lt": …}) form a conjunction. The remaining
    // keys are clauses for whichever operator claims them.
    let mut terms = Vec::new();
    for (key, term) in entries {
        match resolve_tag(key) {
            Some(Tag::MatchAll) => terms.push(Expr::boolean(true)),
            Some(Tag::Null) => terms.push(Expr::null()),
            Some(Tag::Op(tag)) => terms.push(parse_op(tag, term, entries, json)?),
            None => continue,
        }
    }
    match terms.len() {
        0 => {
            let first = entries.keys().next().expect("non-empty").clone();
            Err(perr(Reason::UnknownOperator { op: first }, json))
        }
        1 => Ok(terms.pop().expect("one term")),
        _ => Ok(Expr::and(terms)),
    }
}

fn parse_op(tag: OpTag, term: &Json, entries: &Map<String, Json>, json: &Json) -> Result<Expr> {
    use OpTag::*;
    match tag {
        Literal => Ok(Expr::literal(Value::from_json(term))),
        Date => Ok(Expr::date(parse_date(term)?)),
        Script => {
            if !crate::scripting_allowed() {
                return Err(perr(Reason::ScriptingDisabled, json));
            }
            match term {
                Json::String(source) => Ok(Expr::script(source.clone())),
                _ => Err(expected(tag, "a script string", term)),
            }
        }
        Offset => match term.as_i64() {
            Some(i) => Ok(Expr::offset(i)),
            None => Err(expected(tag, "an integer", term)),
        },
        Variable => match term {
            Json::String(name) => Expr::variable(name.as_str()),
            _ => Err(expected(tag, "a variable name", term)),
        },
        Tuple => Ok(Expr::tuple(parse_list(term)?)),
        Leaves => Ok(Expr::leaves(parse_expr(term)?)),
        Coalesce => Ok(Expr::coalesce(parse_list(term)?)),
        Get => {
            let items = expect_array(tag, term, 2)?;
            let mut expr = parse_expr(&items[0])?;
            for index in &items[1..] {
                expr = Expr::get(expr, parse_expr(index)?);
            }
            Ok(expr)
        }
        Rows => {
            let items = expect_array(tag, term, 2)?;
            Ok(Expr::rows(parse_expr(&items[0])?, parse_expr(&items[1])?))
        }

        Sub | Exp | Mod => {
            let (left, right) = expect_pair(tag, term)?;
            let op = BinaryOperator::from_str(&tag.to_string()).expect("tag is a binary operator");
            Ok(Expr::binary(op, left, right))
        }
        Add => parse_multi(MultiOperator::Add, false, term, entries),
        Sum => parse_multi(MultiOperator::Add, true, term, entries),
        Mul => parse_multi(MultiOperator::Mul, false, term, entries),
        Div => {
            let (numer, denom) = expect_pair(tag, term)?;
            Ok(Expr::div(numer, denom, clause(entries, "default")?))
        }
        Floor => match term {
            Json::Array(_) => {
                let (value, modulo) = expect_pair(tag, term)?;
                Ok(Expr::floor(value, modulo))
            }
            _ => Ok(Expr::floor(parse_expr(term)?, Expr::integer(1))),
        },
        Abs => Ok(Expr::abs(parse_expr(term)?)),
        Number => Ok(Expr::number(parse_expr(term)?)),
        Unix => Ok(Expr::unix(parse_expr(term)?)),
        FromUnix => Ok(Expr::from_unix(parse_expr(term)?)),

        Eq => simple_or_pair(tag, term, &|field, value| {
            // equality against a list collapses to membership
            if value.is_array() {
                Ok(Expr::is_in(
                    Expr::variable(field)?,
                    Expr::literal(Value::from_json(value)),
                ))
            } else {
                Ok(Expr::eq(
                    Expr::variable(field)?,
                    Expr::literal(Value::from_json(value)),
                ))
            }
        }, &Expr::eq),
        Ne => simple_or_pair(tag, term, &|field, value| {
            if value.is_array() {
                Ok(Expr::not(Expr::is_in(
                    Expr::variable(field)?,
                    Expr::literal(Value::from_json(value)),
                )))
            } else {
                Ok(Expr::ne(
                    Expr::variable(field)?,
                    Expr::literal(Value::from_json(value)),
                ))
            }
        }, &Expr::ne),
        Gt | Gte | Lt | Lte => {
            let op = InequalityOperator::from_str(&tag.to_string())
                .expect("tag is an inequality operator");
            simple_or_pair(tag, term, &move |field, value| {
                Ok(Expr::inequality(
                    op,
                    Expr::variable(field)?,
                    Expr::literal(Value::from_json(value)),
                ))
            }, &move |l, r| Expr::inequality(op, l, r))
        }
        In => simple_or_pair(tag, term, &|field, value| {
            let superset = match value {
                Json::Array(_) => Value::from_json(value),
                scalar => Value::Array(vec![Value::from_json(scalar)]),
            };
            Ok(Expr::is_in(Expr::variable(field)?, Expr::literal(superset)))
        }, &Expr::is_in),
        Range => parse_range(term),

        And => Ok(Expr::and(parse_list(term)?)),
        Or => Ok(Expr::or(parse_list(term)?)),
        Not => Ok(Expr::not(parse_expr(term)?)),
        Missing => Ok(Expr::missing_of(parse_expr(term)?)),
        Exists => Ok(Expr::exists_of(parse_expr(term)?)),

        Length => Ok(Expr::length(parse_expr(term)?)),
        String => Ok(Expr::stringify(parse_expr(term)?)),
        Prefix => simple_or_pair(tag, term, &|field, value| {
            Ok(Expr::prefix(
                Expr::variable(field)?,
                Expr::literal(Value::from_json(value)),
            ))
        }, &Expr::prefix),
        Suffix => simple_or_pair(tag, term, &|field, value| {
            Ok(Expr::suffix(
                Expr::variable(field)?,
                Expr::literal(Value::from_json(value)),
            ))
        }, &Expr::suffix),
        Concat => Ok(Expr::concat(
            parse_list(term)?,
            clause(entries, "separator")?,
            clause(entries, "default")?,
        )),
        Left => parse_slice(tag, term, &Expr::left),
        Right => parse_slice(tag, term, &Expr::right),
        NotLeft => parse_slice(tag, term, &Expr::not_left),
        NotRight => parse_slice(tag, term, &Expr::not_right),
        Find => {
            let start = start_clause(entries)?;
            let default = clause(entries, "default")?;
            match term {
                Json::Object(fields) => {
                    let mut terms = Vec::with_capacity(fields.len());
                    for (field, value) in fields {
                        terms.push(Expr::find(
                            Expr::variable(field.as_str())?,
                            Expr::literal(Value::from_json(value)),
                            start.clone(),
                            default.clone(),
                        ));
                    }
                    match terms.len() {
                        1 => Ok(terms.pop().expect("one term")),
                        _ => Ok(Expr::and(terms)),
                    }
                }
                _ => {
                    let (value, find) = expect_pair(tag, term)?;
                    Ok(Expr::find(value, find, start, default))
                }
            }
        }
        Split => {
            let (value, separator) = expect_pair(tag, term)?;
            Ok(Expr::split(value, separator))
        }
        Between => parse_between(term, entries),
        RegExp => parse_regexp(term),

        BasicIndexOf => {
            let items = expect_array(tag, term, 2)?;
            let start = match items.get(2) {
                Some(s) => parse_expr(s)?,
                None => Expr::integer(0),
            };
            Ok(Expr::basic_index_of(
                parse_expr(&items[0])?,
                parse_expr(&items[1])?,
                start,
            ))
        }
        BasicStartsWith => {
            let (value, prefix) = expect_pair(tag, term)?;
            Ok(Expr::basic_starts_with(value, prefix))
        }
        BasicSubstring => {
            let items = expect_array(tag, term, 3)?;
            Ok(Expr::basic_substring(
                parse_expr(&items[0])?,
                parse_expr(&items[1])?,
                parse_expr(&items[2])?,
            ))
        }
        BasicEq => {
            let (left, right) = expect_pair(tag, term)?;
            Ok(Expr::basic_eq(left, right))
        }
        SqlInstr => {
            let (value, find) = expect_pair(tag, term)?;
            Ok(Expr::sql_instr(value, find))
        }
        SqlSubstr => {
            let items = expect_array(tag, term, 2)?;
            let length = match items.get(2) {
                Some(l) => parse_expr(l)?,
                None => Expr::null(),
            };
            Ok(Expr::sql_substr(
                parse_expr(&items[0])?,
                parse_expr(&items[1])?,
                length,
            ))
        }

        When => Ok(Expr::when(
            parse_expr(term)?,
            clause(entries, "then")?,
            clause(entries, "else")?,
        )),
        Case => {
            let clauses = parse_list(term)?;
            Expr::case(clauses)
        }
        Count => Ok(Expr::count(parse_list(term)?)),
        Max => Ok(Expr::max(parse_list(term)?)),
        Min => Ok(Expr::min(parse_list(term)?)),
    }
}

fn expected(tag: OpTag, what: &str, found: &Json) -> anyhow::Error {
    anyhow!(Error::new(Reason::Expected {
        who: Some(format!("`{tag}`")),
        expected: what.to_string(),
        found: found.to_string(),
    })
    .with_cause(found.clone()))
}

/// Parse a clause entry, defaulting to the NULL literal when absent.
fn clause(entries: &Map<String, Json>, name: &str) -> Result<Expr> {
    match entries.get(name) {
        Some(json) => parse_expr(json),
        None => Ok(Expr::null()),
    }
}

fn start_clause(entries: &Map<String, Json>) -> Result<Expr> {
    match entries.get("start") {
        Some(json) => parse_expr(json),
        None => Ok(Expr::integer(0)),
    }
}

/// A sequence term, or a lone expression treated as a one-element sequence.
fn parse_list(term: &Json) -> Result<Vec<Expr>> {
    match term {
        Json::Array(items) => items.iter().map(parse_expr).collect(),
        _ => Ok(vec![parse_expr(term)?]),
    }
}

fn expect_array<'a>(tag: OpTag, term: &'a Json, at_least: usize) -> Result<&'a Vec<Json>> {
    match term {
        Json::Array(items) if items.len() >= at_least => Ok(items),
        _ => Err(expected(
            tag,
            &format!("a sequence of at least {at_least} operands"),
            term,
        )),
    }
}

fn expect_pair(tag: OpTag, term: &Json) -> Result<(Expr, Expr)> {
    match term {
        Json::Array(items) if items.len() == 2 => {
            Ok((parse_expr(&items[0])?, parse_expr(&items[1])?))
        }
        _ => Err(expected(tag, "a sequence of two operands", term)),
    }
}

/// Handle an operator that accepts both the pair form `{op: [a, b]}` and the
/// short form `{op: {field: value, …}}`; multiple short-form entries expand
/// to a conjunction.
fn simple_or_pair(
    tag: OpTag,
    term: &Json,
    short: &dyn Fn(&str, &Json) -> Result<Expr>,
    pair: &dyn Fn(Expr, Expr) -> Expr,
) -> Result<Expr> {
    match term {
        Json::Object(fields) if tag.has_simple_form() => {
            let mut terms = Vec::with_capacity(fields.len());
            for (field, value) in fields {
                terms.push(short(field, value)?);
            }
            match terms.len() {
                1 => Ok(terms.pop().expect("one term")),
                _ => Ok(Expr::and(terms)),
            }
        }
        _ => {
            let (left, right) = expect_pair(tag, term)?;
            Ok(pair(left, right))
        }
    }
}

fn parse_slice(
    tag: OpTag,
    term: &Json,
    build: &dyn Fn(Expr, Expr) -> Expr,
) -> Result<Expr> {
    simple_or_pair(tag, term, &|field, value| {
        Ok(build(
            Expr::variable(field)?,
            Expr::literal(Value::from_json(value)),
        ))
    }, build)
}

/// `{"range": {field: {op: value, …}}}` desugars into a conjunction of
/// inequalities at parse time; `range` has no AST node.
fn parse_range(term: &Json) -> Result<Expr> {
    let fields = match term {
        Json::Object(fields) => fields,
        _ => return Err(expected(OpTag::Range, "a mapping of fields to bounds", term)),
    };
    let mut terms = Vec::new();
    for (field, bounds) in fields {
        let bounds = match bounds {
            Json::Object(bounds) => bounds,
            _ => {
                return Err(expected(
                    OpTag::Range,
                    "a mapping of comparison operators to values",
                    bounds,
                ))
            }
        };
        for (op, value) in bounds {
            let op = InequalityOperator::from_str(op).map_err(|_| {
                perr(
                    Reason::UnknownOperator {
                        op: op.to_string(),
                    },
                    term,
                )
            })?;
            terms.push(Expr::inequality(
                op,
                Expr::variable(field.as_str())?,
                Expr::literal(Value::from_json(value)),
            ));
        }
    }
    match terms.len() {
        1 => Ok(terms.pop().expect("one term")),
        _ => Ok(Expr::and(terms)),
    }
}

fn parse_multi(
    op: MultiOperator,
    nulls: bool,
    term: &Json,
    entries: &Map<String, Json>,
) -> Result<Expr> {
    let nulls = match entries.get("nulls") {
        Some(Json::Bool(b)) => *b,
        _ => nulls,
    };
    Ok(Expr::multi(
        op,
        parse_list(term)?,
        nulls,
        clause(entries, "default")?,
    ))
}

fn parse_between(term: &Json, entries: &Map<String, Json>) -> Result<Expr> {
    let start = start_clause(entries)?;
    let default = clause(entries, "default")?;
    match term {
        // {"between": {field: [prefix, suffix]}}
        Json::Object(fields) => {
            let mut terms = Vec::new();
            for (field, bounds) in fields {
                let bounds = match bounds {
                    Json::Array(items) if items.len() == 2 => items,
                    _ => {
                        return Err(expected(
                            OpTag::Between,
                            "a [prefix, suffix] pair",
                            bounds,
                        ))
                    }
                };
                terms.push(Expr::between(
                    Expr::variable(field.as_str())?,
                    Expr::literal(Value::from_json(&bounds[0])),
                    Expr::literal(Value::from_json(&bounds[1])),
                    start.clone(),
                    default.clone(),
                ));
            }
            match terms.len() {
                1 => Ok(terms.pop().expect("one term")),
                _ => Ok(Expr::and(terms)),
            }
        }
        Json::Array(items) if items.len() == 3 => Ok(Expr::between(
            parse_expr(&items[0])?,
            parse_expr(&items[1])?,
            parse_expr(&items[2])?,
            start,
            default,
        )),
        _ => Err(expected(
            OpTag::Between,
            "a [value, prefix, suffix] sequence or a short form",
            term,
        )),
    }
}

fn parse_regexp(term: &Json) -> Result<Expr> {
    match term {
        // {"regex": {field: pattern}}
        Json::Object(fields) if fields.len() == 1 => {
            let (field, pattern) = fields.iter().next().expect("one entry");
            let pattern = pattern
                .as_str()
                .ok_or_else(|| expected(OpTag::RegExp, "a pattern string", pattern))?;
            Ok(Expr::regexp(Expr::variable(field.as_str())?, pattern))
        }
        Json::Array(items) if items.len() == 2 => {
            let value = parse_expr(&items[0])?;
            let pattern = match &items[1] {
                Json::String(s) => s.clone(),
                Json::Object(entries) => match entries.get("literal") {
                    Some(Json::String(s)) => s.clone(),
                    _ => return Err(expected(OpTag::RegExp, "a pattern string", &items[1])),
                },
                other => return Err(expected(OpTag::RegExp, "a pattern string", other)),
            };
            Ok(Expr::regexp(value, pattern))
        }
        _ => Err(expected(
            OpTag::RegExp,
            "a [value, pattern] sequence or a short form",
            term,
        )),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    fn parse(json: Json) -> Expr {
        parse_expr(&json).unwrap()
    }

    fn var(name: &str) -> Expr {
        Expr::variable(name).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(parse(json!(null)), Expr::null());
        assert_eq!(parse(json!(true)), Expr::boolean(true));
        assert_eq!(parse(json!(3)), Expr::integer(3));
        assert_eq!(parse(json!("a.b")), var("a.b"));
        assert!(parse_expr(&json!("")).is_err());
        assert!(parse_expr(&json!("not a name!")).is_err());
    }

    #[test]
    fn short_form_expands_to_a_conjunction() {
        let e = parse(json!({"eq": {"a": 1, "b": 2}}));
        assert_eq!(
            e,
            Expr::and(vec![
                Expr::eq(var("a"), Expr::integer(1)),
                Expr::eq(var("b"), Expr::integer(2)),
            ])
        );
        // and round-trips through its canonical form
        assert_eq!(parse(e.to_json()), e);
    }

    #[test]
    fn eq_against_a_list_collapses_to_in() {
        let e = parse(json!({"eq": {"a": [1, 2, 3]}}));
        assert_eq!(
            e,
            Expr::is_in(
                var("a"),
                Expr::literal(Value::Array(vec![
                    Value::Integer(1),
                    Value::Integer(2),
                    Value::Integer(3),
                ]))
            )
        );
        assert_eq!(parse(e.to_json()), e);
    }

    #[test]
    fn range_desugars_at_parse_time() {
        let e = parse(json!({"range": {"a": {"gt": 20, "lt": 40}}}));
        assert_eq!(
            e,
            Expr::and(vec![
                Expr::inequality(InequalityOperator::Gt, var("a"), Expr::integer(20)),
                Expr::inequality(InequalityOperator::Lt, var("a"), Expr::integer(40)),
            ])
        );
    }

    #[test]
    fn aliases_are_accepted() {
        assert_eq!(
            parse(json!({"term": {"a": 1}})),
            Expr::eq(var("a"), Expr::integer(1))
        );
        assert_eq!(
            parse(json!({"terms": {"a": [1]}})),
            parse(json!({"in": {"a": [1]}}))
        );
        assert_eq!(
            parse(json!({"subtract": ["a", 1]})),
            Expr::binary(BinaryOperator::Sub, var("a"), Expr::integer(1))
        );
        assert_eq!(parse(json!({"match_all": {}})), Expr::boolean(true));
        assert_eq!(parse(json!({"null": {}})), Expr::null());
    }

    #[test]
    fn unknown_operators_are_named() {
        let err = parse_expr(&json!({"frobnicate": 1})).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err.reason, Reason::UnknownOperator { op } if op == "frobnicate"));
    }

    #[test]
    fn scripting_is_gated() {
        let err = parse_expr(&json!({"script": "doc.a"})).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err.reason, Reason::ScriptingDisabled));
    }

    #[test]
    fn clauses_ride_alongside_the_operator() {
        let e = parse(json!({"instr": ["a", {"literal": "x"}], "start": 2}));
        assert_eq!(
            e,
            Expr::find(var("a"), Expr::string("x"), Expr::integer(2), Expr::null())
        );

        let c = parse(json!({"concat": ["first", "last"], "separator": {"literal": " "}}));
        assert_eq!(
            c,
            Expr::concat(
                vec![var("first"), var("last")],
                Expr::string(" "),
                Expr::null()
            )
        );
    }

    #[test]
    fn when_reads_its_branches_from_clauses() {
        let e = parse(json!({"when": {"eq": {"a": 1}}, "then": 10, "else": 20}));
        assert_eq!(
            e,
            Expr::when(
                Expr::eq(var("a"), Expr::integer(1)),
                Expr::integer(10),
                Expr::integer(20)
            )
        );
    }

    #[test]
    fn date_literals_parse_to_unix_seconds() {
        assert_eq!(parse(json!({"date": "2015-04-23"})), Expr::date(1429747200.0));
        assert_eq!(parse(json!({"date": 1429747200})), Expr::date(1429747200.0));
    }

    #[test]
    fn data_round_trips() {
        for json in [
            json!({"eq": {"a": 1, "b": 2}}),
            json!({"and": [{"gt": {"a": 20}}, {"lt": {"a": 40}}]}),
            json!({"eq": {"a": [1, 2, 3]}}),
            json!({"ne": {"a": 1}}),
            json!({"concat": ["first", "last"], "separator": {"literal": " "}}),
            json!({"case": [{"when": "a", "then": 1}, 9]}),
            json!({"sum": ["a", "b"]}),
            json!({"missing": "a"}),
            json!({"between": ["a", {"literal": "<"}, {"literal": ">"}]}),
        ] {
            let parsed = parse_expr(&json).unwrap();
            assert_eq!(parse_expr(&parsed.to_json()).unwrap(), parsed, "{json}");
        }
    }
}
