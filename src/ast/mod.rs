//! The expression AST.
//!
//! [Expr] wraps an [ExprKind] with the `simplified` flag that
//! [partial_eval](Expr::partial_eval) sets once a node is at its fixpoint.
//! Nodes are immutable after construction; all the intrinsic methods
//! (`vars`, `map`, `missing`, `to_json`, …) are pure functions of the tree.

mod data;
mod expr;
mod missing;
mod ops;
mod vars;

pub use expr::ExprKind;
pub use ops::{BinaryOperator, InequalityOperator, MultiOperator, OpTag};

use anyhow::{anyhow, Result};

use crate::error::{Error, Reason};
use crate::path::is_variable_name;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// Set once `partial_eval` has brought this node to its fixpoint;
    /// short-circuits re-entry.
    pub simplified: bool,
}

/// Structural equality ignores the `simplified` bookkeeping.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Expr {
        Expr {
            kind,
            simplified: false,
        }
    }

    pub fn op_tag(&self) -> OpTag {
        self.kind.op_tag()
    }

    // --- constants -------------------------------------------------------

    pub fn null() -> Expr {
        Expr::new(ExprKind::Literal(Value::Null))
    }

    pub fn boolean(b: bool) -> Expr {
        Expr::new(ExprKind::Literal(Value::Boolean(b)))
    }

    /// Wrap a value as a constant, routing the nullish shapes to their
    /// canonical forms: `null` and the empty string to the `NULL` singleton,
    /// booleans to `TRUE`/`FALSE`, and `{"date": n}`-shaped objects to a
    /// date constant.
    pub fn literal(value: Value) -> Expr {
        match value {
            Value::String(s) if s.is_empty() => Expr::null(),
            Value::Object(entries)
                if entries.len() == 1 && entries.keys().next().map(String::as_str) == Some("date") =>
            {
                match entries.values().next().and_then(Value::as_number) {
                    Some(seconds) => Expr::date(seconds),
                    None => Expr::new(ExprKind::Literal(Value::Object(entries))),
                }
            }
            other => Expr::new(ExprKind::Literal(other)),
        }
    }

    pub fn integer(i: i64) -> Expr {
        Expr::new(ExprKind::Literal(Value::Integer(i)))
    }

    pub fn float(f: f64) -> Expr {
        Expr::new(ExprKind::Literal(Value::Float(f)))
    }

    pub fn string<S: Into<String>>(s: S) -> Expr {
        Expr::literal(Value::String(s.into()))
    }

    pub fn date(seconds: f64) -> Expr {
        Expr::new(ExprKind::Date(seconds))
    }

    // --- atoms -----------------------------------------------------------

    pub fn variable<S: Into<String>>(name: S) -> Result<Expr> {
        let name = name.into();
        if !is_variable_name(&name) {
            return Err(anyhow!(Error::new(Reason::InvalidVariable { name })));
        }
        Ok(Expr::new(ExprKind::Variable(name)))
    }

    pub fn offset(i: i64) -> Expr {
        Expr::new(ExprKind::Offset(i))
    }

    pub fn script<S: Into<String>>(source: S) -> Expr {
        Expr::new(ExprKind::Script(source.into()))
    }

    // --- compound data ---------------------------------------------------

    pub fn tuple(exprs: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Tuple(exprs))
    }

    pub fn leaves(term: Expr) -> Expr {
        Expr::new(ExprKind::Leaves(Box::new(term)))
    }

    pub fn coalesce(terms: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Coalesce(terms))
    }

    pub fn get(container: Expr, index: Expr) -> Expr {
        Expr::new(ExprKind::Get {
            container: Box::new(container),
            index: Box::new(index),
        })
    }

    pub fn rows(var: Expr, offset: Expr) -> Expr {
        Expr::new(ExprKind::Rows {
            var: Box::new(var),
            offset: Box::new(offset),
        })
    }

    // --- arithmetic ------------------------------------------------------

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn multi(op: MultiOperator, terms: Vec<Expr>, nulls: bool, default: Expr) -> Expr {
        Expr::new(ExprKind::Multi {
            op,
            terms,
            nulls,
            default: Box::new(default),
        })
    }

    pub fn div(numer: Expr, denom: Expr, default: Expr) -> Expr {
        Expr::new(ExprKind::Div {
            numer: Box::new(numer),
            denom: Box::new(denom),
            default: Box::new(default),
        })
    }

    pub fn floor(term: Expr, modulo: Expr) -> Expr {
        Expr::new(ExprKind::Floor {
            term: Box::new(term),
            modulo: Box::new(modulo),
        })
    }

    pub fn abs(term: Expr) -> Expr {
        Expr::new(ExprKind::Abs(Box::new(term)))
    }

    pub fn number(term: Expr) -> Expr {
        Expr::new(ExprKind::Number(Box::new(term)))
    }

    pub fn unix(term: Expr) -> Expr {
        Expr::new(ExprKind::Unix(Box::new(term)))
    }

    pub fn from_unix(term: Expr) -> Expr {
        Expr::new(ExprKind::FromUnix(Box::new(term)))
    }

    // --- comparison ------------------------------------------------------

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::new(ExprKind::Eq {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn ne(left: Expr, right: Expr) -> Expr {
        Expr::new(ExprKind::Ne {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn inequality(op: InequalityOperator, left: Expr, right: Expr) -> Expr {
        Expr::new(ExprKind::Inequality {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn is_in(value: Expr, superset: Expr) -> Expr {
        Expr::new(ExprKind::In {
            value: Box::new(value),
            superset: Box::new(superset),
        })
    }

    // --- boolean ---------------------------------------------------------

    pub fn and(terms: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::And(terms))
    }

    pub fn or(terms: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Or(terms))
    }

    pub fn not(term: Expr) -> Expr {
        Expr::new(ExprKind::Not(Box::new(term)))
    }

    pub fn missing_of(term: Expr) -> Expr {
        Expr::new(ExprKind::Missing(Box::new(term)))
    }

    pub fn exists_of(term: Expr) -> Expr {
        Expr::new(ExprKind::Exists(Box::new(term)))
    }

    // --- strings ---------------------------------------------------------

    pub fn length(term: Expr) -> Expr {
        Expr::new(ExprKind::Length(Box::new(term)))
    }

    pub fn stringify(term: Expr) -> Expr {
        Expr::new(ExprKind::String(Box::new(term)))
    }

    pub fn prefix(value: Expr, prefix: Expr) -> Expr {
        Expr::new(ExprKind::Prefix {
            value: Box::new(value),
            prefix: Box::new(prefix),
        })
    }

    pub fn suffix(value: Expr, suffix: Expr) -> Expr {
        Expr::new(ExprKind::Suffix {
            value: Box::new(value),
            suffix: Box::new(suffix),
        })
    }

    pub fn concat(terms: Vec<Expr>, separator: Expr, default: Expr) -> Expr {
        Expr::new(ExprKind::Concat {
            terms,
            separator: Box::new(separator),
            default: Box::new(default),
        })
    }

    pub fn left(value: Expr, length: Expr) -> Expr {
        Expr::new(ExprKind::Left {
            value: Box::new(value),
            length: Box::new(length),
        })
    }

    pub fn right(value: Expr, length: Expr) -> Expr {
        Expr::new(ExprKind::Right {
            value: Box::new(value),
            length: Box::new(length),
        })
    }

    pub fn not_left(value: Expr, length: Expr) -> Expr {
        Expr::new(ExprKind::NotLeft {
            value: Box::new(value),
            length: Box::new(length),
        })
    }

    pub fn not_right(value: Expr, length: Expr) -> Expr {
        Expr::new(ExprKind::NotRight {
            value: Box::new(value),
            length: Box::new(length),
        })
    }

    pub fn find(value: Expr, find: Expr, start: Expr, default: Expr) -> Expr {
        Expr::new(ExprKind::Find {
            value: Box::new(value),
            find: Box::new(find),
            start: Box::new(start),
            default: Box::new(default),
        })
    }

    pub fn split(value: Expr, separator: Expr) -> Expr {
        Expr::new(ExprKind::Split {
            value: Box::new(value),
            separator: Box::new(separator),
        })
    }

    pub fn between(value: Expr, prefix: Expr, suffix: Expr, start: Expr, default: Expr) -> Expr {
        Expr::new(ExprKind::Between {
            value: Box::new(value),
            prefix: Box::new(prefix),
            suffix: Box::new(suffix),
            start: Box::new(start),
            default: Box::new(default),
        })
    }

    pub fn regexp<S: Into<String>>(value: Expr, pattern: S) -> Expr {
        Expr::new(ExprKind::RegExp {
            value: Box::new(value),
            pattern: pattern.into(),
        })
    }

    pub fn basic_index_of(value: Expr, find: Expr, start: Expr) -> Expr {
        Expr::new(ExprKind::BasicIndexOf {
            value: Box::new(value),
            find: Box::new(find),
            start: Box::new(start),
        })
    }

    pub fn basic_starts_with(value: Expr, prefix: Expr) -> Expr {
        Expr::new(ExprKind::BasicStartsWith {
            value: Box::new(value),
            prefix: Box::new(prefix),
        })
    }

    pub fn basic_substring(value: Expr, start: Expr, end: Expr) -> Expr {
        Expr::new(ExprKind::BasicSubstring {
            value: Box::new(value),
            start: Box::new(start),
            end: Box::new(end),
        })
    }

    pub fn basic_eq(left: Expr, right: Expr) -> Expr {
        Expr::new(ExprKind::BasicEq {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn sql_instr(value: Expr, find: Expr) -> Expr {
        Expr::new(ExprKind::SqlInstr {
            value: Box::new(value),
            find: Box::new(find),
        })
    }

    pub fn sql_substr(value: Expr, start: Expr, length: Expr) -> Expr {
        Expr::new(ExprKind::SqlSubstr {
            value: Box::new(value),
            start: Box::new(start),
            length: Box::new(length),
        })
    }

    // --- conditionals ----------------------------------------------------

    pub fn when(cond: Expr, then: Expr, els: Expr) -> Expr {
        Expr::new(ExprKind::When {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        })
    }

    /// Build a `case` from its clause list: leading `when` clauses (each
    /// without an `else`), optionally followed by one default expression.
    pub fn case(mut clauses: Vec<Expr>) -> Result<Expr> {
        let default = match clauses.last() {
            Some(e) if !e.kind.is_when() => clauses.pop().expect("non-empty"),
            _ => Expr::null(),
        };
        for clause in &clauses {
            match &clause.kind {
                ExprKind::When { els, .. } if els.kind == ExprKind::Literal(Value::Null) => {}
                other => {
                    return Err(anyhow!(Error::new(Reason::Expected {
                        who: Some("case".to_string()),
                        expected: "a `when` clause without an `else`".to_string(),
                        found: other.op_tag().to_string(),
                    })));
                }
            }
        }
        Ok(Expr::new(ExprKind::Case {
            whens: clauses,
            default: Box::new(default),
        }))
    }

    // --- aggregation markers ---------------------------------------------

    pub fn count(terms: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Count(terms))
    }

    pub fn max(terms: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Max(terms))
    }

    pub fn min(terms: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Min(terms))
    }

    // --- shape helpers ---------------------------------------------------

    pub fn literal_value(&self) -> Option<&Value> {
        self.kind.as_literal()
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(Value::Null))
    }

    /// All direct children, in a fixed order.
    pub fn children(&self) -> Vec<&Expr> {
        use ExprKind::*;
        match &self.kind {
            Variable(_) | Offset(_) | Literal(_) | Date(_) | Script(_) => vec![],
            Tuple(terms) | Coalesce(terms) | And(terms) | Or(terms) | Count(terms)
            | Max(terms) | Min(terms) => terms.iter().collect(),
            Leaves(t) | Abs(t) | Number(t) | Unix(t) | FromUnix(t) | Not(t) | Missing(t)
            | Exists(t) | Length(t) | String(t) => vec![t],
            Get { container, index } => vec![container, index],
            Rows { var, offset } => vec![var, offset],
            Binary { left, right, .. }
            | Eq { left, right }
            | Ne { left, right }
            | Inequality { left, right, .. }
            | BasicEq { left, right } => vec![left, right],
            Multi { terms, default, .. } => terms.iter().chain([default.as_ref()]).collect(),
            Div {
                numer,
                denom,
                default,
            } => vec![numer, denom, default],
            Floor { term, modulo } => vec![term, modulo],
            In { value, superset } => vec![value, superset],
            Prefix { value, prefix } => vec![value, prefix],
            Suffix { value, suffix } => vec![value, suffix],
            Concat {
                terms,
                separator,
                default,
            } => terms
                .iter()
                .chain([separator.as_ref(), default.as_ref()])
                .collect(),
            Left { value, length }
            | Right { value, length }
            | NotLeft { value, length }
            | NotRight { value, length } => vec![value, length],
            Find {
                value,
                find,
                start,
                default,
            } => vec![value, find, start, default],
            Split { value, separator } => vec![value, separator],
            Between {
                value,
                prefix,
                suffix,
                start,
                default,
            } => vec![value, prefix, suffix, start, default],
            RegExp { value, .. } => vec![value],
            BasicIndexOf { value, find, start } => vec![value, find, start],
            BasicStartsWith { value, prefix } => vec![value, prefix],
            BasicSubstring { value, start, end } => vec![value, start, end],
            SqlInstr { value, find } => vec![value, find],
            SqlSubstr {
                value,
                start,
                length,
            } => vec![value, start, length],
            When { cond, then, els } => vec![cond, then, els],
            Case { whens, default } => whens.iter().chain([default.as_ref()]).collect(),
        }
    }

    /// Rebuild this node with every direct child passed through `f`,
    /// preserving the operator. The workhorse behind [Expr::map] and the
    /// child-first recursion of `partial_eval`.
    pub fn try_map_children<F>(&self, mut f: F) -> Result<ExprKind>
    where
        F: FnMut(&Expr) -> Result<Expr>,
    {
        use ExprKind::*;
        let mut b = |e: &Box<Expr>, f: &mut F| -> Result<Box<Expr>> { Ok(Box::new(f(e)?)) };
        let kind = match &self.kind {
            Variable(_) | Offset(_) | Literal(_) | Date(_) | Script(_) => self.kind.clone(),
            Tuple(terms) => Tuple(terms.iter().map(&mut f).collect::<Result<_>>()?),
            Leaves(t) => Leaves(b(t, &mut f)?),
            Coalesce(terms) => Coalesce(terms.iter().map(&mut f).collect::<Result<_>>()?),
            Get { container, index } => Get {
                container: b(container, &mut f)?,
                index: b(index, &mut f)?,
            },
            Rows { var, offset } => Rows {
                var: b(var, &mut f)?,
                offset: b(offset, &mut f)?,
            },
            Binary { op, left, right } => Binary {
                op: *op,
                left: b(left, &mut f)?,
                right: b(right, &mut f)?,
            },
            Multi {
                op,
                terms,
                nulls,
                default,
            } => Multi {
                op: *op,
                terms: terms.iter().map(&mut f).collect::<Result<_>>()?,
                nulls: *nulls,
                default: b(default, &mut f)?,
            },
            Div {
                numer,
                denom,
                default,
            } => Div {
                numer: b(numer, &mut f)?,
                denom: b(denom, &mut f)?,
                default: b(default, &mut f)?,
            },
            Floor { term, modulo } => Floor {
                term: b(term, &mut f)?,
                modulo: b(modulo, &mut f)?,
            },
            Abs(t) => Abs(b(t, &mut f)?),
            Number(t) => Number(b(t, &mut f)?),
            Unix(t) => Unix(b(t, &mut f)?),
            FromUnix(t) => FromUnix(b(t, &mut f)?),
            Eq { left, right } => Eq {
                left: b(left, &mut f)?,
                right: b(right, &mut f)?,
            },
            Ne { left, right } => Ne {
                left: b(left, &mut f)?,
                right: b(right, &mut f)?,
            },
            Inequality { op, left, right } => Inequality {
                op: *op,
                left: b(left, &mut f)?,
                right: b(right, &mut f)?,
            },
            In { value, superset } => In {
                value: b(value, &mut f)?,
                superset: b(superset, &mut f)?,
            },
            And(terms) => And(terms.iter().map(&mut f).collect::<Result<_>>()?),
            Or(terms) => Or(terms.iter().map(&mut f).collect::<Result<_>>()?),
            Not(t) => Not(b(t, &mut f)?),
            Missing(t) => Missing(b(t, &mut f)?),
            Exists(t) => Exists(b(t, &mut f)?),
            Length(t) => Length(b(t, &mut f)?),
            String(t) => String(b(t, &mut f)?),
            Prefix { value, prefix } => Prefix {
                value: b(value, &mut f)?,
                prefix: b(prefix, &mut f)?,
            },
            Suffix { value, suffix } => Suffix {
                value: b(value, &mut f)?,
                suffix: b(suffix, &mut f)?,
            },
            Concat {
                terms,
                separator,
                default,
            } => Concat {
                terms: terms.iter().map(&mut f).collect::<Result<_>>()?,
                separator: b(separator, &mut f)?,
                default: b(default, &mut f)?,
            },
            Left { value, length } => Left {
                value: b(value, &mut f)?,
                length: b(length, &mut f)?,
            },
            Right { value, length } => Right {
                value: b(value, &mut f)?,
                length: b(length, &mut f)?,
            },
            NotLeft { value, length } => NotLeft {
                value: b(value, &mut f)?,
                length: b(length, &mut f)?,
            },
            NotRight { value, length } => NotRight {
                value: b(value, &mut f)?,
                length: b(length, &mut f)?,
            },
            Find {
                value,
                find,
                start,
                default,
            } => Find {
                value: b(value, &mut f)?,
                find: b(find, &mut f)?,
                start: b(start, &mut f)?,
                default: b(default, &mut f)?,
            },
            Split { value, separator } => Split {
                value: b(value, &mut f)?,
                separator: b(separator, &mut f)?,
            },
            Between {
                value,
                prefix,
                suffix,
                start,
                default,
            } => Between {
                value: b(value, &mut f)?,
                prefix: b(prefix, &mut f)?,
                suffix: b(suffix, &mut f)?,
                start: b(start, &mut f)?,
                default: b(default, &mut f)?,
            },
            RegExp { value, pattern } => RegExp {
                value: b(value, &mut f)?,
                pattern: pattern.clone(),
            },
            BasicIndexOf { value, find, start } => BasicIndexOf {
                value: b(value, &mut f)?,
                find: b(find, &mut f)?,
                start: b(start, &mut f)?,
            },
            BasicStartsWith { value, prefix } => BasicStartsWith {
                value: b(value, &mut f)?,
                prefix: b(prefix, &mut f)?,
            },
            BasicSubstring { value, start, end } => BasicSubstring {
                value: b(value, &mut f)?,
                start: b(start, &mut f)?,
                end: b(end, &mut f)?,
            },
            BasicEq { left, right } => BasicEq {
                left: b(left, &mut f)?,
                right: b(right, &mut f)?,
            },
            SqlInstr { value, find } => SqlInstr {
                value: b(value, &mut f)?,
                find: b(find, &mut f)?,
            },
            SqlSubstr {
                value,
                start,
                length,
            } => SqlSubstr {
                value: b(value, &mut f)?,
                start: b(start, &mut f)?,
                length: b(length, &mut f)?,
            },
            When { cond, then, els } => When {
                cond: b(cond, &mut f)?,
                then: b(then, &mut f)?,
                els: b(els, &mut f)?,
            },
            Case { whens, default } => Case {
                whens: whens.iter().map(&mut f).collect::<Result<_>>()?,
                default: b(default, &mut f)?,
            },
            Count(terms) => Count(terms.iter().map(&mut f).collect::<Result<_>>()?),
            Max(terms) => Max(terms.iter().map(&mut f).collect::<Result<_>>()?),
            Min(terms) => Min(terms.iter().map(&mut f).collect::<Result<_>>()?),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_routes_nullish_shapes() {
        assert_eq!(Expr::string(""), Expr::null());
        assert_eq!(
            Expr::literal(Value::Boolean(true)),
            Expr::boolean(true)
        );
        let date_shaped = Value::Object(
            [("date".to_string(), Value::Integer(1429747200))]
                .into_iter()
                .collect(),
        );
        assert_eq!(Expr::literal(date_shaped), Expr::date(1429747200.0));
    }

    #[test]
    fn variable_names_are_checked() {
        assert!(Expr::variable("a.b").is_ok());
        assert!(Expr::variable("").is_err());
        assert!(Expr::variable("a b").is_err());
    }

    #[test]
    fn case_rejects_when_with_else() {
        let with_else = Expr::when(
            Expr::variable("a").unwrap(),
            Expr::integer(1),
            Expr::integer(2),
        );
        assert!(Expr::case(vec![with_else]).is_err());

        let bare = Expr::when(Expr::variable("a").unwrap(), Expr::integer(1), Expr::null());
        let case = Expr::case(vec![bare, Expr::integer(9)]).unwrap();
        let (whens, default) = case.kind.as_case().unwrap();
        assert_eq!(whens.len(), 1);
        assert_eq!(**default, Expr::integer(9));
    }
}
