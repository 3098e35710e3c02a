//! The `missing` calculus.
//!
//! `e.missing()` is an expression that is boolean-true exactly where `e`
//! evaluates to nothing. The results here are *unsimplified*; callers fold
//! them through `partial_eval` when they need the compact form.

use super::{Expr, ExprKind};
use crate::value::Value;

impl Expr {
    pub fn missing(&self) -> Expr {
        use ExprKind::*;
        match &self.kind {
            Variable(_) => Expr::missing_of(self.clone()),
            Literal(v) => Expr::boolean(v.is_missing()),
            // offsets, dates, scripts and tuples always produce a value
            Offset(_) | Date(_) | Script(_) | Tuple(_) => Expr::boolean(false),
            Leaves(t) => t.missing(),
            Coalesce(terms) => Expr::and(terms.iter().map(|t| t.missing()).collect()),
            Binary { left, right, .. } => Expr::or(vec![left.missing(), right.missing()]),
            Multi {
                terms,
                nulls,
                default,
                ..
            } => {
                if !default.is_null_literal() {
                    Expr::boolean(false)
                } else if *nulls {
                    Expr::and(terms.iter().map(|t| t.missing()).collect())
                } else {
                    Expr::or(terms.iter().map(|t| t.missing()).collect())
                }
            }
            Div {
                numer,
                denom,
                default,
            } => {
                if !default.is_null_literal() {
                    Expr::boolean(false)
                } else {
                    Expr::or(vec![
                        numer.missing(),
                        denom.missing(),
                        Expr::eq((**denom).clone(), Expr::integer(0)),
                    ])
                }
            }
            Floor { term, modulo } => Expr::or(vec![term.missing(), modulo.missing()]),
            Abs(t) | Number(t) | Unix(t) | FromUnix(t) | Length(t) | String(t) => t.missing(),
            // comparisons and predicates are total: false on missing input
            Eq { .. }
            | In { .. }
            | And(_)
            | Or(_)
            | Missing(_)
            | Exists(_)
            | Prefix { .. }
            | Suffix { .. }
            | RegExp { .. }
            | BasicStartsWith { .. }
            | BasicEq { .. }
            | Count(_) => Expr::boolean(false),
            Ne { left, right } => Expr::or(vec![left.missing(), right.missing()]),
            Inequality { left, right, .. } => Expr::or(vec![left.missing(), right.missing()]),
            Not(t) => t.missing(),
            Concat { terms, default, .. } => {
                if !default.is_null_literal() {
                    Expr::boolean(false)
                } else {
                    Expr::and(terms.iter().map(|t| t.missing()).collect())
                }
            }
            // A literal length is the only shape the short form can produce;
            // that path historically reported only the value's missingness.
            Left { value, length } => {
                if length.kind.is_literal() {
                    Expr::missing_of((**value).clone())
                } else {
                    Expr::or(vec![value.missing(), length.missing()])
                }
            }
            Right { value, length } | NotLeft { value, length } | NotRight { value, length } => {
                Expr::or(vec![value.missing(), length.missing()])
            }
            Find {
                value,
                find,
                start,
                default,
            } => {
                if !default.is_null_literal() {
                    Expr::boolean(false)
                } else {
                    Expr::or(vec![
                        value.missing(),
                        find.missing(),
                        Expr::eq(
                            Expr::basic_index_of(
                                (**value).clone(),
                                (**find).clone(),
                                (**start).clone(),
                            ),
                            Expr::integer(-1),
                        ),
                    ])
                }
            }
            Split { value, .. } => value.missing(),
            Between { default, .. } => {
                if !default.is_null_literal() {
                    Expr::boolean(false)
                } else {
                    Expr::missing_of(self.clone())
                }
            }
            BasicIndexOf { .. } | BasicSubstring { .. } => Expr::boolean(false),
            SqlInstr { value, find } => Expr::or(vec![value.missing(), find.missing()]),
            SqlSubstr { value, start, length } => Expr::or(vec![
                value.missing(),
                start.missing(),
                length.missing(),
            ]),
            When { cond, then, els } => Expr::when(
                (**cond).clone(),
                then.missing(),
                els.missing(),
            ),
            Max(terms) | Min(terms) => {
                Expr::and(terms.iter().map(|t| t.missing()).collect())
            }
            Get { .. } | Rows { .. } | Case { .. } => Expr::missing_of(self.clone()),
        }
    }

    /// `NOT missing()`, short-circuited where it is trivially constant.
    pub fn exists(&self) -> Expr {
        match &self.kind {
            ExprKind::Literal(v) => Expr::boolean(!v.is_missing()),
            ExprKind::Offset(_) | ExprKind::Date(_) | ExprKind::Tuple(_) => Expr::boolean(true),
            _ => Expr::not(self.missing()),
        }
    }

    /// True only when this node is statically the `TRUE` constant.
    pub fn is_true(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(Value::Boolean(true)))
    }

    /// True only when this node is statically the `FALSE` constant.
    pub fn is_false(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(Value::Boolean(false)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_missingness() {
        assert!(Expr::null().missing().is_true());
        assert!(Expr::string("").missing().is_true());
        assert!(Expr::integer(0).missing().is_false());
        assert!(Expr::boolean(false).missing().is_false());
    }

    #[test]
    fn variable_missing_wraps() {
        let v = Expr::variable("a").unwrap();
        assert_eq!(v.missing(), Expr::missing_of(v.clone()));
        assert_eq!(v.exists(), Expr::not(Expr::missing_of(v)));
    }

    #[test]
    fn left_short_form_drops_length_missingness() {
        let v = Expr::variable("a").unwrap();
        let n = Expr::variable("n").unwrap();
        // literal length: only the value's missingness is reported
        assert_eq!(
            Expr::left(v.clone(), Expr::integer(3)).missing(),
            Expr::missing_of(v.clone())
        );
        // symbolic length: both count
        assert_eq!(
            Expr::left(v.clone(), n.clone()).missing(),
            Expr::or(vec![v.missing(), n.missing()])
        );
    }

    #[test]
    fn defaults_suppress_missingness() {
        let v = Expr::variable("a").unwrap();
        let with_default = Expr::div(v.clone(), Expr::integer(2), Expr::integer(0));
        assert!(with_default.missing().is_false());
        let without = Expr::div(v.clone(), Expr::integer(2), Expr::null());
        assert!(matches!(without.missing().kind, ExprKind::Or(_)));
    }
}
