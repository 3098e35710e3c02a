//! AST → SQLite fragments.
//!
//! The emitter produces typed [SqlFragment]s, not statements: the query
//! shell that owns tables and joins assembles the final SQL. Entry point is
//! [compile]; the per-operator emitters live in [gen_expr] and are resolved
//! through the `sqlite` [Language] registry.

pub mod build;
pub mod fragment;
mod gen_expr;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::ast::{Expr, ExprKind};
use crate::schema::Schema;
use crate::translate::Language;

pub use build::Sql;
pub use fragment::{check_fragments, FragmentList, Slot, SlotMap, SqlFragment};

pub struct Context<'a> {
    pub schema: &'a dyn Schema,
    pub lang: &'static Language<SqlEmitter>,
}

impl<'a> Context<'a> {
    pub fn new(schema: &'a dyn Schema) -> Context<'a> {
        Context {
            schema,
            lang: &SQLITE,
        }
    }
}

/// Emission hints, passed parent to child.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hints {
    /// The parent proved the operands present; skip defensive null wrapping.
    pub not_null: bool,
    /// The parent wants the boolean slot even when others exist.
    pub boolean: bool,
}

pub type SqlEmitter = fn(&Expr, &Context<'_>, Hints) -> Result<FragmentList>;

pub static SQLITE: Lazy<Language<SqlEmitter>> = Lazy::new(gen_expr::language);

/// Emit one node, resolving its emitter through the language registry and
/// validating the fragment shape on the way out.
pub fn to_sql(expr: &Expr, ctx: &Context<'_>, hints: Hints) -> Result<FragmentList> {
    let emitter = ctx.lang.emitter_for(expr)?;
    check_fragments(expr.op_tag(), emitter(expr, ctx, hints)?)
}

/// Simplify and emit an expression against a schema.
pub fn compile(expr: &Expr, schema: &dyn Schema) -> Result<FragmentList> {
    let simplified = expr.partial_eval()?;
    to_sql(&simplified, &Context::new(schema), Hints::default())
}

/// Group the terms of a conjunction by the deepest nested path their
/// variables live under, so the caller can emit each group under one join.
/// A non-conjunction is returned as a single group.
pub fn split_expression_by_depth(
    expr: &Expr,
    schema: &dyn Schema,
) -> Vec<(Vec<String>, Expr)> {
    let terms = match &expr.kind {
        ExprKind::And(terms) => terms.clone(),
        _ => vec![expr.clone()],
    };
    let mut groups: Vec<(Vec<String>, Vec<Expr>)> = Vec::new();
    for term in terms {
        let path = deepest_path(&term, schema);
        match groups.iter_mut().find(|(p, _)| *p == path) {
            Some((_, group)) => group.push(term),
            None => groups.push((path, vec![term])),
        }
    }
    groups
        .into_iter()
        .map(|(path, mut group)| {
            let expr = if group.len() == 1 {
                group.pop().expect("one term")
            } else {
                Expr::and(group)
            };
            (path, expr)
        })
        .collect()
}

fn deepest_path(expr: &Expr, schema: &dyn Schema) -> Vec<String> {
    let mut deepest = vec![".".to_string()];
    for var in expr.vars() {
        for column in schema.columns(&var) {
            if column.nested_path.len() > deepest.len() {
                deepest = column.nested_path.clone();
            }
        }
    }
    deepest
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;
    use serde_json::json;

    use super::*;
    use crate::parser::parse_expr;
    use crate::schema::{Column, ColumnType, SimpleSchema};

    fn schema() -> SimpleSchema {
        SimpleSchema::table(&[
            ("a", ColumnType::Number),
            ("b", ColumnType::Number),
            ("first", ColumnType::String),
            ("last", ColumnType::String),
            ("ok", ColumnType::Boolean),
        ])
    }

    fn sql(json: serde_json::Value) -> String {
        let schema = schema();
        let expr = parse_expr(&json).unwrap();
        let fragments = compile(&expr, &schema).unwrap();
        assert_eq!(fragments.len(), 1, "expected a scalar fragment");
        let fragment = &fragments[0];
        assert_eq!(fragment.sql.len(), 1, "expected a single slot");
        fragment.sql.values().next().unwrap().to_string()
    }

    #[test]
    fn literals() {
        assert_snapshot!(sql(json!({"literal": "it's"})), @"'it''s'");
        assert_snapshot!(sql(json!(3)), @"3");
        assert_snapshot!(sql(json!(true)), @"1");
    }

    #[test]
    fn comparisons() {
        assert_snapshot!(sql(json!({"eq": {"a": 1}})), @r#""a" IS 1"#);
        assert_snapshot!(sql(json!({"gt": {"a": 20}})), @r#""a" > 20"#);
        assert_snapshot!(
            sql(json!({"eq": {"first": "x"}})),
            @r#"NULLIF("first", '') IS NULLIF('x', '')"#
        );
        // equality across disjoint slots is statically false
        assert_snapshot!(sql(json!({"eq": {"a": "x"}})), @"0");
    }

    #[test]
    fn conjunctions() {
        assert_snapshot!(
            sql(json!({"and": [{"gt": {"a": 20}}, {"lt": {"a": 40}}]})),
            @r#"("a" > 20) AND ("a" < 40)"#
        );
        assert_snapshot!(
            sql(json!({"ne": {"a": 1}})),
            @r#""a" <> 1"#
        );
    }

    #[test]
    fn membership() {
        assert_snapshot!(sql(json!({"in": {"a": [1, 2, 3]}})), @r#""a" IN (1, 2, 3)"#);
        assert_snapshot!(
            sql(json!({"in": {"first": ["x", "y"]}})),
            @r#"NULLIF("first", '') IN ('x', 'y')"#
        );
    }

    #[test]
    fn missing_tests_strings_twice() {
        assert_snapshot!(sql(json!({"missing": "a"})), @r#""a" IS NULL"#);
        assert_snapshot!(
            sql(json!({"missing": "first"})),
            @r#"("first" IS NULL OR "first" = '')"#
        );
        // `exists` normalizes to NOT missing during partial evaluation
        assert_snapshot!(
            sql(json!({"exists": "first"})),
            @r#"NOT ("first" IS NULL OR "first" = '')"#
        );
    }

    #[test]
    fn arithmetic_wraps_missing_operands() {
        assert_snapshot!(
            sql(json!({"sub": ["a", "b"]})),
            @r#"CASE WHEN ("a" IS NULL) OR ("b" IS NULL) THEN NULL ELSE "a" - "b" END"#
        );
        assert_snapshot!(
            sql(json!({"sum": ["a", "b"]})),
            @r#"CASE WHEN ("a" IS NULL) AND ("b" IS NULL) THEN NULL ELSE COALESCE("a", 0) + COALESCE("b", 0) END"#
        );
        // literals cannot be missing, so no guard
        assert_snapshot!(sql(json!({"sub": ["a", 1]})), @r#"CASE WHEN "a" IS NULL THEN NULL ELSE "a" - 1 END"#);
    }

    #[test]
    fn string_slicing_clamps() {
        assert_snapshot!(
            sql(json!({"left": {"first": 2}})),
            @r#"SUBSTR("first", 1, MAX(0, 2))"#
        );
        assert_snapshot!(
            sql(json!({"not_right": {"first": 2}})),
            @r#"SUBSTR("first", 1, MAX(0, LENGTH("first") - MAX(0, 2)))"#
        );
        assert_snapshot!(
            sql(json!({"instr": {"first": "x"}})),
            @r#"NULLIF(INSTR("first", 'x'), 0) - 1"#
        );
    }

    #[test]
    fn concat_never_leaves_a_dangling_separator() {
        let expected = concat_expected();
        assert_eq!(
            sql(json!({
                "concat": ["first", "last"],
                "separator": {"literal": " "}
            })),
            expected
        );
    }

    fn concat_expected() -> String {
        let piece = |v: &str| {
            format!(
                "CASE WHEN (\"{v}\" IS NULL OR \"{v}\" = '') THEN '' ELSE ' ' || \"{v}\" END"
            )
        };
        format!(
            "NULLIF(SUBSTR({} || {}, 2), '')",
            piece("first"),
            piece("last")
        )
    }

    #[test]
    fn numeric_functions() {
        assert_snapshot!(sql(json!({"abs": "a"})), @r#"ABS("a")"#);
        assert_snapshot!(
            sql(json!({"floor": ["a", 10]})),
            @r#"CASE WHEN "a" IS NULL THEN NULL ELSE "a" - ((("a" % 10) + 10) % 10) END"#
        );
        // a string column is cast into the numeric slot, with the
        // empty-string-is-missing rule preserved by the guard
        assert_snapshot!(
            sql(json!({"number": "first"})),
            @r#"CASE WHEN ("first" IS NULL OR "first" = '') THEN NULL ELSE CAST("first" AS REAL) END"#
        );
        assert_snapshot!(
            sql(json!({"max": ["a", 5]})),
            @r#"MAX(COALESCE("a", 5), COALESCE(5, "a"))"#
        );
        // counting literals folds before emission
        assert_snapshot!(sql(json!({"count": [1, 2, null]})), @"2");
    }

    #[test]
    fn string_predicates() {
        assert_snapshot!(
            sql(json!({"prefix": {"first": "x"}})),
            @r#"INSTR("first", 'x') = 1"#
        );
        assert_snapshot!(
            sql(json!({"suffix": {"first": ".rs"}})),
            @r#"SUBSTR("first", -LENGTH('.rs')) = '.rs'"#
        );
        assert_snapshot!(
            sql(json!({"regex": {"first": "v.*"}})),
            @r#""first" REGEXP 'v.*'"#
        );
    }

    #[test]
    fn conditionals() {
        assert_snapshot!(
            sql(json!({"when": {"eq": {"a": 1}}, "then": 10, "else": 20})),
            @r#"CASE WHEN "a" IS 1 THEN 10 ELSE 20 END"#
        );
        assert_snapshot!(
            sql(json!({"coalesce": ["a", "b", 7]})),
            @r#"COALESCE("a", "b", 7)"#
        );
    }

    #[test]
    fn unknown_columns_are_schema_errors() {
        let schema = schema();
        let expr = parse_expr(&json!({"eq": {"nope": 1}})).unwrap();
        let err = compile(&expr, &schema).unwrap_err();
        let err = err.downcast::<crate::error::Error>().unwrap();
        assert!(matches!(
            err.reason,
            crate::error::Reason::ColumnNotFound { path } if path == "nope"
        ));
    }

    #[test]
    fn scripts_have_no_sql_form() {
        let expr = Expr::script("1 + 1");
        let err = compile(&expr, &schema()).unwrap_err();
        let err = err.downcast::<crate::error::Error>().unwrap();
        assert!(matches!(err.reason, crate::error::Reason::Unsupported { .. }));
    }

    #[test]
    fn fragments_carry_their_nested_path() {
        let schema = SimpleSchema::new(vec![
            Column::new("a", ColumnType::Number),
            Column::new("events.t", ColumnType::Number)
                .with_nested_path(vec!["events".to_string(), ".".to_string()]),
        ]);
        let expr = parse_expr(&json!({"gt": {"events.t": 5}})).unwrap();
        let fragments = compile(&expr, &schema).unwrap();
        assert_eq!(
            fragments[0].nested_path,
            vec!["events".to_string(), ".".to_string()]
        );

        // one conjunction spanning depths splits into per-depth groups
        let both = parse_expr(&json!({"and": [{"gt": {"a": 1}}, {"gt": {"events.t": 5}}]}))
            .unwrap()
            .partial_eval()
            .unwrap();
        let groups = split_expression_by_depth(&both, &schema);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, vec![".".to_string()]);
        assert_eq!(
            groups[1].0,
            vec!["events".to_string(), ".".to_string()]
        );
    }

    #[test]
    fn variables_over_objects_expand_to_leaves() {
        let schema = SimpleSchema::new(vec![
            Column::new("o", ColumnType::Object),
            Column::new("o.x", ColumnType::Number),
            Column::new("o.y", ColumnType::String),
        ]);
        let expr = parse_expr(&json!("o")).unwrap();
        let fragments = compile(&expr, &schema).unwrap();
        let names: Vec<_> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn typed_columns_surface_every_slot() {
        let schema = SimpleSchema::new(vec![
            Column::typed("v", ColumnType::Number),
            Column::typed("v", ColumnType::String),
        ]);
        let expr = parse_expr(&json!("v")).unwrap();
        let fragments = compile(&expr, &schema).unwrap();
        assert_eq!(fragments.len(), 1);
        let fragment = &fragments[0];
        assert_eq!(fragment.slot(Slot::N).unwrap().as_str(), "\"v.~n~\"");
        assert_eq!(fragment.slot(Slot::S).unwrap().as_str(), "\"v.~s~\"");
    }
}
