//! AST → Elasticsearch 1.x.
//!
//! Two emission modes: [to_esfilter] for filter positions, and
//! [script::to_ruby] for scripted positions when an operator has no filter
//! shape. Two language generations are registered, `es14` as the base and
//! `es17` as a child that overrides a couple of filter shapes, sharing
//! everything else through the parent chain.

pub mod filter;
pub mod script;

use anyhow::Result;
use log::warn;
use once_cell::sync::Lazy;
use serde_json::{json, Value as Json};

use crate::ast::Expr;
use crate::schema::Schema;
use crate::translate::Language;

pub use filter::simplify_esfilter;
pub use script::to_ruby;

pub struct Context<'a> {
    pub schema: &'a dyn Schema,
    pub lang: &'static Language<FilterEmitter>,
}

impl<'a> Context<'a> {
    pub fn new(schema: &'a dyn Schema) -> Context<'a> {
        Context {
            schema,
            lang: &ES14,
        }
    }

    pub fn with_lang(schema: &'a dyn Schema, lang: &'static Language<FilterEmitter>) -> Context<'a> {
        Context { schema, lang }
    }
}

pub type FilterEmitter = fn(&Expr, &Context<'_>) -> Result<Json>;

pub static ES14: Lazy<Language<FilterEmitter>> = Lazy::new(filter::es14);
pub static ES17: Lazy<Language<FilterEmitter>> = Lazy::new(|| filter::es17(&ES14));

/// Resolve a variable to its physical column name, when the schema knows it.
pub(crate) fn es_field(ctx: &Context<'_>, name: &str) -> String {
    ctx.schema
        .columns(name)
        .first()
        .map(|column| column.es_column.clone())
        .unwrap_or_else(|| name.to_string())
}

/// Emit one node as a filter, falling back to a script filter for operators
/// with no native filter shape.
pub fn to_esfilter(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    match ctx.lang.emitter(expr.op_tag()) {
        Some(emit) => emit(expr, ctx),
        None => script_filter(expr, ctx),
    }
}

pub(crate) fn script_filter(expr: &Expr, ctx: &Context<'_>) -> Result<Json> {
    warn!(
        "`{}` has no {} filter shape; emitting a script filter",
        expr.op_tag(),
        ctx.lang.name
    );
    Ok(json!({"script": {"script": to_ruby(expr, ctx)?}}))
}

/// Simplify, emit, and canonicalize an expression as an ES filter.
pub fn compile(expr: &Expr, schema: &dyn Schema) -> Result<Json> {
    let simplified = expr.partial_eval()?;
    let filter = to_esfilter(&simplified, &Context::new(schema))?;
    Ok(simplify_esfilter(&filter))
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::parser::parse_expr;
    use crate::schema::SimpleSchema;

    fn es(json: serde_json::Value) -> Json {
        let schema = SimpleSchema::default();
        let expr = parse_expr(&json).unwrap();
        compile(&expr, &schema).unwrap()
    }

    #[test]
    fn term_and_terms() {
        assert_eq!(es(json!({"eq": {"a": 1}})), json!({"term": {"a": 1}}));
        assert_eq!(
            es(json!({"eq": {"a": [1, 2, 3]}})),
            json!({"terms": {"a": [1, 2, 3]}})
        );
        assert_eq!(
            es(json!({"ne": {"a": 1}})),
            json!({"not": {"term": {"a": 1}}})
        );
    }

    #[test]
    fn ranges_fuse_during_canonicalization() {
        assert_eq!(
            es(json!({"and": [{"gt": {"a": 20}}, {"lt": {"a": 40}}]})),
            json!({"range": {"a": {"gt": 20, "lt": 40}}})
        );
    }

    #[test]
    fn date_bounds_keep_integer_precision() {
        assert_eq!(
            es(json!({"gte": {"build.date": 1429747200}, "lt": {"build.date": 1429920000}})),
            json!({"range": {"build.date": {"gte": 1429747200, "lt": 1429920000}}})
        );
    }

    #[test]
    fn predicates() {
        assert_eq!(
            es(json!({"missing": "a"})),
            json!({"missing": {"field": "a"}})
        );
        assert_eq!(
            es(json!({"prefix": {"a": "v1"}})),
            json!({"prefix": {"a": "v1"}})
        );
        assert_eq!(
            es(json!({"regex": {"a": "v1\\..*"}})),
            json!({"regexp": {"a": "v1\\..*"}})
        );
    }

    #[test]
    fn es17_reshapes_missing_but_inherits_the_rest() {
        let schema = SimpleSchema::default();
        let ctx = Context::with_lang(&schema, &ES17);
        let missing = parse_expr(&json!({"missing": "a"}))
            .unwrap()
            .partial_eval()
            .unwrap();
        assert_eq!(
            to_esfilter(&missing, &ctx).unwrap(),
            json!({"bool": {"must_not": {"exists": {"field": "a"}}}})
        );
        // eq is not overridden; it resolves through the parent
        let eq = parse_expr(&json!({"eq": {"a": 1}}))
            .unwrap()
            .partial_eval()
            .unwrap();
        assert_eq!(to_esfilter(&eq, &ctx).unwrap(), json!({"term": {"a": 1}}));
    }

    #[test]
    fn arithmetic_falls_back_to_script() {
        assert_eq!(
            es(json!({"gt": [{"sub": ["a", "b"]}, 0]})),
            json!({"script": {"script": "((doc[\"a\"].value - doc[\"b\"].value) > 0)"}})
        );
    }

    #[test]
    fn boolean_constants_are_filter_identities() {
        assert_eq!(es(json!({"and": []})), json!({"match_all": {}}));
        assert_eq!(es(json!({"or": []})), json!({"not": {"match_all": {}}}));
        // TRUE terms vanish, FALSE sinks the conjunction
        assert_eq!(
            es(json!({"and": [{"eq": {"a": 1}}, {"match_all": {}}]})),
            json!({"term": {"a": 1}})
        );
    }

    #[test]
    fn simplify_is_idempotent() {
        for case in [
            json!({"and": [{"range": {"a": {"gt": 20}}}, {"range": {"a": {"lt": 40}}}]}),
            json!({"and": [{"and": [{"term": {"a": 1}}]}, {"match_all": {}}]}),
            json!({"or": [{"term": {"a": 1}}, {"not": {"match_all": {}}}]}),
            json!({"not": {"not": {"term": {"a": 1}}}}),
        ] {
            let once = simplify_esfilter(&case);
            let twice = simplify_esfilter(&once);
            assert_eq!(once, twice, "{case}");
        }
    }

    #[test]
    fn typed_schemas_rewrite_field_names() {
        use crate::schema::{Column, ColumnType};
        let schema = SimpleSchema::new(vec![Column::typed("a", ColumnType::Number)]);
        let expr = parse_expr(&json!({"eq": {"a": 1}})).unwrap();
        assert_eq!(
            compile(&expr, &schema).unwrap(),
            json!({"term": {"a.~n~": 1}})
        );
    }
}
