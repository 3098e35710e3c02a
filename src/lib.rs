//! JX expressions: a JSON-encoded query-expression algebra.
//!
//! Expressions arrive as JSON, are parsed into a typed AST, simplified by
//! partial evaluation, and translated to a target dialect:
//!
//! ```ascii
//!        JSON document
//!
//!      (parse) │ ▲
//!              │ │ to_json
//!              ▼ │
//!              AST
//!               │
//! partial_eval │    (+ optional map() renaming)
//!               ▼
//!              AST, simplified
//!               │
//!               ├─ sql::compile ──►  typed SQLite fragments
//!               ├─ es::compile ───►  ES 1.x filter tree
//!               └─ es::to_ruby ───►  ES script source
//! ```
//!
//! You probably want to start with [parse] and one of the `compile`
//! functions:
//!
//! ```
//! use jx_expr::schema::{ColumnType, SimpleSchema};
//!
//! let schema = SimpleSchema::table(&[("a", ColumnType::Number)]);
//! let expr = jx_expr::parse(&serde_json::json!({"eq": {"a": 1}})).unwrap();
//! let filter = jx_expr::es::compile(&expr, &schema).unwrap();
//! assert_eq!(filter, serde_json::json!({"term": {"a": 1}}));
//! ```

pub mod ast;
mod error;
pub mod es;
pub mod parser;
pub mod path;
pub mod schema;
mod simplify;
pub mod sql;
#[cfg(test)]
mod test;
pub mod translate;
pub mod value;

pub use error::{downcast, Error, ErrorKind, ErrorMessage, ErrorMessages, Reason, WithErrorInfo};

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use ast::Expr;
use schema::Schema;

pub const JX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide consent for `{"script": …}` expressions; off by default and
/// read on every parse of a script form.
static ALLOW_SCRIPTING: AtomicBool = AtomicBool::new(false);

pub fn set_allow_scripting(allow: bool) {
    ALLOW_SCRIPTING.store(allow, Ordering::Relaxed);
}

pub(crate) fn scripting_allowed() -> bool {
    ALLOW_SCRIPTING.load(Ordering::Relaxed)
}

/// Parse a JSON document into an expression.
///
/// This is the typed-error boundary; for the `anyhow`-level equivalent see
/// [parser::parse_expr].
pub fn parse(json: &Json) -> Result<Expr, ErrorMessages> {
    parser::parse_expr(json).map_err(downcast)
}

/// Translation target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
pub enum Target {
    #[strum(to_string = "sqlite")]
    Sqlite,
    #[strum(to_string = "es14")]
    Es14,
    #[strum(to_string = "es17")]
    Es17,
}

impl Default for Target {
    fn default() -> Self {
        Target::Sqlite
    }
}

/// Translation options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    pub target: Target,
}

impl Options {
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }
}

impl FromStr for Options {
    type Err = Error;

    fn from_str(s: &str) -> Result<Options, Self::Err> {
        Target::from_str(s)
            .map(|target| Options::default().with_target(target))
            .map_err(|_| {
                Error::new(Reason::Unsupported {
                    op: "translate".to_string(),
                    language: s.to_string(),
                })
            })
    }
}

/// What a translation produced, per target.
#[derive(Debug, Clone, PartialEq)]
pub enum Translated {
    Sql(sql::FragmentList),
    EsFilter(Json),
}

/// Simplify and translate an expression for the configured target.
pub fn translate(
    expr: &Expr,
    schema: &dyn Schema,
    options: &Options,
) -> Result<Translated, ErrorMessages> {
    let result = match options.target {
        Target::Sqlite => sql::compile(expr, schema).map(Translated::Sql),
        Target::Es14 => es::compile(expr, schema).map(Translated::EsFilter),
        Target::Es17 => expr
            .partial_eval()
            .and_then(|simplified| {
                es::to_esfilter(&simplified, &es::Context::with_lang(schema, &es::ES17))
            })
            .map(|filter| Translated::EsFilter(es::simplify_esfilter(&filter))),
    };
    result.map_err(downcast)
}

/// String-level JSON conveniences.
pub mod json {
    use super::*;

    pub fn to_expr(text: &str) -> Result<Expr, ErrorMessages> {
        let json: Json = serde_json::from_str(text).map_err(|e| downcast(anyhow::anyhow!(e)))?;
        parse(&json)
    }

    pub fn from_expr(expr: &Expr) -> String {
        expr.to_json().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_str() {
        assert_eq!(Target::from_str("sqlite").unwrap(), Target::Sqlite);
        assert_eq!(Target::from_str("es17").unwrap(), Target::Es17);
        assert!(Target::from_str("oracle").is_err());
        assert!("es14".parse::<Options>().is_ok());
    }

    #[test]
    fn string_round_trip() {
        let expr = json::to_expr(r#"{"eq": {"a": 1}}"#).unwrap();
        assert_eq!(json::from_expr(&expr), r#"{"eq":["a",1]}"#);
    }
}
