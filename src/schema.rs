//! The schema contract the translators consume.
//!
//! The storage engine owns tables and column metadata; the expression core
//! only ever asks three questions: which columns sit at a path, which leaves
//! sit under a prefix, and what a column's user-visible name is. A single
//! logical field may map to several physical columns when typed storage
//! holds heterogeneous values.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::path::{is_type_tag, split_field, startswith_field, untype_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ColumnType {
    #[strum(to_string = "boolean")]
    Boolean,
    #[strum(to_string = "number")]
    Number,
    #[strum(to_string = "string")]
    String,
    #[strum(to_string = "object")]
    Object,
    #[strum(to_string = "nested")]
    Nested,
    #[strum(to_string = "exists")]
    Exists,
}

impl ColumnType {
    /// The `~x~` path segment used in typed storage mode, where one exists.
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            ColumnType::Boolean => Some("~b~"),
            ColumnType::Number => Some("~n~"),
            ColumnType::String => Some("~s~"),
            ColumnType::Nested => Some("~N~"),
            ColumnType::Exists => Some("~e~"),
            ColumnType::Object => None,
        }
    }

    pub fn from_type_tag(segment: &str) -> Option<ColumnType> {
        match segment {
            "~b~" => Some(ColumnType::Boolean),
            "~n~" => Some(ColumnType::Number),
            "~s~" => Some(ColumnType::String),
            "~N~" => Some(ColumnType::Nested),
            "~e~" => Some(ColumnType::Exists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Logical (user-visible) path.
    pub name: String,
    /// Physical column name; carries type-tag segments in typed mode.
    pub es_column: String,
    pub ctype: ColumnType,
    /// Nested paths this column lives under, deepest first; always ends
    /// with `"."`.
    pub nested_path: Vec<String>,
    pub cardinality: Option<usize>,
    pub partitions: Option<Vec<Json>>,
    pub last_updated: Option<f64>,
}

impl Column {
    /// A plain scalar column at the table root.
    pub fn new<S: Into<String>>(name: S, ctype: ColumnType) -> Column {
        let name = name.into();
        Column {
            es_column: name.clone(),
            name,
            ctype,
            nested_path: vec![".".to_string()],
            cardinality: None,
            partitions: None,
            last_updated: None,
        }
    }

    /// A typed-mode column: the physical name carries the type tag.
    pub fn typed<S: Into<String>>(name: S, ctype: ColumnType) -> Column {
        let name = name.into();
        let es_column = match ctype.type_tag() {
            Some(tag) => format!("{name}.{tag}"),
            None => name.clone(),
        };
        Column {
            name,
            es_column,
            ctype,
            nested_path: vec![".".to_string()],
            cardinality: None,
            partitions: None,
            last_updated: None,
        }
    }

    pub fn with_nested_path(mut self, nested_path: Vec<String>) -> Column {
        self.nested_path = nested_path;
        self
    }
}

pub trait Schema {
    /// All non-object leaf columns at or below `prefix`.
    fn leaves(&self, prefix: &str) -> Vec<&Column>;

    /// The columns mapped to exactly this path; several when one logical
    /// field holds multiple physical types.
    fn columns(&self, path: &str) -> Vec<&Column>;

    /// The canonical user-visible path of a column.
    fn get_column_name(&self, column: &Column) -> String {
        untype_path(&column.name)
    }
}

/// An in-memory [Schema]; the reference implementation used by tests and
/// small callers.
#[derive(Debug, Clone, Default)]
pub struct SimpleSchema {
    columns: Vec<Column>,
}

impl SimpleSchema {
    pub fn new(columns: Vec<Column>) -> SimpleSchema {
        SimpleSchema { columns }
    }

    /// An untyped table of root-level scalars.
    pub fn table(columns: &[(&str, ColumnType)]) -> SimpleSchema {
        SimpleSchema {
            columns: columns
                .iter()
                .map(|(name, ctype)| Column::new(*name, *ctype))
                .collect(),
        }
    }
}

impl Schema for SimpleSchema {
    fn leaves(&self, prefix: &str) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| !matches!(c.ctype, ColumnType::Object | ColumnType::Nested))
            .filter(|c| startswith_field(&c.name, prefix))
            .collect()
    }

    fn columns(&self, path: &str) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.name == path || untype_path(&c.name) == path)
            .collect()
    }
}

/// Recover a column type from a typed physical path, if it carries a tag.
pub fn type_of_path(path: &str) -> Option<ColumnType> {
    split_field(path)
        .iter()
        .rev()
        .find(|segment| is_type_tag(segment))
        .and_then(|segment| ColumnType::from_type_tag(segment))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn leaves_exclude_structure() {
        let schema = SimpleSchema::new(vec![
            Column::new("a", ColumnType::Object),
            Column::new("a.b", ColumnType::Number),
            Column::new("a.c", ColumnType::String),
            Column::new("x", ColumnType::Number),
        ]);
        let names: Vec<_> = schema.leaves("a").iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.b", "a.c"]);
    }

    #[test]
    fn typed_columns_answer_to_their_untyped_name() {
        let schema = SimpleSchema::new(vec![
            Column::typed("a", ColumnType::Number),
            Column::typed("a", ColumnType::String),
        ]);
        let found = schema.columns("a");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].es_column, "a.~n~");
        assert_eq!(schema.get_column_name(found[0]), "a");
        assert_eq!(type_of_path("a.~n~"), Some(ColumnType::Number));
    }
}
