//! Typed SQL fragments.
//!
//! An expression does not emit one SQL string; it emits a list of fragments,
//! each holding one snippet per primitive type slot, under the nested path
//! the snippet must be evaluated at. The query shell assembles statements
//! and plans nested-array joins from these; the core never does.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::ast::OpTag;
use crate::error::{Error, Reason};
use crate::schema::ColumnType;
use crate::value::Value;

use super::build::Sql;

/// The primitive type slots a fragment may carry. `Zero` is the slot of a
/// statically absent value (always SQL `NULL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    B,
    N,
    S,
    J,
    Zero,
}

impl Slot {
    pub fn code(&self) -> char {
        match self {
            Slot::B => 'b',
            Slot::N => 'n',
            Slot::S => 's',
            Slot::J => 'j',
            Slot::Zero => '0',
        }
    }

    pub fn of_column(ctype: ColumnType) -> Slot {
        match ctype {
            ColumnType::Boolean => Slot::B,
            ColumnType::Number | ColumnType::Exists => Slot::N,
            ColumnType::String => Slot::S,
            ColumnType::Object | ColumnType::Nested => Slot::J,
        }
    }

    pub fn of_value(value: &Value) -> Slot {
        match value {
            Value::Null => Slot::Zero,
            Value::Boolean(_) => Slot::B,
            Value::Integer(_)
            | Value::Float(_)
            | Value::Decimal(_)
            | Value::Date(_)
            | Value::Duration(_) => Slot::N,
            Value::String(_) => Slot::S,
            Value::Array(_) | Value::Object(_) => Slot::J,
        }
    }

    /// The `b < n < s` order used for cross-slot strict inequalities;
    /// `None` for slots outside that order.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Slot::B => Some(0),
            Slot::N => Some(1),
            Slot::S => Some(2),
            Slot::J | Slot::Zero => None,
        }
    }
}

pub type SlotMap = BTreeMap<Slot, Sql>;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// Relative path this column is emitted under; `"."` for the scalar
    /// value itself.
    pub name: String,
    /// One snippet per type slot.
    pub sql: SlotMap,
    /// Nested paths this snippet must be evaluated under, deepest first,
    /// ending with `"."`.
    pub nested_path: Vec<String>,
}

pub type FragmentList = Vec<SqlFragment>;

impl SqlFragment {
    pub fn scalar(slot: Slot, sql: Sql) -> SqlFragment {
        SqlFragment {
            name: ".".to_string(),
            sql: SlotMap::from([(slot, sql)]),
            nested_path: vec![".".to_string()],
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<&Sql> {
        self.sql.get(&slot)
    }
}

/// The deepest of several nested paths, failing when they diverge; the
/// caller is expected to split such expressions before emission.
pub fn merged_nested_path(fragments: &[&SqlFragment]) -> Result<Vec<String>> {
    let mut deepest: Vec<String> = vec![".".to_string()];
    for fragment in fragments {
        let path = &fragment.nested_path;
        let (longer, shorter) = if path.len() >= deepest.len() {
            (path.clone(), &deepest)
        } else {
            (deepest.clone(), path)
        };
        if !longer.ends_with(shorter) {
            return Err(anyhow!(Error::new(Reason::Invariant {
                detail: format!(
                    "expression spans nested paths {:?} and {:?}",
                    deepest, path
                ),
            })));
        }
        deepest = longer;
    }
    Ok(deepest)
}

/// The validating wrapper around every emitter return: fragments must carry
/// a name, at least one slot, and a non-empty nested path.
pub fn check_fragments(op: OpTag, fragments: FragmentList) -> Result<FragmentList> {
    if fragments.is_empty() {
        return Err(invariant(op, "emitted no fragments"));
    }
    for fragment in &fragments {
        if fragment.name.is_empty() {
            return Err(invariant(op, "emitted a fragment with an empty name"));
        }
        if fragment.sql.is_empty() {
            return Err(invariant(op, "emitted a fragment with no type slots"));
        }
        if fragment.nested_path.is_empty()
            || fragment.nested_path.last().map(String::as_str) != Some(".")
        {
            return Err(invariant(op, "emitted a fragment with a bad nested path"));
        }
    }
    Ok(fragments)
}

fn invariant(op: OpTag, detail: &str) -> anyhow::Error {
    anyhow!(Error::new(Reason::Invariant {
        detail: format!("`{op}` {detail}"),
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    fn frag(nested: &[&str]) -> SqlFragment {
        SqlFragment {
            name: ".".to_string(),
            sql: SlotMap::from([(Slot::N, Sql::atom("1"))]),
            nested_path: nested.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn nested_paths_merge_to_the_deepest() {
        let root = frag(&["."]);
        let deep = frag(&["a.b", "."]);
        assert_eq!(
            merged_nested_path(&[&root, &deep]).unwrap(),
            vec!["a.b".to_string(), ".".to_string()]
        );
    }

    #[test]
    fn diverging_nested_paths_are_rejected() {
        let one = frag(&["a.b", "."]);
        let other = frag(&["x.y", "."]);
        assert!(merged_nested_path(&[&one, &other]).is_err());
    }

    #[test]
    fn the_wrapper_rejects_slotless_fragments() {
        let empty = SqlFragment {
            name: ".".to_string(),
            sql: SlotMap::new(),
            nested_path: vec![".".to_string()],
        };
        assert!(check_fragments(OpTag::Eq, vec![empty]).is_err());
        assert!(check_fragments(OpTag::Eq, vec![]).is_err());
    }
}
