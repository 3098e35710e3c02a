//! Per-target emitter dispatch.
//!
//! A [Language] maps operator tags to target-specific emitter functions.
//! Lookup falls back to the parent language when a tag is not registered,
//! which is how incremental dialect generations (Elasticsearch 1.4 vs 1.7)
//! share everything but their differences. The operator catalogue is closed,
//! so the registries are plain tables populated once at initialization and
//! read-only thereafter.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::ast::{Expr, OpTag};
use crate::error::{Error, Reason};

pub struct Language<E: 'static> {
    pub name: &'static str,
    parent: Option<&'static Language<E>>,
    emitters: HashMap<OpTag, E>,
}

impl<E> Language<E> {
    pub fn base(name: &'static str) -> Self {
        Language {
            name,
            parent: None,
            emitters: HashMap::new(),
        }
    }

    /// A child language: unregistered operators resolve through `parent`.
    pub fn extend(name: &'static str, parent: &'static Language<E>) -> Self {
        Language {
            name,
            parent: Some(parent),
            emitters: HashMap::new(),
        }
    }

    pub fn register(mut self, entries: impl IntoIterator<Item = (OpTag, E)>) -> Self {
        self.emitters.extend(entries);
        self
    }

    pub fn emitter(&self, op: OpTag) -> Option<&E> {
        self.emitters
            .get(&op)
            .or_else(|| self.parent.and_then(|parent| parent.emitter(op)))
    }

    pub fn emitter_for(&self, expr: &Expr) -> Result<&E> {
        let op = expr.op_tag();
        self.emitter(op).ok_or_else(|| {
            anyhow!(Error::new(Reason::Unsupported {
                op: op.to_string(),
                language: self.name.to_string(),
            })
            .with_cause(expr.to_json()))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type Emitter = fn() -> &'static str;

    #[test]
    fn lookup_falls_back_to_the_parent() {
        fn base_eq() -> &'static str {
            "base"
        }
        fn child_eq() -> &'static str {
            "child"
        }
        let parent: &'static Language<Emitter> = Box::leak(Box::new(
            Language::base("parent")
                .register([(OpTag::Eq, base_eq as Emitter), (OpTag::Ne, base_eq as Emitter)]),
        ));
        let child = Language::extend("child", parent).register([(OpTag::Eq, child_eq as Emitter)]);

        assert_eq!(child.emitter(OpTag::Eq).unwrap()(), "child");
        assert_eq!(child.emitter(OpTag::Ne).unwrap()(), "base");
        assert!(child.emitter(OpTag::Max).is_none());
    }
}
