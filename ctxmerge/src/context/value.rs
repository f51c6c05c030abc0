//! Key/value links in a context chain.

use super::{Context, ContextRef};
use crate::cancellation::Done;
use crate::errors::CancelError;
use std::sync::Arc;
use std::time::Instant;

struct ValueContext {
    parent: ContextRef,
    key: String,
    value: serde_json::Value,
}

impl Context for ValueContext {
    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn done(&self) -> Done {
        self.parent.done()
    }

    fn err(&self) -> Option<CancelError> {
        self.parent.err()
    }

    fn value(&self, key: &str) -> Option<serde_json::Value> {
        if key == self.key {
            return Some(self.value.clone());
        }
        self.parent.value(key)
    }
}

impl std::fmt::Debug for ValueContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueContext")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Returns a child of `parent` that binds `key` to `value`.
///
/// Lookups walk toward the root and the nearest binding wins. Cancellation
/// and deadline are the parent's.
#[must_use]
pub fn with_value(
    parent: &ContextRef,
    key: impl Into<String>,
    value: impl Into<serde_json::Value>,
) -> ContextRef {
    Arc::new(ValueContext {
        parent: Arc::clone(parent),
        key: key.into(),
        value: value.into(),
    })
}
