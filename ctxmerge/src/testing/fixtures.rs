//! Test fixtures for context testing.

use crate::cancellation::Done;
use crate::context::{Context, ContextRef};
use crate::errors::CancelError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// A context whose state is set directly by the test.
///
/// It has no parent: the deadline and values are whatever the builder
/// methods set, and it is canceled only by [`StaticContext::fire`].
#[derive(Debug)]
pub struct StaticContext {
    deadline: Option<Instant>,
    values: HashMap<String, serde_json::Value>,
    done: Done,
    err: RwLock<Option<CancelError>>,
}

impl Default for StaticContext {
    fn default() -> Self {
        Self {
            deadline: None,
            values: HashMap::new(),
            done: Done::new(),
            err: RwLock::new(None),
        }
    }
}

impl StaticContext {
    /// Creates an active context with no deadline and no values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Adds a value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Wraps the context for use wherever a [`ContextRef`] is expected.
    #[must_use]
    pub fn into_ref(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Cancels with `cause`. Returns true only for the first call.
    pub fn fire(&self, cause: CancelError) -> bool {
        {
            let mut err = self.err.write();
            if err.is_some() {
                return false;
            }
            *err = Some(cause);
        }
        self.done.fire();
        true
    }
}

impl Context for StaticContext {
    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn done(&self) -> Done {
        self.done.clone()
    }

    fn err(&self) -> Option<CancelError> {
        self.err.read().clone()
    }

    fn value(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }
}

/// Converts a shared fixture into a [`ContextRef`].
#[must_use]
pub fn as_context_ref(ctx: &Arc<StaticContext>) -> ContextRef {
    Arc::clone(ctx) as ContextRef
}

/// Installs a fmt subscriber honoring `RUST_LOG` that writes through the
/// test harness. Later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_context_builder() {
        let deadline = Instant::now();
        let ctx = StaticContext::new()
            .with_deadline(deadline)
            .with_value("k", "v");

        assert_eq!(ctx.deadline(), Some(deadline));
        assert_eq!(ctx.value("k"), Some(json!("v")));
        assert!(ctx.err().is_none());
    }

    #[test]
    fn test_static_context_fire_once() {
        let ctx = StaticContext::new();
        assert!(ctx.fire(CancelError::DeadlineExceeded));
        assert!(!ctx.fire(CancelError::Canceled));

        assert!(ctx.done().is_fired());
        assert_eq!(ctx.err(), Some(CancelError::DeadlineExceeded));
    }

    #[test]
    fn test_as_context_ref_shares_state() {
        let ctx = StaticContext::new().into_ref();
        let shared = as_context_ref(&ctx);
        ctx.fire(CancelError::Canceled);
        assert!(shared.is_cancelled());
    }
}
