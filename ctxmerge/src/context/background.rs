//! The root context.

use super::{Context, ContextRef};
use crate::cancellation::Done;
use crate::errors::CancelError;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
struct Background;

impl Context for Background {
    fn deadline(&self) -> Option<Instant> {
        None
    }

    fn done(&self) -> Done {
        Done::never()
    }

    fn err(&self) -> Option<CancelError> {
        None
    }

    fn value(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }
}

/// Returns the root context: no deadline, no values, never canceled.
#[must_use]
pub fn background() -> ContextRef {
    static BACKGROUND: OnceLock<ContextRef> = OnceLock::new();
    Arc::clone(BACKGROUND.get_or_init(|| Arc::new(Background) as ContextRef))
}
