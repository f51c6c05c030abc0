//! Cancellation contexts.
//!
//! This module provides:
//! - The `Context` trait every cancellation handle implements
//! - A root context that is never canceled
//! - Derived contexts with cancellation, deadlines and values

mod background;
mod cancel;
#[cfg(test)]
mod context_tests;
mod value;

pub use background::background;
pub use cancel::{with_cancel, with_deadline, with_timeout};
pub use value::with_value;

pub(crate) use cancel::CancelContext;

use crate::cancellation::Done;
use crate::errors::CancelError;
use std::sync::Arc;
use std::time::Instant;

/// A read-only cancellation handle.
///
/// Carries an optional deadline, a one-shot done signal, the cause once
/// canceled, and an immutable key/value chain. All methods are safe to call
/// from any number of threads at once.
pub trait Context: Send + Sync + std::fmt::Debug {
    /// Returns when this context will be canceled because of a deadline.
    fn deadline(&self) -> Option<Instant>;

    /// Returns the signal that fires when this context is canceled.
    fn done(&self) -> Done;

    /// Returns `None` while active, and the cause once canceled.
    fn err(&self) -> Option<CancelError>;

    /// Looks up `key` in this context's value chain.
    fn value(&self, key: &str) -> Option<serde_json::Value>;

    /// Returns whether the context has been canceled.
    fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }
}

/// A shared, dynamically typed context.
pub type ContextRef = Arc<dyn Context>;
