//! Cancellation primitives shared by every context.
//!
//! This module provides:
//! - Done, the one-shot signal a context exposes
//! - Registration, a detachable callback on a Done signal
//! - CancelFn, the release function handed back with derived contexts

mod cancel_fn;
mod signal;

pub use cancel_fn::CancelFn;
pub use signal::{Done, Registration};
