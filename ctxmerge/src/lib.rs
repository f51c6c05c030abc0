//! # ctxmerge
//!
//! Merge two cancellation contexts into one.
//!
//! A context is a read-only cancellation handle: it carries an optional
//! deadline, a one-shot done signal, the cause once canceled, and a chain of
//! key/value pairs. This crate provides:
//!
//! - **Contexts**: a root context plus derived contexts with cancellation,
//!   deadlines and values
//! - **Merging**: [`add_cancel`](merge::add_cancel) combines a `main` and an
//!   `extra` context into one canceled by either, with the earlier deadline
//!   and `main`'s values
//! - **Two propagation strategies**: eager callbacks, or a lazily started
//!   watcher thread
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctxmerge::prelude::*;
//!
//! let (shutdown, trigger_shutdown) = with_cancel(&background());
//! let (request, cancel_request) = with_timeout(&background(), Duration::from_secs(30));
//!
//! let (ctx, release) = add_cancel(&request, &shutdown);
//! handle(&ctx);
//! release.cancel();
//! cancel_request.cancel();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod merge;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancelFn, Done, Registration};
    pub use crate::context::{
        background, with_cancel, with_deadline, with_timeout, with_value, Context, ContextRef,
    };
    pub use crate::errors::{CancelError, ConfigError};
    pub use crate::merge::{
        add_cancel, add_cancel_with, earliest_deadline, MergeOptions, MergeStrategy,
    };
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn prelude_covers_merge() {
        let (extra, cancel_extra) = with_cancel(&background());
        let (ctx, release) = add_cancel(&background(), &extra);
        cancel_extra.cancel();
        assert_eq!(ctx.err(), Some(CancelError::Canceled));
        release.cancel();
    }
}
