//! Merging two contexts into one.
//!
//! [`add_cancel`] derives a context from `main` and `extra` that:
//! - is canceled the first time either source is, with that source's cause
//! - reports the earlier of the two deadlines
//! - looks values up in `main` only
//!
//! The returned [`CancelFn`] cancels the merged context and detaches it from
//! `extra`, so a long-lived `extra` does not keep the merge alive.
//!
//! ```rust,ignore
//! use ctxmerge::prelude::*;
//!
//! let (request, cancel_request) = with_cancel(&background());
//! let (ctx, release) = add_cancel(&request, &server_shutdown);
//! do_work(&ctx);
//! release.cancel();
//! ```

mod callback;
mod options;
mod watcher;

pub use options::{MergeOptions, MergeStrategy, STRATEGY_ENV_VAR};

use crate::cancellation::CancelFn;
use crate::context::ContextRef;
use std::time::Instant;
use tracing::debug;

/// Returns the earlier of two optional deadlines.
///
/// A present deadline always beats an absent one.
#[must_use]
pub fn earliest_deadline(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Merges `main` and `extra` with the default options.
///
/// See [`add_cancel_with`].
pub fn add_cancel(main: &ContextRef, extra: &ContextRef) -> (ContextRef, CancelFn) {
    add_cancel_with(main, extra, &MergeOptions::default())
}

/// Returns a context with the values and cancellation of `main` that is also
/// canceled when `extra` is, plus a function that releases it.
///
/// Neither source is ever canceled by the merge. The release function is
/// idempotent; calling it cancels the merged context with
/// [`CancelError::Canceled`](crate::errors::CancelError::Canceled) if it is
/// still active, and once it returns nothing in the merge refers to `extra`.
pub fn add_cancel_with(
    main: &ContextRef,
    extra: &ContextRef,
    options: &MergeOptions,
) -> (ContextRef, CancelFn) {
    // Deadlines never change after a context is built.
    let deadline = earliest_deadline(main.deadline(), extra.deadline());
    debug!(
        strategy = %options.strategy,
        has_deadline = deadline.is_some(),
        "Merging contexts"
    );

    match options.strategy {
        MergeStrategy::Callback => callback::merge(main, extra, deadline),
        MergeStrategy::Watcher => watcher::merge(main, extra, deadline, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_earliest_deadline_absent() {
        assert_eq!(earliest_deadline(None, None), None);
    }

    proptest! {
        #[test]
        fn prop_single_deadline_wins(offset in 0u64..1_000_000, main_side in any::<bool>()) {
            let d = Instant::now() + Duration::from_millis(offset);
            let got = if main_side {
                earliest_deadline(Some(d), None)
            } else {
                earliest_deadline(None, Some(d))
            };
            prop_assert_eq!(got, Some(d));
        }

        #[test]
        fn prop_earliest_of_two(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let base = Instant::now();
            let da = base + Duration::from_millis(a);
            let db = base + Duration::from_millis(b);
            let got = earliest_deadline(Some(da), Some(db));
            prop_assert_eq!(got, Some(da.min(db)));
            prop_assert_eq!(got, earliest_deadline(Some(db), Some(da)));
        }
    }
}
