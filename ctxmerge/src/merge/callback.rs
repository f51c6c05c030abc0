//! Eager propagation through callbacks on both sources.

use crate::cancellation::CancelFn;
use crate::context::{CancelContext, ContextRef};
use crate::errors::CancelError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// The merged context is a cancel context over `main` with one more
/// registration, on `extra`. Cancelling it by any path stops both
/// registrations, which drops the callback and its reference to `extra`.
pub(super) fn merge(
    main: &ContextRef,
    extra: &ContextRef,
    deadline: Option<Instant>,
) -> (ContextRef, CancelFn) {
    let merged = CancelContext::new(Arc::clone(main), deadline);

    let weak = Arc::downgrade(&merged);
    let source = Arc::clone(extra);
    let registration = extra.done().register(move || {
        if let Some(merged) = weak.upgrade() {
            let cause = source.err().unwrap_or(CancelError::Canceled);
            if merged.cancel(cause) {
                trace!("Merged context canceled by extra");
            }
        }
    });
    merged.attach(registration);

    let release = {
        let merged = Arc::clone(&merged);
        CancelFn::new(move |cause| {
            if merged.cancel(cause) {
                debug!("Merged context released");
            }
        })
    };

    (merged, release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{background, with_cancel, Context};

    #[test]
    fn test_registers_on_both_sources() {
        let (main, cancel_main) = with_cancel(&background());
        let (extra, cancel_extra) = with_cancel(&background());

        let (_merged, release) = merge(&main, &extra, None);
        assert_eq!(main.done().pending_count(), 1);
        assert_eq!(extra.done().pending_count(), 1);

        release.cancel();
        assert_eq!(main.done().pending_count(), 0);
        assert_eq!(extra.done().pending_count(), 0);

        cancel_main.cancel();
        cancel_extra.cancel();
    }

    #[test]
    fn test_main_cancel_detaches_extra() {
        let (main, cancel_main) = with_cancel(&background());
        let (extra, cancel_extra) = with_cancel(&background());

        let (merged, _release) = merge(&main, &extra, None);
        cancel_main.cancel_with("main");

        assert_eq!(merged.err(), Some(CancelError::Cause("main".into())));
        assert_eq!(extra.done().pending_count(), 0);
        assert_eq!(Arc::strong_count(&extra), 1);
        cancel_extra.cancel();
    }

    #[test]
    fn test_already_canceled_extra_cancels_at_creation() {
        let (extra, cancel_extra) = with_cancel(&background());
        cancel_extra.cancel_with("gone");

        let (merged, _release) = merge(&background(), &extra, None);

        assert!(merged.done().is_fired());
        assert_eq!(merged.err(), Some(CancelError::Cause("gone".into())));
    }
}
