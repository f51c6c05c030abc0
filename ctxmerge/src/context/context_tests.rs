//! Comprehensive tests for context module.

#[cfg(test)]
mod tests {
    use crate::context::{
        background, with_cancel, with_deadline, with_timeout, with_value, CancelContext,
        Context, ContextRef,
    };
    use crate::errors::CancelError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_background_is_inert() {
        let root = background();
        assert!(root.deadline().is_none());
        assert!(root.err().is_none());
        assert!(!root.is_cancelled());
        assert!(!root.done().can_fire());
        assert!(root.value("anything").is_none());
    }

    #[test]
    fn test_background_is_shared() {
        assert!(Arc::ptr_eq(&background(), &background()));
    }

    #[test]
    fn test_with_cancel_starts_active() {
        let (ctx, cancel) = with_cancel(&background());
        assert!(ctx.err().is_none());
        assert!(!ctx.done().is_fired());
        cancel.cancel();
    }

    #[test]
    fn test_with_cancel_cancel() {
        let (ctx, cancel) = with_cancel(&background());
        cancel.cancel();

        assert!(ctx.done().is_fired());
        assert_eq!(ctx.err(), Some(CancelError::Canceled));
    }

    #[test]
    fn test_with_cancel_first_cause_wins() {
        let (ctx, cancel) = with_cancel(&background());
        cancel.cancel_with("first");
        cancel.cancel_with("second");
        cancel.cancel();

        assert_eq!(ctx.err(), Some(CancelError::Cause("first".to_string())));
    }

    #[test]
    fn test_parent_cancel_propagates_cause() {
        let (parent, cancel_parent) = with_cancel(&background());
        let (child, cancel_child) = with_cancel(&parent);
        let (grandchild, _cancel_grandchild) = with_cancel(&child);

        cancel_parent.cancel_with("parent gone");

        let expected = Some(CancelError::Cause("parent gone".to_string()));
        assert_eq!(child.err(), expected);
        assert_eq!(grandchild.err(), expected);
        assert!(grandchild.done().is_fired());
        cancel_child.cancel();
    }

    #[test]
    fn test_child_cancel_leaves_parent_active() {
        let (parent, cancel_parent) = with_cancel(&background());
        let (child, cancel_child) = with_cancel(&parent);

        cancel_child.cancel();

        assert!(child.is_cancelled());
        assert!(parent.err().is_none());
        cancel_parent.cancel();
    }

    #[test]
    fn test_child_cancel_detaches_from_parent() {
        let (parent, cancel_parent) = with_cancel(&background());
        let (_child, cancel_child) = with_cancel(&parent);
        assert_eq!(parent.done().pending_count(), 1);

        cancel_child.cancel();

        assert_eq!(parent.done().pending_count(), 0);
        cancel_parent.cancel();
    }

    #[test]
    fn test_child_of_canceled_parent_is_canceled() {
        let (parent, cancel_parent) = with_cancel(&background());
        cancel_parent.cancel_with("early");

        let (child, _cancel_child) = with_cancel(&parent);

        assert_eq!(child.err(), Some(CancelError::Cause("early".to_string())));
        assert!(child.done().is_fired());
    }

    #[test]
    fn test_attach_after_cancel_stops_registration() {
        let (source, cancel_source) = with_cancel(&background());
        let ctx = CancelContext::new(background(), None);
        ctx.cancel(CancelError::Canceled);

        ctx.attach(source.done().register(|| {}));

        assert_eq!(ctx.attached_count(), 0);
        assert_eq!(source.done().pending_count(), 0);
        cancel_source.cancel();
    }

    #[test]
    fn test_with_deadline_reports_deadline() {
        let deadline = Instant::now() + Duration::from_secs(3600);
        let (ctx, cancel) = with_deadline(&background(), deadline);

        assert_eq!(ctx.deadline(), Some(deadline));
        assert!(ctx.err().is_none());
        cancel.cancel();
        assert_eq!(ctx.err(), Some(CancelError::Canceled));
    }

    #[test]
    fn test_with_deadline_keeps_earlier_parent_deadline() {
        let soon = Instant::now() + Duration::from_secs(60);
        let far = soon + Duration::from_secs(3600);
        let (parent, cancel_parent) = with_deadline(&background(), soon);
        let (child, cancel_child) = with_deadline(&parent, far);

        assert_eq!(child.deadline(), Some(soon));
        cancel_child.cancel();
        cancel_parent.cancel();
    }

    #[test]
    fn test_with_deadline_in_past_expires_immediately() {
        let (ctx, _cancel) = with_deadline(&background(), Instant::now());

        assert!(ctx.done().is_fired());
        assert_eq!(ctx.err(), Some(CancelError::DeadlineExceeded));
    }

    #[test]
    fn test_with_timeout_expires() {
        let (ctx, _cancel) = with_timeout(&background(), Duration::from_millis(20));

        assert!(ctx.done().wait_timeout(Duration::from_secs(5)));
        assert_eq!(ctx.err(), Some(CancelError::DeadlineExceeded));
    }

    #[test]
    fn test_cancel_before_timeout_keeps_canceled() {
        let (ctx, cancel) = with_timeout(&background(), Duration::from_millis(20));
        cancel.cancel();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ctx.err(), Some(CancelError::Canceled));
    }

    #[test]
    fn test_with_value_lookup() {
        let root = background();
        let ctx = with_value(&root, "user", "alice");
        let ctx = with_value(&ctx, "attempt", 3);

        assert_eq!(ctx.value("user"), Some(json!("alice")));
        assert_eq!(ctx.value("attempt"), Some(json!(3)));
        assert_eq!(ctx.value("missing"), None);
    }

    #[test]
    fn test_with_value_nearest_binding_wins() {
        let ctx = with_value(&background(), "key", 1);
        let ctx = with_value(&ctx, "key", 2);

        assert_eq!(ctx.value("key"), Some(json!(2)));
    }

    #[test]
    fn test_values_visible_through_cancel() {
        let ctx = with_value(&background(), "trace_id", "abc");
        let (child, cancel) = with_cancel(&ctx);

        assert_eq!(child.value("trace_id"), Some(json!("abc")));
        cancel.cancel();
        assert_eq!(child.value("trace_id"), Some(json!("abc")));
    }

    #[test]
    fn test_value_context_follows_parent_cancellation() {
        let (parent, cancel) = with_cancel(&background());
        let ctx: ContextRef = with_value(&parent, "k", "v");

        cancel.cancel();

        assert!(ctx.done().is_fired());
        assert_eq!(ctx.err(), Some(CancelError::Canceled));
    }

    #[test]
    fn test_concurrent_cancel_single_cause() {
        let (ctx, cancel) = with_cancel(&background());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cancel = cancel.clone();
                std::thread::spawn(move || cancel.cancel_with(format!("thread-{i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let err = ctx.err().unwrap();
        assert!(err.reason().is_some_and(|r| r.starts_with("thread-")));
        assert_eq!(ctx.err(), Some(err));
    }
}
