//! Test assertions for cancellation state.

use crate::context::Context;
use crate::errors::CancelError;
use std::time::Duration;

/// Asserts that the context is active and its signal has not fired.
pub fn assert_active(ctx: &dyn Context) {
    assert!(
        ctx.err().is_none(),
        "Expected an active context, got err: {:?}",
        ctx.err()
    );
    assert!(
        !ctx.done().is_fired(),
        "Expected done signal not to have fired"
    );
}

/// Asserts that the context is canceled with `expected`, without waiting.
pub fn assert_canceled_with(ctx: &dyn Context, expected: &CancelError) {
    assert_eq!(
        ctx.err().as_ref(),
        Some(expected),
        "Expected context canceled with {expected:?}"
    );
}

/// Waits up to `timeout` for the done signal, then asserts the cause.
pub fn assert_canceled_within(ctx: &dyn Context, timeout: Duration, expected: &CancelError) {
    assert!(
        ctx.done().wait_timeout(timeout),
        "Expected done signal within {timeout:?}, err: {:?}",
        ctx.err()
    );
    assert_canceled_with(ctx, expected);
}
