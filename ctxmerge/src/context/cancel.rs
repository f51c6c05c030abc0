//! Contexts that can be canceled explicitly or by a deadline.

use super::{Context, ContextRef};
use crate::cancellation::{CancelFn, Done, Registration};
use crate::errors::CancelError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// A context with its own cancellation state.
///
/// Cancellation is idempotent: only the first cause is kept. The context
/// follows its parent through a registration on the parent's done signal, and
/// any further registrations attached to it are detached on cancel.
pub(crate) struct CancelContext {
    parent: ContextRef,
    deadline: Option<Instant>,
    done: Done,
    /// `Some` once canceled (first cause wins).
    err: RwLock<Option<CancelError>>,
    /// Callbacks this context keeps on other signals.
    registrations: Mutex<Vec<Registration>>,
}

impl CancelContext {
    /// Creates a child of `parent` that is canceled with the parent's cause
    /// when the parent is.
    pub(crate) fn new(parent: ContextRef, deadline: Option<Instant>) -> Arc<Self> {
        let ctx = Arc::new(Self {
            parent,
            deadline,
            done: Done::new(),
            err: RwLock::new(None),
            registrations: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&ctx);
        let registration = ctx.parent.done().register(move || {
            if let Some(ctx) = weak.upgrade() {
                let cause = ctx.parent.err().unwrap_or(CancelError::Canceled);
                ctx.cancel(cause);
            }
        });
        ctx.attach(registration);
        ctx
    }

    /// Keeps `registration` until this context is canceled.
    ///
    /// If the context is already canceled the registration is stopped now.
    pub(crate) fn attach(&self, registration: Registration) {
        let mut registrations = self.registrations.lock();
        if self.err.read().is_some() {
            drop(registrations);
            registration.stop();
            return;
        }
        registrations.push(registration);
    }

    /// Cancels with `cause`. Returns true only for the first cancellation.
    pub(crate) fn cancel(&self, cause: CancelError) -> bool {
        {
            let mut err = self.err.write();
            if err.is_some() {
                return false;
            }
            trace!(%cause, "context canceled");
            *err = Some(cause);
        }

        self.done.fire();

        let registrations = std::mem::take(&mut *self.registrations.lock());
        for registration in registrations {
            registration.stop();
        }
        true
    }

    /// Returns a release function that cancels this context.
    pub(crate) fn cancel_fn(self: &Arc<Self>) -> CancelFn {
        let ctx = Arc::clone(self);
        CancelFn::new(move |cause| {
            ctx.cancel(cause);
        })
    }

    /// Returns the number of registrations still attached.
    #[cfg(test)]
    pub(crate) fn attached_count(&self) -> usize {
        self.registrations.lock().len()
    }
}

impl Context for CancelContext {
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
        self.parent.value(key)
    }
}

impl std::fmt::Debug for CancelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelContext")
            .field("deadline", &self.deadline)
            .field("err", &self.err())
            .finish_non_exhaustive()
    }
}

/// Returns a child of `parent` and a function that cancels it.
///
/// The child is also canceled, with the parent's cause, when the parent is.
pub fn with_cancel(parent: &ContextRef) -> (ContextRef, CancelFn) {
    let ctx = CancelContext::new(Arc::clone(parent), parent.deadline());
    let cancel = ctx.cancel_fn();
    (ctx, cancel)
}

/// Returns a child of `parent` that is canceled with
/// [`CancelError::DeadlineExceeded`] once `deadline` passes.
///
/// If the parent's deadline is already earlier, the child keeps the parent's
/// deadline and behaves like [`with_cancel`].
pub fn with_deadline(parent: &ContextRef, deadline: Instant) -> (ContextRef, CancelFn) {
    if parent.deadline().is_some_and(|current| current <= deadline) {
        return with_cancel(parent);
    }

    let ctx = CancelContext::new(Arc::clone(parent), Some(deadline));
    let cancel = ctx.cancel_fn();

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        ctx.cancel(CancelError::DeadlineExceeded);
    } else if ctx.err().is_none() {
        spawn_deadline_timer(&ctx, remaining);
    }

    (ctx, cancel)
}

/// Shorthand for [`with_deadline`] at `now + timeout`.
pub fn with_timeout(parent: &ContextRef, timeout: Duration) -> (ContextRef, CancelFn) {
    match Instant::now().checked_add(timeout) {
        Some(deadline) => with_deadline(parent, deadline),
        None => with_cancel(parent),
    }
}

/// Cancels `ctx` after `remaining`, unless it is canceled first.
fn spawn_deadline_timer(ctx: &Arc<CancelContext>, remaining: Duration) {
    let done = ctx.done();
    let weak = Arc::downgrade(ctx);

    let spawned = thread::Builder::new()
        .name("ctxmerge-deadline".to_string())
        .spawn(move || {
            if done.wait_timeout(remaining) {
                return;
            }
            if let Some(ctx) = weak.upgrade() {
                ctx.cancel(CancelError::DeadlineExceeded);
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn deadline timer, expiring context now");
        ctx.cancel(CancelError::DeadlineExceeded);
    }
}
