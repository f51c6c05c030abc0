//! Release functions returned alongside derived contexts.

use crate::errors::CancelError;
use std::sync::Arc;

type CancelAction = dyn Fn(CancelError) + Send + Sync;

/// Cancels the context it was returned with.
///
/// Calling it more than once is harmless: only the first cancellation of the
/// context takes effect. Dropping it cancels nothing, so callers that want
/// their resources back must call it.
#[derive(Clone)]
pub struct CancelFn {
    action: Arc<CancelAction>,
}

impl CancelFn {
    pub(crate) fn new<F>(action: F) -> Self
    where
        F: Fn(CancelError) + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
        }
    }

    /// Cancels with the generic [`CancelError::Canceled`] cause.
    pub fn cancel(&self) {
        (self.action)(CancelError::Canceled);
    }

    /// Cancels with a [`CancelError::Cause`] carrying `reason`.
    pub fn cancel_with(&self, reason: impl Into<String>) {
        (self.action)(CancelError::Cause(reason.into()));
    }
}

impl std::fmt::Debug for CancelFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelFn").finish_non_exhaustive()
    }
}
