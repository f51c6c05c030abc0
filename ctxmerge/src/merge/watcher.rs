//! Lazy propagation through a watcher thread.
//!
//! Nothing runs in the background until someone asks for `done()`. The first
//! caller creates the signal and starts one thread that waits on `main`,
//! `extra` and the merged signal itself, relays the source that fired first,
//! then exits. Until then `err()` polls both sources directly and uses the
//! signals' firing order to pick the earlier cause.

use super::MergeOptions;
use crate::cancellation::{CancelFn, Done, Registration};
use crate::context::{Context, ContextRef};
use crate::errors::CancelError;
use futures::future::{select_all, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, trace, warn};

struct WatchState {
    err: Option<CancelError>,
    /// Created on the first `done()` call.
    done: Option<Done>,
    /// Dropped once the merge is canceled.
    extra: Option<ContextRef>,
    watcher: Option<JoinHandle<()>>,
    /// Source callbacks used when the watcher thread could not start.
    fallback: Vec<Registration>,
}

struct Watched {
    main: ContextRef,
    deadline: Option<Instant>,
    thread_name: String,
    state: Mutex<WatchState>,
}

/// Returns true if `a`'s done signal is known to have fired before `b`'s.
fn fired_first(a: &dyn Context, b: &dyn Context) -> bool {
    match (a.done().fire_order(), b.done().fire_order()) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

impl Watched {
    fn new(
        main: &ContextRef,
        extra: &ContextRef,
        deadline: Option<Instant>,
        options: &MergeOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            main: Arc::clone(main),
            deadline,
            thread_name: options.watcher_thread_name.clone(),
            state: Mutex::new(WatchState {
                err: None,
                done: None,
                extra: Some(Arc::clone(extra)),
                watcher: None,
                fallback: Vec::new(),
            }),
        })
    }

    /// Cancels with `cause`. Returns true only for the first cancellation.
    fn cancel(&self, cause: CancelError) -> bool {
        let (done, extra, fallback) = {
            let mut state = self.state.lock();
            if state.err.is_some() {
                return false;
            }
            trace!(%cause, "Merged context canceled");
            state.err = Some(cause);
            (
                state.done.clone(),
                state.extra.take(),
                std::mem::take(&mut state.fallback),
            )
        };
        drop(extra);

        if let Some(done) = done {
            done.fire();
        }
        for registration in fallback {
            registration.stop();
        }
        true
    }

    /// Records a source's cancellation if one has happened.
    ///
    /// When both sources are canceled, the one whose signal fired first wins.
    fn poll_sources(&self) -> Option<CancelError> {
        let (err, extra) = {
            let state = self.state.lock();
            (state.err.clone(), state.extra.clone())
        };
        if err.is_some() {
            return err;
        }

        let main_err = self.main.err();
        let extra_err = extra.as_ref().and_then(|extra| extra.err());
        let cause = match (main_err, extra_err) {
            (Some(main_cause), Some(extra_cause)) => {
                let extra_first = extra
                    .as_ref()
                    .is_some_and(|extra| fired_first(extra.as_ref(), self.main.as_ref()));
                if extra_first {
                    extra_cause
                } else {
                    main_cause
                }
            }
            (main_cause, extra_cause) => main_cause.or(extra_cause)?,
        };
        self.cancel(cause);
        self.state.lock().err.clone()
    }

    fn done(self: &Arc<Self>) -> Done {
        // Avoid starting a thread for a source that already fired.
        self.poll_sources();

        let (done, unwatched) = {
            let mut state = self.state.lock();
            if let Some(done) = &state.done {
                return done.clone();
            }

            let extra = if state.err.is_none() {
                state.extra.clone()
            } else {
                None
            };
            match extra {
                Some(extra) => {
                    let done = Done::new();
                    state.done = Some(done.clone());
                    match self.spawn_watcher(done.clone(), &extra) {
                        Ok(handle) => {
                            state.watcher = Some(handle);
                            (done, None)
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                "Failed to spawn merge watcher; wait() callers are woken by source callbacks instead"
                            );
                            (done, Some(extra))
                        }
                    }
                }
                None => {
                    let done = Done::closed();
                    state.done = Some(done.clone());
                    (done, None)
                }
            }
        };

        if let Some(extra) = unwatched {
            self.watch_with_callbacks(&extra);
        }
        done
    }

    fn spawn_watcher(
        self: &Arc<Self>,
        own: Done,
        extra: &ContextRef,
    ) -> std::io::Result<JoinHandle<()>> {
        let merged = Arc::clone(self);
        let extra_done = extra.done();

        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let main_done = merged.main.done();
                let (_, index, _) = futures::executor::block_on(select_all([
                    main_done.fired().boxed(),
                    extra_done.fired().boxed(),
                    own.fired().boxed(),
                ]));

                let source = match index {
                    0 => "main",
                    1 => "extra",
                    _ => "release",
                };
                if index < 2 {
                    if let Some(cause) = merged.poll_sources() {
                        debug!(source, %cause, "Watcher relayed cancellation");
                    }
                }
                debug!(source, "Merge watcher exiting");
            })?;

        debug!(thread = %self.thread_name, "Merge watcher started");
        Ok(handle)
    }

    /// Relays source cancellation through callbacks on both signals.
    fn watch_with_callbacks(self: &Arc<Self>, extra: &ContextRef) {
        let registrations = [self.main.done(), extra.done()].map(|done| {
            let weak = Arc::downgrade(self);
            done.register(move || {
                if let Some(merged) = weak.upgrade() {
                    merged.poll_sources();
                }
            })
        });

        let mut state = self.state.lock();
        if state.err.is_some() {
            drop(state);
            for registration in registrations {
                registration.stop();
            }
            return;
        }
        state.fallback.extend(registrations);
    }

    fn release(&self, cause: CancelError) {
        let canceled = self.cancel(cause);

        let (watcher, extra) = {
            let mut state = self.state.lock();
            (state.watcher.take(), state.extra.take())
        };
        drop(extra);

        if let Some(handle) = watcher {
            if handle.thread().id() == thread::current().id() {
                trace!("Release called on the watcher thread, not joining");
            } else if handle.join().is_err() {
                warn!("Merge watcher panicked");
            }
        }

        if canceled {
            debug!("Merged context released");
        }
    }
}

/// A merged context using the watcher strategy.
struct WatchedContext {
    inner: Arc<Watched>,
}

impl Context for WatchedContext {
    fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    fn done(&self) -> Done {
        self.inner.done()
    }

    fn err(&self) -> Option<CancelError> {
        self.inner.poll_sources()
    }

    fn value(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.main.value(key)
    }
}

impl std::fmt::Debug for WatchedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WatchedContext")
            .field("deadline", &self.inner.deadline)
            .field("err", &state.err)
            .field("watching", &state.watcher.is_some())
            .finish_non_exhaustive()
    }
}

pub(super) fn merge(
    main: &ContextRef,
    extra: &ContextRef,
    deadline: Option<Instant>,
    options: &MergeOptions,
) -> (ContextRef, CancelFn) {
    let inner = Watched::new(main, extra, deadline, options);

    let release = {
        let inner = Arc::clone(&inner);
        CancelFn::new(move |cause| inner.release(cause))
    };

    (Arc::new(WatchedContext { inner }), release)
}
