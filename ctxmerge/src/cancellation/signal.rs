//! One-shot done signal shared by every context.

use parking_lot::{Condvar, Mutex};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::warn;

/// A callback invoked once when a signal fires.
pub(crate) type DoneCallback = Box<dyn FnOnce() + Send>;

/// Process-wide firing order; 0 means not fired.
static FIRE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_fire_order() -> u64 {
    FIRE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Callbacks waiting for the signal, keyed by registration id.
#[derive(Default)]
struct Pending {
    next_id: u64,
    callbacks: Vec<(u64, DoneCallback)>,
}

struct Signal {
    /// Set exactly once, while holding `pending`.
    fired: AtomicBool,
    /// Position of this signal among all fired signals.
    fire_order: AtomicU64,
    pending: Mutex<Pending>,
    /// Wakes blocking waiters.
    cond: Condvar,
    /// Wakes async waiters.
    notify: Notify,
}

impl Signal {
    fn new(fired: bool) -> Self {
        Self {
            fired: AtomicBool::new(fired),
            fire_order: AtomicU64::new(if fired { next_fire_order() } else { 0 }),
            pending: Mutex::new(Pending::default()),
            cond: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn fire(&self) -> bool {
        let callbacks = {
            let mut pending = self.pending.lock();
            if self.is_fired() {
                return false;
            }
            self.fire_order.store(next_fire_order(), Ordering::Relaxed);
            self.fired.store(true, Ordering::Release);
            std::mem::take(&mut pending.callbacks)
        };

        self.cond.notify_all();
        self.notify.notify_waiters();

        for (_, callback) in callbacks {
            run_callback(callback);
        }
        true
    }
}

fn run_callback(callback: DoneCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Done callback panicked: {:?}", e);
    }
}

/// A one-shot signal that becomes observable exactly once, when its context
/// is canceled.
///
/// Cloning is cheap and every clone observes the same signal. Once fired it
/// stays fired.
#[derive(Clone)]
pub struct Done {
    /// `None` for a signal that can never fire.
    signal: Option<Arc<Signal>>,
}

impl Done {
    /// Creates a new signal that has not fired yet.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            signal: Some(Arc::new(Signal::new(false))),
        }
    }

    /// Returns the process-wide signal that has already fired.
    ///
    /// Every call returns a clone of the same signal; it is created once and
    /// never changes afterwards.
    #[must_use]
    pub fn closed() -> Self {
        static CLOSED: OnceLock<Done> = OnceLock::new();
        CLOSED
            .get_or_init(|| Self {
                signal: Some(Arc::new(Signal::new(true))),
            })
            .clone()
    }

    /// Returns a signal that never fires.
    #[must_use]
    pub const fn never() -> Self {
        Self { signal: None }
    }

    /// Returns whether the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.is_fired())
    }

    /// Returns the signal's position in the process-wide firing order.
    ///
    /// A signal that fired strictly before another (the second `fire` began
    /// after the first returned) has a smaller value. `None` until fired.
    #[must_use]
    pub fn fire_order(&self) -> Option<u64> {
        let signal = self.signal.as_ref()?;
        if !signal.is_fired() {
            return None;
        }
        Some(signal.fire_order.load(Ordering::Relaxed))
    }

    /// Returns false for a signal that can never fire.
    #[must_use]
    pub const fn can_fire(&self) -> bool {
        self.signal.is_some()
    }

    /// Returns true if both handles observe the same signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.signal, &other.signal) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Blocks the current thread until the signal fires.
    ///
    /// Blocks forever on a signal that can never fire.
    pub fn wait(&self) {
        let Some(signal) = &self.signal else {
            loop {
                std::thread::park();
            }
        };

        let mut pending = signal.pending.lock();
        while !signal.is_fired() {
            signal.cond.wait(&mut pending);
        }
    }

    /// Blocks until the signal fires or `timeout` elapses.
    ///
    /// Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(signal) = &self.signal else {
            std::thread::sleep(timeout);
            return false;
        };

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut pending = signal.pending.lock();
        while !signal.is_fired() {
            if signal.cond.wait_until(&mut pending, deadline).timed_out() {
                return signal.is_fired();
            }
        }
        true
    }

    /// Completes once the signal fires.
    ///
    /// Works on any executor; it does not need a Tokio runtime.
    pub async fn fired(&self) {
        let Some(signal) = &self.signal else {
            futures::future::pending::<()>().await;
            return;
        };

        loop {
            let mut notified = pin!(signal.notify.notified());
            notified.as_mut().enable();
            if signal.is_fired() {
                return;
            }
            notified.await;
        }
    }

    /// Registers a callback to run once when the signal fires.
    ///
    /// The callback runs on the thread that fires the signal. If the signal
    /// has already fired, the callback is invoked immediately on the calling
    /// thread. Callbacks on a signal that can never fire are dropped.
    pub fn register<F>(&self, callback: F) -> Registration
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(signal) = &self.signal else {
            return Registration::inert();
        };

        {
            let mut pending = signal.pending.lock();
            if !signal.is_fired() {
                let id = pending.next_id;
                pending.next_id += 1;
                pending.callbacks.push((id, Box::new(callback)));
                return Registration {
                    slot: Some((Arc::clone(signal), id)),
                };
            }
        }

        run_callback(Box::new(callback));
        Registration::inert()
    }

    /// Returns the number of callbacks still waiting for this signal.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.signal
            .as_ref()
            .map_or(0, |s| s.pending.lock().callbacks.len())
    }

    /// Fires the signal. Returns true only for the first call.
    pub(crate) fn fire(&self) -> bool {
        self.signal.as_ref().is_some_and(|s| s.fire())
    }
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("fired", &self.is_fired())
            .field("can_fire", &self.can_fire())
            .finish()
    }
}

/// A pending callback registered on a [`Done`] signal.
///
/// Dropping a registration leaves the callback in place; call [`stop`]
/// to detach it.
///
/// [`stop`]: Registration::stop
#[must_use = "dropping a Registration does not detach its callback"]
pub struct Registration {
    slot: Option<(Arc<Signal>, u64)>,
}

impl Registration {
    const fn inert() -> Self {
        Self { slot: None }
    }

    /// Detaches the callback from its signal.
    ///
    /// Returns true if the callback was removed before it started. Returns
    /// false if it already ran, is running right now, or was never pending.
    /// Once this returns the signal no longer holds the callback.
    pub fn stop(&self) -> bool {
        let Some((signal, id)) = &self.slot else {
            return false;
        };

        let removed = {
            let mut pending = signal.pending.lock();
            pending
                .callbacks
                .iter()
                .position(|(pending_id, _)| pending_id == id)
                .map(|index| pending.callbacks.swap_remove(index))
        };
        removed.is_some()
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.slot.as_ref().map(|(_, id)| *id))
            .finish()
    }
}
