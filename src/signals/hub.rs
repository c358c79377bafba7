//! Listener registry for host failure signals.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::events::{UncaughtError, UnhandledRejection};

/// Identifies an installed listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

type UncaughtListener = Arc<dyn Fn(&UncaughtError) + Send + Sync>;
type RejectionListener = Arc<dyn Fn(&UnhandledRejection) + Send + Sync>;

/// Dispatches failure signals to listeners in installation order.
pub struct SignalHub {
    uncaught: RwLock<BTreeMap<ListenerId, UncaughtListener>>,
    rejection: RwLock<BTreeMap<ListenerId, RejectionListener>>,
    next_id: AtomicU64,
}

impl SignalHub {
    pub fn new() -> Self {
        Self {
            uncaught: RwLock::new(BTreeMap::new()),
            rejection: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Process-wide hub.
    pub fn global() -> &'static Arc<SignalHub> {
        static GLOBAL: OnceLock<Arc<SignalHub>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(SignalHub::new()))
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn on_uncaught<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UncaughtError) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.uncaught.write().insert(id, Arc::new(listener));
        id
    }

    pub fn on_unhandled_rejection<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UnhandledRejection) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.rejection.write().insert(id, Arc::new(listener));
        id
    }

    /// Remove a listener of either kind. Returns false if it was not installed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.uncaught.write().remove(&id).is_some() || self.rejection.write().remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.uncaught.read().len() + self.rejection.read().len()
    }

    /// Deliver an uncaught error. Returns the number of listeners invoked.
    pub fn dispatch_uncaught(&self, event: &UncaughtError) -> usize {
        // Listeners run outside the lock so they may add or remove listeners.
        let listeners: Vec<UncaughtListener> = self.uncaught.read().values().cloned().collect();
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::debug!("Uncaught-error listener panicked");
            }
        }
        listeners.len()
    }

    /// Deliver an unhandled rejection. Returns the number of listeners invoked.
    pub fn dispatch_rejection(&self, event: &UnhandledRejection) -> usize {
        let listeners: Vec<RejectionListener> = self.rejection.read().values().cloned().collect();
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::debug!("Unhandled-rejection listener panicked");
            }
        }
        listeners.len()
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}
