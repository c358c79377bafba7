//! The error collector tying history, delivery, and broadcast together.

use crate::delivery::{DeliveryConfig, DeliveryQueue, DeliveryStats, Transport};
use crate::error::Result;
use crate::history::{ErrorHistory, DEFAULT_CAPACITY};
use crate::signals::{
    panic_message, without_forwarding, ListenerId, SignalHub, UncaughtError, UnhandledRejection,
};
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{capture_stack, ErrorInput, ErrorKind, ErrorRecord};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

/// Collector configuration.
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    /// Max records kept in history.
    /// Default: 100
    pub capacity: usize,

    /// Remote delivery settings.
    pub delivery: DeliveryConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            delivery: DeliveryConfig::default(),
        }
    }
}

/// Listeners installed on a hub.
struct Attachment {
    hub: Weak<SignalHub>,
    uncaught: ListenerId,
    rejection: ListenerId,
}

impl Attachment {
    fn remove(self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove_listener(self.uncaught);
            hub.remove_listener(self.rejection);
        }
    }
}

struct Inner {
    app: String,
    history: ErrorHistory,
    delivery: DeliveryQueue,
    subscriptions: SubscriptionManager,
    attachment: Mutex<Option<Attachment>>,
}

impl Inner {
    fn log_error(&self, input: ErrorInput) -> ErrorRecord {
        let record = ErrorRecord::from_input(&self.app, input);

        self.history.push(record.clone());

        tracing::error!(
            app = %self.app,
            kind = %record.kind,
            id = %record.id,
            "[{}] Error: {}",
            self.app,
            record.message
        );

        without_forwarding(|| {
            self.delivery.enqueue(record.clone());
            self.subscriptions.broadcast_error(&record);
        });

        record
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.get_mut().take() {
            attachment.remove();
        }
    }
}

/// Captures errors for one application.
///
/// Each captured error is:
/// - Appended to a bounded history (oldest evicted first)
/// - Queued for best-effort delivery to the logging endpoint
/// - Broadcast to local subscribers as an `app-error` event
///
/// Cloning is cheap; clones share the same history and worker. Hub listeners
/// are removed once the last clone is dropped.
#[derive(Clone)]
pub struct ErrorCollector {
    inner: Arc<Inner>,
}

impl ErrorCollector {
    /// Create a collector with default settings, reporting over HTTP.
    pub fn new(app: impl Into<String>) -> Self {
        Self::with_config(app, CollectorConfig::default())
    }

    /// Create a collector with default settings attached to the process-wide hub.
    pub fn install(app: impl Into<String>) -> Self {
        let collector = Self::new(app);
        collector.attach(SignalHub::global());
        collector
    }

    /// Create a collector reporting to `config.delivery`.
    ///
    /// Without the `http` feature, reports are discarded.
    pub fn with_config(app: impl Into<String>, config: CollectorConfig) -> Self {
        #[cfg(feature = "http")]
        let transport: Arc<dyn Transport> =
            Arc::new(crate::delivery::HttpTransport::new(&config.delivery));
        #[cfg(not(feature = "http"))]
        let transport: Arc<dyn Transport> = Arc::new(crate::delivery::NullTransport);

        Self::with_transport(app, config, transport)
    }

    /// Create a collector with a custom transport.
    pub fn with_transport(
        app: impl Into<String>,
        config: CollectorConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let app = app.into();
        tracing::debug!(app = %app, capacity = config.capacity, "Starting error collector");

        Self {
            inner: Arc::new(Inner {
                app,
                history: ErrorHistory::new(config.capacity),
                delivery: DeliveryQueue::start(transport, config.delivery.queue_capacity),
                subscriptions: SubscriptionManager::new(),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn app(&self) -> &str {
        &self.inner.app
    }

    pub fn capacity(&self) -> usize {
        self.inner.history.capacity()
    }

    // --- Signal Wiring ---

    /// Listen for uncaught errors and unhandled rejections on `hub`.
    ///
    /// Replaces any previous attachment.
    pub fn attach(&self, hub: &Arc<SignalHub>) {
        let weak = Arc::downgrade(&self.inner);
        let uncaught = hub.on_uncaught(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.log_error(event.to_input());
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let rejection = hub.on_unhandled_rejection(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.log_error(event.to_input());
            }
        });

        let previous = self.inner.attachment.lock().replace(Attachment {
            hub: Arc::downgrade(hub),
            uncaught,
            rejection,
        });
        if let Some(previous) = previous {
            previous.remove();
        }
    }

    /// Remove the hub listeners. Returns false if not attached.
    pub fn detach(&self) -> bool {
        let attachment = self.inner.attachment.lock().take();
        match attachment {
            Some(attachment) => {
                attachment.remove();
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attachment.lock().is_some()
    }

    // --- Capture ---

    /// Record an error: append to history, log it, queue delivery, and
    /// broadcast. Never fails.
    pub fn log_error(&self, input: ErrorInput) -> ErrorRecord {
        self.inner.log_error(input)
    }

    /// Record an uncaught error directly, without going through a hub.
    pub fn capture_uncaught(&self, event: &UncaughtError) -> ErrorRecord {
        self.log_error(event.to_input())
    }

    /// Record an unhandled rejection directly, without going through a hub.
    pub fn capture_rejection(&self, event: &UnhandledRejection) -> ErrorRecord {
        self.log_error(event.to_input())
    }

    /// Run `f`, recording an `Err` or panic as a `sync-function` error.
    ///
    /// The original `Err` is returned and the original panic resumed.
    pub fn capture_sync<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.log_error(ErrorInput::from_failure(ErrorKind::SyncFunction, &e));
                Err(e)
            }
            Err(payload) => {
                self.log_error(
                    ErrorInput::new(ErrorKind::SyncFunction, panic_message(payload.as_ref()))
                        .with_stack(capture_stack()),
                );
                resume_unwind(payload)
            }
        }
    }

    /// Wrap `f` so every failing call is recorded as a `sync-function` error.
    ///
    /// Multiple arguments are passed as a tuple.
    pub fn wrap_sync<A, T, E, F>(&self, f: F) -> impl Fn(A) -> std::result::Result<T, E>
    where
        F: Fn(A) -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        let collector = self.clone();
        move |args| collector.capture_sync(|| f(args))
    }

    /// Await `future`, recording an `Err` as an `async-function` error.
    pub fn capture_async<Fut>(&self, future: Fut) -> Captured<Fut> {
        Captured {
            inner: Box::pin(future),
            collector: self.clone(),
        }
    }

    /// Wrap an async function so every failing call is recorded as an
    /// `async-function` error.
    pub fn wrap_async<A, T, E, Fut, F>(&self, f: F) -> impl Fn(A) -> Captured<Fut>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let collector = self.clone();
        move |args| collector.capture_async(f(args))
    }

    // --- History ---

    /// Snapshot of captured errors, oldest first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.inner.history.snapshot()
    }

    pub fn clear_errors(&self) {
        self.inner.history.clear();
    }

    // --- Broadcast ---

    /// Subscribe to `app-error` events for errors captured from now on.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.inner.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.subscriptions.unsubscribe(id)
    }

    // --- Delivery ---

    pub fn delivery_stats(&self) -> DeliveryStats {
        self.inner.delivery.stats()
    }

    /// Wait until every error captured so far has been sent or discarded.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.inner.delivery.flush(timeout)
    }
}

impl fmt::Debug for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCollector")
            .field("app", &self.inner.app)
            .field("errors", &self.inner.history.len())
            .field("capacity", &self.inner.history.capacity())
            .finish()
    }
}

/// Future returned by [`ErrorCollector::capture_async`] and
/// [`ErrorCollector::wrap_async`].
///
/// Resolves to the inner future's output, recording an `Err` first.
pub struct Captured<Fut> {
    inner: Pin<Box<Fut>>,
    collector: ErrorCollector,
}

impl<Fut, T, E> Future for Captured<Fut>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    type Output = std::result::Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.inner.as_mut().poll(cx) {
            Poll::Ready(Err(e)) => {
                self.collector
                    .log_error(ErrorInput::from_failure(ErrorKind::AsyncFunction, &e));
                Poll::Ready(Err(e))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::NullTransport;
    use crate::error::CollectorError;

    fn test_collector(app: &str) -> ErrorCollector {
        ErrorCollector::with_transport(app, CollectorConfig::default(), Arc::new(NullTransport))
    }

    #[test]
    fn test_log_error_stamps_app_and_id() {
        let collector = test_collector("demo");
        let record = collector.log_error(ErrorInput::new(ErrorKind::SyncFunction, "boom"));

        assert_eq!(record.app, "demo");
        assert_eq!(record.id.as_str().len(), crate::types::ID_LEN);

        let errors = collector.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], record);
    }

    #[test]
    fn test_capture_sync_passes_success_through() {
        let collector = test_collector("demo");
        let value: std::result::Result<u32, CollectorError> = collector.capture_sync(|| Ok(7));
        assert_eq!(value.unwrap(), 7);
        assert!(collector.errors().is_empty());
    }

    #[test]
    fn test_capture_sync_resumes_panic() {
        let collector = test_collector("demo");
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _: std::result::Result<(), CollectorError> =
                collector.capture_sync(|| panic!("kaboom"));
        }));

        let payload = result.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "kaboom");

        let errors = collector.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::SyncFunction);
        assert_eq!(errors[0].message, "kaboom");
    }

    #[test]
    fn test_attach_replaces_previous() {
        let collector = test_collector("demo");
        let first = Arc::new(SignalHub::new());
        let second = Arc::new(SignalHub::new());

        collector.attach(&first);
        collector.attach(&second);

        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 2);

        first.dispatch_uncaught(&UncaughtError::new("ignored"));
        second.dispatch_uncaught(&UncaughtError::new("seen"));
        let errors = collector.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "seen");
    }

    #[test]
    fn test_drop_removes_listeners() {
        let hub = Arc::new(SignalHub::new());
        let collector = test_collector("demo");
        collector.attach(&hub);
        let clone = collector.clone();

        drop(collector);
        assert_eq!(hub.listener_count(), 2);

        drop(clone);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_debug_output() {
        let collector = test_collector("demo");
        let rendered = format!("{:?}", collector);
        assert!(rendered.contains("demo"));
        assert!(rendered.contains("capacity: 100"));
    }
}
