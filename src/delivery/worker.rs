//! Background delivery worker.

use crate::error::{CollectorError, Result};
use crate::signals::without_forwarding;
use crate::types::ErrorRecord;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::transport::Transport;

/// Remote delivery configuration.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    /// Scheme, host and port of the logging server.
    pub base_url: String,

    /// Fixed logging path on the server.
    /// Default: /api/errors/log
    pub path: String,

    /// Per-request timeout.
    /// Default: 10s
    pub timeout: Duration,

    /// Max records waiting for the worker before new ones are dropped.
    /// Default: 256
    pub queue_capacity: usize,
}

impl DeliveryConfig {
    /// Full endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            path: "/api/errors/log".to_string(),
            timeout: Duration::from_secs(10),
            queue_capacity: 256,
        }
    }
}

/// Delivery outcome counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Records the transport accepted.
    pub delivered: u64,
    /// Records the transport rejected (sent once, then discarded).
    pub failed: u64,
    /// Records never attempted because the queue was full or the worker gone.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum Job {
    Deliver(ErrorRecord),
    Flush(Sender<()>),
}

/// Bounded queue feeding a single delivery thread.
///
/// The thread owns the transport and exits once every queue handle is
/// dropped. It is never joined: an in-flight request may outlive the queue.
pub struct DeliveryQueue {
    sender: Sender<Job>,
    counters: Arc<Counters>,
}

impl DeliveryQueue {
    /// Spawn the worker thread.
    pub fn start(transport: Arc<dyn Transport>, queue_capacity: usize) -> Self {
        let (sender, receiver) = bounded(queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let worker_counters = Arc::clone(&counters);
        let spawned = thread::Builder::new()
            .name("errtrap-delivery".to_string())
            .spawn(move || run_worker(receiver, transport, worker_counters));

        // Without a worker the receiver is gone and every enqueue counts as dropped.
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Failed to spawn delivery worker, reports will be dropped");
        }

        Self { sender, counters }
    }

    /// Queue a record for delivery. Never blocks.
    ///
    /// Returns false if the record was dropped.
    pub fn enqueue(&self, record: ErrorRecord) -> bool {
        match self.sender.try_send(Job::Deliver(record)) {
            Ok(()) => true,
            Err(TrySendError::Full(Job::Deliver(record))) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(id = %record.id, "Delivery queue full, dropping error report");
                false
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Wait until every record queued before this call has been attempted.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let (ack_tx, ack_rx) = bounded(1);

        self.sender
            .send_deadline(Job::Flush(ack_tx), deadline)
            .map_err(|e| match e {
                crossbeam_channel::SendTimeoutError::Timeout(_) => {
                    CollectorError::FlushTimeout(timeout)
                }
                crossbeam_channel::SendTimeoutError::Disconnected(_) => {
                    CollectorError::WorkerClosed
                }
            })?;

        ack_rx.recv_deadline(deadline).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => CollectorError::FlushTimeout(timeout),
            crossbeam_channel::RecvTimeoutError::Disconnected => CollectorError::WorkerClosed,
        })
    }

    /// Current counters.
    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

fn run_worker(receiver: Receiver<Job>, transport: Arc<dyn Transport>, counters: Arc<Counters>) {
    for job in receiver.iter() {
        match job {
            Job::Deliver(record) => {
                let outcome = without_forwarding(|| {
                    catch_unwind(AssertUnwindSafe(|| transport.send(&record)))
                });
                match outcome {
                    Ok(Ok(())) => {
                        counters.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(id = %record.id, error = %e, "Failed to send error report");
                    }
                    Err(_) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(id = %record.id, "Transport panicked while sending error report");
                    }
                }
            }
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::NullTransport;
    use crate::types::{ErrorInput, ErrorKind};
    use parking_lot::Mutex;

    fn make_record(message: &str) -> ErrorRecord {
        ErrorRecord::from_input("test", ErrorInput::new(ErrorKind::Uncaught, message))
    }

    #[test]
    fn test_delivers_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let queue = DeliveryQueue::start(
            Arc::new(move |record: &ErrorRecord| -> Result<()> {
                sink.lock().push(record.message.clone());
                Ok(())
            }),
            16,
        );

        for i in 0..5 {
            assert!(queue.enqueue(make_record(&i.to_string())));
        }
        queue.flush(Duration::from_secs(5)).unwrap();

        assert_eq!(*seen.lock(), vec!["0", "1", "2", "3", "4"]);
        assert_eq!(
            queue.stats(),
            DeliveryStats {
                delivered: 5,
                failed: 0,
                dropped: 0
            }
        );
    }

    #[test]
    fn test_failed_send_not_retried() {
        let attempts = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&attempts);
        let queue = DeliveryQueue::start(
            Arc::new(move |_: &ErrorRecord| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CollectorError::Transport("connection refused".into()))
            }),
            16,
        );

        queue.enqueue(make_record("a"));
        queue.enqueue(make_record("b"));
        queue.flush(Duration::from_secs(5)).unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().failed, 2);
        assert_eq!(queue.stats().delivered, 0);
    }

    #[test]
    fn test_full_queue_drops() {
        let (release_tx, release_rx) = bounded::<()>(0);
        let release_rx = Mutex::new(release_rx);
        let queue = DeliveryQueue::start(
            Arc::new(move |_: &ErrorRecord| -> Result<()> {
                // Block the worker until the test releases it.
                let _ = release_rx.lock().recv();
                Ok(())
            }),
            1,
        );

        // First record occupies the worker, second fills the queue.
        assert!(queue.enqueue(make_record("in-flight")));
        let start = Instant::now();
        while queue.stats().dropped == 0 && start.elapsed() < Duration::from_secs(5) {
            queue.enqueue(make_record("overflow"));
        }
        assert!(queue.stats().dropped > 0);

        drop(release_tx);
        queue.flush(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_panicking_transport_counts_as_failed() {
        let queue = DeliveryQueue::start(
            Arc::new(|_: &ErrorRecord| -> Result<()> { panic!("transport bug") }),
            4,
        );
        queue.enqueue(make_record("a"));
        queue.flush(Duration::from_secs(5)).unwrap();
        assert_eq!(queue.stats().failed, 1);

        // Worker survives.
        queue.enqueue(make_record("b"));
        queue.flush(Duration::from_secs(5)).unwrap();
        assert_eq!(queue.stats().failed, 2);
    }

    #[test]
    fn test_endpoint_join() {
        let config = DeliveryConfig {
            base_url: "https://example.test/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://example.test/api/errors/log");
        let queue = DeliveryQueue::start(Arc::new(NullTransport), config.queue_capacity);
        queue.flush(Duration::from_secs(5)).unwrap();
    }
}
