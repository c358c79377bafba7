//! Subscription types for captured-error broadcasts.

use crate::types::{ErrorKind, ErrorRecord};
use serde::{Deserialize, Serialize};

/// Name of the local broadcast event.
pub const APP_ERROR_EVENT: &str = "app-error";

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::default(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Filter by capture path (None = all kinds).
    pub kinds: Option<Vec<ErrorKind>>,

    /// Filter by owning app (None = any app).
    pub app: Option<String>,
}

impl SubscriptionFilter {
    /// Subscribe to every captured error.
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscribe to specific capture paths.
    pub fn kinds(kinds: Vec<ErrorKind>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    /// Subscribe to errors from one app.
    pub fn app(app: impl Into<String>) -> Self {
        Self {
            app: Some(app.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &ErrorRecord) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&record.kind) {
                return false;
            }
        }

        if let Some(ref app) = self.app {
            if app != &record.app {
                return false;
            }
        }

        true
    }
}

/// Events emitted to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CollectorEvent {
    /// An error was captured.
    AppError { record: ErrorRecord },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<CollectorEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<CollectorEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<CollectorEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<CollectorEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
