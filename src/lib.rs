//! # Error Trap
//!
//! In-process error capture: failures are recorded in a bounded history,
//! reported to a remote endpoint on a best-effort basis, and broadcast to
//! local subscribers.
//!
//! ## Core Concepts
//!
//! - **Records**: Immutable `ErrorRecord`s tagged with one of four capture paths
//! - **Signals**: A `SignalHub` carrying uncaught errors and unhandled rejections
//! - **Delivery**: A background worker that sends each record once
//! - **Subscriptions**: `app-error` events for in-process listeners
//!
//! ## Example
//!
//! ```ignore
//! use errtrap::{install_panic_hook, ErrorCollector, ErrorInput, ErrorKind, SignalHub};
//!
//! let hub = SignalHub::global();
//! install_panic_hook(Arc::clone(hub));
//!
//! let collector = ErrorCollector::new("checkout");
//! collector.attach(hub);
//!
//! // Record an error by hand
//! collector.log_error(ErrorInput::new(ErrorKind::SyncFunction, "cart is empty"));
//!
//! // Wrap a fallible function
//! let parse = collector.wrap_sync(|s: &str| s.parse::<u32>());
//! assert!(parse("nope").is_err());
//! assert_eq!(collector.errors().len(), 2);
//! ```

pub mod collector;
pub mod delivery;
pub mod error;
pub mod history;
pub mod signals;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use collector::{Captured, CollectorConfig, ErrorCollector};
#[cfg(feature = "http")]
pub use delivery::HttpTransport;
pub use delivery::{DeliveryConfig, DeliveryQueue, DeliveryStats, NullTransport, Transport};
pub use error::{CollectorError, Result};
pub use history::{ErrorHistory, DEFAULT_CAPACITY};
pub use signals::{
    install_panic_hook, ErrorObject, ListenerId, RejectionReason, SignalHub, UncaughtError,
    UnhandledRejection,
};
pub use subscriptions::{
    CollectorEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager, APP_ERROR_EVENT,
};
pub use types::*;
