//! Host failure signals.
//!
//! A [`SignalHub`] stands in for the host's global event target: the host
//! (or [`install_panic_hook`]) dispatches uncaught errors and unhandled
//! rejections into it, and collectors attach listeners to it.
//!
//! # Example
//!
//! ```ignore
//! let hub = Arc::new(SignalHub::new());
//! install_panic_hook(Arc::clone(&hub));
//!
//! let collector = ErrorCollector::new("demo");
//! collector.attach(&hub);
//!
//! hub.dispatch_rejection(&UnhandledRejection::new(json!("timed out")));
//! ```

mod events;
mod hub;
mod panic;

pub use events::{ErrorObject, RejectionReason, UncaughtError, UnhandledRejection};
pub use hub::{ListenerId, SignalHub};
pub use panic::install_panic_hook;
pub(crate) use panic::{panic_message, without_forwarding};
