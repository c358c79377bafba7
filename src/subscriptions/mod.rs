//! Local broadcast of captured errors.
//!
//! Every captured error is published as an `app-error` event to in-process
//! subscribers. Subscriptions support:
//! - Filtering by capture path or owning app
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let handle = collector.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::kinds(vec![ErrorKind::Uncaught]),
//!     ..Default::default()
//! });
//!
//! loop {
//!     match handle.recv() {
//!         Ok(CollectorEvent::AppError { record }) => println!("captured: {}", record.message),
//!         Ok(CollectorEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    CollectorEvent, DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, APP_ERROR_EVENT,
};
