//! Best-effort remote delivery of captured errors.
//!
//! Records are handed to a background worker through a bounded queue and sent
//! once through a [`Transport`]:
//! - A full queue drops the record
//! - A failed send is counted and discarded
//! - Nothing is retried
//!
//! # Example
//!
//! ```ignore
//! let queue = DeliveryQueue::start(Arc::new(NullTransport), 256);
//! queue.enqueue(record);
//! queue.flush(Duration::from_secs(1))?;
//! assert_eq!(queue.stats().delivered, 1);
//! ```

mod transport;
mod worker;

#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{NullTransport, Transport};
pub use worker::{DeliveryConfig, DeliveryQueue, DeliveryStats};
