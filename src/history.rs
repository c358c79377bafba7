//! Bounded in-memory error history.

use crate::types::ErrorRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default number of records retained.
pub const DEFAULT_CAPACITY: usize = 100;

/// FIFO history of captured errors.
///
/// Append and eviction happen under one lock acquisition, so concurrent
/// writers never observe the history above capacity.
pub struct ErrorHistory {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
}

impl ErrorHistory {
    /// Create a history holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a record, evicting from the front if over capacity.
    ///
    /// Returns the evicted record, if any.
    pub fn push(&self, record: ErrorRecord) -> Option<ErrorRecord> {
        let mut records = self.records.lock();
        records.push_back(record);
        if records.len() > self.capacity {
            records.pop_front()
        } else {
            None
        }
    }

    /// Snapshot of the history, oldest first.
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ErrorHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorInput, ErrorKind};
    use proptest::prelude::*;

    fn make_record(message: &str) -> ErrorRecord {
        ErrorRecord::from_input("test", ErrorInput::new(ErrorKind::SyncFunction, message))
    }

    #[test]
    fn test_evicts_oldest_first() {
        let history = ErrorHistory::new(3);
        for i in 0..3 {
            assert!(history.push(make_record(&i.to_string())).is_none());
        }

        let evicted = history.push(make_record("3")).unwrap();
        assert_eq!(evicted.message, "0");

        let messages: Vec<_> = history.snapshot().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_clear() {
        let history = ErrorHistory::default();
        history.push(make_record("a"));
        history.push(make_record("b"));
        history.clear();
        assert!(history.is_empty());
        assert!(history.snapshot().is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let history = ErrorHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(make_record("a"));
        history.push(make_record("b"));
        assert_eq!(history.snapshot()[0].message, "b");
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(capacity in 1usize..50, count in 0usize..200) {
            let history = ErrorHistory::new(capacity);
            for i in 0..count {
                history.push(make_record(&i.to_string()));
                prop_assert!(history.len() <= capacity);
            }

            // Survivors are the newest records, in insertion order.
            let kept: Vec<usize> = history
                .snapshot()
                .into_iter()
                .map(|r| r.message.parse().unwrap())
                .collect();
            let expected: Vec<usize> = (count.saturating_sub(capacity)..count).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
