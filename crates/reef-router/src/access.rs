//! Per-key access bookkeeping.
//!
//! Nothing in routing reads these records; they exist for future warm-set
//! or eviction policies.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Access metadata for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    /// When the key was last routed.
    pub last_used: Instant,
    /// How many times the key has been routed.
    pub touches: u64,
}

/// Thread-safe map of key -> [`AccessRecord`].
///
/// A single lock guards the map; the critical section is one hash lookup.
#[derive(Debug, Default)]
pub struct AccessTracker {
    records: Mutex<HashMap<String, AccessRecord>>,
}

impl AccessTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access to `key` now.
    ///
    /// Creates the record on first access; later accesses overwrite the
    /// timestamp, which never moves backwards.
    pub fn touch(&self, key: &str) {
        let now = Instant::now();
        let mut records = self.records.lock().expect("tracker lock poisoned");

        match records.get_mut(key) {
            Some(record) => {
                record.last_used = record.last_used.max(now);
                record.touches += 1;
            }
            None => {
                records.insert(
                    key.to_string(),
                    AccessRecord {
                        last_used: now,
                        touches: 1,
                    },
                );
            }
        }
    }

    /// Look up the record for `key`.
    pub fn record(&self, key: &str) -> Option<AccessRecord> {
        self.records
            .lock()
            .expect("tracker lock poisoned")
            .get(key)
            .copied()
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.records.lock().expect("tracker lock poisoned").len()
    }

    /// Whether no key has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
