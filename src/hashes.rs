use alloy_primitives::B256;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxHashRecord {
    pub hash: B256,
    /// Unix milliseconds at append time.
    pub timestamp: u64,
}

/// Bounded, time-ordered log of submitted transaction hashes. Oldest entries
/// are evicted once the cap is reached.
pub struct HashLog {
    records: RwLock<VecDeque<TxHashRecord>>,
    cap: usize,
}

impl HashLog {
    pub fn new(cap: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn record(&self, hash: B256) {
        let record = TxHashRecord {
            hash,
            timestamp: unix_millis(),
        };
        let mut records = self.records.write();
        if records.len() >= self.cap {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Retained hashes, newest first.
    pub fn recent(&self) -> Vec<TxHashRecord> {
        self.records.read().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    #[test]
    fn newest_hash_is_first() {
        let log = HashLog::new(10);
        log.record(hash(1));
        log.record(hash(2));
        log.record(hash(3));

        let recent = log.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].hash, hash(3));
        assert_eq!(recent[2].hash, hash(1));
    }

    #[test]
    fn evicts_oldest_past_cap() {
        let log = HashLog::new(3);
        for n in 1..=5 {
            log.record(hash(n));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].hash, hash(5));
        assert_eq!(recent[2].hash, hash(3));
    }

    #[test]
    fn clear_empties_the_log() {
        let log = HashLog::new(3);
        log.record(hash(1));
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
        assert!(log.recent().is_empty());
    }
}
