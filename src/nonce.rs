use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-signer transaction counters. Seeded from the chain's confirmed
/// transaction count at the start of each batch, advanced locally per
/// submission, never decremented within a process run.
pub struct NonceTracker {
    counters: DashMap<Address, Arc<AtomicU64>>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Hands out the next nonce for a signer and advances the counter.
    /// The same value is never issued to two in-flight submissions.
    pub fn allocate(&self, address: Address) -> u64 {
        let entry = self
            .counters
            .entry(address)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        entry.fetch_add(1, Ordering::SeqCst)
    }

    /// Current counter without advancing it.
    pub fn current(&self, address: Address) -> u64 {
        self.counters
            .get(&address)
            .map(|v| v.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Seeds or corrects the counter, e.g. from the remote transaction count
    /// at batch start.
    pub fn reset(&self, address: Address, value: u64) {
        let entry = self
            .counters
            .entry(address)
            .or_insert_with(|| Arc::new(AtomicU64::new(value)));
        entry.store(value, Ordering::SeqCst);
    }
}

impl Default for NonceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn allocates_strictly_increasing() {
        let tracker = NonceTracker::new();
        let addr = Address::repeat_byte(0xAA);
        tracker.reset(addr, 7);
        assert_eq!(tracker.allocate(addr), 7);
        assert_eq!(tracker.allocate(addr), 8);
        assert_eq!(tracker.allocate(addr), 9);
        assert_eq!(tracker.current(addr), 10);
    }

    #[test]
    fn counters_are_independent_per_signer() {
        let tracker = NonceTracker::new();
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        tracker.reset(a, 100);
        assert_eq!(tracker.allocate(a), 100);
        assert_eq!(tracker.allocate(b), 0);
        assert_eq!(tracker.allocate(a), 101);
    }

    #[test]
    fn never_issues_duplicate_nonces_concurrently() {
        let tracker = Arc::new(NonceTracker::new());
        let addr = Address::repeat_byte(0xCC);
        let seen = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let nonce = tracker.allocate(addr);
                        assert!(seen.lock().unwrap().insert(nonce), "duplicate nonce {nonce}");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 800);
    }
}
