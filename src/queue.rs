use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event::{MatchEvent, PendingMatch, QueueEntry};
use crate::signer::SignerPool;
use crate::submit::Submitter;

#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Flush as soon as this many events are buffered.
    pub batch_size: usize,
    /// Flush whatever is buffered this long after the first enqueue.
    pub batch_timeout: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 15,
            batch_timeout: Duration::from_secs(60),
        }
    }
}

struct Inner {
    buffer: VecDeque<QueueEntry>,
    in_flight: bool,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    policy: BatchPolicy,
    pool: SignerPool,
    submitter: Arc<Submitter>,
    inner: Mutex<Inner>,
}

/// Accumulates match events and decides when to hand a batch to the
/// submitter. At most one flush is in flight at a time; the buffer and the
/// in-flight flag are only touched under the mutex, never across an await, so
/// a batch cannot be duplicated or dropped between two flush attempts.
/// Clones share the same queue.
#[derive(Clone)]
pub struct BatchProcessor {
    shared: Arc<Shared>,
}

impl BatchProcessor {
    pub fn new(policy: BatchPolicy, pool: SignerPool, submitter: Arc<Submitter>) -> Self {
        Self {
            shared: Arc::new(Shared {
                policy,
                pool,
                submitter,
                inner: Mutex::new(Inner {
                    buffer: VecDeque::new(),
                    in_flight: false,
                    timer: None,
                }),
            }),
        }
    }

    /// Buffered events not yet spliced into a batch.
    pub fn depth(&self) -> usize {
        self.shared.inner.lock().buffer.len()
    }

    /// Appends an event and evaluates the flush triggers. The handle resolves
    /// once the event's transaction hash is known or it fails permanently.
    pub fn enqueue(&self, event: MatchEvent) -> PendingMatch {
        let (entry, pending) = QueueEntry::channel(event);
        let mut inner = self.shared.inner.lock();
        inner.buffer.push_back(entry);
        if inner.buffer.len() >= self.shared.policy.batch_size && !inner.in_flight {
            self.begin_flush(&mut inner);
        } else if inner.buffer.len() == 1 {
            // First item since the last flush started a fresh buffer.
            self.arm_timer(&mut inner);
        }
        pending
    }

    /// Splices the oldest batch out of the buffer and spawns its dispatch.
    /// Caller holds the lock; flushing an empty buffer is a no-op.
    fn begin_flush(&self, inner: &mut Inner) {
        if inner.buffer.is_empty() || inner.in_flight {
            return;
        }
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        let take = inner.buffer.len().min(self.shared.policy.batch_size);
        let batch: Vec<QueueEntry> = inner.buffer.drain(..take).collect();
        inner.in_flight = true;

        let this = self.clone();
        tokio::spawn(async move {
            this.dispatch(batch).await;
        });
    }

    fn arm_timer(&self, inner: &mut Inner) {
        if inner.timer.is_some() {
            return;
        }
        let this = self.clone();
        let timeout = self.shared.policy.batch_timeout;
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut inner = this.shared.inner.lock();
            inner.timer = None;
            if !inner.in_flight {
                debug!(
                    pending = inner.buffer.len(),
                    "batch timeout reached, flushing partial batch"
                );
                this.begin_flush(&mut inner);
            }
        }));
    }

    async fn dispatch(&self, batch: Vec<QueueEntry>) {
        let size = batch.len();
        match self.shared.pool.acquire().await {
            Ok(guard) => {
                info!(signer = %guard.address(), size, "dispatching batch");
                let outcome = self
                    .shared
                    .submitter
                    .submit_batch(batch, guard.signer())
                    .await;
                info!(
                    submitted = outcome.submitted,
                    failed = outcome.failed,
                    "batch complete"
                );
            }
            Err(err) => {
                warn!(error = %err, "no signer for batch");
                for entry in batch {
                    entry.complete(Err(err.clone()));
                }
            }
        }

        let mut inner = self.shared.inner.lock();
        inner.in_flight = false;
        if inner.buffer.len() >= self.shared.policy.batch_size {
            self.begin_flush(&mut inner);
        } else if !inner.buffer.is_empty() {
            // Residual items added during the flush wait for the next timeout.
            self.arm_timer(&mut inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainEndpoint;
    use crate::chain::mock::MockEndpoint;
    use crate::hashes::HashLog;
    use crate::signer::Signer;
    use crate::submit::{SubmitPolicy, Submitter};
    use alloy_primitives::{Address, B256};

    fn event(n: u8) -> MatchEvent {
        MatchEvent {
            x: n % 8,
            y: n / 8,
            candy_type: 1,
        }
    }

    fn pool(signers: usize) -> SignerPool {
        SignerPool::new(
            (0..signers)
                .map(|n| Signer {
                    address: Address::repeat_byte(n as u8 + 1),
                    private_key: B256::repeat_byte(n as u8 + 1),
                })
                .collect(),
        )
    }

    fn processor(
        batch_size: usize,
        endpoint: &Arc<MockEndpoint>,
        signers: usize,
    ) -> BatchProcessor {
        let submitter = Arc::new(Submitter::new(
            Arc::clone(endpoint) as Arc<dyn ChainEndpoint>,
            Arc::new(HashLog::new(50)),
            SubmitPolicy::default(),
        ));
        BatchProcessor::new(
            BatchPolicy {
                batch_size,
                batch_timeout: Duration::from_secs(60),
            },
            pool(signers),
            submitter,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_waits_for_the_timeout() {
        let endpoint = Arc::new(MockEndpoint::new(0));
        let queue = processor(5, &endpoint, 1);

        let pending: Vec<_> = (0..3).map(|n| queue.enqueue(event(n))).collect();

        // Just short of the timeout: nothing has been flushed.
        tokio::time::sleep(Duration::from_millis(59_900)).await;
        assert_eq!(queue.depth(), 3);
        assert!(endpoint.submitted_events().is_empty());

        // Past the timeout: exactly one flush with every event, in order.
        for handle in pending {
            handle.wait().await.unwrap();
        }
        assert_eq!(
            endpoint.submitted_events(),
            (0..3).map(event).collect::<Vec<_>>()
        );
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_flushes_immediately() {
        let endpoint = Arc::new(MockEndpoint::new(0));
        let queue = processor(5, &endpoint, 1);

        let pending: Vec<_> = (0..5).map(|n| queue.enqueue(event(n))).collect();
        // The batch was spliced out synchronously on the fifth enqueue.
        assert_eq!(queue.depth(), 0);

        for handle in pending {
            handle.wait().await.unwrap();
        }
        assert_eq!(
            endpoint.submitted_events(),
            (0..5).map(event).collect::<Vec<_>>()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_starts_a_fresh_buffer_and_timer() {
        let endpoint = Arc::new(MockEndpoint::new(0));
        let queue = processor(15, &endpoint, 1);

        let pending: Vec<_> = (0..20).map(|n| queue.enqueue(event(n))).collect();
        // First 15 spliced out immediately; 5 held for the next cycle.
        assert_eq!(queue.depth(), 5);

        let mut pending = pending.into_iter();
        for handle in pending.by_ref().take(15) {
            handle.wait().await.unwrap();
        }
        assert_eq!(endpoint.submitted_events().len(), 15);
        assert_eq!(
            endpoint.submitted_events(),
            (0..15).map(event).collect::<Vec<_>>()
        );

        // The residue flushes on its own timer.
        for handle in pending {
            handle.wait().await.unwrap();
        }
        assert_eq!(endpoint.submitted_events().len(), 20);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_during_flight_waits_for_next_cycle() {
        let endpoint = Arc::new(MockEndpoint::new(0));
        endpoint.set_response_delay(Duration::from_secs(1));
        let queue = processor(2, &endpoint, 1);

        let first: Vec<_> = (0..2).map(|n| queue.enqueue(event(n))).collect();
        // Flush of the first two is in flight; this one must not join it.
        let late = queue.enqueue(event(2));
        assert_eq!(queue.depth(), 1);

        for handle in first {
            handle.wait().await.unwrap();
        }
        assert_eq!(endpoint.submitted_events(), vec![event(0), event(1)]);

        late.wait().await.unwrap();
        assert_eq!(
            endpoint.submitted_events(),
            vec![event(0), event(1), event(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn nonce_sequence_spans_the_whole_batch() {
        let endpoint = Arc::new(MockEndpoint::new(40));
        let queue = processor(4, &endpoint, 1);

        let pending: Vec<_> = (0..4).map(|n| queue.enqueue(event(n))).collect();
        for handle in pending {
            handle.wait().await.unwrap();
        }
        assert_eq!(endpoint.submitted_nonces(), vec![40, 41, 42, 43]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_fails_the_batch() {
        let endpoint = Arc::new(MockEndpoint::new(0));
        let queue = processor(1, &endpoint, 0);

        let pending = queue.enqueue(event(0));
        assert_eq!(
            pending.wait().await,
            Err(crate::error::RelayError::NoSigner)
        );
        assert!(endpoint.submitted_events().is_empty());
    }
}
