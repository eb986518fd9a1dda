use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use alloy_primitives::B256;

use crate::chain::ChainEndpoint;
use crate::error::RelayError;
use crate::event::{MatchEvent, QueueEntry};
use crate::hashes::HashLog;
use crate::nonce::NonceTracker;
use crate::signer::Signer;

#[derive(Debug, Clone)]
pub struct SubmitPolicy {
    /// Attempts per event before its error is reported.
    pub max_attempts: u32,
    /// Linear backoff unit; attempt N waits N times this.
    pub retry_backoff: Duration,
    /// Pacing delay between submissions, so the rate-limited endpoint is not
    /// overwhelmed.
    pub send_delay: Duration,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            send_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub submitted: usize,
    pub failed: usize,
}

/// Converts a batch of match events plus one signer into a sequence of
/// submitted transactions with strictly increasing nonces in enqueue order.
/// Submissions are fired sequentially without awaiting confirmations.
pub struct Submitter {
    endpoint: Arc<dyn ChainEndpoint>,
    nonces: NonceTracker,
    hashes: Arc<HashLog>,
    policy: SubmitPolicy,
}

impl Submitter {
    pub fn new(endpoint: Arc<dyn ChainEndpoint>, hashes: Arc<HashLog>, policy: SubmitPolicy) -> Self {
        Self {
            endpoint,
            nonces: NonceTracker::new(),
            hashes,
            policy,
        }
    }

    /// Submits every entry under the given signer. Per-event failures are
    /// isolated; a failure to read the starting nonce aborts the whole batch
    /// and delivers the same error to every entry.
    pub(crate) async fn submit_batch(
        &self,
        entries: Vec<QueueEntry>,
        signer: &Signer,
    ) -> BatchOutcome {
        if entries.is_empty() {
            return BatchOutcome::default();
        }

        let base = match self.endpoint.transaction_count(signer.address).await {
            Ok(count) => count,
            Err(err) => {
                warn!(signer = %signer.address, error = %err, "starting nonce unavailable, aborting batch");
                let abort = RelayError::BatchAborted(err.to_string());
                let failed = entries.len();
                for entry in entries {
                    entry.complete(Err(abort.clone()));
                }
                return BatchOutcome {
                    submitted: 0,
                    failed,
                };
            }
        };
        self.nonces.reset(signer.address, base);
        debug!(signer = %signer.address, base, size = entries.len(), "starting batch");

        let mut outcome = BatchOutcome::default();
        let total = entries.len();
        for (idx, entry) in entries.into_iter().enumerate() {
            let result = self.submit_one(signer, &entry.event).await;
            match &result {
                Ok(hash) => {
                    self.hashes.record(*hash);
                    outcome.submitted += 1;
                    info!(signer = %signer.address, %hash, "match recorded");
                }
                Err(err) => {
                    outcome.failed += 1;
                    warn!(signer = %signer.address, error = %err, "match submission failed permanently");
                }
            }
            entry.complete(result);
            if idx + 1 < total {
                sleep(self.policy.send_delay).await;
            }
        }
        outcome
    }

    async fn submit_one(&self, signer: &Signer, event: &MatchEvent) -> Result<B256, RelayError> {
        let mut nonce = self.nonces.allocate(signer.address);
        let mut attempt = 1u32;
        loop {
            match self.endpoint.record_match(signer.address, nonce, event).await {
                Ok(hash) => return Ok(hash),
                // The chain is ahead of the seeded counter; skip forward and
                // retry without spending the attempt budget.
                Err(RelayError::NonceTooLow) => {
                    nonce = self.nonces.allocate(signer.address);
                    warn!(signer = %signer.address, nonce, "nonce too low, advancing");
                }
                Err(err) if attempt < self.policy.max_attempts => {
                    debug!(signer = %signer.address, attempt, error = %err, "submission failed, retrying");
                    sleep(self.policy.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
