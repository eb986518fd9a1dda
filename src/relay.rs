use std::sync::Arc;

use alloy_primitives::Address;

use crate::chain::{ChainEndpoint, HttpEndpoint};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::event::{MatchEvent, PendingMatch};
use crate::hashes::{HashLog, TxHashRecord};
use crate::queue::BatchProcessor;
use crate::reconcile::{GameState, MemoryStore, StateReconciler, SyncOutcome};
use crate::signer::SignerPool;
use crate::submit::Submitter;

/// Wires the signer pool, submitter, batch queue, hash log and reconciler
/// together behind the surface the route layer consumes.
pub struct Relayer {
    queue: BatchProcessor,
    hashes: Arc<HashLog>,
    reconciler: StateReconciler,
    endpoint: Arc<dyn ChainEndpoint>,
    signer_count: usize,
}

impl std::fmt::Debug for Relayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relayer")
            .field("signer_count", &self.signer_count)
            .finish_non_exhaustive()
    }
}

impl Relayer {
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let contract = config.contract.ok_or(RelayError::ContractUnresolved)?;
        let endpoint: Arc<dyn ChainEndpoint> =
            Arc::new(HttpEndpoint::new(config.rpc_url.clone(), contract));
        Self::with_endpoint(config, endpoint)
    }

    /// Builds the relayer against an injected endpoint.
    pub fn with_endpoint(
        config: &RelayConfig,
        endpoint: Arc<dyn ChainEndpoint>,
    ) -> Result<Self, RelayError> {
        if config.signers.is_empty() {
            return Err(RelayError::NoSigner);
        }
        let hashes = Arc::new(HashLog::new(config.hash_cap));
        let pool = SignerPool::new(config.signers.clone());
        let submitter = Arc::new(Submitter::new(
            Arc::clone(&endpoint),
            Arc::clone(&hashes),
            config.submit_policy(),
        ));
        let queue = BatchProcessor::new(config.batch_policy(), pool, submitter);
        let reconciler = StateReconciler::new(Arc::new(MemoryStore::new()));
        Ok(Self {
            queue,
            hashes,
            reconciler,
            endpoint,
            signer_count: config.signers.len(),
        })
    }

    /// Validates and queues one match. The optimistic counters advance
    /// immediately; the handle resolves with the transaction hash once the
    /// owning batch is submitted.
    pub fn enqueue_match(&self, event: MatchEvent) -> Result<PendingMatch, RelayError> {
        event.validate()?;
        self.reconciler.apply_match();
        Ok(self.queue.enqueue(event))
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn recent_hashes(&self) -> Vec<TxHashRecord> {
        self.hashes.recent()
    }

    pub fn clear_hashes(&self) {
        self.hashes.clear();
    }

    pub fn state(&self) -> GameState {
        self.reconciler.snapshot()
    }

    pub fn reset_combo(&self) {
        self.reconciler.reset_combo();
    }

    pub fn signer_count(&self) -> usize {
        self.signer_count
    }

    /// Pulls the authoritative counters for a player and merges them into
    /// local state.
    pub async fn sync_remote(&self, player: Address) -> Result<SyncOutcome, RelayError> {
        let score = self.endpoint.player_score(player).await?;
        let matches = self.endpoint.matches_made(player).await?;
        Ok(self
            .reconciler
            .merge_remote(score.saturating_to::<u64>(), matches.saturating_to::<u64>()))
    }
}
