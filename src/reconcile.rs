use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const STATE_KEY: &str = "monad-match/state";

const MATCH_POINTS: u64 = 10;
/// Matches per multiplier step.
const COMBO_STEP: u32 = 5;
const MAX_MULTIPLIER: u64 = 5;

/// UI-visible counters, updated optimistically before any confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub score: u64,
    pub tx_count: u64,
    pub combo_counter: u32,
    pub score_multiplier: u64,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            score: 0,
            tx_count: 0,
            combo_counter: 0,
            score_multiplier: 1,
        }
    }
}

/// Durable key-value persistence for optimistic state. The server backs this
/// with process memory; a browser host would use local storage.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);
}

pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn put(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    InSync,
    /// Remote counters were ahead; local state now matches them.
    RemoteAdopted { score: u64 },
    /// Local score is ahead of the chain; the remote value still needs to be
    /// advanced by a contract write (a collaborator's responsibility).
    NeedsSync { local: u64, remote: u64 },
}

/// Keeps local optimistic counters consistent with the authoritative on-chain
/// ones. Every local mutation persists immediately so a reload cannot lose
/// progress.
pub struct StateReconciler {
    store: Arc<dyn StateStore>,
    state: RwLock<GameState>,
}

impl StateReconciler {
    /// Restores persisted state when present.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        let state = store
            .get(STATE_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            store,
            state: RwLock::new(state),
        }
    }

    /// Optimistic update for one recorded match.
    pub fn apply_match(&self) -> GameState {
        let snapshot = {
            let mut state = self.state.write();
            state.combo_counter += 1;
            state.score_multiplier =
                (1 + u64::from(state.combo_counter / COMBO_STEP)).min(MAX_MULTIPLIER);
            state.score += MATCH_POINTS * state.score_multiplier;
            state.tx_count += 1;
            state.clone()
        };
        self.persist(&snapshot);
        snapshot
    }

    /// Called when the board settles with no follow-up match.
    pub fn reset_combo(&self) {
        let snapshot = {
            let mut state = self.state.write();
            state.combo_counter = 0;
            state.score_multiplier = 1;
            state.clone()
        };
        self.persist(&snapshot);
    }

    /// Merges authoritative on-chain counters into local state.
    pub fn merge_remote(&self, remote_score: u64, remote_matches: u64) -> SyncOutcome {
        let mut state = self.state.write();
        if remote_score > state.score {
            state.score = remote_score;
            state.tx_count = state.tx_count.max(remote_matches);
            let snapshot = state.clone();
            drop(state);
            self.persist(&snapshot);
            info!(score = remote_score, "adopted remote score");
            return SyncOutcome::RemoteAdopted {
                score: remote_score,
            };
        }
        if state.score > remote_score {
            debug!(local = state.score, remote = remote_score, "local score ahead of chain");
            return SyncOutcome::NeedsSync {
                local: state.score,
                remote: remote_score,
            };
        }
        SyncOutcome::InSync
    }

    pub fn snapshot(&self) -> GameState {
        self.state.read().clone()
    }

    fn persist(&self, state: &GameState) {
        if let Ok(raw) = serde_json::to_string(state) {
            self.store.put(STATE_KEY, raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_updates_persist_across_restarts() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let reconciler = StateReconciler::new(Arc::clone(&store));
        reconciler.apply_match();
        reconciler.apply_match();
        let before = reconciler.snapshot();
        assert_eq!(before.tx_count, 2);
        assert_eq!(before.score, 20);

        let reloaded = StateReconciler::new(store);
        assert_eq!(reloaded.snapshot(), before);
    }

    #[test]
    fn combo_raises_the_multiplier() {
        let reconciler = StateReconciler::new(Arc::new(MemoryStore::new()));
        for _ in 0..5 {
            reconciler.apply_match();
        }
        assert_eq!(reconciler.snapshot().score_multiplier, 2);
        reconciler.reset_combo();
        assert_eq!(reconciler.snapshot().score_multiplier, 1);
        assert_eq!(reconciler.snapshot().combo_counter, 0);
    }

    #[test]
    fn remote_ahead_overwrites_local() {
        let reconciler = StateReconciler::new(Arc::new(MemoryStore::new()));
        reconciler.apply_match();
        let outcome = reconciler.merge_remote(500, 40);
        assert_eq!(outcome, SyncOutcome::RemoteAdopted { score: 500 });
        let state = reconciler.snapshot();
        assert_eq!(state.score, 500);
        assert_eq!(state.tx_count, 40);
    }

    #[test]
    fn local_ahead_signals_needs_sync() {
        let reconciler = StateReconciler::new(Arc::new(MemoryStore::new()));
        reconciler.apply_match();
        let outcome = reconciler.merge_remote(0, 0);
        assert_eq!(
            outcome,
            SyncOutcome::NeedsSync {
                local: 10,
                remote: 0
            }
        );
        // Local value is kept, not clobbered.
        assert_eq!(reconciler.snapshot().score, 10);
    }

    #[test]
    fn equal_counters_are_in_sync() {
        let reconciler = StateReconciler::new(Arc::new(MemoryStore::new()));
        assert_eq!(reconciler.merge_remote(0, 0), SyncOutcome::InSync);
    }
}
