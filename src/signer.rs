use alloy_primitives::{Address, B256};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

use crate::error::RelayError;

/// A private-key-derived relay identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    pub address: Address,
    pub private_key: B256,
}

struct Slot {
    signer: Signer,
    busy: AtomicBool,
}

struct Shared {
    slots: Vec<Slot>,
    freed: Notify,
}

/// Exclusive access to one of N relay identities. A signer is never held by
/// two in-flight batches at once; waiters are woken on release instead of
/// busy-polling. Cloning the pool shares the same slots.
#[derive(Clone)]
pub struct SignerPool {
    shared: Arc<Shared>,
}

impl SignerPool {
    pub fn new(signers: Vec<Signer>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: signers
                    .into_iter()
                    .map(|signer| Slot {
                        signer,
                        busy: AtomicBool::new(false),
                    })
                    .collect(),
                freed: Notify::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.shared.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.slots.is_empty()
    }

    /// Waits until a signer is free. Fails immediately when none are
    /// configured.
    pub async fn acquire(&self) -> Result<SignerGuard, RelayError> {
        if self.shared.slots.is_empty() {
            return Err(RelayError::NoSigner);
        }
        loop {
            // Register for the wakeup before scanning, so a release between
            // the scan and the await is not missed.
            let freed = self.shared.freed.notified();
            for (idx, slot) in self.shared.slots.iter().enumerate() {
                if slot
                    .busy
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    return Ok(SignerGuard {
                        shared: Arc::clone(&self.shared),
                        idx,
                    });
                }
            }
            freed.await;
        }
    }
}

/// Releases the signer on drop, so the slot frees on both the success and
/// failure paths of a batch.
pub struct SignerGuard {
    shared: Arc<Shared>,
    idx: usize,
}

impl std::fmt::Debug for SignerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerGuard")
            .field("idx", &self.idx)
            .finish_non_exhaustive()
    }
}

impl SignerGuard {
    pub fn signer(&self) -> &Signer {
        &self.shared.slots[self.idx].signer
    }

    pub fn address(&self) -> Address {
        self.signer().address
    }
}

impl Drop for SignerGuard {
    fn drop(&mut self) {
        self.shared.slots[self.idx].busy.store(false, Ordering::SeqCst);
        self.shared.freed.notify_one();
    }
}
