//! Transaction relaying core for the Monad Match mini-app.
//!
//! Gameplay reports candy-match events; this crate batches them, assigns
//! per-signer nonces, and submits one `recordMatch` transaction per event
//! against the match contract on a rate-limited testnet RPC endpoint.
//! Optimistic score state is reconciled against the authoritative on-chain
//! counters.

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod hashes;
pub mod nonce;
pub mod queue;
pub mod reconcile;
pub mod relay;
pub mod signer;
pub mod submit;
