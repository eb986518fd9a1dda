use thiserror::Error;

/// Relay failure taxonomy. `Clone` so a batch-level error can fan out to
/// every pending entry in the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("no signer available")]
    NoSigner,

    #[error("contract address unresolved")]
    ContractUnresolved,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid match event: {0}")]
    InvalidEvent(String),

    /// The chain already has a transaction at the attempted nonce. The
    /// submitter corrects this by advancing the counter, free of retry budget.
    #[error("nonce too low")]
    NonceTooLow,

    #[error("rpc error: {0}")]
    Rpc(String),

    /// The batch could not start (e.g. the signer's transaction count was
    /// unreadable); every entry in the batch receives this.
    #[error("batch aborted: {0}")]
    BatchAborted(String),

    #[error("relay dropped before completion")]
    ChannelClosed,
}

impl RelayError {
    /// Classifies a raw RPC error message.
    pub fn from_rpc_message(message: &str) -> Self {
        if message.to_ascii_lowercase().contains("nonce too low") {
            RelayError::NonceTooLow
        } else {
            RelayError::Rpc(message.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_nonce_too_low() {
        assert_eq!(
            RelayError::from_rpc_message("Nonce too low: next nonce 42"),
            RelayError::NonceTooLow
        );
        assert_eq!(
            RelayError::from_rpc_message("insufficient funds"),
            RelayError::Rpc("insufficient funds".into())
        );
    }
}
