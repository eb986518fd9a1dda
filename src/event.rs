use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::RelayError;

/// Board is a fixed 8x8 grid.
pub const BOARD_SIZE: u8 = 8;
pub const CANDY_TYPE_MIN: u8 = 1;
pub const CANDY_TYPE_MAX: u8 = 6;

/// One candy match reported by gameplay. Immutable once enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchEvent {
    pub x: u8,
    pub y: u8,
    #[serde(rename = "candyType")]
    pub candy_type: u8,
}

impl MatchEvent {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.x >= BOARD_SIZE || self.y >= BOARD_SIZE {
            return Err(RelayError::InvalidEvent(format!(
                "coordinates ({}, {}) outside the {BOARD_SIZE}x{BOARD_SIZE} board",
                self.x, self.y
            )));
        }
        if !(CANDY_TYPE_MIN..=CANDY_TYPE_MAX).contains(&self.candy_type) {
            return Err(RelayError::InvalidEvent(format!(
                "candy type {} outside {CANDY_TYPE_MIN}..={CANDY_TYPE_MAX}",
                self.candy_type
            )));
        }
        Ok(())
    }
}

/// A match event waiting in the batch queue, paired with the channel that
/// resolves its caller-facing handle. Completed exactly once, on success or
/// permanent failure.
pub(crate) struct QueueEntry {
    pub event: MatchEvent,
    done: oneshot::Sender<Result<B256, RelayError>>,
}

impl QueueEntry {
    pub fn channel(event: MatchEvent) -> (Self, PendingMatch) {
        let (done, rx) = oneshot::channel();
        (Self { event, done }, PendingMatch { rx })
    }

    pub fn complete(self, result: Result<B256, RelayError>) {
        let _ = self.done.send(result);
    }
}

/// Caller-facing handle for an enqueued match. Resolves with the submitted
/// transaction hash, or the error after retries are exhausted.
#[derive(Debug)]
pub struct PendingMatch {
    rx: oneshot::Receiver<Result<B256, RelayError>>,
}

impl PendingMatch {
    pub async fn wait(self) -> Result<B256, RelayError> {
        self.rx.await.unwrap_or(Err(RelayError::ChannelClosed))
    }
}
