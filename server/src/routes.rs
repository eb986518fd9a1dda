use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use monad_match_relay::error::RelayError;
use monad_match_relay::event::MatchEvent;
use monad_match_relay::hashes::TxHashRecord;
use monad_match_relay::reconcile::GameState;
use monad_match_relay::relay::Relayer;

#[derive(Clone)]
pub struct AppState {
    pub relayer: Arc<Relayer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/matches", post(submit_match))
        .route("/api/hashes", get(recent_hashes).delete(clear_hashes))
        .route("/api/state", get(game_state))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    x: i64,
    y: i64,
    #[serde(rename = "candyType")]
    candy_type: i64,
}

#[derive(Serialize)]
struct MatchAccepted {
    accepted: bool,
    queued: usize,
}

/// Accepts one match event for relaying. Replies 202 with the current queue
/// depth; the eventual transaction hash is not returned synchronously.
async fn submit_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = event_from_request(&req)?;
    let pending = state.relayer.enqueue_match(event).map_err(ApiError)?;

    tokio::spawn(async move {
        match pending.wait().await {
            Ok(hash) => tracing::debug!(%hash, "relayed match submitted"),
            Err(err) => tracing::warn!(error = %err, "relayed match failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(MatchAccepted {
            accepted: true,
            queued: state.relayer.queue_depth(),
        }),
    ))
}

fn event_from_request(req: &MatchRequest) -> Result<MatchEvent, ApiError> {
    let narrow = |v: i64| u8::try_from(v).ok();
    match (narrow(req.x), narrow(req.y), narrow(req.candy_type)) {
        (Some(x), Some(y), Some(candy_type)) => Ok(MatchEvent { x, y, candy_type }),
        _ => Err(ApiError(RelayError::InvalidEvent(
            "coordinates and candy type must be small non-negative integers".into(),
        ))),
    }
}

async fn recent_hashes(State(state): State<AppState>) -> Json<Vec<TxHashRecord>> {
    Json(state.relayer.recent_hashes())
}

async fn clear_hashes(State(state): State<AppState>) -> StatusCode {
    state.relayer.clear_hashes();
    StatusCode::NO_CONTENT
}

async fn game_state(State(state): State<AppState>) -> Json<GameState> {
    Json(state.relayer.state())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    signers: usize,
    queued: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        signers: state.relayer.signer_count(),
        queued: state.relayer.queue_depth(),
    })
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(RelayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RelayError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_request_fields() {
        let ok = MatchRequest {
            x: 3,
            y: 4,
            candy_type: 2,
        };
        assert!(event_from_request(&ok).is_ok());

        let negative = MatchRequest {
            x: -1,
            y: 0,
            candy_type: 1,
        };
        assert!(event_from_request(&negative).is_err());

        let huge = MatchRequest {
            x: 0,
            y: 0,
            candy_type: 100_000,
        };
        assert!(event_from_request(&huge).is_err());
    }
}
