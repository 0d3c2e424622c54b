use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::pipeline::Pipeline;
use crate::reassembly::{ReassemblyStore, ReceiveOutcome};

/// Shared application state for the ingest endpoint.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReassemblyStore>,
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkRequest {
    pub message_id: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default = "default_total_chunks")]
    pub total_chunks: usize,
    #[serde(default)]
    pub payload_b64: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_total_chunks() -> usize {
    1
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sim/send_chunk", post(send_chunk))
        .route("/health", get(health))
        .with_state(state)
}

/// Marshalling only: validate, feed the store, spawn processing on
/// completion. All the real work happens in the core modules.
async fn send_chunk(State(state): State<AppState>, Json(req): Json<ChunkRequest>) -> Response {
    if req.message_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing message_id"})),
        )
            .into_response();
    }
    if req.total_chunks == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "total_chunks must be positive"})),
        )
            .into_response();
    }

    let outcome = state.store.add_chunk(
        &req.message_id,
        req.chunk_index,
        req.total_chunks,
        req.payload_b64,
        req.client_id,
        req.timestamp,
    );

    match outcome {
        ReceiveOutcome::Complete(completed) => {
            log::debug!("Message {} complete, handing off", req.message_id);
            state.pipeline.spawn_process(completed);
            (
                StatusCode::OK,
                Json(json!({"status": "complete", "message_id": req.message_id})),
            )
                .into_response()
        }
        ReceiveOutcome::Received { received_count } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "received",
                "message_id": req.message_id,
                "received_chunks": received_count,
            })),
        )
            .into_response(),
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"ok": true, "model_loaded": state.pipeline.model_loaded()}))
}

pub async fn run(listen_addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("Listening on {listen_addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
