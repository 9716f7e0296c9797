use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use tribunal_schema::{ChatMessage, FraudScan, IntentScan};
use tribunal_store::DisputeStore;

use crate::routes::request_error_status;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub message_text: String,
    #[serde(default)]
    pub dispute_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: String,
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub dispute_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub dispute_id: Option<Uuid>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send_message))
        .route("/intent", post(check_intent))
        .route("/scan", post(scan_history))
        .route("/history", get(message_history))
}

/// Accepts a message, persists it and acks immediately. Screening and the
/// intent check run off the request path.
async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if body.sender_id.trim().is_empty()
        || body.receiver_id.trim().is_empty()
        || body.message_text.trim().is_empty()
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut message = ChatMessage::new(body.sender_id, body.receiver_id, body.message_text);
    message.dispute_id = body.dispute_id;
    let message_id = message.id;

    state.store.save_message(&message).await.map_err(|e| {
        tracing::error!(error = %e, "failed to persist chat message");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.process_chat_message(&message).await {
            Ok(outcome) => {
                tracing::info!(message_id = %message.id, ?outcome, "chat message processed");
            }
            Err(e) => {
                tracing::error!(message_id = %message.id, error = %e, "chat message processing failed");
            }
        }
    });

    Ok(Json(json!({
        "status": "message received",
        "message_id": message_id,
    })))
}

/// Synchronous platform-switch intent check for one message.
async fn check_intent(
    State(state): State<AppState>,
    Json(body): Json<IntentRequest>,
) -> Result<Json<IntentScan>, StatusCode> {
    if body.message_text.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message = ChatMessage::new(body.sender_id, body.receiver_id, body.message_text);
    let scan = state
        .orchestrator
        .process_chat_intent(&message)
        .await
        .map_err(request_error_status)?;
    Ok(Json(scan))
}

/// Deterministic fraud scan over stored history, optionally scoped to one
/// dispute.
async fn scan_history(
    State(state): State<AppState>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<FraudScan>, StatusCode> {
    let history = state
        .store
        .get_history(body.dispute_id)
        .await
        .map_err(request_error_status)?;
    Ok(Json(state.orchestrator.process_chat_for_fraud(&history)))
}

async fn message_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    let history = state
        .store
        .get_history(query.dispute_id)
        .await
        .map_err(request_error_status)?;
    Ok(Json(history))
}
