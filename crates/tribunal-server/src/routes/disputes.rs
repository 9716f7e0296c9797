use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use tribunal_core::{kind_for_filename, verify_structure, ObjectStore};
use tribunal_schema::{
    ChatGuidance, ChatMessage, DisputeSubmission, DisputeType, EvidenceUpload, FinalizeSummary,
    MessageOutcome, ResolutionOutcome,
};
use tribunal_store::DisputeStore;

use crate::routes::request_error_status;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitDisputeRequest {
    pub transaction_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub dispute_type: DisputeType,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub evidence: Option<EvidenceUpload>,
}

#[derive(Debug, Deserialize)]
pub struct DisputeMessageRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub additional_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GuidanceRequest {
    #[serde(default)]
    pub conversation_context: String,
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submit", post(submit_dispute))
        .route("/upload", post(upload_evidence))
        .route("/{id}", get(get_dispute))
        .route("/{id}/message", post(dispute_message))
        .route("/{id}/finalize", post(finalize_dispute))
        .route("/{id}/chat", post(guidance_chat))
        .route("/{id}/analyze", post(analyze_conversation))
}

/// Accepts a dispute, persists it and acks immediately. Automated resolution
/// runs off the request path.
async fn submit_dispute(
    State(state): State<AppState>,
    Json(body): Json<SubmitDisputeRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if body.transaction_id.trim().is_empty()
        || body.buyer_id.trim().is_empty()
        || body.seller_id.trim().is_empty()
        || body.currency.trim().is_empty()
        || !body.amount.is_finite()
        || body.amount <= 0.0
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let dispute = DisputeSubmission::new(
        body.transaction_id,
        body.buyer_id,
        body.seller_id,
        body.dispute_type,
        body.amount,
        body.currency,
        body.additional_info,
    );
    let dispute_id = dispute.id;

    state.store.save_dispute(&dispute).await.map_err(|e| {
        tracing::error!(error = %e, "failed to persist dispute");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let outcome = orchestrator.process_dispute(&dispute, body.evidence).await;
        tracing::info!(dispute_id = %dispute.id, ?outcome, "dispute processed");
    });

    Ok(Json(json!({
        "status": "dispute submitted",
        "dispute_id": dispute_id,
    })))
}

async fn get_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeSubmission>, StatusCode> {
    let dispute = state
        .store
        .get_dispute(id)
        .await
        .map_err(request_error_status)?;
    match dispute {
        Some(dispute) => Ok(Json(dispute)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Message inside an existing dispute conversation; screening outcome is
/// returned synchronously.
async fn dispute_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DisputeMessageRequest>,
) -> Result<Json<MessageOutcome>, StatusCode> {
    if body.sender_id.trim().is_empty()
        || body.receiver_id.trim().is_empty()
        || body.message_text.trim().is_empty()
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message =
        ChatMessage::for_dispute(body.sender_id, body.receiver_id, body.message_text, id);
    let outcome = state
        .orchestrator
        .process_dispute_chat_message(&message)
        .await
        .map_err(request_error_status)?;
    Ok(Json(outcome))
}

async fn finalize_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FinalizeRequest>,
) -> Result<Json<FinalizeSummary>, StatusCode> {
    let summary = state
        .orchestrator
        .finalize_dispute(id, body.additional_info)
        .await
        .map_err(request_error_status)?;
    Ok(Json(summary))
}

async fn guidance_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GuidanceRequest>,
) -> Result<Json<ChatGuidance>, StatusCode> {
    let guidance = state
        .orchestrator
        .interactive_dispute_chat(id, &body.conversation_context, &body.message)
        .await
        .map_err(request_error_status)?;
    Ok(Json(guidance))
}

async fn analyze_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResolutionOutcome>, StatusCode> {
    let outcome = state
        .orchestrator
        .analyze_dispute_conversation(id)
        .await
        .map_err(request_error_status)?;
    Ok(Json(outcome))
}

/// Multipart evidence upload. Bytes land in the object store; PDFs get a
/// structural verdict recorded in the response, unknown media types are
/// rejected outright.
async fn upload_evidence(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            return Err(StatusCode::BAD_REQUEST);
        };
        // Clients may send a full path; only the final component matters.
        let base_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        let Some(kind) = kind_for_filename(&base_name) else {
            return Err(StatusCode::BAD_REQUEST);
        };

        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let verification = verify_structure(kind, &bytes);

        let destination = format!("evidence/{}-{}", Uuid::new_v4(), base_name);
        let stored = state
            .objects
            .put(&destination, bytes.to_vec())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "evidence upload failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        return Ok(Json(json!({
            "status": "success",
            "locator": stored.locator,
            "sha256": stored.sha256,
            "size": stored.size,
            "file_type": kind.as_str(),
            "verification_status": verification,
        })));
    }

    Err(StatusCode::BAD_REQUEST)
}
