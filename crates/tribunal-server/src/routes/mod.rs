pub mod chat;
pub mod disputes;

use axum::http::StatusCode;
use axum::Router;

use crate::state::AppState;
use tribunal_core::RequestError;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/chat", chat::router())
        .nest("/disputes", disputes::router())
}

/// Maps orchestrator request errors onto HTTP codes. Anything not typed as a
/// request error is a server fault.
pub(crate) fn request_error_status(error: anyhow::Error) -> StatusCode {
    match error.downcast_ref::<RequestError>() {
        Some(RequestError::DisputeNotFound(_)) => StatusCode::NOT_FOUND,
        Some(RequestError::Invalid(_)) => StatusCode::BAD_REQUEST,
        None => {
            tracing::error!(error = %error, "request handling failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
