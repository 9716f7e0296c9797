use std::sync::Arc;

use tribunal_core::{DisputeOrchestrator, ObjectStore};
use tribunal_store::DisputeStore;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DisputeOrchestrator>,
    pub store: Arc<dyn DisputeStore>,
    pub objects: Arc<dyn ObjectStore>,
}
