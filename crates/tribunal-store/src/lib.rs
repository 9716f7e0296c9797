pub mod migrations;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use tribunal_schema::{
    ChatMessage, DisputeStatus, DisputeSubmission, Evidence, FraudAlert,
};

pub use sqlite::SqliteStore;

/// Persistence port for the dispute service. The orchestrator only ever
/// talks to this trait; tests swap in in-memory fakes.
#[async_trait]
pub trait DisputeStore: Send + Sync {
    /// Re-saving an existing message id is a no-op.
    async fn save_message(&self, message: &ChatMessage) -> Result<()>;

    /// Messages in chronological order. `None` returns the whole history
    /// across conversations; `Some(id)` narrows to one dispute.
    async fn get_history(&self, dispute_id: Option<Uuid>) -> Result<Vec<ChatMessage>>;

    /// Marks every message bound to the dispute. Returns how many rows
    /// were touched.
    async fn flag_conversation(&self, dispute_id: Uuid) -> Result<usize>;

    /// Re-saving an existing id leaves the stored row untouched, so the
    /// accept path and the processing path may both call this.
    async fn save_dispute(&self, dispute: &DisputeSubmission) -> Result<()>;

    async fn get_dispute(&self, dispute_id: Uuid) -> Result<Option<DisputeSubmission>>;

    /// Forward-only status write: pending may move anywhere, a terminal
    /// status may only be re-recorded as itself.
    async fn update_dispute_status(&self, dispute_id: Uuid, status: DisputeStatus) -> Result<()>;

    /// Unconditional status write used by finalize, which re-evaluates a
    /// dispute after evidence analysis and may override a prior terminal
    /// status.
    async fn apply_finalize_status(&self, dispute_id: Uuid, status: DisputeStatus) -> Result<()>;

    async fn save_evidence(&self, evidence: &Evidence) -> Result<()>;

    async fn get_evidence(&self, dispute_id: Uuid) -> Result<Option<Evidence>>;

    /// Merges `patch` into the stored metadata document and returns the
    /// updated record. Existing keys not named by the patch survive.
    async fn update_evidence_metadata(
        &self,
        evidence_id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Evidence>;

    async fn save_alerts(
        &self,
        sender_id: &str,
        receiver_id: &str,
        dispute_id: Option<Uuid>,
        alerts: &[FraudAlert],
    ) -> Result<()>;

    /// True when either party appears on any previously recorded fraud
    /// alert, as sender or as receiver.
    async fn has_fraud_history(&self, buyer_id: &str, seller_id: &str) -> Result<bool>;
}
