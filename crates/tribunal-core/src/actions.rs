//! Terminal side-effect ports.

use anyhow::Result;
use async_trait::async_trait;
use tribunal_schema::DisputeSubmission;

/// Actions the orchestrator triggers once a verdict is reached. Injected so
/// decision logic can be exercised against fakes. A failed action never
/// changes the verdict itself; callers record the failure and keep the
/// primary outcome.
#[async_trait]
pub trait DisputeActions: Send + Sync {
    /// Releases the transaction funds to the prevailing party.
    async fn release_funds(&self, dispute: &DisputeSubmission) -> Result<()>;

    /// Opens a human-review ticket for the dispute.
    async fn escalate_to_human(&self, dispute: &DisputeSubmission, reason: &str) -> Result<()>;

    /// Delivers the same warning text to both conversation participants.
    async fn broadcast_warning(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<()>;
}

/// Log-only implementation standing in until the payment and ticketing
/// integrations are connected.
pub struct LoggingDisputeActions;

#[async_trait]
impl DisputeActions for LoggingDisputeActions {
    async fn release_funds(&self, dispute: &DisputeSubmission) -> Result<()> {
        tracing::info!(
            dispute_id = %dispute.id,
            transaction_id = %dispute.transaction_id,
            amount = dispute.amount,
            currency = %dispute.currency,
            "releasing funds"
        );
        Ok(())
    }

    async fn escalate_to_human(&self, dispute: &DisputeSubmission, reason: &str) -> Result<()> {
        tracing::warn!(
            dispute_id = %dispute.id,
            transaction_id = %dispute.transaction_id,
            reason,
            "escalating dispute to human review"
        );
        Ok(())
    }

    async fn broadcast_warning(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<()> {
        tracing::info!(sender_id, receiver_id, text, "broadcasting platform warning");
        Ok(())
    }
}
