//! Dispute lifecycle orchestration.
//!
//! The orchestrator sequences screening, evidence validation, resolution and
//! terminal actions. It holds no cross-request state of its own; everything
//! durable lives behind the injected store.

use std::sync::Arc;

use anyhow::Result;
use tribunal_schema::{
    ChatGuidance, ChatHistorySplit, ChatMessage, DisputeDetails, DisputeSubmission, Evidence,
    EvidenceKind, EvidenceUpload, FinalizeSummary, FraudScan, IntentScan, MessageOutcome,
    ResolutionOutcome, ResolutionStatus,
};
use tribunal_store::DisputeStore;
use uuid::Uuid;

use crate::actions::DisputeActions;
use crate::evidence::EvidenceValidator;
use crate::history::ChatPartitioner;
use crate::resolver::ResolutionEngine;
use crate::screener::FraudScreener;

/// Warning text delivered verbatim to both parties when off-platform intent
/// is detected.
const PLATFORM_WARNING: &str = "For your protection, keep all communication and payments on the \
     platform. Conversations moved elsewhere are not covered by dispute resolution.";

/// Malformed requests surfaced to the transport layer, as opposed to
/// business outcomes, which are always structured results.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("dispute not found: {0}")]
    DisputeNotFound(Uuid),
    #[error("{0}")]
    Invalid(String),
}

pub struct DisputeOrchestrator {
    store: Arc<dyn DisputeStore>,
    screener: FraudScreener,
    validator: EvidenceValidator,
    partitioner: ChatPartitioner,
    engine: ResolutionEngine,
    actions: Arc<dyn DisputeActions>,
}

impl DisputeOrchestrator {
    pub fn new(
        store: Arc<dyn DisputeStore>,
        engine: ResolutionEngine,
        actions: Arc<dyn DisputeActions>,
    ) -> Result<Self> {
        Ok(Self {
            screener: FraudScreener::new()?,
            validator: EvidenceValidator::new(),
            partitioner: ChatPartitioner::new(store.clone()),
            store,
            engine,
            actions,
        })
    }

    // ============================================================
    // Chat message path
    // ============================================================

    /// Ingests one chat message: persist, screen, then check off-platform
    /// intent. Screening always runs first so abusive messages never reach
    /// the oracle.
    pub async fn process_chat_message(&self, message: &ChatMessage) -> Result<MessageOutcome> {
        self.store.save_message(message).await?;
        Ok(self.screen_and_check_intent(message).await)
    }

    /// Same pipeline for a message inside an existing dispute conversation.
    /// The dispute must exist; anything else is a malformed request.
    pub async fn process_dispute_chat_message(
        &self,
        message: &ChatMessage,
    ) -> Result<MessageOutcome> {
        let Some(dispute_id) = message.dispute_id else {
            return Err(
                RequestError::Invalid("dispute chat message requires a dispute_id".into()).into(),
            );
        };
        if self.store.get_dispute(dispute_id).await?.is_none() {
            return Err(RequestError::DisputeNotFound(dispute_id).into());
        }

        self.store.save_message(message).await?;
        Ok(self.screen_and_check_intent(message).await)
    }

    /// Deterministic fraud scan over a message sequence. Pure function of
    /// its input: no persistence, no oracle.
    pub fn process_chat_for_fraud(&self, history: &[ChatMessage]) -> FraudScan {
        self.screener.scan_messages(history)
    }

    /// Standalone oracle-backed intent check, without warning or flagging
    /// side effects.
    pub async fn process_chat_intent(&self, message: &ChatMessage) -> Result<IntentScan> {
        self.engine
            .detect_platform_intent(&message.message_text)
            .await
    }

    async fn screen_and_check_intent(&self, message: &ChatMessage) -> MessageOutcome {
        let (suspicious, alerts) = self.screener.is_suspicious(&message.message_text);
        if suspicious {
            if let Err(e) = self
                .store
                .save_alerts(
                    &message.sender_id,
                    &message.receiver_id,
                    message.dispute_id,
                    &alerts,
                )
                .await
            {
                tracing::warn!(error = %e, "failed to persist fraud alerts");
            }
            return MessageOutcome::Blocked {
                reason: "suspicious activity detected".to_string(),
                alerts,
            };
        }

        match self
            .engine
            .detect_platform_intent(&message.message_text)
            .await
        {
            Ok(scan) if scan.platform_switch_intent => {
                self.issue_platform_warning(message).await;
                MessageOutcome::Warning {
                    reason: "off-platform contact attempt detected".to_string(),
                }
            }
            Ok(_) => MessageOutcome::Clean,
            Err(e) => {
                tracing::warn!(error = %e, "intent detection unavailable, delivering message");
                MessageOutcome::Clean
            }
        }
    }

    async fn issue_platform_warning(&self, message: &ChatMessage) {
        if let Err(e) = self
            .actions
            .broadcast_warning(&message.sender_id, &message.receiver_id, PLATFORM_WARNING)
            .await
        {
            tracing::warn!(error = %e, "warning broadcast failed");
        }

        if let Some(dispute_id) = message.dispute_id {
            match self.store.flag_conversation(dispute_id).await {
                Ok(flagged) => {
                    tracing::info!(%dispute_id, flagged, "conversation flagged for review");
                }
                Err(e) => {
                    tracing::warn!(%dispute_id, error = %e, "failed to flag conversation");
                }
            }
        }
    }

    // ============================================================
    // Dispute submission path
    // ============================================================

    /// Automated first-pass handling of a submitted dispute. Never fails:
    /// an unexpected error at any step degrades to an escalation, since an
    /// uncertain verdict must land with a human.
    pub async fn process_dispute(
        &self,
        dispute: &DisputeSubmission,
        upload: Option<EvidenceUpload>,
    ) -> ResolutionOutcome {
        let outcome = match self.try_process_dispute(dispute, upload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(dispute_id = %dispute.id, error = %e, "dispute processing failed");
                ResolutionOutcome::escalated(format!("dispute processing failed: {e}"))
            }
        };

        let status = outcome.status.as_dispute_status();
        if let Err(e) = self.store.update_dispute_status(dispute.id, status).await {
            tracing::warn!(dispute_id = %dispute.id, error = %e, "failed to record dispute status");
        }

        outcome
    }

    async fn try_process_dispute(
        &self,
        dispute: &DisputeSubmission,
        upload: Option<EvidenceUpload>,
    ) -> Result<ResolutionOutcome> {
        self.store.save_dispute(dispute).await?;

        // Party history dominates the current case: no resolution happens
        // for parties with prior alerts.
        if self
            .store
            .has_fraud_history(&dispute.buyer_id, &dispute.seller_id)
            .await?
        {
            return Ok(ResolutionOutcome::escalated("previous fraud alerts found"));
        }

        let evidence = match upload {
            Some(upload) => {
                let Some(kind) = EvidenceKind::parse(&upload.file_type) else {
                    return Ok(ResolutionOutcome::escalated("unsupported evidence type"));
                };

                let mut evidence = Evidence::new(dispute.id, upload.file_url, kind);
                evidence.verification_status = upload.verification_status;
                evidence.metadata = upload.metadata;
                self.store.save_evidence(&evidence).await?;

                let verdict = self.validator.validate(dispute, &evidence);
                if !verdict.valid {
                    let reason = verdict
                        .reason
                        .unwrap_or_else(|| "invalid evidence".to_string());
                    return Ok(ResolutionOutcome::escalated(reason));
                }

                Some(evidence)
            }
            None => None,
        };

        let outcome = self.engine.resolve(dispute, evidence.as_ref()).await;

        match outcome.status {
            ResolutionStatus::Approved => {
                if let Err(e) = self.actions.release_funds(dispute).await {
                    tracing::warn!(dispute_id = %dispute.id, error = %e, "fund release action failed");
                }
            }
            ResolutionStatus::Escalated => {
                if let Err(e) = self
                    .actions
                    .escalate_to_human(dispute, &outcome.reason)
                    .await
                {
                    tracing::warn!(dispute_id = %dispute.id, error = %e, "human escalation action failed");
                }
            }
            ResolutionStatus::Rejected => {}
        }

        Ok(outcome)
    }

    // ============================================================
    // Finalize path
    // ============================================================

    /// Explicit second-pass resolution over the full case file: evidence
    /// analysis, partitioned chat history, confidence gate. Returns the
    /// consolidated summary for human consumption.
    pub async fn finalize_dispute(
        &self,
        dispute_id: Uuid,
        additional_info: Option<String>,
    ) -> Result<FinalizeSummary> {
        let Some(mut dispute) = self.store.get_dispute(dispute_id).await? else {
            return Err(RequestError::DisputeNotFound(dispute_id).into());
        };
        if let Some(info) = additional_info {
            dispute.additional_info = Some(info);
        }

        match self.assemble_finalize(&dispute).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::error!(%dispute_id, error = %e, "finalize failed");
                let outcome =
                    ResolutionOutcome::escalated(format!("dispute processing failed: {e}"));
                if let Err(e) = self
                    .store
                    .apply_finalize_status(dispute_id, outcome.status.as_dispute_status())
                    .await
                {
                    tracing::warn!(%dispute_id, error = %e, "failed to record dispute status");
                }
                Ok(self.build_summary(&dispute, ChatHistorySplit::default(), None, outcome))
            }
        }
    }

    async fn assemble_finalize(&self, dispute: &DisputeSubmission) -> Result<FinalizeSummary> {
        let mut evidence = self.store.get_evidence(dispute.id).await?;

        if let Some(ev) = &mut evidence {
            if ev.file_type == EvidenceKind::Video {
                self.attach_video_description(ev).await;
            }
        }

        let split = self.partitioner.split(dispute.id, dispute.created_at).await?;
        let outcome = self
            .engine
            .finalize(
                dispute,
                evidence.as_ref(),
                &split.pre_dispute,
                &split.post_dispute,
            )
            .await;

        if let Err(e) = self
            .store
            .apply_finalize_status(dispute.id, outcome.status.as_dispute_status())
            .await
        {
            tracing::warn!(dispute_id = %dispute.id, error = %e, "failed to record dispute status");
        }

        Ok(self.build_summary(dispute, split, evidence, outcome))
    }

    /// Runs the media analyzer and merges its description into the evidence
    /// metadata through the store's single merge operation. Analysis failure
    /// leaves a placeholder on the in-memory copy only.
    async fn attach_video_description(&self, evidence: &mut Evidence) {
        let description = match self.engine.describe_video_evidence(evidence).await {
            Ok(description) => description,
            Err(e) => {
                tracing::warn!(evidence_id = %evidence.id, error = %e, "video analysis failed");
                evidence.metadata.insert(
                    "video_description".to_string(),
                    serde_json::Value::String(format!("analysis error: {e}")),
                );
                return;
            }
        };

        let mut patch = serde_json::Map::new();
        patch.insert(
            "video_description".to_string(),
            serde_json::Value::String(description.clone()),
        );
        match self
            .store
            .update_evidence_metadata(evidence.id, &patch)
            .await
        {
            Ok(updated) => *evidence = updated,
            Err(e) => {
                tracing::warn!(evidence_id = %evidence.id, error = %e, "metadata merge failed");
                evidence.metadata.insert(
                    "video_description".to_string(),
                    serde_json::Value::String(description),
                );
            }
        }
    }

    fn build_summary(
        &self,
        dispute: &DisputeSubmission,
        chat_history: ChatHistorySplit,
        evidence: Option<Evidence>,
        final_resolution: ResolutionOutcome,
    ) -> FinalizeSummary {
        FinalizeSummary {
            dispute_details: DisputeDetails {
                transaction_id: dispute.transaction_id.clone(),
                dispute_type: dispute.dispute_type,
                amount: dispute.amount,
                currency: dispute.currency.clone(),
                additional_info: dispute.additional_info.clone(),
                created_at: dispute.created_at,
                status: final_resolution.status.as_dispute_status(),
            },
            chat_history,
            evidence_metadata: evidence.map(|e| e.metadata),
            final_resolution,
        }
    }

    // ============================================================
    // Conversation-level operations
    // ============================================================

    /// Oracle review of a dispute's whole conversation.
    pub async fn analyze_dispute_conversation(
        &self,
        dispute_id: Uuid,
    ) -> Result<ResolutionOutcome> {
        if self.store.get_dispute(dispute_id).await?.is_none() {
            return Err(RequestError::DisputeNotFound(dispute_id).into());
        }

        let history = self.store.get_history(Some(dispute_id)).await?;
        let context: String = history
            .iter()
            .map(|m| {
                format!(
                    "Sender: {}, Receiver: {}, Message: {}\n",
                    m.sender_id, m.receiver_id, m.message_text
                )
            })
            .collect();

        Ok(self.engine.resolve_from_chat(&context).await)
    }

    /// Guidance chat scoped to one dispute.
    pub async fn interactive_dispute_chat(
        &self,
        dispute_id: Uuid,
        conversation_context: &str,
        message: &str,
    ) -> Result<ChatGuidance> {
        if message.trim().is_empty() {
            return Err(RequestError::Invalid("message must be provided".into()).into());
        }
        let Some(dispute) = self.store.get_dispute(dispute_id).await? else {
            return Err(RequestError::DisputeNotFound(dispute_id).into());
        };

        self.engine
            .interactive_chat(&dispute, conversation_context, message)
            .await
    }
}
