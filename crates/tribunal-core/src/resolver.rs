//! Oracle-backed dispute resolution.
//!
//! Every nondeterministic reasoning call in the system goes through
//! [`ResolutionEngine`]. Its callers only ever see a normalized
//! [`ResolutionOutcome`]; oracle transport failures and malformed replies are
//! absorbed here and surface as escalations.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tribunal_oracle::{MediaAnalyzer, OracleRequest, ReasoningOracle};
use tribunal_schema::{
    ChatGuidance, DisputeSubmission, DisputeType, Evidence, EvidenceKind, IntentScan,
    ResolutionOutcome, ResolutionStatus,
};

use crate::actions::DisputeActions;

const RESOLVER_SYSTEM: &str =
    "You are the automated dispute resolver for a peer-to-peer trading platform. \
     Be factual and concise.";

/// Instruction handed to the media analyzer when video evidence is examined.
const VIDEO_ANALYSIS_INSTRUCTION: &str = "You are a fraud detection expert. Your task is to:\n\
    1) Extract important details like bank account information to help next steps in verification that the user made the right transfer to the right account.\n\
    2) Analyse the behaviours and actions of the individual in the video to detect any suspicious activity.\n\
    3) Respond concisely with the required information from the video.";

const VERDICT_INSTRUCTION: &str = r#"Decide the dispute. Respond with a JSON object of the form
{"status": "approved" | "rejected" | "escalated", "reason": "<short explanation>", "confidence": <number between 0 and 1>}"#;

const INTENT_PROMPT: &str = r#"Analyze the following text and determine if the user is attempting to leave the platform.  Look for phrases suggesting a switch to another communication channel, even subtle indications or indirect suggestions. Consider slang, informal language, and Gen Z slang. Pay close attention to any expression of inconvenience with the current platform or preference for another.

Examples of phrases indicating a platform switch intent:

* "Let's continue on WhatsApp"
* "Do you have Insta?"
* "We can talk on Telegram"
* "Let's move to Messenger"
* "Switch to Signal"
* "Continue on WeChat"
* "Talk on Viber"
* "Hit me up on WhatsApp"
* "My Insta is..."
* "Text me on Telegram"
* "DM me on Messenger"
* "Let's chat on Signal"
* "Add me on WeChat"
* "My Viber is..."
* "WhatsApp me!"
* "Let's use Insta instead"
* "I'm on Telegram now"
* "Slide into my DMs on Insta"
* "Hit me up on my WhatsApp"
* "My Snapchat is..."
* "Let's chat on Snap"
* "What's your Insta?"
* "Let's connect on TikTok"
* "My TikTok is..."
* "I'm bouta head to Insta"
* "Bet, hmu on WhatsApp"
* "Let's take this convo to Insta"
* "This platform is kinda slow"
* "I prefer chatting on WhatsApp"
* "Is there a way to continue this on Telegram?"
* "WhatsApp is easier for me"
* "I find this platform less convenient"
* "Let's chat on WhatsApp Business"
* "My number is..."
* "Call me on..."
* "Let's connect on Facebook"
* "Check my Instagram"
* "My Telegram is..."
* "Let's use Telegram instead"
* "I'm on Imo now"
* "Let's chat on Imo"
* "My Imo is..."
* "Let's use 2go"
* "My 2go is..."


Return a JSON object with a "platform_switch_intent" field (boolean, true if a switch is indicated, false otherwise) and a "text" field containing the original text.
"#;

pub struct ResolutionEngine {
    oracle: Arc<dyn ReasoningOracle>,
    media: Arc<dyn MediaAnalyzer>,
    actions: Arc<dyn DisputeActions>,
    model: String,
    confidence_threshold: f64,
}

impl ResolutionEngine {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        media: Arc<dyn MediaAnalyzer>,
        actions: Arc<dyn DisputeActions>,
        model: impl Into<String>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            oracle,
            media,
            actions,
            model: model.into(),
            confidence_threshold,
        }
    }

    /// Automated first-pass resolution. No confidence gate here; that policy
    /// belongs to [`ResolutionEngine::finalize`].
    pub async fn resolve(
        &self,
        dispute: &DisputeSubmission,
        evidence: Option<&Evidence>,
    ) -> ResolutionOutcome {
        let prompt = build_resolution_prompt(dispute, evidence);
        match self.ask(prompt).await {
            Ok(text) => parse_outcome(&text),
            Err(e) => ResolutionOutcome::escalated(format!("resolution failed: {e}")),
        }
    }

    /// Resolution from conversation context alone, without a dispute record.
    pub async fn resolve_from_chat(&self, chat_context: &str) -> ResolutionOutcome {
        let prompt = format!(
            "Analyze the following chat conversation for potential fraud:\n\n\
             {chat_context}\n\
             Based on this conversation, is there any indication of fraudulent activity?\n\n\
             {VERDICT_INSTRUCTION}"
        );
        match self.ask(prompt).await {
            Ok(text) => parse_outcome(&text),
            Err(e) => ResolutionOutcome::escalated(format!("resolution failed: {e}")),
        }
    }

    /// Full-context resolution with the confidence gate applied. An approved
    /// outcome that clears the gate releases the funds here, so no caller can
    /// approve a payout while skipping the gate.
    pub async fn finalize(
        &self,
        dispute: &DisputeSubmission,
        evidence: Option<&Evidence>,
        pre_chat: &[String],
        post_chat: &[String],
    ) -> ResolutionOutcome {
        let prompt = build_finalize_prompt(dispute, evidence, pre_chat, post_chat);
        let outcome = match self.ask(prompt).await {
            Ok(text) => parse_outcome(&text),
            Err(e) => return ResolutionOutcome::escalated(format!("resolution failed: {e}")),
        };

        let gated = self.apply_confidence_gate(outcome);
        if gated.status == ResolutionStatus::Approved {
            if let Err(e) = self.actions.release_funds(dispute).await {
                tracing::warn!(dispute_id = %dispute.id, error = %e, "fund release action failed");
            }
        }
        gated
    }

    /// Oracle-backed check for off-platform redirection in a single message.
    pub async fn detect_platform_intent(&self, text: &str) -> Result<IntentScan> {
        let prompt = format!("{INTENT_PROMPT}Text to analyze: {text}");
        let request = OracleRequest::json(self.model.clone(), None, prompt);
        let response = self.oracle.generate(request).await?;
        serde_json::from_str(response.text.trim())
            .with_context(|| format!("intent response was not valid json: {}", response.text))
    }

    /// Guidance reply for the interactive dispute chat. Unlike resolution,
    /// a failure here propagates: there is no safe fabricated guidance.
    pub async fn interactive_chat(
        &self,
        dispute: &DisputeSubmission,
        conversation_context: &str,
        message: &str,
    ) -> Result<ChatGuidance> {
        let context = if conversation_context.trim().is_empty() {
            "(none)"
        } else {
            conversation_context
        };
        let prompt = format!(
            "{}\nConversation so far:\n{context}\n\nLatest message from the user:\n{message}\n\n\
             You are assisting the parties of this dispute. Respond with a JSON object of the form\n\
             {{\"reply\": \"<direct answer>\", \"suggestions\": [\"<next step>\"], \"evidence_request\": \"<document to upload>\" or null}}",
            dispute_block(dispute)
        );
        let request = OracleRequest::json(
            self.model.clone(),
            Some(RESOLVER_SYSTEM.to_string()),
            prompt,
        );
        let response = self.oracle.generate(request).await?;
        serde_json::from_str(response.text.trim())
            .with_context(|| format!("guidance response was not valid json: {}", response.text))
    }

    /// Runs the media analyzer over video evidence.
    pub async fn describe_video_evidence(&self, evidence: &Evidence) -> Result<String> {
        self.media
            .describe(
                &self.model,
                &evidence.file_url,
                evidence.file_type.mime_type(),
                VIDEO_ANALYSIS_INSTRUCTION,
            )
            .await
    }

    async fn ask(&self, prompt: String) -> Result<String> {
        let request = OracleRequest::text(
            self.model.clone(),
            Some(RESOLVER_SYSTEM.to_string()),
            prompt,
        );
        let response = self.oracle.generate(request).await?;
        Ok(response.text)
    }

    /// Outcomes without a confidence value fail the gate: an unquantified
    /// verdict is treated as maximally uncertain.
    fn apply_confidence_gate(&self, outcome: ResolutionOutcome) -> ResolutionOutcome {
        let confident = outcome
            .confidence
            .is_some_and(|c| c >= self.confidence_threshold);
        if confident {
            return outcome;
        }

        ResolutionOutcome {
            status: ResolutionStatus::Escalated,
            requires_human_review: true,
            ..outcome
        }
    }
}

// ============================================================
// Prompt construction
// ============================================================

fn dispute_block(dispute: &DisputeSubmission) -> String {
    format!(
        "Dispute under review:\n\
         - transaction id: {}\n\
         - dispute type: {}\n\
         - amount: {} {}\n\
         - additional info: {}\n\
         {}\n",
        dispute.transaction_id,
        dispute.dispute_type.as_str(),
        dispute.amount,
        dispute.currency,
        dispute.additional_info.as_deref().unwrap_or("none provided"),
        type_instruction(dispute.dispute_type),
    )
}

fn type_instruction(dispute_type: DisputeType) -> &'static str {
    match dispute_type {
        DisputeType::BuyerNotPaid => {
            "The seller reports that no payment arrived. Verify whether the buyer produced credible proof of payment."
        }
        DisputeType::SellerNotReleased => {
            "The buyer reports paying without receiving the asset. Verify whether the seller withheld release after a confirmed payment."
        }
        DisputeType::BuyerUnderpaid => {
            "The payment is reported below the agreed amount. Verify the transferred amount against the agreement."
        }
        DisputeType::BuyerOverpaid => {
            "The payment is reported above the agreed amount. Verify the transferred amount and whether a refund is owed."
        }
    }
}

fn evidence_block(evidence: &Evidence) -> String {
    match evidence.file_type {
        EvidenceKind::Video => {
            let mut block = format!(
                "Evidence is a video at {}.\n{VIDEO_ANALYSIS_INSTRUCTION}\n",
                evidence.file_url
            );
            if let Some(description) = evidence
                .metadata
                .get("video_description")
                .and_then(Value::as_str)
            {
                block.push_str(&format!("Video analysis output:\n{description}\n"));
            }
            block
        }
        EvidenceKind::Pdf => {
            let mut block = format!(
                "Evidence is a pdf document at {}.\n\
                 Check the document for payment references matching the transaction, signs of \
                 tampering, and timestamps consistent with the dispute timeline.\n",
                evidence.file_url
            );
            if let Some(status) = &evidence.verification_status {
                block.push_str(&format!("Structural verification result: {status}.\n"));
            }
            block
        }
    }
}

fn build_resolution_prompt(dispute: &DisputeSubmission, evidence: Option<&Evidence>) -> String {
    let mut prompt = dispute_block(dispute);
    if let Some(evidence) = evidence {
        prompt.push('\n');
        prompt.push_str(&evidence_block(evidence));
    }
    prompt.push('\n');
    prompt.push_str(VERDICT_INSTRUCTION);
    prompt
}

fn chat_section(title: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        format!("{title}:\n(no messages)\n")
    } else {
        format!("{title}:\n{}\n", lines.join("\n"))
    }
}

fn build_finalize_prompt(
    dispute: &DisputeSubmission,
    evidence: Option<&Evidence>,
    pre_chat: &[String],
    post_chat: &[String],
) -> String {
    let mut prompt = String::from(
        "Finalize the resolution of this dispute using the complete case file below.\n\n",
    );
    prompt.push_str(&dispute_block(dispute));
    if let Some(evidence) = evidence {
        prompt.push('\n');
        prompt.push_str(&evidence_block(evidence));
    }
    prompt.push('\n');
    prompt.push_str(&chat_section("Conversation before the dispute was opened", pre_chat));
    prompt.push('\n');
    prompt.push_str(&chat_section("Conversation after the dispute was opened", post_chat));
    prompt.push('\n');
    prompt.push_str(VERDICT_INSTRUCTION);
    prompt
}

// ============================================================
// Response parsing
// ============================================================

/// Two-stage parse of the oracle reply. Stage one requires a bare JSON
/// object whose `status` is one of the known verdicts. Anything else falls
/// through to stage two, a case-insensitive scan for "approved"/"rejected"
/// over the raw text, defaulting to escalation.
fn parse_outcome(text: &str) -> ResolutionOutcome {
    if let Some(outcome) = parse_structured(text) {
        return outcome;
    }
    keyword_fallback(text)
}

fn parse_structured(text: &str) -> Option<ResolutionOutcome> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let status = ResolutionStatus::parse(value.get("status")?.as_str()?)?;
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0));
    let requires_human_review = value
        .get("requires_human_review")
        .and_then(Value::as_bool)
        .unwrap_or(status == ResolutionStatus::Escalated);

    Some(ResolutionOutcome {
        status,
        reason,
        confidence,
        requires_human_review,
    })
}

/// "approved" wins over "rejected" when both tokens appear.
fn keyword_fallback(text: &str) -> ResolutionOutcome {
    let lowered = text.to_lowercase();
    let status = if lowered.contains("approved") {
        ResolutionStatus::Approved
    } else if lowered.contains("rejected") {
        ResolutionStatus::Rejected
    } else {
        ResolutionStatus::Escalated
    };

    ResolutionOutcome {
        status,
        reason: text.trim().to_string(),
        confidence: None,
        requires_human_review: status == ResolutionStatus::Escalated,
    }
}
