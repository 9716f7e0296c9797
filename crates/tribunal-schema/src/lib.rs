use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub message_text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dispute_id: Option<Uuid>,
    /// Set true by the orchestrator when off-platform intent is detected.
    #[serde(default)]
    pub flagged: bool,
}

impl ChatMessage {
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        message_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            message_text: message_text.into(),
            created_at: Utc::now(),
            dispute_id: None,
            flagged: false,
        }
    }

    pub fn for_dispute(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        message_text: impl Into<String>,
        dispute_id: Uuid,
    ) -> Self {
        let mut msg = Self::new(sender_id, receiver_id, message_text);
        msg.dispute_id = Some(dispute_id);
        msg
    }
}

/// Closed set of accepted evidence media types. Unknown wire values never
/// construct this type; they are handled by `parse` at the boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Video,
    Pdf,
}

impl EvidenceKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "video" => Some(Self::Video),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("video/") {
            Some(Self::Video)
        } else if mime == "application/pdf" {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Video => "video/mp4",
            Self::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub dispute_id: Uuid,
    pub file_url: String,
    pub file_type: EvidenceKind,
    pub upload_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub verification_status: Option<String>,
    /// Accumulates analysis results over the evidence's life. Writes merge
    /// into this map; they never replace it wholesale.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Evidence {
    pub fn new(dispute_id: Uuid, file_url: impl Into<String>, file_type: EvidenceKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            dispute_id,
            file_url: file_url.into(),
            file_type,
            upload_timestamp: Utc::now(),
            verification_status: None,
            metadata: Map::new(),
        }
    }
}

/// Wire-level evidence payload. `file_type` stays a raw string here so the
/// orchestrator can apply the unsupported-type fallback instead of the
/// request failing opaquely at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceUpload {
    pub file_url: String,
    pub file_type: String,
    /// Structural verdict echoed from the upload endpoint, when the client
    /// went through it.
    #[serde(default)]
    pub verification_status: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    BuyerNotPaid,
    SellerNotReleased,
    BuyerUnderpaid,
    BuyerOverpaid,
}

impl DisputeType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buyer_not_paid" => Some(Self::BuyerNotPaid),
            "seller_not_released" => Some(Self::SellerNotReleased),
            "buyer_underpaid" => Some(Self::BuyerUnderpaid),
            "buyer_overpaid" => Some(Self::BuyerOverpaid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyerNotPaid => "buyer_not_paid",
            Self::SellerNotReleased => "seller_not_released",
            Self::BuyerUnderpaid => "buyer_underpaid",
            Self::BuyerOverpaid => "buyer_overpaid",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Pending,
    Approved,
    Rejected,
    Escalated,
}

impl DisputeStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Forward-only rule: pending may move anywhere, a terminal status may
    /// only be re-recorded as itself. Finalize bypasses this through its own
    /// store operation.
    pub fn can_transition(&self, to: DisputeStatus) -> bool {
        match self {
            Self::Pending => true,
            current => *current == to,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeSubmission {
    pub id: Uuid,
    pub transaction_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub dispute_type: DisputeType,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub additional_info: Option<String>,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub evidence: Option<Evidence>,
}

impl DisputeSubmission {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        dispute_type: DisputeType,
        amount: f64,
        currency: impl Into<String>,
        additional_info: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: transaction_id.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            dispute_type,
            amount,
            currency: currency.into(),
            additional_info,
            status: DisputeStatus::Pending,
            created_at: Utc::now(),
            evidence: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    ExternalPlatform,
    UrgencyPressure,
    SuspiciousAmounts,
    Keyword,
}

impl AlertCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "external_platform" => Some(Self::ExternalPlatform),
            "urgency_pressure" => Some(Self::UrgencyPressure),
            "suspicious_amounts" => Some(Self::SuspiciousAmounts),
            "keyword" => Some(Self::Keyword),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalPlatform => "external_platform",
            Self::UrgencyPressure => "urgency_pressure",
            Self::SuspiciousAmounts => "suspicious_amounts",
            Self::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    High,
    Medium,
}

impl AlertSeverity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudAlert {
    pub category: AlertCategory,
    pub matched_pattern: String,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Approved,
    Rejected,
    Escalated,
}

impl ResolutionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }

    pub fn as_dispute_status(&self) -> DisputeStatus {
        match self {
            Self::Approved => DisputeStatus::Approved,
            Self::Rejected => DisputeStatus::Rejected,
            Self::Escalated => DisputeStatus::Escalated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionOutcome {
    pub status: ResolutionStatus,
    pub reason: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub requires_human_review: bool,
}

impl ResolutionOutcome {
    /// The universal safe fallback under uncertainty or failure.
    pub fn escalated(reason: impl Into<String>) -> Self {
        Self {
            status: ResolutionStatus::Escalated,
            reason: reason.into(),
            confidence: None,
            requires_human_review: true,
        }
    }
}

/// Outcome of the chat-message screening path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageOutcome {
    Blocked {
        reason: String,
        alerts: Vec<FraudAlert>,
    },
    Warning {
        reason: String,
    },
    Clean,
}

/// Deterministic fraud scan over a message sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FraudScan {
    pub is_fraudulent: bool,
    pub alerts: Vec<FraudAlert>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentScan {
    pub platform_switch_intent: bool,
    pub text: String,
}

/// Oracle-generated guidance for the interactive dispute chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatGuidance {
    pub reply: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub evidence_request: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeDetails {
    pub transaction_id: String,
    pub dispute_type: DisputeType,
    pub amount: f64,
    pub currency: String,
    pub additional_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: DisputeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatHistorySplit {
    pub pre_dispute: Vec<String>,
    pub post_dispute: Vec<String>,
}

/// Consolidated finalize result for human consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeSummary {
    pub dispute_details: DisputeDetails,
    pub chat_history: ChatHistorySplit,
    pub evidence_metadata: Option<Map<String, Value>>,
    pub final_resolution: ResolutionOutcome,
}
