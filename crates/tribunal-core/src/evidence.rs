//! Per-type evidence checks that run before any resolution reasoning.

use chrono::{Duration, Utc};
use tribunal_schema::{DisputeSubmission, Evidence, EvidenceKind};

/// Recorded by the upload pipeline after a structural parse of the document.
pub const STRUCTURE_VERIFIED: &str = "structure_verified";
pub const STRUCTURE_INVALID: &str = "structure_invalid";
/// Written by reviewer tooling when evidence is thrown out by a human.
pub const REVIEW_REJECTED: &str = "rejected";

/// Verdict of an evidence check. Invalid evidence is a normal result, not an
/// error; the orchestrator turns it into an escalation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn pass() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct EvidenceValidator;

impl EvidenceValidator {
    pub fn new() -> Self {
        Self
    }

    /// Dispatches on the evidence kind. The kind set is closed, so a new
    /// variant without a matching check fails to compile here.
    pub fn validate(&self, dispute: &DisputeSubmission, evidence: &Evidence) -> Validation {
        if evidence.file_url.trim().is_empty() {
            return Validation::fail("missing evidence locator");
        }

        // Allows a little clock skew between uploader and server.
        if evidence.upload_timestamp > Utc::now() + Duration::minutes(5) {
            return Validation::fail("implausible upload timestamp");
        }

        if evidence.verification_status.as_deref() == Some(REVIEW_REJECTED) {
            return Validation::fail("evidence previously rejected");
        }

        match evidence.file_type {
            EvidenceKind::Video => self.validate_video(dispute, evidence),
            EvidenceKind::Pdf => self.validate_pdf(dispute, evidence),
        }
    }

    /// Video content is examined during finalize by the media analyzer, so
    /// the pre-resolution check only covers the shared structural fields.
    fn validate_video(&self, _dispute: &DisputeSubmission, _evidence: &Evidence) -> Validation {
        Validation::pass()
    }

    fn validate_pdf(&self, _dispute: &DisputeSubmission, evidence: &Evidence) -> Validation {
        if evidence.verification_status.as_deref() == Some(STRUCTURE_INVALID) {
            return Validation::fail("pdf failed structural verification");
        }
        Validation::pass()
    }
}
