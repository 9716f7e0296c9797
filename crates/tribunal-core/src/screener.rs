//! Deterministic pre-send message screening.
//!
//! Every inbound chat message is matched against a fixed rule set before any
//! oracle is consulted. Matching is pure: no clock reads besides the alert
//! timestamp, no storage, no network.

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use tribunal_schema::{AlertCategory, AlertSeverity, ChatMessage, FraudAlert, FraudScan};

const EXTERNAL_PLATFORM_PATTERNS: &[&str] = &[
    r"(?i)let's (?:continue|talk|chat|move)(?: \w+)? (?:on|to) (?:whatsapp|telegram|messenger|signal|wechat|viber)",
    r"(?i)(?:whatsapp|telegram|messenger|signal|wechat|viber)[\s]*?(?:number|contact|id)?[\s]*?[:\s]+[\d\w@]+",
];

const URGENCY_PATTERNS: &[&str] = &[
    r"(?i)urgent(?:ly)? need",
    r"(?i)(?:transfer|send|pay).*?now.*?urgent",
];

const AMOUNT_PATTERNS: &[&str] = &[
    r"(?i)different amount",
    r"(?i)change(?:d) (?:the )?(?:amount|price)",
];

const KEYWORD_PATTERNS: &[&str] = &[r"(?i)password", r"(?i)bank details", r"(?i)guarantee"];

struct ScreeningRule {
    category: AlertCategory,
    pattern: Regex,
}

pub struct FraudScreener {
    rules: Vec<ScreeningRule>,
}

impl FraudScreener {
    pub fn new() -> Result<Self> {
        let groups = [
            (AlertCategory::ExternalPlatform, EXTERNAL_PLATFORM_PATTERNS),
            (AlertCategory::UrgencyPressure, URGENCY_PATTERNS),
            (AlertCategory::SuspiciousAmounts, AMOUNT_PATTERNS),
            (AlertCategory::Keyword, KEYWORD_PATTERNS),
        ];

        let mut rules = Vec::new();
        for (category, patterns) in groups {
            for raw in patterns {
                let pattern = Regex::new(raw)
                    .with_context(|| format!("invalid screening pattern: {raw}"))?;
                rules.push(ScreeningRule { category, pattern });
            }
        }

        Ok(Self { rules })
    }

    /// One alert per matching pattern. A single message can trip several
    /// rules and therefore carry several alerts, possibly across categories.
    pub fn scan(&self, text: &str) -> Vec<FraudAlert> {
        let now = Utc::now();
        let mut alerts = Vec::new();

        for rule in &self.rules {
            if rule.pattern.is_match(text) {
                alerts.push(FraudAlert {
                    category: rule.category,
                    matched_pattern: rule.pattern.as_str().to_string(),
                    severity: severity_for(rule.category),
                    timestamp: now,
                });
            }
        }

        alerts
    }

    pub fn is_suspicious(&self, text: &str) -> (bool, Vec<FraudAlert>) {
        let alerts = self.scan(text);
        (!alerts.is_empty(), alerts)
    }

    /// Scans a whole conversation. The verdict depends only on the message
    /// texts, so re-running over the same history yields the same result.
    pub fn scan_messages(&self, messages: &[ChatMessage]) -> FraudScan {
        let mut alerts = Vec::new();
        for message in messages {
            alerts.extend(self.scan(&message.message_text));
        }

        FraudScan {
            is_fraudulent: !alerts.is_empty(),
            alerts,
        }
    }
}

fn severity_for(category: AlertCategory) -> AlertSeverity {
    match category {
        AlertCategory::ExternalPlatform => AlertSeverity::High,
        _ => AlertSeverity::Medium,
    }
}
