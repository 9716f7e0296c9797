use crate::migrations::run_migrations;
use crate::DisputeStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tokio::task;
use tribunal_schema::{
    ChatMessage, DisputeStatus, DisputeSubmission, DisputeType, Evidence, EvidenceKind, FraudAlert,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl DisputeStore for SqliteStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<()> {
        let db = Arc::clone(&self.db);
        let message = message.clone();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            conn.execute(
                r#"
                INSERT INTO chat_messages (
                    id, sender_id, receiver_id, message_text, created_at, dispute_id, flagged
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO NOTHING
                "#,
                params![
                    message.id.to_string(),
                    message.sender_id,
                    message.receiver_id,
                    message.message_text,
                    message.created_at.to_rfc3339(),
                    message.dispute_id.map(|id| id.to_string()),
                    message.flagged,
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn get_history(&self, dispute_id: Option<Uuid>) -> Result<Vec<ChatMessage>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let mut messages = Vec::new();
            match dispute_id {
                Some(id) => {
                    let mut stmt = conn.prepare(
                        r#"
                        SELECT id, sender_id, receiver_id, message_text, created_at, dispute_id, flagged
                        FROM chat_messages
                        WHERE dispute_id = ?1
                        ORDER BY created_at ASC, rowid ASC
                        "#,
                    )?;
                    let rows = stmt.query_map(params![id.to_string()], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        r#"
                        SELECT id, sender_id, receiver_id, message_text, created_at, dispute_id, flagged
                        FROM chat_messages
                        ORDER BY created_at ASC, rowid ASC
                        "#,
                    )?;
                    let rows = stmt.query_map([], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok::<Vec<ChatMessage>, anyhow::Error>(messages)
        })
        .await?
    }

    async fn flag_conversation(&self, dispute_id: Uuid) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let touched = conn.execute(
                "UPDATE chat_messages SET flagged = 1 WHERE dispute_id = ?1",
                params![dispute_id.to_string()],
            )?;
            Ok::<usize, anyhow::Error>(touched)
        })
        .await?
    }

    async fn save_dispute(&self, dispute: &DisputeSubmission) -> Result<()> {
        let db = Arc::clone(&self.db);
        let dispute = dispute.clone();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            // An id re-save must not trip the transaction_id uniqueness
            // constraint, so the existing row is detected up front. A new id
            // reusing a transaction_id still fails the INSERT.
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM disputes WHERE id = ?1)",
                params![dispute.id.to_string()],
                |r| r.get(0),
            )?;
            if exists {
                return Ok(());
            }
            conn.execute(
                r#"
                INSERT INTO disputes (
                    id, transaction_id, buyer_id, seller_id, dispute_type,
                    amount, currency, additional_info, status, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    dispute.id.to_string(),
                    dispute.transaction_id,
                    dispute.buyer_id,
                    dispute.seller_id,
                    dispute.dispute_type.as_str(),
                    dispute.amount,
                    dispute.currency,
                    dispute.additional_info,
                    dispute.status.as_str(),
                    dispute.created_at.to_rfc3339(),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn get_dispute(&self, dispute_id: Uuid) -> Result<Option<DisputeSubmission>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let dispute = conn
                .query_row(
                    r#"
                    SELECT id, transaction_id, buyer_id, seller_id, dispute_type,
                           amount, currency, additional_info, status, created_at
                    FROM disputes
                    WHERE id = ?1
                    "#,
                    params![dispute_id.to_string()],
                    row_to_dispute,
                )
                .optional()?;

            let Some(mut dispute) = dispute else {
                return Ok::<Option<DisputeSubmission>, anyhow::Error>(None);
            };

            dispute.evidence = conn
                .query_row(
                    r#"
                    SELECT id, dispute_id, file_url, file_type, upload_timestamp,
                           verification_status, metadata
                    FROM evidence
                    WHERE dispute_id = ?1
                    "#,
                    params![dispute_id.to_string()],
                    row_to_evidence,
                )
                .optional()?;

            Ok(Some(dispute))
        })
        .await?
    }

    async fn update_dispute_status(&self, dispute_id: Uuid, status: DisputeStatus) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let current_raw: Option<String> = conn
                .query_row(
                    "SELECT status FROM disputes WHERE id = ?1",
                    params![dispute_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            let current_raw =
                current_raw.ok_or_else(|| anyhow!("dispute not found: {dispute_id}"))?;
            let current = DisputeStatus::parse(&current_raw)
                .ok_or_else(|| anyhow!("corrupt dispute status: {current_raw}"))?;
            if !current.can_transition(status) {
                return Err(anyhow!(
                    "invalid status transition: {} -> {}",
                    current.as_str(),
                    status.as_str()
                ));
            }
            conn.execute(
                "UPDATE disputes SET status = ?2 WHERE id = ?1",
                params![dispute_id.to_string(), status.as_str()],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn apply_finalize_status(&self, dispute_id: Uuid, status: DisputeStatus) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let touched = conn.execute(
                "UPDATE disputes SET status = ?2 WHERE id = ?1",
                params![dispute_id.to_string(), status.as_str()],
            )?;
            if touched == 0 {
                return Err(anyhow!("dispute not found: {dispute_id}"));
            }
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn save_evidence(&self, evidence: &Evidence) -> Result<()> {
        let db = Arc::clone(&self.db);
        let evidence = evidence.clone();
        task::spawn_blocking(move || {
            let metadata = serde_json::to_string(&evidence.metadata)?;
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            conn.execute(
                r#"
                INSERT INTO evidence (
                    id, dispute_id, file_url, file_type, upload_timestamp,
                    verification_status, metadata
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(dispute_id) DO UPDATE SET
                    id = excluded.id,
                    file_url = excluded.file_url,
                    file_type = excluded.file_type,
                    upload_timestamp = excluded.upload_timestamp,
                    verification_status = excluded.verification_status,
                    metadata = excluded.metadata
                "#,
                params![
                    evidence.id.to_string(),
                    evidence.dispute_id.to_string(),
                    evidence.file_url,
                    evidence.file_type.as_str(),
                    evidence.upload_timestamp.to_rfc3339(),
                    evidence.verification_status,
                    metadata,
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn get_evidence(&self, dispute_id: Uuid) -> Result<Option<Evidence>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let evidence = conn
                .query_row(
                    r#"
                    SELECT id, dispute_id, file_url, file_type, upload_timestamp,
                           verification_status, metadata
                    FROM evidence
                    WHERE dispute_id = ?1
                    "#,
                    params![dispute_id.to_string()],
                    row_to_evidence,
                )
                .optional()?;
            Ok::<Option<Evidence>, anyhow::Error>(evidence)
        })
        .await?
    }

    async fn update_evidence_metadata(
        &self,
        evidence_id: Uuid,
        patch: &Map<String, Value>,
    ) -> Result<Evidence> {
        let db = Arc::clone(&self.db);
        let patch = patch.clone();
        task::spawn_blocking(move || {
            let patch_json = serde_json::to_string(&patch)?;
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let touched = conn.execute(
                "UPDATE evidence SET metadata = json_patch(metadata, ?2) WHERE id = ?1",
                params![evidence_id.to_string(), patch_json],
            )?;
            if touched == 0 {
                return Err(anyhow!("evidence not found: {evidence_id}"));
            }
            let evidence = conn.query_row(
                r#"
                SELECT id, dispute_id, file_url, file_type, upload_timestamp,
                       verification_status, metadata
                FROM evidence
                WHERE id = ?1
                "#,
                params![evidence_id.to_string()],
                row_to_evidence,
            )?;
            Ok::<Evidence, anyhow::Error>(evidence)
        })
        .await?
    }

    async fn save_alerts(
        &self,
        sender_id: &str,
        receiver_id: &str,
        dispute_id: Option<Uuid>,
        alerts: &[FraudAlert],
    ) -> Result<()> {
        if alerts.is_empty() {
            return Ok(());
        }
        let db = Arc::clone(&self.db);
        let sender_id = sender_id.to_owned();
        let receiver_id = receiver_id.to_owned();
        let alerts = alerts.to_vec();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let tx = conn.unchecked_transaction()?;
            for alert in &alerts {
                tx.execute(
                    r#"
                    INSERT INTO fraud_alerts (
                        id, sender_id, receiver_id, dispute_id, category,
                        matched_pattern, severity, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    params![
                        Uuid::new_v4().to_string(),
                        sender_id,
                        receiver_id,
                        dispute_id.map(|id| id.to_string()),
                        alert.category.as_str(),
                        alert.matched_pattern,
                        alert.severity.as_str(),
                        alert.timestamp.to_rfc3339(),
                    ],
                )?;
            }
            tx.commit()?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    async fn has_fraud_history(&self, buyer_id: &str, seller_id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let buyer_id = buyer_id.to_owned();
        let seller_id = seller_id.to_owned();
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let count: i64 = conn.query_row(
                r#"
                SELECT COUNT(*)
                FROM fraud_alerts
                WHERE sender_id IN (?1, ?2) OR receiver_id IN (?1, ?2)
                "#,
                params![buyer_id, seller_id],
                |r| r.get(0),
            )?;
            Ok::<bool, anyhow::Error>(count > 0)
        })
        .await?
    }
}

fn parse_datetime_sql(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_uuid_sql(raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_text_sql<T>(raw: &str, parsed: Option<T>, what: &str) -> rusqlite::Result<T> {
    parsed.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown {what}: {raw}").into(),
        )
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id_raw: String = row.get(0)?;
    let created_raw: String = row.get(4)?;
    let dispute_raw: Option<String> = row.get(5)?;
    let dispute_id = match dispute_raw {
        Some(raw) => Some(parse_uuid_sql(&raw)?),
        None => None,
    };

    Ok(ChatMessage {
        id: parse_uuid_sql(&id_raw)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        message_text: row.get(3)?,
        created_at: parse_datetime_sql(&created_raw)?,
        dispute_id,
        flagged: row.get(6)?,
    })
}

fn row_to_dispute(row: &Row<'_>) -> rusqlite::Result<DisputeSubmission> {
    let id_raw: String = row.get(0)?;
    let type_raw: String = row.get(4)?;
    let status_raw: String = row.get(8)?;
    let created_raw: String = row.get(9)?;

    Ok(DisputeSubmission {
        id: parse_uuid_sql(&id_raw)?,
        transaction_id: row.get(1)?,
        buyer_id: row.get(2)?,
        seller_id: row.get(3)?,
        dispute_type: parse_text_sql(&type_raw, DisputeType::parse(&type_raw), "dispute type")?,
        amount: row.get(5)?,
        currency: row.get(6)?,
        additional_info: row.get(7)?,
        status: parse_text_sql(&status_raw, DisputeStatus::parse(&status_raw), "dispute status")?,
        created_at: parse_datetime_sql(&created_raw)?,
        evidence: None,
    })
}

fn row_to_evidence(row: &Row<'_>) -> rusqlite::Result<Evidence> {
    let id_raw: String = row.get(0)?;
    let dispute_raw: String = row.get(1)?;
    let kind_raw: String = row.get(3)?;
    let uploaded_raw: String = row.get(4)?;
    let metadata_raw: String = row.get(6)?;
    let metadata: Map<String, Value> = serde_json::from_str(&metadata_raw).unwrap_or_default();

    Ok(Evidence {
        id: parse_uuid_sql(&id_raw)?,
        dispute_id: parse_uuid_sql(&dispute_raw)?,
        file_url: row.get(2)?,
        file_type: parse_text_sql(&kind_raw, EvidenceKind::parse(&kind_raw), "evidence kind")?,
        upload_timestamp: parse_datetime_sql(&uploaded_raw)?,
        verification_status: row.get(5)?,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tribunal_schema::{AlertCategory, AlertSeverity};

    fn make_dispute(transaction_id: &str) -> DisputeSubmission {
        DisputeSubmission::new(
            transaction_id,
            "buyer-1",
            "seller-1",
            DisputeType::BuyerNotPaid,
            250.0,
            "USD",
            None,
        )
    }

    fn make_alert(pattern: &str) -> FraudAlert {
        FraudAlert {
            category: AlertCategory::ExternalPlatform,
            matched_pattern: pattern.to_owned(),
            severity: AlertSeverity::High,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_in_memory_succeeds() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn save_and_fetch_global_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-1");
        store.save_dispute(&dispute).await.unwrap();

        let first = ChatMessage::new("buyer-1", "seller-1", "hello");
        let second = ChatMessage::for_dispute("seller-1", "buyer-1", "about the order", dispute.id);
        store.save_message(&first).await.unwrap();
        store.save_message(&second).await.unwrap();

        let history = store.get_history(None).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn history_scoped_to_dispute() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-2");
        store.save_dispute(&dispute).await.unwrap();

        let scoped = ChatMessage::for_dispute("buyer-1", "seller-1", "in scope", dispute.id);
        let unscoped = ChatMessage::new("buyer-1", "seller-1", "out of scope");
        store.save_message(&scoped).await.unwrap();
        store.save_message(&unscoped).await.unwrap();

        let history = store.get_history(Some(dispute.id)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message_text, "in scope");
    }

    #[tokio::test]
    async fn history_orders_by_time_then_insertion() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-3");
        store.save_dispute(&dispute).await.unwrap();

        let ts = Utc::now();
        let mut late = ChatMessage::for_dispute("buyer-1", "seller-1", "late", dispute.id);
        late.created_at = ts + chrono::TimeDelta::seconds(10);
        let mut first = ChatMessage::for_dispute("buyer-1", "seller-1", "tie first", dispute.id);
        first.created_at = ts;
        let mut second = ChatMessage::for_dispute("buyer-1", "seller-1", "tie second", dispute.id);
        second.created_at = ts;

        store.save_message(&late).await.unwrap();
        store.save_message(&first).await.unwrap();
        store.save_message(&second).await.unwrap();

        let history = store.get_history(Some(dispute.id)).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.message_text.as_str()).collect();
        assert_eq!(texts, vec!["tie first", "tie second", "late"]);
    }

    #[tokio::test]
    async fn flag_conversation_touches_only_dispute_messages() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-4");
        store.save_dispute(&dispute).await.unwrap();

        let one = ChatMessage::for_dispute("buyer-1", "seller-1", "one", dispute.id);
        let two = ChatMessage::for_dispute("seller-1", "buyer-1", "two", dispute.id);
        let other = ChatMessage::new("buyer-2", "seller-2", "unrelated");
        store.save_message(&one).await.unwrap();
        store.save_message(&two).await.unwrap();
        store.save_message(&other).await.unwrap();

        let touched = store.flag_conversation(dispute.id).await.unwrap();
        assert_eq!(touched, 2);

        let history = store.get_history(Some(dispute.id)).await.unwrap();
        assert!(history.iter().all(|m| m.flagged));
        let global = store.get_history(None).await.unwrap();
        let unrelated = global
            .iter()
            .find(|m| m.message_text == "unrelated")
            .unwrap();
        assert!(!unrelated.flagged);
    }

    #[tokio::test]
    async fn dispute_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut dispute = make_dispute("tx-5");
        dispute.additional_info = Some("buyer says funds sent".into());
        store.save_dispute(&dispute).await.unwrap();

        let loaded = store.get_dispute(dispute.id).await.unwrap().unwrap();
        assert_eq!(loaded.transaction_id, "tx-5");
        assert_eq!(loaded.dispute_type, DisputeType::BuyerNotPaid);
        assert_eq!(loaded.status, DisputeStatus::Pending);
        assert_eq!(loaded.amount, 250.0);
        assert_eq!(loaded.additional_info.as_deref(), Some("buyer says funds sent"));
        assert!(loaded.evidence.is_none());
    }

    #[tokio::test]
    async fn save_dispute_is_idempotent_on_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-50");
        store.save_dispute(&dispute).await.unwrap();
        store
            .update_dispute_status(dispute.id, DisputeStatus::Approved)
            .await
            .unwrap();

        // The processing path re-saves the same submission; the stored row
        // keeps its recorded status.
        store.save_dispute(&dispute).await.unwrap();
        let loaded = store.get_dispute(dispute.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DisputeStatus::Approved);
    }

    #[tokio::test]
    async fn duplicate_transaction_id_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_dispute(&make_dispute("tx-51")).await.unwrap();

        let err = store.save_dispute(&make_dispute("tx-51")).await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));
    }

    #[tokio::test]
    async fn get_dispute_missing_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let loaded = store.get_dispute(Uuid::new_v4()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn get_dispute_attaches_evidence() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-6");
        store.save_dispute(&dispute).await.unwrap();

        let evidence = Evidence::new(dispute.id, "gs://bucket/clip.mp4", EvidenceKind::Video);
        store.save_evidence(&evidence).await.unwrap();

        let loaded = store.get_dispute(dispute.id).await.unwrap().unwrap();
        let attached = loaded.evidence.unwrap();
        assert_eq!(attached.file_type, EvidenceKind::Video);
        assert_eq!(attached.file_url, "gs://bucket/clip.mp4");
    }

    #[tokio::test]
    async fn save_evidence_replaces_prior_upload() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-7");
        store.save_dispute(&dispute).await.unwrap();

        let first = Evidence::new(dispute.id, "gs://bucket/v1.mp4", EvidenceKind::Video);
        store.save_evidence(&first).await.unwrap();
        let second = Evidence::new(dispute.id, "gs://bucket/v2.pdf", EvidenceKind::Pdf);
        store.save_evidence(&second).await.unwrap();

        let loaded = store.get_evidence(dispute.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, second.id);
        assert_eq!(loaded.file_url, "gs://bucket/v2.pdf");
        assert_eq!(loaded.file_type, EvidenceKind::Pdf);
    }

    #[tokio::test]
    async fn status_updates_are_forward_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-8");
        store.save_dispute(&dispute).await.unwrap();

        store
            .update_dispute_status(dispute.id, DisputeStatus::Approved)
            .await
            .unwrap();

        let err = store
            .update_dispute_status(dispute.id, DisputeStatus::Rejected)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid status transition"));

        let loaded = store.get_dispute(dispute.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DisputeStatus::Approved);
    }

    #[tokio::test]
    async fn finalize_status_overrides_terminal_state() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-9");
        store.save_dispute(&dispute).await.unwrap();

        store
            .update_dispute_status(dispute.id, DisputeStatus::Approved)
            .await
            .unwrap();
        store
            .apply_finalize_status(dispute.id, DisputeStatus::Escalated)
            .await
            .unwrap();

        let loaded = store.get_dispute(dispute.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DisputeStatus::Escalated);
    }

    #[tokio::test]
    async fn update_status_unknown_dispute_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .update_dispute_status(Uuid::new_v4(), DisputeStatus::Approved)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dispute not found"));
    }

    #[tokio::test]
    async fn metadata_patch_merges_instead_of_replacing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dispute = make_dispute("tx-10");
        store.save_dispute(&dispute).await.unwrap();

        let mut evidence = Evidence::new(dispute.id, "gs://bucket/clip.mp4", EvidenceKind::Video);
        evidence
            .metadata
            .insert("duration_seconds".into(), json!(42));
        store.save_evidence(&evidence).await.unwrap();

        let mut patch = Map::new();
        patch.insert(
            "video_description".into(),
            json!("a person reads out a bank statement"),
        );
        let updated = store
            .update_evidence_metadata(evidence.id, &patch)
            .await
            .unwrap();

        assert_eq!(updated.metadata["duration_seconds"], json!(42));
        assert_eq!(
            updated.metadata["video_description"],
            json!("a person reads out a bank statement")
        );

        let mut overwrite = Map::new();
        overwrite.insert("duration_seconds".into(), json!(99));
        let updated = store
            .update_evidence_metadata(evidence.id, &overwrite)
            .await
            .unwrap();
        assert_eq!(updated.metadata["duration_seconds"], json!(99));
        assert!(updated.metadata.contains_key("video_description"));
    }

    #[tokio::test]
    async fn metadata_patch_unknown_evidence_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .update_evidence_metadata(Uuid::new_v4(), &Map::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("evidence not found"));
    }

    #[tokio::test]
    async fn fraud_history_matches_either_party_in_either_role() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.has_fraud_history("buyer-1", "seller-1").await.unwrap());

        store
            .save_alerts("buyer-1", "seller-9", None, &[make_alert("whatsapp")])
            .await
            .unwrap();

        assert!(store.has_fraud_history("buyer-1", "seller-1").await.unwrap());
        // Matches whichever query position the flagged party occupies.
        assert!(store.has_fraud_history("buyer-7", "buyer-1").await.unwrap());
        assert!(!store.has_fraud_history("buyer-2", "seller-2").await.unwrap());
    }

    #[tokio::test]
    async fn save_alerts_empty_slice_is_noop() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .save_alerts("buyer-1", "seller-1", None, &[])
            .await
            .unwrap();
        assert!(!store.has_fraud_history("buyer-1", "seller-1").await.unwrap());
    }
}
