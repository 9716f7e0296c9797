use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashSet;

type Migration = (i64, &'static str);

fn migrations() -> Vec<Migration> {
    vec![
        (
            1,
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                message_text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                dispute_id TEXT,
                flagged INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_dispute ON chat_messages(dispute_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_chat_messages_created ON chat_messages(created_at);
            "#,
        ),
        (
            2,
            r#"
            CREATE TABLE IF NOT EXISTS disputes (
                id TEXT PRIMARY KEY,
                transaction_id TEXT NOT NULL UNIQUE,
                buyer_id TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                dispute_type TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                additional_info TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_disputes_status ON disputes(status);
            CREATE INDEX IF NOT EXISTS idx_disputes_parties ON disputes(buyer_id, seller_id);
            "#,
        ),
        (
            3,
            r#"
            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                dispute_id TEXT NOT NULL UNIQUE REFERENCES disputes(id),
                file_url TEXT NOT NULL,
                file_type TEXT NOT NULL,
                upload_timestamp TEXT NOT NULL,
                verification_status TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            "#,
        ),
        (
            4,
            r#"
            CREATE TABLE IF NOT EXISTS fraud_alerts (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                dispute_id TEXT,
                category TEXT NOT NULL,
                matched_pattern TEXT NOT NULL,
                severity TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fraud_alerts_sender ON fraud_alerts(sender_id);
            CREATE INDEX IF NOT EXISTS idx_fraud_alerts_receiver ON fraud_alerts(receiver_id);
            "#,
        ),
    ]
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS __schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    let mut stmt = conn.prepare("SELECT version FROM __schema_version")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut applied = HashSet::new();
    for row in rows {
        applied.insert(row?);
    }

    for (version, sql) in migrations() {
        if applied.contains(&version) {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO __schema_version(version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;
    }

    Ok(())
}
