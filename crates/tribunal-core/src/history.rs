//! Pre/post-dispute partitioning of a conversation.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tribunal_schema::{ChatHistorySplit, ChatMessage};
use tribunal_store::DisputeStore;
use uuid::Uuid;

fn transcript_line(message: &ChatMessage) -> String {
    format!(
        "{}: {} (at {})",
        message.sender_id,
        message.message_text,
        message.created_at.to_rfc3339()
    )
}

/// Splits an ordered message sequence at the dispute creation instant.
/// Strictly-earlier messages land on the pre side; a message created exactly
/// at the pivot lands on the post side. Every message lands on exactly one
/// side.
pub fn partition(messages: &[ChatMessage], pivot: DateTime<Utc>) -> ChatHistorySplit {
    let mut split = ChatHistorySplit::default();
    for message in messages {
        let line = transcript_line(message);
        if message.created_at < pivot {
            split.pre_dispute.push(line);
        } else {
            split.post_dispute.push(line);
        }
    }
    split
}

pub struct ChatPartitioner {
    store: Arc<dyn DisputeStore>,
}

impl ChatPartitioner {
    pub fn new(store: Arc<dyn DisputeStore>) -> Self {
        Self { store }
    }

    /// Fetches the dispute's conversation, oldest first, and partitions it
    /// around the dispute creation timestamp.
    pub async fn split(
        &self,
        dispute_id: Uuid,
        dispute_created_at: DateTime<Utc>,
    ) -> Result<ChatHistorySplit> {
        let messages = self.store.get_history(Some(dispute_id)).await?;
        Ok(partition(&messages, dispute_created_at))
    }
}
