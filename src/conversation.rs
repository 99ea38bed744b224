use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::db::enums::Intent;
use crate::db::models::{Message, ResolvedTags};
use crate::db::store::{MessageStore, StoreResult};
use crate::dispatch::router::ASSISTANT_AUTHOR;

/// Writes assistant-authored messages into a conversation.
#[derive(Clone)]
pub struct ConversationWriter {
    messages: Arc<dyn MessageStore>,
}

impl ConversationWriter {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self { messages }
    }

    pub async fn post_reply(
        &self,
        conversation_id: &str,
        content: &str,
        intent: Intent,
    ) -> StoreResult<Message> {
        let now = Utc::now();
        let message = Message {
            conversation_id: conversation_id.to_string(),
            timestamp: now,
            message_id: Uuid::new_v4(),
            sender: ASSISTANT_AUTHOR.to_string(),
            content: content.to_string(),
            input_type: "text".to_string(),
            intent: Some(intent),
            tags: ResolvedTags::default(),
            tag_source: None,
            created_at: now,
            updated_at: now,
            created_by: ASSISTANT_AUTHOR.to_string(),
        };
        self.messages.put_message(message.clone()).await?;
        Ok(message)
    }

    /// Confirmation after a successful action. A failed write is only logged.
    pub async fn confirm(&self, conversation_id: &str, content: &str, intent: Intent) {
        if let Err(e) = self.post_reply(conversation_id, content, intent).await {
            warn!(conversation_id, error = %e, "Failed to save confirmation message.");
        }
    }

    /// Apology after a failure. A failed write is only logged.
    pub async fn apologize(&self, conversation_id: &str, content: &str) {
        if let Err(e) = self.post_reply(conversation_id, content, Intent::Error).await {
            error!(conversation_id, error = %e, "Failed to save apology message.");
        }
    }
}
