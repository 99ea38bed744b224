use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::enums::{Intent, MessageType, TagSource};
use crate::db::models::ResolvedTags;

/// Author recorded on everything the assistant creates on a user's behalf.
pub const ASSISTANT_AUTHOR: &str = "IA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateThought,
    CreateList,
    Research,
    DriveQuery,
}

impl ActionKind {
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Thought => Some(ActionKind::CreateThought),
            Intent::List => Some(ActionKind::CreateList),
            Intent::Research => Some(ActionKind::Research),
            Intent::DriveQuery => Some(ActionKind::DriveQuery),
            Intent::Order | Intent::Error => None,
        }
    }
}

/// Body handed to a downstream action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub user_id: String,
    pub content: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_source: Option<TagSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ActionPayload {
    pub fn new(user_id: &str, content: &str, created_by: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_by: created_by.to_string(),
            source_message_id: None,
            tag_ids: Vec::new(),
            tag_names: Vec::new(),
            tag_source: None,
            conversation_id: None,
        }
    }

    /// Conversation that receives replies and apologies for this action.
    pub fn reply_conversation(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(&self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionJob {
    pub kind: ActionKind,
    pub payload: ActionPayload,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Action queue is closed")]
    QueueClosed,
}

/// Asynchronous, fire-and-forget hand-off of an action job. Returning `Ok`
/// means the job was accepted, not that it ran.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn invoke(&self, job: ActionJob) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub sender: String,
    pub content: String,
    pub intent: Intent,
    pub conversation_id: Option<String>,
    pub source_message_id: Option<Uuid>,
    pub tags: ResolvedTags,
    pub tag_source: Option<TagSource>,
}

impl DispatchRequest {
    pub fn new(sender: &str, content: &str, intent: Intent) -> Self {
        Self {
            sender: sender.to_string(),
            content: content.to_string(),
            intent,
            conversation_id: None,
            source_message_id: None,
            tags: ResolvedTags::default(),
            tag_source: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub intent: Intent,
    pub message_type: MessageType,
}

impl DispatchOutcome {
    pub fn for_intent(intent: Intent) -> Self {
        Self {
            intent,
            message_type: intent.message_type(),
        }
    }

    /// What callers see when classification or dispatch went wrong.
    pub fn fallback() -> Self {
        Self::for_intent(Intent::Thought)
    }
}

/// Turns a classified intent into at most one downstream action.
#[derive(Clone)]
pub struct DispatchRouter {
    invoker: Arc<dyn ActionInvoker>,
}

impl DispatchRouter {
    pub fn new(invoker: Arc<dyn ActionInvoker>) -> Self {
        Self { invoker }
    }

    pub async fn route(&self, request: DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        let outcome = DispatchOutcome::for_intent(request.intent);

        let Some(kind) = ActionKind::for_intent(request.intent) else {
            debug!(sender = %request.sender, intent = %request.intent, "No action for intent.");
            return Ok(outcome);
        };

        let mut payload = ActionPayload::new(&request.sender, &request.content, ASSISTANT_AUTHOR);
        payload.conversation_id = request.conversation_id;
        if kind == ActionKind::CreateThought {
            payload.source_message_id = request.source_message_id;
            payload.tag_ids = request.tags.tag_ids;
            payload.tag_names = request.tags.tag_names;
            payload.tag_source = request.tag_source;
        }

        self.invoker.invoke(ActionJob { kind, payload }).await?;
        info!(
            sender = %request.sender,
            intent = %request.intent,
            action = ?kind,
            "Action dispatched."
        );
        Ok(outcome)
    }
}
