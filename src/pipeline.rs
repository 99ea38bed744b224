//! Message ingestion: persist, classify once, route once.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ai::intent::IntentClassifier;
use crate::conversation::ConversationWriter;
use crate::db::enums::{Intent, TagSource};
use crate::db::models::Message;
use crate::db::store::{MessageStore, StoreError};
use crate::dispatch::router::{DispatchError, DispatchOutcome, DispatchRequest, DispatchRouter};
use crate::tags::{TagError, TagInput, TagResolver};

pub const PIPELINE_APOLOGY: &str =
    "Lo siento, hubo un error al procesar tu mensaje. Intenta de nuevo.";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Tags(#[from] TagError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub tags: Option<TagInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMessage {
    pub message: Message,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

#[derive(Clone)]
pub struct MessagePipeline {
    messages: Arc<dyn MessageStore>,
    resolver: TagResolver,
    classifier: IntentClassifier,
    router: DispatchRouter,
    conversation: ConversationWriter,
}

impl MessagePipeline {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        resolver: TagResolver,
        classifier: IntentClassifier,
        router: DispatchRouter,
    ) -> Self {
        Self {
            conversation: ConversationWriter::new(messages.clone()),
            messages,
            resolver,
            classifier,
            router,
        }
    }

    /// Validates, resolves tags, stores the message with no intent and then
    /// runs it through [`MessagePipeline::process`].
    pub async fn create_message(&self, input: NewMessage) -> Result<CreatedMessage, PipelineError> {
        let conversation_id = required(input.conversation_id, "conversationId")?;
        let sender = required(input.sender, "sender")?;
        let content = required(input.content, "content")?;

        let tags = self.resolver.resolve(input.tags.as_ref(), &sender).await?;
        let tag_source = (!tags.is_empty()).then_some(TagSource::Manual);

        let now = Utc::now();
        let mut message = Message {
            conversation_id,
            timestamp: now,
            message_id: Uuid::new_v4(),
            sender: sender.clone(),
            content,
            input_type: input.input_type.unwrap_or_else(|| "text".to_string()),
            intent: None,
            tags,
            tag_source,
            created_at: now,
            updated_at: now,
            created_by: sender,
        };
        self.messages.put_message(message.clone()).await?;
        info!(
            conversation_id = %message.conversation_id,
            message_id = %message.message_id,
            tags = message.tags.len(),
            "Message stored."
        );

        let outcome = self.process(&message).await;
        message.intent = self.stored_intent(&message).await.or(Some(outcome.intent));
        Ok(CreatedMessage { message, outcome })
    }

    /// Classifies a stored message, records the intent and routes it. Failures
    /// degrade to `{thought, thought}` plus an apology in the conversation.
    pub async fn process(&self, message: &Message) -> DispatchOutcome {
        match self.try_process(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    conversation_id = %message.conversation_id,
                    message_id = %message.message_id,
                    error = %e,
                    "Message processing failed."
                );
                self.conversation
                    .apologize(&message.conversation_id, PIPELINE_APOLOGY)
                    .await;
                DispatchOutcome::fallback()
            }
        }
    }

    async fn try_process(&self, message: &Message) -> Result<DispatchOutcome, PipelineError> {
        let current = self
            .messages
            .get_message(&message.conversation_id, message.message_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("message {}", message.message_id)))?;
        if let Some(recorded) = current.intent {
            debug!(message_id = %message.message_id, intent = %recorded, "Intent already recorded, not routing again.");
            return Ok(DispatchOutcome::for_intent(recorded));
        }

        let intent = self.classifier.classify(&message.sender, &message.content).await;
        let first_write = self
            .messages
            .set_message_intent(&message.conversation_id, message.message_id, intent)
            .await?;
        if !first_write {
            // Another processing recorded its intent between the read and the write.
            let recorded = self.stored_intent(message).await.unwrap_or(intent);
            debug!(message_id = %message.message_id, intent = %recorded, "Intent already recorded, not routing again.");
            return Ok(DispatchOutcome::for_intent(recorded));
        }

        let request = DispatchRequest {
            sender: message.sender.clone(),
            content: message.content.clone(),
            intent,
            conversation_id: Some(message.conversation_id.clone()),
            source_message_id: Some(message.message_id),
            tags: message.tags.clone(),
            tag_source: message.tag_source,
        };
        Ok(self.router.route(request).await?)
    }

    async fn stored_intent(&self, message: &Message) -> Option<Intent> {
        match self
            .messages
            .get_message(&message.conversation_id, message.message_id)
            .await
        {
            Ok(stored) => stored.and_then(|m| m.intent),
            Err(e) => {
                warn!(message_id = %message.message_id, error = %e, "Failed to read back message intent.");
                None
            }
        }
    }

    /// Classifies and routes text that was never stored as a message. With no
    /// conversation to apologize in, failures only degrade the outcome.
    pub async fn classify_and_route(&self, sender: &str, content: &str) -> DispatchOutcome {
        let intent = self.classifier.classify(sender, content).await;
        match self.router.route(DispatchRequest::new(sender, content, intent)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(sender, error = %e, "Dispatch failed.");
                DispatchOutcome::fallback()
            }
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, PipelineError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(PipelineError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::MessageType;
    use crate::db::memory::MemoryStore;
    use crate::dispatch::router::ActionKind;
    use crate::test_support::{RecordingInvoker, ScriptedClassifier};

    fn pipeline(
        store: Arc<MemoryStore>,
        reply: &str,
        invoker: Arc<RecordingInvoker>,
    ) -> MessagePipeline {
        let classifier = IntentClassifier::new(Arc::new(ScriptedClassifier::new(vec![Ok(
            reply.to_string(),
        )])));
        MessagePipeline::new(
            store.clone(),
            TagResolver::new(store),
            classifier,
            DispatchRouter::new(invoker),
        )
    }

    fn new_message(content: &str) -> NewMessage {
        NewMessage {
            conversation_id: Some("conv1".to_string()),
            sender: Some("u1".to_string()),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_message_routes_once_and_sets_intent() {
        let store = Arc::new(MemoryStore::new());
        let invoker = Arc::new(RecordingInvoker::default());
        let p = pipeline(store.clone(), "{\"intent\":\"list\"}", invoker.clone());

        let created = p.create_message(new_message("lista: pan, leche")).await.unwrap();
        assert_eq!(created.outcome.intent, Intent::List);
        assert_eq!(created.outcome.message_type, MessageType::Order);
        assert_eq!(created.message.intent, Some(Intent::List));

        let stored = store.list_messages("conv1").await.unwrap();
        assert_eq!(stored[0].intent, Some(Intent::List));
        let jobs = invoker.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, ActionKind::CreateList);
    }

    #[tokio::test]
    async fn test_not_json_reply_is_thought() {
        let store = Arc::new(MemoryStore::new());
        let invoker = Arc::new(RecordingInvoker::default());
        let p = pipeline(store.clone(), "no soy json", invoker.clone());

        let created = p.create_message(new_message("hoy fue un buen día")).await.unwrap();
        assert_eq!(created.outcome, DispatchOutcome::for_intent(Intent::Thought));
        assert_eq!(created.outcome.message_type, MessageType::Thought);

        let jobs = invoker.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, ActionKind::CreateThought);
        assert_eq!(jobs[0].payload.source_message_id, Some(created.message.message_id));
    }

    #[tokio::test]
    async fn test_dispatch_failure_apologizes_and_falls_back() {
        let store = Arc::new(MemoryStore::new());
        let invoker = Arc::new(RecordingInvoker::failing());
        let p = pipeline(store.clone(), "{\"intent\":\"research\"}", invoker);

        let created = p.create_message(new_message("investiga los agujeros negros")).await.unwrap();
        assert_eq!(created.outcome, DispatchOutcome::fallback());

        let stored = store.list_messages("conv1").await.unwrap();
        assert_eq!(stored.len(), 2);
        let original = stored.iter().find(|m| m.message_id == created.message.message_id).unwrap();
        assert_eq!(original.intent, Some(Intent::Research));
        assert_eq!(created.message.intent, Some(Intent::Research));
        let apology = stored.iter().find(|m| m.sender == "IA").unwrap();
        assert_eq!(apology.intent, Some(Intent::Error));
        assert_eq!(apology.content, PIPELINE_APOLOGY);
    }

    #[tokio::test]
    async fn test_manual_tags_are_resolved_and_carried() {
        let store = Arc::new(MemoryStore::new());
        let invoker = Arc::new(RecordingInvoker::default());
        let p = pipeline(store.clone(), "{\"intent\":\"thought\"}", invoker.clone());

        let mut input = new_message("reunión larga");
        input.tags = Some(TagInput::Raw("trabajo, urgente".to_string()));
        let created = p.create_message(input).await.unwrap();

        assert_eq!(created.message.tags.tag_names, vec!["Trabajo", "Urgente"]);
        assert_eq!(created.message.tag_source, Some(TagSource::Manual));
        let jobs = invoker.jobs();
        assert_eq!(jobs[0].payload.tag_ids, created.message.tags.tag_ids);
        assert_eq!(jobs[0].payload.tag_source, Some(TagSource::Manual));
    }

    #[tokio::test]
    async fn test_second_processing_does_not_route_again() {
        let store = Arc::new(MemoryStore::new());
        let invoker = Arc::new(RecordingInvoker::default());
        let scripted = Arc::new(ScriptedClassifier::new(vec![
            Ok("{\"intent\":\"list\"}".to_string()),
            Ok("{\"intent\":\"research\"}".to_string()),
        ]));
        let p = MessagePipeline::new(
            store.clone(),
            TagResolver::new(store.clone()),
            IntentClassifier::new(scripted.clone()),
            DispatchRouter::new(invoker.clone()),
        );

        let created = p.create_message(new_message("lista: pan")).await.unwrap();
        let again = p.process(&created.message).await;

        assert_eq!(again, DispatchOutcome::for_intent(Intent::List));
        assert_eq!(scripted.requests().len(), 1);
        assert_eq!(invoker.jobs().len(), 1);
        let stored = store.list_messages("conv1").await.unwrap();
        assert_eq!(stored[0].intent, Some(Intent::List));
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone(), "", Arc::new(RecordingInvoker::default()));

        let mut input = new_message("x");
        input.sender = None;
        let result = p.create_message(input).await;
        assert!(matches!(result, Err(PipelineError::MissingField("sender"))));
        assert!(store.list_messages("conv1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classify_and_route_without_message() {
        let store = Arc::new(MemoryStore::new());
        let invoker = Arc::new(RecordingInvoker::default());
        let p = pipeline(store.clone(), "{\"intent\":\"order\"}", invoker.clone());

        let outcome = p.classify_and_route("u1", "recuérdame a las 5").await;
        assert_eq!(outcome.intent, Intent::Order);
        assert!(invoker.jobs().is_empty());
    }
}
