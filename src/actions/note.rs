use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{prefix_chars, require, ActionContext, ActionError};
use crate::db::enums::TagSource;
use crate::db::models::Note;
use crate::tags::TagInput;

const SOURCE_TYPE: &str = "message";
pub const MAX_NOTE_SOURCE_CHARS: usize = 5000;
const TITLE_CHARS: usize = 50;
const UNTITLED: &str = "Nota sin título";

#[derive(Debug, Clone)]
pub struct NoteFromMessage {
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: Uuid,
    pub title: Option<String>,
    pub tags: Option<TagInput>,
}

/// Copies one of the owner's messages into a note. Tags are only attached when
/// given explicitly.
pub async fn create_note_from_message(
    ctx: &ActionContext,
    input: NoteFromMessage,
) -> Result<Note, ActionError> {
    let user_id = require(&input.user_id, "userId")?;
    let conversation_id = require(&input.conversation_id, "conversationId")?;

    let message = ctx
        .stores
        .messages
        .get_message(conversation_id, input.message_id)
        .await?
        .ok_or_else(|| ActionError::NotFound(format!("Message {} not found", input.message_id)))?;
    if message.sender != user_id {
        return Err(ActionError::NotOwner("Message"));
    }
    let length = message.content.chars().count();
    if length > MAX_NOTE_SOURCE_CHARS {
        return Err(ActionError::InvalidInput(format!(
            "Message content has {length} characters, the limit is {MAX_NOTE_SOURCE_CHARS}"
        )));
    }

    let title = match input.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => title_from(&message.content),
    };
    let tags = ctx.resolver.resolve(input.tags.as_ref(), user_id).await?;

    let now = Utc::now();
    let note = Note {
        note_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        title,
        content: message.content,
        attachment_keys: Vec::new(),
        tag_source: (!tags.is_empty()).then_some(TagSource::Manual),
        tags,
        source_type: Some(SOURCE_TYPE.to_string()),
        source_message_id: Some(message.message_id),
        source_conversation_id: Some(message.conversation_id),
        created_at: now,
        updated_at: now,
        created_by: user_id.to_string(),
        last_modified_by: user_id.to_string(),
    };
    ctx.stores.notes.put_note(note.clone()).await?;
    info!(user_id, note_id = %note.note_id, message_id = %input.message_id, "Note created from message.");
    Ok(note)
}

fn title_from(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else if content.chars().count() > TITLE_CHARS {
        format!("{}...", prefix_chars(content, TITLE_CHARS).trim())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::{Message, ResolvedTags};
    use crate::db::store::{MessageStore, NoteStore};
    use crate::test_support::{action_context, ScriptedClassifier};
    use std::sync::Arc;

    async fn stored_message(store: &MemoryStore, sender: &str, content: &str) -> Message {
        let now = Utc::now();
        let message = Message {
            conversation_id: "conv1".to_string(),
            timestamp: now,
            message_id: Uuid::new_v4(),
            sender: sender.to_string(),
            content: content.to_string(),
            input_type: "text".to_string(),
            intent: None,
            tags: ResolvedTags::default(),
            tag_source: None,
            created_at: now,
            updated_at: now,
            created_by: sender.to_string(),
        };
        store.put_message(message.clone()).await.unwrap();
        message
    }

    fn input(message: &Message) -> NoteFromMessage {
        NoteFromMessage {
            user_id: "u1".to_string(),
            conversation_id: message.conversation_id.clone(),
            message_id: message.message_id,
            title: None,
            tags: None,
        }
    }

    #[tokio::test]
    async fn test_note_copies_message_and_resolves_tags() {
        let store = Arc::new(MemoryStore::new());
        let message = stored_message(&store, "u1", "Comprar regalo para mamá antes del domingo").await;
        let ctx = action_context(store.clone(), Arc::new(ScriptedClassifier::new(vec![])));

        let mut request = input(&message);
        request.tags = Some(TagInput::Raw("familia".to_string()));
        let note = create_note_from_message(&ctx, request).await.unwrap();

        assert_eq!(note.title, "Comprar regalo para mamá antes del domingo");
        assert_eq!(note.content, message.content);
        assert_eq!(note.tags.tag_names, vec!["Familia"]);
        assert_eq!(note.tag_source, Some(TagSource::Manual));
        assert_eq!(note.source_type.as_deref(), Some("message"));
        assert_eq!(note.source_message_id, Some(message.message_id));
        assert_eq!(note.source_conversation_id.as_deref(), Some("conv1"));
        assert_eq!(store.list_notes("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_note_title_is_truncated_and_untagged_by_default() {
        let store = Arc::new(MemoryStore::new());
        let content = "a".repeat(60);
        let message = stored_message(&store, "u1", &content).await;
        let ctx = action_context(store.clone(), Arc::new(ScriptedClassifier::new(vec![])));

        let note = create_note_from_message(&ctx, input(&message)).await.unwrap();
        assert_eq!(note.title, format!("{}...", "a".repeat(50)));
        assert!(note.tags.is_empty());
        assert!(note.tag_source.is_none());
    }

    #[tokio::test]
    async fn test_note_rejects_missing_foreign_and_oversized_messages() {
        let store = Arc::new(MemoryStore::new());
        let ctx = action_context(store.clone(), Arc::new(ScriptedClassifier::new(vec![])));

        let foreign = stored_message(&store, "u2", "de otra persona").await;
        assert!(matches!(
            create_note_from_message(&ctx, input(&foreign)).await,
            Err(ActionError::NotOwner("Message"))
        ));

        let mut wrong_conversation = input(&foreign);
        wrong_conversation.conversation_id = "conv2".to_string();
        assert!(matches!(
            create_note_from_message(&ctx, wrong_conversation).await,
            Err(ActionError::NotFound(_))
        ));

        let oversized = stored_message(&store, "u1", &"x".repeat(MAX_NOTE_SOURCE_CHARS + 1)).await;
        assert!(matches!(
            create_note_from_message(&ctx, input(&oversized)).await,
            Err(ActionError::InvalidInput(_))
        ));
        assert!(store.list_notes("u1").await.unwrap().is_empty());
    }

    #[test]
    fn test_title_from_blank_content() {
        assert_eq!(title_from("   "), UNTITLED);
        assert_eq!(title_from("  hola  "), "hola");
    }
}
