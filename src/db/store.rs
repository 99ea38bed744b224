//! Read/write contracts for the single-table-per-entity key-value store.
//!
//! Every call is a round trip from the caller's point of view. Single-item
//! reads are consistent, owner queries may lag behind writes, and nothing here
//! offers cross-item atomicity.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::enums::Intent;
use super::models::{List, Message, Note, Tag, Thought};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn get_tag(&self, tag_id: Uuid) -> StoreResult<Option<Tag>>;

    /// Owner/name index lookup. The comparison is case-insensitive.
    async fn find_tag_by_name(&self, user_id: &str, name: &str) -> StoreResult<Option<Tag>>;

    async fn list_tags(&self, user_id: &str) -> StoreResult<Vec<Tag>>;

    /// Full scan, used by the reconciliation job.
    async fn list_all_tags(&self) -> StoreResult<Vec<Tag>>;

    async fn put_tag(&self, tag: Tag) -> StoreResult<()>;

    /// Atomic `usageCount += by` with a companion `updatedAt` write.
    async fn increment_usage_count(&self, tag_id: Uuid, by: u64) -> StoreResult<()>;

    async fn delete_tag(&self, tag_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ThoughtStore: Send + Sync {
    async fn put_thought(&self, thought: Thought) -> StoreResult<()>;
    async fn get_thought(&self, thought_id: Uuid) -> StoreResult<Option<Thought>>;
    async fn list_thoughts(&self, user_id: &str) -> StoreResult<Vec<Thought>>;
    async fn find_thought_by_source(
        &self,
        user_id: &str,
        source_message_id: Uuid,
    ) -> StoreResult<Option<Thought>>;
    async fn delete_thought(&self, thought_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ListStore: Send + Sync {
    async fn put_list(&self, list: List) -> StoreResult<()>;
    async fn get_list(&self, list_id: Uuid) -> StoreResult<Option<List>>;
    async fn list_lists(&self, user_id: &str) -> StoreResult<Vec<List>>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn put_note(&self, note: Note) -> StoreResult<()>;
    async fn get_note(&self, note_id: Uuid) -> StoreResult<Option<Note>>;
    async fn list_notes(&self, user_id: &str) -> StoreResult<Vec<Note>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn put_message(&self, message: Message) -> StoreResult<()>;

    /// Messages of a conversation, oldest first.
    async fn list_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>>;

    async fn get_message(
        &self,
        conversation_id: &str,
        message_id: Uuid,
    ) -> StoreResult<Option<Message>>;

    /// Messages sent by `sender` across all conversations, oldest first.
    async fn list_user_messages(&self, sender: &str) -> StoreResult<Vec<Message>>;

    /// Conditional write: sets `intent` only while it is still unset.
    /// Returns `false` when the message already carried an intent.
    async fn set_message_intent(
        &self,
        conversation_id: &str,
        message_id: Uuid,
        intent: Intent,
    ) -> StoreResult<bool>;
}
