use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use super::enums::Intent;
use super::models::{List, Message, Note, Tag, Thought};
use super::store::{
    ListStore, MessageStore, NoteStore, StoreError, StoreResult, TagStore, ThoughtStore,
};

/// In-process implementation of every table. Each table is a concurrent map
/// keyed by the entity id; owner queries scan the table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tags: DashMap<Uuid, Tag>,
    thoughts: DashMap<Uuid, Thought>,
    lists: DashMap<Uuid, List>,
    notes: DashMap<Uuid, Note>,
    messages: DashMap<Uuid, Message>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    thoughts: Vec<Thought>,
    #[serde(default)]
    lists: Vec<List>,
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot written by [`MemoryStore::save_snapshot`]. A missing
    /// file yields an empty store.
    pub async fn load_snapshot(path: &Path) -> StoreResult<Self> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No store snapshot found. Starting empty.");
                return Ok(Self::new());
            }
            Err(e) => return Err(StoreError::Snapshot(format!("Failed to read {path:?}: {e}"))),
        };

        let snapshot: StoreSnapshot = serde_json::from_slice(&contents)
            .map_err(|e| StoreError::Snapshot(format!("Failed to parse {path:?}: {e}")))?;

        let store = Self::new();
        for tag in snapshot.tags {
            store.tags.insert(tag.tag_id, tag);
        }
        for thought in snapshot.thoughts {
            store.thoughts.insert(thought.thought_id, thought);
        }
        for list in snapshot.lists {
            store.lists.insert(list.list_id, list);
        }
        for note in snapshot.notes {
            store.notes.insert(note.note_id, note);
        }
        for message in snapshot.messages {
            store.messages.insert(message.message_id, message);
        }
        info!(
            path = %path.display(),
            tags = store.tags.len(),
            thoughts = store.thoughts.len(),
            messages = store.messages.len(),
            "Store snapshot loaded."
        );
        Ok(store)
    }

    /// Writes the whole store to `path` via a temporary file and a rename.
    pub async fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let snapshot = StoreSnapshot {
            tags: self.tags.iter().map(|e| e.value().clone()).collect(),
            thoughts: self.thoughts.iter().map(|e| e.value().clone()).collect(),
            lists: self.lists.iter().map(|e| e.value().clone()).collect(),
            notes: self.notes.iter().map(|e| e.value().clone()).collect(),
            messages: self.messages.iter().map(|e| e.value().clone()).collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| StoreError::Snapshot(format!("Failed to serialize snapshot: {e}")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Snapshot(format!("Failed to create {parent:?}: {e}")))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| StoreError::Snapshot(format!("Failed to write {tmp_path:?}: {e}")))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| StoreError::Snapshot(format!("Failed to move snapshot into {path:?}: {e}")))?;
        debug!(path = %path.display(), "Store snapshot written.");
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn get_tag(&self, tag_id: Uuid) -> StoreResult<Option<Tag>> {
        Ok(self.tags.get(&tag_id).map(|t| t.value().clone()))
    }

    async fn find_tag_by_name(&self, user_id: &str, name: &str) -> StoreResult<Option<Tag>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .tags
            .iter()
            .filter(|t| t.user_id == user_id && t.name.trim().to_lowercase() == wanted)
            .map(|t| t.value().clone())
            .min_by_key(|t| (t.created_at, t.tag_id)))
    }

    async fn list_tags(&self, user_id: &str) -> StoreResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.value().clone())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_all_tags(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.tags.iter().map(|t| t.value().clone()).collect())
    }

    async fn put_tag(&self, tag: Tag) -> StoreResult<()> {
        self.tags.insert(tag.tag_id, tag);
        Ok(())
    }

    async fn increment_usage_count(&self, tag_id: Uuid, by: u64) -> StoreResult<()> {
        match self.tags.get_mut(&tag_id) {
            Some(mut tag) => {
                tag.usage_count = tag.usage_count.saturating_add(by);
                tag.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("tag {tag_id}"))),
        }
    }

    async fn delete_tag(&self, tag_id: Uuid) -> StoreResult<bool> {
        Ok(self.tags.remove(&tag_id).is_some())
    }
}

#[async_trait]
impl ThoughtStore for MemoryStore {
    async fn put_thought(&self, thought: Thought) -> StoreResult<()> {
        self.thoughts.insert(thought.thought_id, thought);
        Ok(())
    }

    async fn get_thought(&self, thought_id: Uuid) -> StoreResult<Option<Thought>> {
        Ok(self.thoughts.get(&thought_id).map(|t| t.value().clone()))
    }

    async fn list_thoughts(&self, user_id: &str) -> StoreResult<Vec<Thought>> {
        let mut thoughts: Vec<Thought> = self
            .thoughts
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.value().clone())
            .collect();
        thoughts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(thoughts)
    }

    async fn find_thought_by_source(
        &self,
        user_id: &str,
        source_message_id: Uuid,
    ) -> StoreResult<Option<Thought>> {
        Ok(self
            .thoughts
            .iter()
            .filter(|t| t.user_id == user_id && t.source_message_id == Some(source_message_id))
            .map(|t| t.value().clone())
            .min_by_key(|t| t.created_at))
    }

    async fn delete_thought(&self, thought_id: Uuid) -> StoreResult<bool> {
        Ok(self.thoughts.remove(&thought_id).is_some())
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn put_list(&self, list: List) -> StoreResult<()> {
        self.lists.insert(list.list_id, list);
        Ok(())
    }

    async fn get_list(&self, list_id: Uuid) -> StoreResult<Option<List>> {
        Ok(self.lists.get(&list_id).map(|l| l.value().clone()))
    }

    async fn list_lists(&self, user_id: &str) -> StoreResult<Vec<List>> {
        let mut lists: Vec<List> = self
            .lists
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| l.value().clone())
            .collect();
        lists.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(lists)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn put_note(&self, note: Note) -> StoreResult<()> {
        self.notes.insert(note.note_id, note);
        Ok(())
    }

    async fn get_note(&self, note_id: Uuid) -> StoreResult<Option<Note>> {
        Ok(self.notes.get(&note_id).map(|n| n.value().clone()))
    }

    async fn list_notes(&self, user_id: &str) -> StoreResult<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.value().clone())
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn put_message(&self, message: Message) -> StoreResult<()> {
        self.messages.insert(message.message_id, message);
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| m.value().clone())
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }

    async fn get_message(
        &self,
        conversation_id: &str,
        message_id: Uuid,
    ) -> StoreResult<Option<Message>> {
        Ok(self
            .messages
            .get(&message_id)
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| m.value().clone()))
    }

    async fn list_user_messages(&self, sender: &str) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.sender == sender)
            .map(|m| m.value().clone())
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }

    async fn set_message_intent(
        &self,
        conversation_id: &str,
        message_id: Uuid,
        intent: Intent,
    ) -> StoreResult<bool> {
        match self.messages.get_mut(&message_id) {
            Some(mut message) if message.conversation_id == conversation_id => {
                if message.intent.is_some() {
                    return Ok(false);
                }
                message.intent = Some(intent);
                message.updated_at = Utc::now();
                Ok(true)
            }
            _ => Err(StoreError::NotFound(format!(
                "message {message_id} in conversation {conversation_id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ResolvedTags;

    fn tag(user_id: &str, name: &str) -> Tag {
        let now = Utc::now();
        Tag {
            tag_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            color: "#FF6B6B".to_string(),
            usage_count: 1,
            created_at: now,
            updated_at: now,
            created_by: user_id.to_string(),
            last_modified_by: user_id.to_string(),
        }
    }

    fn message(conversation_id: &str) -> Message {
        let now = Utc::now();
        Message {
            conversation_id: conversation_id.to_string(),
            timestamp: now,
            message_id: Uuid::new_v4(),
            sender: "user123".to_string(),
            content: "hola".to_string(),
            input_type: "text".to_string(),
            intent: None,
            tags: ResolvedTags::default(),
            tag_source: None,
            created_at: now,
            updated_at: now,
            created_by: "user123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_tag_by_name_is_case_insensitive_and_owner_scoped() {
        let store = MemoryStore::new();
        let mine = tag("u1", "Trabajo");
        store.put_tag(mine.clone()).await.unwrap();
        store.put_tag(tag("u2", "Trabajo")).await.unwrap();

        let found = store.find_tag_by_name("u1", "trabajo").await.unwrap().unwrap();
        assert_eq!(found.tag_id, mine.tag_id);
        assert!(store.find_tag_by_name("u3", "Trabajo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_usage_count() {
        let store = MemoryStore::new();
        let t = tag("u1", "Ideas");
        store.put_tag(t.clone()).await.unwrap();
        store.increment_usage_count(t.tag_id, 2).await.unwrap();
        assert_eq!(store.get_tag(t.tag_id).await.unwrap().unwrap().usage_count, 3);

        let missing = store.increment_usage_count(Uuid::new_v4(), 1).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_message_intent_only_once() {
        let store = MemoryStore::new();
        let m = message("conv1");
        store.put_message(m.clone()).await.unwrap();

        assert!(store.set_message_intent("conv1", m.message_id, Intent::List).await.unwrap());
        assert!(!store.set_message_intent("conv1", m.message_id, Intent::Thought).await.unwrap());

        let stored = store.list_messages("conv1").await.unwrap();
        assert_eq!(stored[0].intent, Some(Intent::List));
    }

    #[tokio::test]
    async fn test_set_message_intent_wrong_conversation() {
        let store = MemoryStore::new();
        let m = message("conv1");
        store.put_message(m.clone()).await.unwrap();
        let res = store.set_message_intent("conv2", m.message_id, Intent::List).await;
        assert!(matches!(res, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_message_checks_conversation() {
        let store = MemoryStore::new();
        let m = message("conv1");
        store.put_message(m.clone()).await.unwrap();

        let found = store.get_message("conv1", m.message_id).await.unwrap();
        assert_eq!(found.map(|f| f.message_id), Some(m.message_id));
        assert!(store.get_message("conv2", m.message_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_user_messages_spans_conversations() {
        let store = MemoryStore::new();
        store.put_message(message("conv1")).await.unwrap();
        store.put_message(message("conv2")).await.unwrap();
        let mut other = message("conv1");
        other.sender = "someone-else".to_string();
        store.put_message(other).await.unwrap();

        let mine = store.list_user_messages("user123").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|m| m.sender == "user123"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = MemoryStore::new();
        let t = tag("u1", "Viajes");
        store.put_tag(t.clone()).await.unwrap();
        store.put_message(message("conv1")).await.unwrap();
        store.save_snapshot(&path).await.unwrap();

        let loaded = MemoryStore::load_snapshot(&path).await.unwrap();
        assert_eq!(loaded.get_tag(t.tag_id).await.unwrap(), Some(t));
        assert_eq!(loaded.list_messages("conv1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = MemoryStore::load_snapshot(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.list_all_tags().await.unwrap().is_empty());
    }
}
