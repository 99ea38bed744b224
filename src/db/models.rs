use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Intent, TagSource};

/// A per-owner tag. `name` is the canonical display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub tag_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_by: String,
}

/// Denormalized tag references carried by every taggable entity.
/// `tag_ids` and `tag_names` are positionally aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTags {
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    #[serde(default)]
    pub tag_names: Vec<String>,
}

impl ResolvedTags {
    pub fn push(&mut self, tag_id: Uuid, name: impl Into<String>) {
        self.tag_ids.push(tag_id);
        self.tag_names.push(name.into());
    }

    pub fn len(&self) -> usize {
        self.tag_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag_ids.is_empty()
    }

    pub fn contains(&self, tag_id: Uuid) -> bool {
        self.tag_ids.contains(&tag_id)
    }

    /// Points every reference to `old_id` at `new_id`/`new_name`, then drops
    /// repeated ids (first occurrence wins) together with their names.
    /// Returns whether anything changed.
    pub fn replace_tag(&mut self, old_id: Uuid, new_id: Uuid, new_name: &str) -> bool {
        if !self.contains(old_id) {
            return false;
        }

        let mut ids = Vec::with_capacity(self.tag_ids.len());
        let mut names = Vec::with_capacity(self.tag_names.len());
        // Older records may have drifted out of alignment; missing names become "".
        for (index, id) in self.tag_ids.iter().enumerate() {
            let (id, name) = if *id == old_id {
                (new_id, new_name.to_string())
            } else {
                (*id, self.tag_names.get(index).cloned().unwrap_or_default())
            };
            if ids.contains(&id) {
                continue;
            }
            ids.push(id);
            names.push(name);
        }

        self.tag_ids = ids;
        self.tag_names = names;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub message_id: Uuid,
    pub sender: String,
    pub content: String,
    pub input_type: String,
    pub intent: Option<Intent>,
    #[serde(flatten)]
    pub tags: ResolvedTags,
    pub tag_source: Option<TagSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub thought_id: Uuid,
    pub user_id: String,
    pub content: String,
    #[serde(flatten)]
    pub tags: ResolvedTags,
    pub tag_source: Option<TagSource>,
    /// Dedup key: at most one thought per owner and source message.
    pub source_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub item_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub list_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub items: Vec<ListItem>,
    #[serde(flatten)]
    pub tags: ResolvedTags,
    pub tag_source: Option<TagSource>,
    /// `"tags"` for lists assembled from tagged thoughts.
    #[serde(default)]
    pub source_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub note_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub attachment_keys: Vec<String>,
    #[serde(flatten)]
    pub tags: ResolvedTags,
    pub tag_source: Option<TagSource>,
    pub source_type: Option<String>,
    pub source_message_id: Option<Uuid>,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_modified_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_tag_keeps_ids_and_names_aligned() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut tags = ResolvedTags::default();
        tags.push(a, "Trabajo");
        tags.push(b, "trabajo");
        tags.push(c, "Viajes");

        assert!(tags.replace_tag(b, a, "Trabajo"));
        assert_eq!(tags.tag_ids, vec![a, c]);
        assert_eq!(tags.tag_names, vec!["Trabajo".to_string(), "Viajes".to_string()]);
    }

    #[test]
    fn test_replace_tag_substitutes_in_place() {
        let (old, new, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut tags = ResolvedTags::default();
        tags.push(other, "Ideas");
        tags.push(old, "Musica");

        assert!(tags.replace_tag(old, new, "Música"));
        assert_eq!(tags.tag_ids, vec![other, new]);
        assert_eq!(tags.tag_names[1], "Música");
    }

    #[test]
    fn test_replace_tag_untouched_when_absent() {
        let mut tags = ResolvedTags::default();
        tags.push(Uuid::new_v4(), "Ideas");
        let before = tags.clone();
        assert!(!tags.replace_tag(Uuid::new_v4(), Uuid::new_v4(), "Otro"));
        assert_eq!(tags, before);
    }

    #[test]
    fn test_thought_wire_format_is_flat_camel_case() {
        let now = Utc::now();
        let thought = Thought {
            thought_id: Uuid::new_v4(),
            user_id: "user123".to_string(),
            content: "hola".to_string(),
            tags: ResolvedTags::default(),
            tag_source: None,
            source_message_id: None,
            created_at: now,
            updated_at: now,
            created_by: "Manual".to_string(),
            last_modified_by: "Manual".to_string(),
        };
        let value = serde_json::to_value(&thought).unwrap();
        assert!(value.get("tagIds").unwrap().as_array().unwrap().is_empty());
        assert!(value.get("tagNames").is_some());
        assert!(value.get("tagSource").unwrap().is_null());
        assert!(value.get("sourceMessageId").unwrap().is_null());
    }
}
