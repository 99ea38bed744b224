use chrono::Utc;
use futures::future::try_join_all;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::input::TagInput;
use super::normalize::{identity_key, is_valid_length, normalize, MAX_TAGS_PER_RESOURCE};
use crate::db::models::{ResolvedTags, Tag};
use crate::db::store::{StoreError, TagStore};

pub const PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
    "#F8B739", "#52C41A", "#FA8C16", "#13C2C2", "#EB2F96", "#722ED1", "#FA541C",
];

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Tag store error: {0}")]
    Store(#[from] StoreError),
}

pub fn random_color() -> String {
    PALETTE
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(PALETTE[0])
        .to_string()
}

/// Maps tag text onto the owner's canonical tag vocabulary, creating tags on
/// first use.
///
/// Lookup and creation are two separate store calls. Two resolutions of the
/// same new name racing each other can both create a tag; the reconciliation
/// job merges such duplicates afterwards.
#[derive(Clone)]
pub struct TagResolver {
    store: Arc<dyn TagStore>,
}

impl TagResolver {
    pub fn new(store: Arc<dyn TagStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        input: Option<&TagInput>,
        owner_id: &str,
    ) -> Result<ResolvedTags, TagError> {
        let Some(input) = input else {
            return Ok(ResolvedTags::default());
        };
        if input.is_empty() {
            return Ok(ResolvedTags::default());
        }

        match input {
            TagInput::Ids(ids) => self.resolve_ids(ids, owner_id).await,
            TagInput::Raw(text) => {
                let candidates: Vec<&str> = text.split(',').collect();
                self.find_or_create(&candidates, owner_id).await
            }
            TagInput::Names(names) => {
                let candidates: Vec<&str> = names.iter().map(String::as_str).collect();
                self.find_or_create(&candidates, owner_id).await
            }
        }
    }

    /// Looks ids up concurrently. Missing ids and ids of other owners are
    /// dropped; nothing is created and usage counts are left alone.
    async fn resolve_ids(&self, ids: &[Uuid], owner_id: &str) -> Result<ResolvedTags, TagError> {
        let lookups = ids.iter().map(|id| self.store.get_tag(*id));
        let found = try_join_all(lookups).await?;

        let mut resolved = ResolvedTags::default();
        for tag in found.into_iter().flatten() {
            if tag.user_id != owner_id {
                debug!(tag_id = %tag.tag_id, owner_id, "Ignoring tag id owned by another user.");
                continue;
            }
            resolved.push(tag.tag_id, tag.name);
        }
        Ok(resolved)
    }

    async fn find_or_create(
        &self,
        candidates: &[&str],
        owner_id: &str,
    ) -> Result<ResolvedTags, TagError> {
        let names = prepare_candidates(candidates);
        let mut resolved = ResolvedTags::default();

        for name in names {
            match self.store.find_tag_by_name(owner_id, &name).await? {
                Some(existing) => {
                    if let Err(e) = self.store.increment_usage_count(existing.tag_id, 1).await {
                        warn!(tag_id = %existing.tag_id, error = %e, "Failed to bump tag usage count.");
                    }
                    resolved.push(existing.tag_id, existing.name);
                }
                None => {
                    let tag = self.create_tag(owner_id, &name).await?;
                    resolved.push(tag.tag_id, tag.name);
                }
            }
        }
        Ok(resolved)
    }

    async fn create_tag(&self, owner_id: &str, name: &str) -> Result<Tag, TagError> {
        let now = Utc::now();
        let tag = Tag {
            tag_id: Uuid::new_v4(),
            user_id: owner_id.to_string(),
            name: name.to_string(),
            color: random_color(),
            usage_count: 1,
            created_at: now,
            updated_at: now,
            created_by: owner_id.to_string(),
            last_modified_by: owner_id.to_string(),
        };
        self.store.put_tag(tag.clone()).await?;
        debug!(tag_id = %tag.tag_id, owner_id, name = %tag.name, "Created tag.");
        Ok(tag)
    }
}

/// Normalizes, drops out-of-bounds names, caps the list and removes
/// case-insensitive repeats keeping first-seen order.
fn prepare_candidates(candidates: &[&str]) -> Vec<String> {
    let bounded: Vec<String> = candidates
        .iter()
        .map(|c| normalize(c))
        .filter(|n| is_valid_length(n))
        .take(MAX_TAGS_PER_RESOURCE)
        .collect();

    let mut seen = HashSet::new();
    bounded
        .into_iter()
        .filter(|n| seen.insert(identity_key(n)))
        .collect()
}
