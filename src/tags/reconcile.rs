use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use super::normalize::identity_key;
use super::resolver::TagError;
use crate::db::models::Tag;
use crate::db::Stores;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub dry_run: bool,
    /// Owner/name groups holding more than one tag.
    pub groups: usize,
    /// Duplicate tags folded into their canonical tag.
    pub merged: usize,
    pub rewritten_thoughts: usize,
    pub rewritten_lists: usize,
    pub rewritten_notes: usize,
    pub rewritten_messages: usize,
}

/// Merges tags that share an owner and a case-insensitive name into the
/// oldest member of the group. Entity references are rewritten before the
/// duplicate is deleted, so a failure part-way leaves dangling ids at worst
/// pointing at a tag that still exists.
pub async fn reconcile_duplicate_tags(
    stores: &Stores,
    dry_run: bool,
) -> Result<ReconcileReport, TagError> {
    let mut report = ReconcileReport {
        dry_run,
        ..Default::default()
    };

    let mut groups: HashMap<(String, String), Vec<Tag>> = HashMap::new();
    for tag in stores.tags.list_all_tags().await? {
        groups
            .entry((tag.user_id.clone(), identity_key(&tag.name)))
            .or_default()
            .push(tag);
    }

    for ((owner_id, key), mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        report.groups += 1;
        members.sort_by(|a, b| (a.created_at, a.tag_id).cmp(&(b.created_at, b.tag_id)));
        let canonical = members.remove(0);
        info!(
            owner_id = %owner_id,
            name = %key,
            canonical = %canonical.tag_id,
            duplicates = members.len(),
            dry_run,
            "Found duplicate tag group."
        );

        for duplicate in members {
            report.merged += 1;
            if dry_run {
                continue;
            }
            merge_into(stores, &owner_id, &canonical, &duplicate, &mut report).await?;
        }
    }

    info!(?report, "Tag reconciliation finished.");
    Ok(report)
}

async fn merge_into(
    stores: &Stores,
    owner_id: &str,
    canonical: &Tag,
    duplicate: &Tag,
    report: &mut ReconcileReport,
) -> Result<(), TagError> {
    let now = Utc::now();

    for mut thought in stores.thoughts.list_thoughts(owner_id).await? {
        if thought.tags.replace_tag(duplicate.tag_id, canonical.tag_id, &canonical.name) {
            thought.updated_at = now;
            stores.thoughts.put_thought(thought).await?;
            report.rewritten_thoughts += 1;
        }
    }

    for mut list in stores.lists.list_lists(owner_id).await? {
        if list.tags.replace_tag(duplicate.tag_id, canonical.tag_id, &canonical.name) {
            list.updated_at = now;
            stores.lists.put_list(list).await?;
            report.rewritten_lists += 1;
        }
    }

    for mut note in stores.notes.list_notes(owner_id).await? {
        if note.tags.replace_tag(duplicate.tag_id, canonical.tag_id, &canonical.name) {
            note.updated_at = now;
            stores.notes.put_note(note).await?;
            report.rewritten_notes += 1;
        }
    }

    for mut message in stores.messages.list_user_messages(owner_id).await? {
        if message.tags.replace_tag(duplicate.tag_id, canonical.tag_id, &canonical.name) {
            message.updated_at = now;
            stores.messages.put_message(message).await?;
            report.rewritten_messages += 1;
        }
    }

    if duplicate.usage_count > 0 {
        stores
            .tags
            .increment_usage_count(canonical.tag_id, duplicate.usage_count)
            .await?;
    }
    if !stores.tags.delete_tag(duplicate.tag_id).await? {
        warn!(tag_id = %duplicate.tag_id, "Duplicate tag was already gone.");
    }
    Ok(())
}
