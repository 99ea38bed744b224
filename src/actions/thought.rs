use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{require, ActionContext, ActionError};
use crate::ai::client::CompletionRequest;
use crate::db::enums::TagSource;
use crate::db::models::{ResolvedTags, Thought};
use crate::dispatch::router::ActionPayload;
use crate::tags::TagInput;

const DEFAULT_AUTHOR: &str = "Manual";

#[derive(Debug, Clone, Default)]
pub struct NewThought {
    pub user_id: String,
    pub content: String,
    pub created_by: Option<String>,
    pub source_message_id: Option<Uuid>,
    pub tags: Option<TagInput>,
    pub tag_source: Option<TagSource>,
}

impl From<&ActionPayload> for NewThought {
    fn from(payload: &ActionPayload) -> Self {
        let tags = (!payload.tag_ids.is_empty()).then(|| TagInput::from(payload.tag_ids.clone()));
        Self {
            user_id: payload.user_id.clone(),
            content: payload.content.clone(),
            created_by: Some(payload.created_by.clone()),
            source_message_id: payload.source_message_id,
            tags,
            tag_source: payload.tag_source,
        }
    }
}

/// Creates a thought. With a source message id this is idempotent: a second
/// delivery for the same owner and message returns the first thought as is.
pub async fn create_thought(ctx: &ActionContext, new: NewThought) -> Result<Thought, ActionError> {
    let user_id = require(&new.user_id, "userId")?;
    require(&new.content, "content")?;

    if let Some(source_id) = new.source_message_id {
        if let Some(existing) = ctx.stores.thoughts.find_thought_by_source(user_id, source_id).await? {
            info!(user_id, source_message_id = %source_id, thought_id = %existing.thought_id, "Thought already exists for message.");
            return Ok(existing);
        }
    }

    let (tags, tag_source) = choose_tags(ctx, user_id, &new).await?;
    let created_by = new
        .created_by
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());

    let now = Utc::now();
    let thought = Thought {
        thought_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        content: new.content,
        tag_source: if tags.is_empty() { None } else { tag_source },
        tags,
        source_message_id: new.source_message_id,
        created_at: now,
        updated_at: now,
        created_by: created_by.clone(),
        last_modified_by: created_by,
    };
    ctx.stores.thoughts.put_thought(thought.clone()).await?;
    info!(user_id, thought_id = %thought.thought_id, tags = thought.tags.len(), "Thought created.");
    Ok(thought)
}

/// Carried tags first, then explicit hashtags, then a suggestion.
async fn choose_tags(
    ctx: &ActionContext,
    user_id: &str,
    new: &NewThought,
) -> Result<(ResolvedTags, Option<TagSource>), ActionError> {
    if let Some(input) = new.tags.as_ref().filter(|t| !t.is_empty()) {
        let resolved = ctx.resolver.resolve(Some(input), user_id).await?;
        return Ok((resolved, Some(new.tag_source.unwrap_or(TagSource::Manual))));
    }

    let hashtags = extract_hashtags(&new.content);
    if !hashtags.is_empty() {
        let resolved = ctx
            .resolver
            .resolve(Some(&TagInput::Names(hashtags)), user_id)
            .await?;
        return Ok((resolved, Some(TagSource::Manual)));
    }

    match suggest_tags(ctx, user_id, &new.content).await {
        Ok(suggestion) if !suggestion.trim().is_empty() => {
            let resolved = ctx
                .resolver
                .resolve(Some(&TagInput::Raw(suggestion)), user_id)
                .await?;
            Ok((resolved, Some(TagSource::Ai)))
        }
        Ok(_) => Ok((ResolvedTags::default(), None)),
        Err(e) => {
            warn!(user_id, error = %e, "Tag suggestion failed, saving thought untagged.");
            Ok((ResolvedTags::default(), None))
        }
    }
}

async fn suggest_tags(ctx: &ActionContext, user_id: &str, content: &str) -> Result<String, ActionError> {
    let existing: Vec<String> = ctx
        .stores
        .tags
        .list_tags(user_id)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let known = if existing.is_empty() {
        "(ninguna)".to_string()
    } else {
        existing.join(", ")
    };

    let prompt = format!(
        "Eres un clasificador de etiquetas para \"thoughts\".\n\
         Las etiquetas existentes del usuario son: {known}.\n\
         Usa una existente si aplica; si no, sugiere hasta dos etiquetas nuevas, en una sola palabra.\n\
         Solo responde con nombres de etiquetas separados por comas."
    );
    let request = CompletionRequest::instruction(prompt)
        .with_user(content)
        .max_tokens(20);
    let reply = ctx.adapter.complete(&request).await?;
    debug!(user_id, reply = %reply, "Tag suggestion received.");

    // At most two suggestions are honored.
    Ok(reply.split(',').take(2).collect::<Vec<_>>().join(","))
}

/// `#word` tokens in order of appearance, without the `#`.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            continue;
        }
        let mut word = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                word.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if !word.is_empty() {
            tags.push(word);
        }
    }
    tags
}
