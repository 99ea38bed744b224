use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{prefix_chars, require, ActionContext, ActionError};
use crate::ai::client::CompletionRequest;
use crate::ai::json::parse_first_object;
use crate::db::enums::{Intent, TagSource};
use crate::db::models::{List, ListItem, ResolvedTags};
use crate::dispatch::router::ActionPayload;
use crate::tags::normalize::identity_key;
use crate::tags::TagInput;

const AI_AUTHOR: &str = "AI";
pub const MAX_SOURCE_TAGS: usize = 5;
const MAX_TAGGED_ITEMS: usize = 100;

#[derive(Deserialize)]
struct ExtractedList {
    name: String,
    items: Vec<String>,
}

/// Builds a list out of free text and confirms it in the owner's conversation.
pub async fn create_list(ctx: &ActionContext, payload: &ActionPayload) -> Result<List, ActionError> {
    let user_id = require(&payload.user_id, "userId")?;
    let content = require(&payload.content, "content")?;

    let prompt = format!(
        "Eres un asistente que extrae de un texto un nombre de lista y sus ítems.\n\
         Devuelve EXACTAMENTE un objeto JSON con dos propiedades:\n\
         \x20 - \"name\": cadena con el título de la lista\n\
         \x20 - \"items\": array de cadenas, cada una un elemento de la lista\n\
         Texto: \"\"\"{content}\"\"\""
    );
    let request = CompletionRequest::instruction(prompt)
        .max_tokens(200)
        .temperature(0.7);
    let reply = ctx.adapter.complete(&request).await?;
    let extracted: ExtractedList = parse_first_object(&reply)
        .ok_or_else(|| ActionError::InvalidCompletion("expected {\"name\", \"items\"}".to_string()))?;
    let name = extracted.name.trim();
    if name.is_empty() {
        return Err(ActionError::InvalidCompletion("list name is empty".to_string()));
    }

    let now = Utc::now();
    let list = List {
        list_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        items: extracted
            .items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(|item| ListItem {
                item_id: Uuid::new_v4(),
                content: item.to_string(),
                completed: false,
            })
            .collect(),
        tags: ResolvedTags::default(),
        tag_source: None,
        source_type: None,
        created_at: now,
        updated_at: now,
        created_by: AI_AUTHOR.to_string(),
        last_modified_by: AI_AUTHOR.to_string(),
    };
    ctx.stores.lists.put_list(list.clone()).await?;
    info!(user_id, list_id = %list.list_id, items = list.items.len(), "List created from message.");

    let confirmation = confirmation_text(ctx, &list, content).await;
    ctx.conversation
        .confirm(payload.reply_conversation(), &confirmation, Intent::List)
        .await;
    Ok(list)
}

/// Input for [`create_list_from_tags`].
#[derive(Debug, Clone, Default)]
pub struct ListFromTags {
    pub user_id: String,
    pub tag_names: Vec<String>,
    pub list_name: Option<String>,
}

/// Collects the owner's thoughts carrying any of the given tags, newest first,
/// into a new list with one item per thought.
pub async fn create_list_from_tags(ctx: &ActionContext, input: ListFromTags) -> Result<List, ActionError> {
    let user_id = require(&input.user_id, "userId")?;
    let names: Vec<String> = input
        .tag_names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(ActionError::MissingField("tagNames"));
    }
    if names.len() > MAX_SOURCE_TAGS {
        return Err(ActionError::InvalidInput(format!(
            "At most {MAX_SOURCE_TAGS} tags can be combined into a list"
        )));
    }

    let wanted: Vec<String> = names.iter().map(|name| identity_key(name)).collect();
    let items: Vec<ListItem> = ctx
        .stores
        .thoughts
        .list_thoughts(user_id)
        .await?
        .into_iter()
        .filter(|thought| {
            thought
                .tags
                .tag_names
                .iter()
                .any(|name| wanted.contains(&identity_key(name)))
        })
        .take(MAX_TAGGED_ITEMS)
        .map(|thought| ListItem {
            item_id: Uuid::new_v4(),
            content: thought.content,
            completed: false,
        })
        .collect();
    if items.is_empty() {
        return Err(ActionError::NotFound(format!(
            "No thoughts tagged {}",
            names.join(", ")
        )));
    }

    let tags = ctx
        .resolver
        .resolve(Some(&TagInput::Names(names.clone())), user_id)
        .await?;
    let name = match input.list_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Lista: {}", names.join(", ")),
    };

    let now = Utc::now();
    let list = List {
        list_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name,
        items,
        tag_source: (!tags.is_empty()).then_some(TagSource::Manual),
        tags,
        source_type: Some("tags".to_string()),
        created_at: now,
        updated_at: now,
        created_by: user_id.to_string(),
        last_modified_by: user_id.to_string(),
    };
    ctx.stores.lists.put_list(list.clone()).await?;
    info!(user_id, list_id = %list.list_id, items = list.items.len(), "List created from tags.");
    Ok(list)
}

async fn confirmation_text(ctx: &ActionContext, list: &List, original: &str) -> String {
    let count = list.items.len();
    let fallback = format!("Listo, creé la lista \"{}\" con {count} elementos. 📋", list.name);

    let mut preview = list
        .items
        .iter()
        .take(5)
        .map(|i| i.content.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if count > 5 {
        preview.push_str(&format!(" y {} más", count - 5));
    }

    let prompt = format!(
        "Eres Zafira, un asistente personal. El usuario te pidió crear una lista y la creaste exitosamente.\n\n\
         Mensaje original del usuario: \"{}\"\n\
         Lista creada: \"{}\" con {count} elementos: {preview}\n\n\
         Genera una respuesta breve y natural (1-2 oraciones) confirmando la creación de la lista. \
         Menciona el nombre y cuántos elementos tiene. Responde en español.",
        prefix_chars(original, 200),
        list.name,
    );
    let request = CompletionRequest::instruction(prompt)
        .max_tokens(150)
        .temperature(0.7);
    match ctx.adapter.complete(&request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback,
        Err(e) => {
            warn!(list_id = %list.list_id, error = %e, "List confirmation completion failed.");
            fallback
        }
    }
}
