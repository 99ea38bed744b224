use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{List, Note, ResolvedTags, Tag, Thought};
use crate::tags::normalize::{identity_key, is_valid_length, normalize};
use crate::tags::resolver::random_color;
use crate::tags::TagInput;
use crate::web::{ensure_owner, require_owner, AppError, AppState, OwnerQuery};

const MANUAL_AUTHOR: &str = "Manual";

// --- Request/Response Structs ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTagsRequest {
    user_id: Option<String>,
    #[serde(default)]
    tags: Option<TagInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    user_id: Option<String>,
    name: Option<String>,
    color: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTagRequest {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Serialize)]
pub struct ResourceCounts {
    thoughts: usize,
    lists: usize,
    notes: usize,
    total: usize,
}

#[derive(Serialize)]
pub struct TagResources {
    tag: Tag,
    thoughts: Vec<Thought>,
    lists: Vec<List>,
    notes: Vec<Note>,
    counts: ResourceCounts,
}

// --- Helpers ---

async fn load_owned_tag(app_state: &AppState, tag_id: Uuid, user_id: &str) -> Result<Tag, AppError> {
    let tag = app_state
        .stores
        .tags
        .get_tag(tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag {tag_id} not found")))?;
    ensure_owner(&tag.user_id, user_id, "Tag")?;
    Ok(tag)
}

fn validated_name(raw: &str) -> Result<String, AppError> {
    let name = normalize(raw);
    if !is_valid_length(&name) {
        return Err(AppError::InvalidInput(
            "Tag name must be between 2 and 50 characters".to_string(),
        ));
    }
    Ok(name)
}

// --- Route Handlers ---

async fn resolve_tags_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ResolveTagsRequest>,
) -> Result<Json<ResolvedTags>, AppError> {
    let user_id = require_owner(payload.user_id)?;
    let resolved = app_state.resolver.resolve(payload.tags.as_ref(), &user_id).await?;
    Ok(Json(resolved))
}

async fn get_user_tags_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Tag>>, AppError> {
    let user_id = require_owner(query.user_id)?;
    let tags = app_state.stores.tags.list_tags(&user_id).await?;
    Ok(Json(tags))
}

async fn create_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let user_id = require_owner(payload.user_id)?;
    let raw_name = payload
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::MissingField("name".to_string()))?;
    let name = validated_name(&raw_name)?;

    if app_state.stores.tags.find_tag_by_name(&user_id, &name).await?.is_some() {
        return Err(AppError::Conflict(format!("A tag named \"{name}\" already exists.")));
    }

    let now = Utc::now();
    let tag = Tag {
        tag_id: Uuid::new_v4(),
        user_id: user_id.clone(),
        name,
        color: payload
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(random_color),
        usage_count: 0,
        created_at: now,
        updated_at: now,
        created_by: user_id.clone(),
        last_modified_by: user_id,
    };
    app_state.stores.tags.put_tag(tag.clone()).await?;
    info!(tag_id = %tag.tag_id, user_id = %tag.user_id, name = %tag.name, "Tag created via API.");
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn get_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Tag>, AppError> {
    let user_id = require_owner(query.user_id)?;
    Ok(Json(load_owned_tag(&app_state, tag_id, &user_id).await?))
}

async fn update_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
    Json(payload): Json<UpdateTagRequest>,
) -> Result<Json<Tag>, AppError> {
    let user_id = require_owner(query.user_id)?;
    let mut tag = load_owned_tag(&app_state, tag_id, &user_id).await?;

    if let Some(raw_name) = payload.name.filter(|n| !n.trim().is_empty()) {
        let name = validated_name(&raw_name)?;
        if identity_key(&name) != identity_key(&tag.name) {
            let clash = app_state.stores.tags.find_tag_by_name(&user_id, &name).await?;
            if clash.is_some_and(|other| other.tag_id != tag_id) {
                return Err(AppError::Conflict(format!("A tag named \"{name}\" already exists.")));
            }
        }
        tag.name = name;
    }
    if let Some(color) = payload.color.filter(|c| !c.trim().is_empty()) {
        tag.color = color;
    }
    tag.updated_at = Utc::now();
    tag.last_modified_by = MANUAL_AUTHOR.to_string();

    app_state.stores.tags.put_tag(tag.clone()).await?;
    Ok(Json(tag))
}

async fn delete_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode, AppError> {
    let user_id = require_owner(query.user_id)?;
    load_owned_tag(&app_state, tag_id, &user_id).await?;

    if app_state.stores.tags.delete_tag(tag_id).await? {
        info!(%tag_id, user_id = %user_id, "Tag deleted.");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Tag {tag_id} not found")))
    }
}

async fn get_tag_resources_handler(
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<TagResources>, AppError> {
    let user_id = require_owner(query.user_id)?;
    let tag = load_owned_tag(&app_state, tag_id, &user_id).await?;

    let thoughts: Vec<Thought> = app_state
        .stores
        .thoughts
        .list_thoughts(&user_id)
        .await?
        .into_iter()
        .filter(|t| t.tags.contains(tag_id))
        .collect();
    let lists: Vec<List> = app_state
        .stores
        .lists
        .list_lists(&user_id)
        .await?
        .into_iter()
        .filter(|l| l.tags.contains(tag_id))
        .collect();
    let notes: Vec<Note> = app_state
        .stores
        .notes
        .list_notes(&user_id)
        .await?
        .into_iter()
        .filter(|n| n.tags.contains(tag_id))
        .collect();

    let counts = ResourceCounts {
        thoughts: thoughts.len(),
        lists: lists.len(),
        notes: notes.len(),
        total: thoughts.len() + lists.len() + notes.len(),
    };
    Ok(Json(TagResources {
        tag,
        thoughts,
        lists,
        notes,
        counts,
    }))
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_user_tags_handler).post(create_tag_handler))
        .route("/resolve", post(resolve_tags_handler))
        .route(
            "/{tag_id}",
            get(get_tag_handler)
                .put(update_tag_handler)
                .delete(delete_tag_handler),
        )
        .route("/{tag_id}/resources", get(get_tag_resources_handler))
}
