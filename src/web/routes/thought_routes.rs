use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::actions::thought::{create_thought, NewThought};
use crate::db::enums::TagSource;
use crate::db::models::Thought;
use crate::tags::TagInput;
use crate::web::{ensure_owner, require_owner, AppError, AppState, OwnerQuery};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThoughtRequest {
    user_id: Option<String>,
    content: Option<String>,
    created_by: Option<String>,
    source_message_id: Option<Uuid>,
    #[serde(default)]
    tags: Option<TagInput>,
}

async fn load_owned_thought(
    app_state: &AppState,
    thought_id: Uuid,
    user_id: &str,
) -> Result<Thought, AppError> {
    let thought = app_state
        .stores
        .thoughts
        .get_thought(thought_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Thought {thought_id} not found")))?;
    ensure_owner(&thought.user_id, user_id, "Thought")?;
    Ok(thought)
}

async fn create_thought_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateThoughtRequest>,
) -> Result<(StatusCode, Json<Thought>), AppError> {
    let user_id = require_owner(payload.user_id)?;
    let new = NewThought {
        user_id,
        content: payload.content.unwrap_or_default(),
        created_by: payload.created_by,
        source_message_id: payload.source_message_id,
        tag_source: payload.tags.as_ref().map(|_| TagSource::Manual),
        tags: payload.tags,
    };
    let thought = create_thought(&app_state.actions, new).await?;
    Ok((StatusCode::CREATED, Json(thought)))
}

async fn get_thoughts_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Thought>>, AppError> {
    let user_id = require_owner(query.user_id)?;
    Ok(Json(app_state.stores.thoughts.list_thoughts(&user_id).await?))
}

async fn get_thought_handler(
    State(app_state): State<Arc<AppState>>,
    Path(thought_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Thought>, AppError> {
    let user_id = require_owner(query.user_id)?;
    Ok(Json(load_owned_thought(&app_state, thought_id, &user_id).await?))
}

async fn delete_thought_handler(
    State(app_state): State<Arc<AppState>>,
    Path(thought_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode, AppError> {
    let user_id = require_owner(query.user_id)?;
    load_owned_thought(&app_state, thought_id, &user_id).await?;
    if app_state.stores.thoughts.delete_thought(thought_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Thought {thought_id} not found")))
    }
}

pub fn create_thoughts_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_thoughts_handler).post(create_thought_handler))
        .route("/{thought_id}", get(get_thought_handler).delete(delete_thought_handler))
}
