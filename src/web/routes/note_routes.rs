use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::actions::note::{create_note_from_message, NoteFromMessage};
use crate::db::models::Note;
use crate::tags::TagInput;
use crate::web::{ensure_owner, require_owner, AppError, AppState, OwnerQuery};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteFromMessageRequest {
    user_id: Option<String>,
    conversation_id: Option<String>,
    message_id: Option<Uuid>,
    title: Option<String>,
    #[serde(default)]
    tags: Option<TagInput>,
}

async fn create_note_from_message_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NoteFromMessageRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let user_id = require_owner(payload.user_id)?;
    let conversation_id = payload
        .conversation_id
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::MissingField("conversationId".to_string()))?;
    let message_id = payload
        .message_id
        .ok_or_else(|| AppError::MissingField("messageId".to_string()))?;

    let input = NoteFromMessage {
        user_id,
        conversation_id,
        message_id,
        title: payload.title,
        tags: payload.tags,
    };
    let note = create_note_from_message(&app_state.actions, input).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_notes_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let user_id = require_owner(query.user_id)?;
    Ok(Json(app_state.stores.notes.list_notes(&user_id).await?))
}

async fn get_note_handler(
    State(app_state): State<Arc<AppState>>,
    Path(note_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Note>, AppError> {
    let user_id = require_owner(query.user_id)?;
    let note = app_state
        .stores
        .notes
        .get_note(note_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {note_id} not found")))?;
    ensure_owner(&note.user_id, &user_id, "Note")?;
    Ok(Json(note))
}

pub fn create_notes_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_notes_handler))
        .route("/from-message", post(create_note_from_message_handler))
        .route("/{note_id}", get(get_note_handler))
}
