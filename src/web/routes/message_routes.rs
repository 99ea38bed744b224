use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::models::Message;
use crate::dispatch::router::DispatchOutcome;
use crate::pipeline::{CreatedMessage, NewMessage};
use crate::web::{require_owner, AppError, AppState};

#[derive(Deserialize)]
pub struct ClassifyRequest {
    sender: Option<String>,
    content: Option<String>,
}

async fn create_message_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NewMessage>,
) -> Result<(StatusCode, Json<CreatedMessage>), AppError> {
    let created = app_state.pipeline.create_message(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = app_state.stores.messages.list_messages(&conversation_id).await?;
    Ok(Json(messages))
}

async fn classify_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ClassifyRequest>,
) -> Result<Json<DispatchOutcome>, AppError> {
    let sender = require_owner(payload.sender)
        .map_err(|_| AppError::MissingField("sender".to_string()))?;
    let content = payload
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::MissingField("content".to_string()))?;
    Ok(Json(app_state.pipeline.classify_and_route(&sender, &content).await))
}

pub fn create_messages_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_message_handler))
        .route("/classify", post(classify_handler))
        .route("/{conversation_id}", get(get_messages_handler))
}
