use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::actions::list::{create_list_from_tags, ListFromTags};
use crate::db::models::List;
use crate::web::{ensure_owner, require_owner, AppError, AppState, OwnerQuery};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFromTagsRequest {
    user_id: Option<String>,
    #[serde(default)]
    tag_names: Vec<String>,
    list_name: Option<String>,
}

async fn create_list_from_tags_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ListFromTagsRequest>,
) -> Result<(StatusCode, Json<List>), AppError> {
    let input = ListFromTags {
        user_id: require_owner(payload.user_id)?,
        tag_names: payload.tag_names,
        list_name: payload.list_name,
    };
    let list = create_list_from_tags(&app_state.actions, input).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn get_lists_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<List>>, AppError> {
    let user_id = require_owner(query.user_id)?;
    Ok(Json(app_state.stores.lists.list_lists(&user_id).await?))
}

async fn get_list_handler(
    State(app_state): State<Arc<AppState>>,
    Path(list_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<List>, AppError> {
    let user_id = require_owner(query.user_id)?;
    let list = app_state
        .stores
        .lists
        .get_list(list_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("List {list_id} not found")))?;
    ensure_owner(&list.user_id, &user_id, "List")?;
    Ok(Json(list))
}

pub fn create_lists_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_lists_handler))
        .route("/from-tags", post(create_list_from_tags_handler))
        .route("/{list_id}", get(get_list_handler))
}
