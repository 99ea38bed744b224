use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::tags::reconcile::{reconcile_duplicate_tags, ReconcileReport};
use crate::web::{AppError, AppState};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnifyTagsRequest {
    #[serde(default)]
    dry_run: bool,
}

async fn unify_tags_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<UnifyTagsRequest>,
) -> Result<Json<ReconcileReport>, AppError> {
    let report = reconcile_duplicate_tags(&app_state.stores, payload.dry_run).await?;
    Ok(Json(report))
}

pub fn create_maintenance_router() -> Router<Arc<AppState>> {
    Router::new().route("/unify-tags", post(unify_tags_handler))
}
