use axum::{
    http::Method,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::actions::ActionContext;
use crate::ai::client::ClassifierAdapter;
use crate::ai::intent::IntentClassifier;
use crate::config::ServerConfig;
use crate::db::Stores;
use crate::dispatch::router::{ActionInvoker, DispatchRouter};
use crate::pipeline::MessagePipeline;
use crate::tags::TagResolver;
use crate::version::VERSION;
use crate::web::routes::*;

pub mod error;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub stores: Stores,
    pub resolver: TagResolver,
    pub pipeline: MessagePipeline,
    pub actions: ActionContext,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        stores: Stores,
        adapter: Arc<dyn ClassifierAdapter>,
        invoker: Arc<dyn ActionInvoker>,
    ) -> Self {
        let resolver = TagResolver::new(stores.tags.clone());
        let pipeline = MessagePipeline::new(
            stores.messages.clone(),
            resolver.clone(),
            IntentClassifier::new(adapter.clone()),
            DispatchRouter::new(invoker),
        );
        Self {
            config,
            actions: ActionContext::new(stores.clone(), adapter),
            stores,
            resolver,
            pipeline,
        }
    }
}

/// `?userId=` on owner-scoped reads.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

pub(crate) fn require_owner(user_id: Option<String>) -> Result<String, AppError> {
    user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::MissingField("userId".to_string()))
}

/// Ownership is a single equality check on `userId`.
pub(crate) fn ensure_owner(owner: &str, user_id: &str, what: &str) -> Result<(), AppError> {
    if owner == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{what} belongs to another user")))
    }
}

async fn health_check_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK", "version": VERSION }))
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/tags", tag_routes::create_tags_router())
        .nest("/api/messages", message_routes::create_messages_router())
        .nest("/api/thoughts", thought_routes::create_thoughts_router())
        .nest("/api/lists", list_routes::create_lists_router())
        .nest("/api/notes", note_routes::create_notes_router())
        .nest("/api/maintenance", maintenance_routes::create_maintenance_router())
        .with_state(app_state)
        .layer(cors)
}
