//! Downstream actions started by the dispatch router.
//!
//! Every action runs detached from the request that caused it. Failures stop
//! here: they are logged and turned into an apology in the owner's
//! conversation.

pub mod drive;
pub mod list;
pub mod note;
pub mod research;
pub mod thought;

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::ai::client::{ClassifierAdapter, ClassifierError};
use crate::conversation::ConversationWriter;
use crate::db::store::StoreError;
use crate::db::Stores;
use crate::dispatch::router::{ActionJob, ActionKind};
use crate::tags::{TagError, TagResolver};

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0} belongs to another user")]
    NotOwner(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tags(#[from] TagError),
    #[error(transparent)]
    Completion(#[from] ClassifierError),
    #[error("Completion returned no content")]
    EmptyCompletion,
    #[error("Unexpected completion format: {0}")]
    InvalidCompletion(String),
}

/// Collaborators shared by all actions.
#[derive(Clone)]
pub struct ActionContext {
    pub stores: Stores,
    pub resolver: TagResolver,
    pub adapter: Arc<dyn ClassifierAdapter>,
    pub conversation: ConversationWriter,
}

impl ActionContext {
    pub fn new(stores: Stores, adapter: Arc<dyn ClassifierAdapter>) -> Self {
        Self {
            resolver: TagResolver::new(stores.tags.clone()),
            conversation: ConversationWriter::new(stores.messages.clone()),
            stores,
            adapter,
        }
    }

    /// Runs one job. Never fails; errors become an apology message.
    pub async fn handle(&self, job: ActionJob) {
        let payload = &job.payload;
        let result = match job.kind {
            ActionKind::CreateThought => thought::create_thought(self, payload.into())
                .await
                .map(|t| t.thought_id.to_string()),
            ActionKind::CreateList => list::create_list(self, payload)
                .await
                .map(|l| l.list_id.to_string()),
            ActionKind::Research => research::perform_research(self, payload)
                .await
                .map(|n| n.note_id.to_string()),
            ActionKind::DriveQuery => drive::answer_drive_query(self, payload)
                .await
                .map(|a| a.sub_intent.to_string()),
        };

        match result {
            Ok(outcome) => {
                info!(user_id = %payload.user_id, action = ?job.kind, %outcome, "Action completed.");
            }
            Err(e) => {
                error!(user_id = %payload.user_id, action = ?job.kind, error = %e, "Action failed.");
                if !payload.user_id.trim().is_empty() {
                    self.conversation
                        .apologize(payload.reply_conversation(), apology_for(job.kind))
                        .await;
                }
            }
        }
    }
}

pub fn apology_for(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::CreateThought => {
            "Lo siento, hubo un error al guardar tu pensamiento. Intenta de nuevo."
        }
        ActionKind::CreateList => "Lo siento, hubo un error al crear tu lista. Intenta de nuevo.",
        ActionKind::Research => {
            "Lo siento, hubo un error al realizar la investigación. Intenta de nuevo."
        }
        ActionKind::DriveQuery => {
            "Lo siento, hubo un error al consultar tus documentos. Intenta de nuevo."
        }
    }
}

/// First `max` characters of `text`.
pub(crate) fn prefix_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub(crate) fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ActionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ActionError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}
