pub mod enums;
pub mod memory;
pub mod models;
pub mod store;

use std::sync::Arc;

use store::{ListStore, MessageStore, NoteStore, TagStore, ThoughtStore};

/// One handle per table. All of them usually point at the same backend.
#[derive(Clone)]
pub struct Stores {
    pub tags: Arc<dyn TagStore>,
    pub thoughts: Arc<dyn ThoughtStore>,
    pub lists: Arc<dyn ListStore>,
    pub notes: Arc<dyn NoteStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: TagStore + ThoughtStore + ListStore + NoteStore + MessageStore + 'static,
    {
        Self {
            tags: backend.clone(),
            thoughts: backend.clone(),
            lists: backend.clone(),
            notes: backend.clone(),
            messages: backend,
        }
    }
}
