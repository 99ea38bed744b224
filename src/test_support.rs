//! Fakes shared by the in-crate tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::actions::ActionContext;
use crate::ai::client::{ClassifierAdapter, ClassifierError, CompletionRequest};
use crate::db::memory::MemoryStore;
use crate::db::models::Tag;
use crate::db::store::{StoreError, StoreResult, TagStore};
use crate::db::Stores;
use crate::dispatch::router::{ActionInvoker, ActionJob, DispatchError};

/// Replies with a fixed script, one entry per call, and records every request.
/// An exhausted script fails the call.
pub struct ScriptedClassifier {
    replies: Mutex<VecDeque<Result<String, ClassifierError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClassifier {
    pub fn new(replies: Vec<Result<String, ClassifierError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClassifierAdapter for ScriptedClassifier {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifierError::RequestFailed("script exhausted".to_string())))
    }
}

/// Records jobs instead of running them.
#[derive(Default)]
pub struct RecordingInvoker {
    jobs: Mutex<Vec<ActionJob>>,
    fail: bool,
}

impl RecordingInvoker {
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn jobs(&self) -> Vec<ActionJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionInvoker for RecordingInvoker {
    async fn invoke(&self, job: ActionJob) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::QueueClosed);
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Tag store that starts failing writes after a number of successful creates,
/// or fails every usage-count bump.
pub struct FlakyTagStore {
    inner: Arc<MemoryStore>,
    puts_allowed: Option<usize>,
    puts: AtomicUsize,
    fail_increments: bool,
}

impl FlakyTagStore {
    pub fn new(inner: Arc<MemoryStore>, puts_allowed: usize) -> Self {
        Self {
            inner,
            puts_allowed: Some(puts_allowed),
            puts: AtomicUsize::new(0),
            fail_increments: false,
        }
    }

    pub fn failing_increments(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            puts_allowed: None,
            puts: AtomicUsize::new(0),
            fail_increments: true,
        }
    }
}

#[async_trait]
impl TagStore for FlakyTagStore {
    async fn get_tag(&self, tag_id: Uuid) -> StoreResult<Option<Tag>> {
        self.inner.get_tag(tag_id).await
    }

    async fn find_tag_by_name(&self, user_id: &str, name: &str) -> StoreResult<Option<Tag>> {
        self.inner.find_tag_by_name(user_id, name).await
    }

    async fn list_tags(&self, user_id: &str) -> StoreResult<Vec<Tag>> {
        self.inner.list_tags(user_id).await
    }

    async fn list_all_tags(&self) -> StoreResult<Vec<Tag>> {
        self.inner.list_all_tags().await
    }

    async fn put_tag(&self, tag: Tag) -> StoreResult<()> {
        let done = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.puts_allowed.is_some_and(|allowed| done >= allowed) {
            return Err(StoreError::Unavailable("injected put failure".to_string()));
        }
        self.inner.put_tag(tag).await
    }

    async fn increment_usage_count(&self, tag_id: Uuid, by: u64) -> StoreResult<()> {
        if self.fail_increments {
            return Err(StoreError::Unavailable("injected increment failure".to_string()));
        }
        self.inner.increment_usage_count(tag_id, by).await
    }

    async fn delete_tag(&self, tag_id: Uuid) -> StoreResult<bool> {
        self.inner.delete_tag(tag_id).await
    }
}

pub fn action_context(store: Arc<MemoryStore>, adapter: Arc<dyn ClassifierAdapter>) -> ActionContext {
    ActionContext::new(Stores::from_backend(store), adapter)
}
