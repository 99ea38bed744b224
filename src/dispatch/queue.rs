use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::router::{ActionInvoker, ActionJob, DispatchError};
use crate::actions::ActionContext;

/// Sending half of the action queue.
#[derive(Clone)]
pub struct QueueInvoker {
    sender: mpsc::Sender<ActionJob>,
}

impl QueueInvoker {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ActionJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ActionInvoker for QueueInvoker {
    async fn invoke(&self, job: ActionJob) -> Result<(), DispatchError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| DispatchError::QueueClosed)
    }
}

/// Drains the action queue, running every job on its own task.
pub struct ActionWorker {
    receiver: mpsc::Receiver<ActionJob>,
    actions: Arc<ActionContext>,
}

impl ActionWorker {
    pub fn new(receiver: mpsc::Receiver<ActionJob>, actions: Arc<ActionContext>) -> Self {
        Self { receiver, actions }
    }

    /// Runs until every sender is dropped, then waits for in-flight jobs.
    pub async fn run(mut self) {
        info!("Action worker started.");
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        while let Some(job) = self.receiver.recv().await {
            in_flight.retain(|handle| !handle.is_finished());
            let actions = self.actions.clone();
            in_flight.push(tokio::spawn(async move { actions.handle(job).await }));
        }

        debug!(pending = in_flight.len(), "Action queue closed. Waiting for in-flight jobs.");
        for result in join_all(in_flight).await {
            if let Err(e) = result {
                error!(error = %e, "Action task failed to complete.");
            }
        }
        info!("Action worker stopped.");
    }
}
