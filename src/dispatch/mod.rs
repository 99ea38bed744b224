pub mod queue;
pub mod router;

pub use queue::{ActionWorker, QueueInvoker};
pub use router::{
    ActionInvoker, ActionJob, ActionKind, ActionPayload, DispatchError, DispatchOutcome,
    DispatchRequest, DispatchRouter,
};
