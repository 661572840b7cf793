mod failure;
mod result;
mod scheduler;
mod step_runner;

pub use failure::render_error;
pub use result::{StepRecord, StepStatus};
pub use scheduler::Executor;
pub(crate) use scheduler::Slot;
pub use step_runner::DEFAULT_POST_TIMEOUT_WAITING_LIMIT;
