//! Command pipeline: queue, shared sensor state, planning worker and outbox

mod outbox;
mod queue;
mod state;
mod worker;

pub use outbox::PlanOutbox;
pub use queue::{CommandReceiver, CommandSender, PipelineJob, command_queue};
pub use state::StateSync;
pub use worker::{JobOutcome, PlanningWorker, normalize_command};
