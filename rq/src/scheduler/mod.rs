//! Scheduler for deferred work
//!
//! Admits tasks into a bounded FIFO queue and releases them at a bounded rate
//! under a concurrency limit, all driven by a single actor.

mod core;
mod gate;
mod handle;
mod messages;
mod queue;
mod task;
mod ticker;

pub use handle::Scheduler;
pub use messages::{QueueState, SchedulerError, SchedulerStats, TaskError, TaskResult};
pub use task::{Awaitable, Deferred, TaskHandle, deferred};
pub use ticker::Rate;
