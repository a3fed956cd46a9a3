//! ratequeue - rate-limited, concurrency-bounded task scheduler
//!
//! Callers submit deferred work; the scheduler queues it FIFO and releases it
//! at a target rate while capping how many tasks run at once. Submissions are
//! rejected once the queue reaches its depth limit.
//!
//! # Core Concepts
//!
//! - **Admission**: `submit` either queues the task or fails it with `QueueFull`
//! - **Ticks**: one dispatch attempt per period (`1 / requests_per_second`)
//! - **Concurrency gate**: no dispatch while `max_concurrent` tasks are in flight
//! - **Drain**: an empty queue stops the ticker; the next `submit` restarts it
//!
//! # Example
//!
//! ```no_run
//! use ratequeue::{Scheduler, SchedulerConfig, deferred};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SchedulerConfig::default().with_rate(10.0).with_max_concurrent(2);
//! let scheduler = Scheduler::<String, std::io::Error>::new(config)?;
//!
//! let greeting = scheduler.submit(|| Ok("hello".to_string())).await?;
//! let later = scheduler
//!     .submit(|| deferred(async { Ok::<_, std::io::Error>("world".to_string()) }))
//!     .await?;
//!
//! println!("{greeting} {later}, processed {}", scheduler.num_processed().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod scheduler;

// Re-export commonly used types
pub use config::SchedulerConfig;
pub use scheduler::{
    Awaitable, Deferred, QueueState, Rate, Scheduler, SchedulerError, SchedulerStats, TaskError, TaskHandle,
    TaskResult, deferred,
};
