//! Scheduler - client interface to the scheduler actor

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;

use super::core::SchedulerActor;
use super::messages::{Command, QueueState, SchedulerError, SchedulerStats};
use super::task::{Awaitable, Task, TaskHandle};
use super::ticker::Rate;

/// Rate-limited, concurrency-bounded FIFO scheduler.
///
/// Tasks are admitted into a FIFO queue (or rejected with
/// [`TaskError::QueueFull`](super::TaskError::QueueFull) once `max_queued` is
/// reached) and released one per tick, at most `requests_per_second` per
/// second, while fewer than `max_concurrent` tasks are in flight. With no rate
/// configured tasks are released as soon as a slot is free.
///
/// The handle is cheap to clone. The underlying actor keeps running until every
/// clone is dropped and its remaining work is done.
pub struct Scheduler<T, E> {
    tx: mpsc::UnboundedSender<Command<T, E>>,
}

impl<T, E> Clone for Scheduler<T, E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T, E> Scheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Spawn the scheduler actor on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        debug!(?config, "Scheduler::new: called");
        config
            .validate()
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(SchedulerActor::new(&config, rx).run());

        let scheduler = Self { tx };
        if config.auto_start {
            scheduler.start()?;
        }

        info!(rate = ?config.rate(), "Scheduler spawned");
        Ok(scheduler)
    }

    /// Queue `work` and make sure the scheduler is running.
    ///
    /// The returned handle resolves with the work's value, its error wrapped in
    /// `TaskError::Failed`, or `TaskError::QueueFull` if it was not admitted.
    pub fn submit<W, A>(&self, work: W) -> TaskHandle<T, E>
    where
        W: FnOnce() -> A + Send + 'static,
        A: Awaitable<Output = T, Error = E>,
    {
        debug!("Scheduler::submit: called");
        self.enqueue(work, true)
    }

    /// Queue `work` without touching the run state
    pub fn submit_without_starting<W, A>(&self, work: W) -> TaskHandle<T, E>
    where
        W: FnOnce() -> A + Send + 'static,
        A: Awaitable<Output = T, Error = E>,
    {
        debug!("Scheduler::submit_without_starting: called");
        self.enqueue(work, false)
    }

    fn enqueue<W, A>(&self, work: W, auto_start: bool) -> TaskHandle<T, E>
    where
        W: FnOnce() -> A + Send + 'static,
        A: Awaitable<Output = T, Error = E>,
    {
        let (task, handle) = Task::new(work);
        if self.tx.send(Command::Submit { task, auto_start }).is_err() {
            // The task was dropped with the command, so the handle resolves to Dropped
            warn!("Scheduler::enqueue: actor gone, task dropped");
        }
        handle
    }

    /// Begin dispatching. No-op when already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        debug!("Scheduler::start: called");
        self.send(Command::Start)
    }

    /// Halt dispatching. Queued and in-flight tasks are left alone.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        debug!("Scheduler::stop: called");
        self.send(Command::Stop)
    }

    /// Change the dispatch rate.
    ///
    /// If the scheduler is running its timer is torn down and rebuilt at the
    /// new period right away; otherwise the rate is stored for the next start.
    /// Queue contents and counters are unaffected. Pass `f64::INFINITY` for
    /// unbounded.
    pub fn set_rate(&self, requests_per_second: f64) -> Result<(), SchedulerError> {
        debug!(requests_per_second, "Scheduler::set_rate: called");
        let rate = Rate::new(requests_per_second).ok_or(SchedulerError::InvalidRate(requests_per_second))?;
        self.send(Command::SetRate(rate))
    }

    /// Change the concurrency limit (`None` for unbounded); applies to the next dispatch
    pub fn set_max_concurrent(&self, max_concurrent: Option<usize>) -> Result<(), SchedulerError> {
        debug!(?max_concurrent, "Scheduler::set_max_concurrent: called");
        if max_concurrent == Some(0) {
            return Err(SchedulerError::InvalidConfig("max-concurrent must be at least 1".to_string()));
        }
        self.send(Command::SetMaxConcurrent(max_concurrent))
    }

    /// Change the queue depth limit (`None` for unbounded); applies to the next admission
    pub fn set_max_queued(&self, max_queued: Option<usize>) -> Result<(), SchedulerError> {
        debug!(?max_queued, "Scheduler::set_max_queued: called");
        self.send(Command::SetMaxQueued(max_queued))
    }

    /// Snapshot of the scheduler, ordered after every earlier call on this handle
    pub async fn state(&self) -> Result<QueueState, SchedulerError> {
        debug!("Scheduler::state: called");
        let (reply, rx) = oneshot::channel();
        self.send(Command::State { reply })?;
        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    pub async fn is_running(&self) -> Result<bool, SchedulerError> {
        Ok(self.state().await?.running)
    }

    /// Tasks admitted but not yet dispatched
    pub async fn queue_length(&self) -> Result<usize, SchedulerError> {
        Ok(self.state().await?.queued)
    }

    /// Tasks that reached a terminal outcome, success or failure
    pub async fn num_processed(&self) -> Result<u64, SchedulerError> {
        Ok(self.state().await?.processed)
    }

    /// Tasks currently in flight
    pub async fn num_concurrent(&self) -> Result<usize, SchedulerError> {
        Ok(self.state().await?.in_flight)
    }

    /// Current rate in requests per second, `f64::INFINITY` when unbounded
    pub async fn rate(&self) -> Result<f64, SchedulerError> {
        Ok(self.state().await?.rate.as_f64())
    }

    pub async fn stats(&self) -> Result<SchedulerStats, SchedulerError> {
        Ok(self.state().await?.stats)
    }

    fn send(&self, cmd: Command<T, E>) -> Result<(), SchedulerError> {
        self.tx.send(cmd).map_err(|_| SchedulerError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskError;

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let result = Scheduler::<(), ()>::new(SchedulerConfig::default().with_max_concurrent(0));
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_set_rate_validation() {
        let scheduler = Scheduler::<(), ()>::new(SchedulerConfig::default()).unwrap();
        assert_eq!(scheduler.set_rate(0.0), Err(SchedulerError::InvalidRate(0.0)));
        assert_eq!(scheduler.set_rate(-2.0), Err(SchedulerError::InvalidRate(-2.0)));
        assert!(scheduler.set_rate(f64::NAN).is_err());

        scheduler.set_rate(20.0).unwrap();
        assert_eq!(scheduler.rate().await.unwrap(), 20.0);

        scheduler.set_rate(f64::INFINITY).unwrap();
        assert_eq!(scheduler.rate().await.unwrap(), f64::INFINITY);
    }

    #[tokio::test]
    async fn test_set_max_concurrent_rejects_zero() {
        let scheduler = Scheduler::<(), ()>::new(SchedulerConfig::default()).unwrap();
        assert!(scheduler.set_max_concurrent(Some(0)).is_err());
        scheduler.set_max_concurrent(Some(4)).unwrap();
        assert_eq!(scheduler.state().await.unwrap().max_concurrent, Some(4));
    }

    #[tokio::test]
    async fn test_set_max_queued_applies_to_next_submission() {
        let scheduler = Scheduler::<u32, String>::new(SchedulerConfig::default()).unwrap();
        scheduler.submit_without_starting(|| Ok(1));
        scheduler.set_max_queued(Some(1)).unwrap();

        let rejected = scheduler.submit_without_starting(|| Ok(2)).await;
        assert!(matches!(rejected, Err(TaskError::QueueFull { max_queued: 1 })));
        assert_eq!(scheduler.queue_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_one_actor() {
        let scheduler = Scheduler::<u32, String>::new(SchedulerConfig::default()).unwrap();
        let other = scheduler.clone();
        other.submit_without_starting(|| Ok(1));
        assert_eq!(scheduler.queue_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stats_track_outcomes() {
        let scheduler = Scheduler::<u32, String>::new(SchedulerConfig::default()).unwrap();
        scheduler.submit(|| Ok(1)).await.unwrap();
        scheduler.submit(|| Err("bad".to_string())).await.unwrap_err();

        let stats = scheduler.stats().await.unwrap();
        assert_eq!(stats.total_submitted, 2);
        assert_eq!(stats.total_dispatched, 2);
        assert_eq!(stats.total_succeeded, 1);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_rejected, 0);
    }
}
