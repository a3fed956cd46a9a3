//! Scheduler actor: dispatch loop and executor
//!
//! One actor task owns the queue, the concurrency gate and the ticker. Every
//! submission, setter, tick and completion is handled in turn by this task,
//! so the dispatch decision (check queue, acquire slot, pop) can never
//! interleave with another mutation. This also closes the window where a
//! submission could land between an idle tick deciding to stop and the stop
//! itself.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;

use super::gate::ConcurrencyGate;
use super::messages::{Command, QueueState, SchedulerStats, TaskError, TaskResult};
use super::queue::TaskQueue;
use super::task::Task;
use super::ticker::RateTicker;

/// Result of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Queue was empty; the ticker has been stopped
    Idle,

    /// Every slot is taken; the head task stays queued
    AtCapacity,

    /// The head task was handed to the executor
    Dispatched,
}

/// Outcome of a finished task on its way back to the actor
struct Completion<T, E> {
    id: u64,
    outcome: TaskResult<T, E>,
    reply: tokio::sync::oneshot::Sender<TaskResult<T, E>>,
}

pub(crate) struct SchedulerActor<T, E> {
    queue: TaskQueue<Task<T, E>>,
    gate: ConcurrencyGate,
    ticker: RateTicker,
    max_queued: Option<usize>,
    stats: SchedulerStats,
    next_id: u64,
    rx: mpsc::UnboundedReceiver<Command<T, E>>,
    // The actor keeps a sender so the completion channel never closes under it
    done_tx: mpsc::UnboundedSender<Completion<T, E>>,
    done_rx: mpsc::UnboundedReceiver<Completion<T, E>>,
}

impl<T, E> SchedulerActor<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(config: &SchedulerConfig, rx: mpsc::UnboundedReceiver<Command<T, E>>) -> Self {
        debug!(?config, "SchedulerActor::new: called");
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            queue: TaskQueue::new(),
            gate: ConcurrencyGate::new(config.max_concurrent),
            ticker: RateTicker::new(config.rate()),
            max_queued: config.max_queued,
            stats: SchedulerStats::default(),
            next_id: 0,
            rx,
            done_tx,
            done_rx,
        }
    }

    /// Run until every handle is gone and nothing is left to do
    pub(crate) async fn run(mut self) {
        debug!("SchedulerActor::run: called");
        let mut commands_open = true;

        loop {
            if !commands_open && self.is_finished() {
                break;
            }

            tokio::select! {
                cmd = self.rx.recv(), if commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("SchedulerActor::run: all handles dropped");
                        commands_open = false;
                    }
                },
                Some(done) = self.done_rx.recv() => self.finish(done),
                _ = self.ticker.tick() => {
                    let outcome = self.dispatch();
                    debug!(?outcome, "SchedulerActor::run: tick");
                }
            }

            if self.ticker.is_eager() && self.ticker.is_running() {
                self.pump();
            }
        }

        info!(
            queued = self.queue.len(),
            processed = self.gate.processed(),
            "Scheduler actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: Command<T, E>) {
        match cmd {
            Command::Submit { task, auto_start } => {
                debug!(auto_start, "SchedulerActor::handle_command: Submit");
                self.admit(task);
                if auto_start {
                    self.start();
                }
            }
            Command::Start => {
                debug!("SchedulerActor::handle_command: Start");
                self.start();
            }
            Command::Stop => {
                debug!("SchedulerActor::handle_command: Stop");
                if self.ticker.stop() {
                    info!(queued = self.queue.len(), "Scheduler stopped");
                }
            }
            Command::SetRate(rate) => {
                debug!(?rate, "SchedulerActor::handle_command: SetRate");
                self.ticker.set_rate(rate);
            }
            Command::SetMaxConcurrent(limit) => {
                debug!(?limit, "SchedulerActor::handle_command: SetMaxConcurrent");
                self.gate.set_max_concurrent(limit);
            }
            Command::SetMaxQueued(limit) => {
                debug!(?limit, queued = self.queue.len(), "SchedulerActor::handle_command: SetMaxQueued");
                self.max_queued = limit;
            }
            Command::State { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn admit(&mut self, mut task: Task<T, E>) {
        task.id = self.next_id;
        self.next_id += 1;
        self.stats.total_submitted += 1;

        match self.queue.admit(task, self.max_queued) {
            Ok(depth) => {
                self.stats.peak_queue_depth = self.queue.peak_depth();
                debug!(depth, "SchedulerActor::admit: queued");
            }
            Err(task) => {
                // admit only rejects when a limit is set
                let max_queued = self.max_queued.unwrap_or_default();
                debug!(task_id = task.id, max_queued, "SchedulerActor::admit: queue full, rejecting");
                self.stats.total_rejected += 1;
                task.reject(TaskError::QueueFull { max_queued });
            }
        }
    }

    fn start(&mut self) {
        if self.ticker.start() {
            info!(rate = ?self.ticker.rate(), queued = self.queue.len(), "Scheduler started");
        }
    }

    /// One dispatch step: at most one task leaves the queue
    pub(crate) fn dispatch(&mut self) -> DispatchOutcome {
        if self.queue.is_empty() {
            if self.ticker.stop() {
                debug!("SchedulerActor::dispatch: queue drained, going idle");
            }
            return DispatchOutcome::Idle;
        }

        if !self.gate.try_acquire() {
            return DispatchOutcome::AtCapacity;
        }

        let Some(task) = self.queue.pop() else {
            unreachable!("queue emptied between check and pop");
        };
        self.stats.total_dispatched += 1;
        self.stats.peak_concurrent = self.gate.peak();
        self.execute(task);
        DispatchOutcome::Dispatched
    }

    /// Dispatch until the queue drains or the gate is full
    fn pump(&mut self) {
        while self.dispatch() == DispatchOutcome::Dispatched {}
    }

    /// Run the task's work on its own tokio task and report back when done
    fn execute(&self, task: Task<T, E>) {
        let Task { id, work, reply } = task;
        debug!(task_id = id, "SchedulerActor::execute: dispatching");
        let done_tx = self.done_tx.clone();

        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(async move { work().await }).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(task_id = id, %message, "Task panicked");
                    Err(TaskError::Panicked(message))
                }
            };
            let _ = done_tx.send(Completion { id, outcome, reply });
        });
    }

    /// Release the slot first so the submitter observes final counters
    fn finish(&mut self, done: Completion<T, E>) {
        self.gate.release();
        if done.outcome.is_ok() {
            self.stats.total_succeeded += 1;
        } else {
            self.stats.total_failed += 1;
        }
        debug!(
            task_id = done.id,
            ok = done.outcome.is_ok(),
            in_flight = self.gate.in_flight(),
            "SchedulerActor::finish: task settled"
        );
        let _ = done.reply.send(done.outcome);
    }

    fn is_finished(&self) -> bool {
        self.gate.in_flight() == 0 && (self.queue.is_empty() || !self.ticker.is_running())
    }

    fn snapshot(&self) -> QueueState {
        QueueState {
            running: self.ticker.is_running(),
            queued: self.queue.len(),
            in_flight: self.gate.in_flight(),
            processed: self.gate.processed(),
            rate: self.ticker.rate(),
            max_concurrent: self.gate.max_concurrent(),
            max_queued: self.max_queued,
            stats: self.stats.clone(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
