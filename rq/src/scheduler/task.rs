//! Task records and the awaitable protocol
//!
//! Work handed to the scheduler may produce its outcome immediately (a plain
//! `Result`) or later (a future). [`Awaitable`] normalizes both into one boxed
//! future so the executor only ever awaits a single shape.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Ready};
use tokio::sync::oneshot;

use super::messages::{TaskError, TaskResult};

/// Anything a task's work may return
pub trait Awaitable: Send + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    fn into_outcome(self) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

impl<T, E> Awaitable for Result<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        futures::future::ready(self).boxed()
    }
}

impl<T, E> Awaitable for BoxFuture<'static, Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        self
    }
}

impl<T, E> Awaitable for Ready<Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        self.boxed()
    }
}

/// Wraps any future resolving to a `Result` so it can be returned from work
pub struct Deferred<F>(pub F);

/// Shorthand for `Deferred(future)`
pub fn deferred<F>(future: F) -> Deferred<F> {
    Deferred(future)
}

impl<F, T, E> Awaitable for Deferred<F>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn into_outcome(self) -> BoxFuture<'static, Result<T, E>> {
        self.0.boxed()
    }
}

pub(crate) type Work<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// A submitted unit of work plus the channel that reports its outcome.
///
/// Both halves are consumed by value, so a task is dispatched at most once
/// and settled at most once.
pub(crate) struct Task<T, E> {
    pub(crate) id: u64,
    pub(crate) work: Work<T, E>,
    pub(crate) reply: oneshot::Sender<TaskResult<T, E>>,
}

impl<T, E> Task<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a task and the handle its submitter awaits
    pub(crate) fn new<W, A>(work: W) -> (Self, TaskHandle<T, E>)
    where
        W: FnOnce() -> A + Send + 'static,
        A: Awaitable<Output = T, Error = E>,
    {
        let (reply, rx) = oneshot::channel();
        let task = Self {
            id: 0,
            work: Box::new(move || work().into_outcome()),
            reply,
        };
        (task, TaskHandle { rx })
    }

    /// Settle the task without running it
    pub(crate) fn reject(self, err: TaskError<E>) {
        // Submitter may have dropped its handle
        let _ = self.reply.send(Err(err));
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Future returned by `submit`; resolves once the task settles.
///
/// Dropping it does not withdraw the task, which still runs and is counted.
pub struct TaskHandle<T, E> {
    rx: oneshot::Receiver<TaskResult<T, E>>,
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = TaskResult<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(TaskError::Dropped)))
    }
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn outcome<A: Awaitable>(value: A) -> Result<A::Output, A::Error> {
        value.into_outcome().await
    }

    #[tokio::test]
    async fn test_plain_result_is_awaitable() {
        assert_eq!(outcome(Ok::<_, String>(7)).await, Ok(7));
        assert_eq!(outcome(Err::<u8, _>("nope")).await, Err("nope"));
    }

    #[tokio::test]
    async fn test_deferred_future_is_awaitable() {
        let fut = async {
            tokio::task::yield_now().await;
            Ok::<_, String>("later")
        };
        assert_eq!(outcome(deferred(fut)).await, Ok("later"));
    }

    #[tokio::test]
    async fn test_boxed_and_ready_futures_are_awaitable() {
        let boxed: BoxFuture<'static, Result<u32, String>> = async { Ok(3) }.boxed();
        assert_eq!(outcome(boxed).await, Ok(3));

        let ready = futures::future::ready(Err::<u32, _>("ready error".to_string()));
        assert_eq!(outcome(ready).await, Err("ready error".to_string()));
    }

    #[tokio::test]
    async fn test_work_is_not_invoked_until_called() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (task, _handle) = Task::<(), ()>::new(move || {
            tx.send(()).unwrap();
            Ok(())
        });
        assert!(rx.try_recv().is_err());

        (task.work)().await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_handle_receives_rejection() {
        let (task, handle) = Task::<u32, String>::new(|| Ok(1));
        task.reject(TaskError::QueueFull { max_queued: 0 });

        let err = handle.await.unwrap_err();
        assert!(err.is_queue_full());
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_task() {
        let (task, handle) = Task::<u32, String>::new(|| Ok(1));
        drop(task);

        assert!(matches!(handle.await, Err(TaskError::Dropped)));
    }
}
