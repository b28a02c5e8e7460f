//! Serialized task queue.
//!
//! Every space owns one [`TaskQueue`]: a FIFO lane that runs at most one
//! mutation against that space's files and index at a time. Rewriting a
//! partition file through a temporary is only safe because no append or
//! second rewrite can interleave with it; this queue is the sole
//! mutual-exclusion mechanism in the engine. Queues of different spaces
//! are fully independent.

use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};

type Task = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A single-worker FIFO execution lane.
///
/// Tasks run strictly in submission order. A task's failure is delivered
/// to its submitter and nothing else: the worker keeps draining the lane,
/// so one failed mutation never blocks the next.
///
/// # Example
///
/// ```rust
/// # use urlmap_core::TaskQueue;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = TaskQueue::new();
/// let out = queue.run(|| async { Ok::<_, urlmap_core::Error>(21 * 2) }).await;
/// assert_eq!(out.unwrap(), 42);
/// # }
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    /// Creates a queue and spawns its worker.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                // Outcomes travel through each task's oneshot; the lane
                // itself never stops on failure.
                task().await;
            }
        });
        Self { tx }
    }

    /// Submits a task and resolves with the task's own outcome.
    ///
    /// The task is enqueued before this returns a future, so submission
    /// order is call order even when the returned futures are awaited
    /// concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the worker is gone; otherwise
    /// exactly the task's result.
    pub fn run<T, F, Fut>(&self, task: F) -> impl Future<Output = Result<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let boxed: Task = Box::new(move || {
            Box::pin(async move {
                let _ = done_tx.send(task().await);
            })
        });
        let submitted = self.tx.send(boxed).map_err(|_| Error::QueueClosed);

        async move {
            submitted?;
            done_rx.await.map_err(|_| Error::QueueClosed)?
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
