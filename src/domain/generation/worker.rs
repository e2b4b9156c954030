use super::executor::ChunkExecutor;
use super::queue::TaskQueue;
use super::task::{ChunkTask, RetryPolicy, TaskError};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Bounded pool of workers draining the shared task queue.
///
/// Each task reports a `TaskOutcome`; retryable failures are pushed back onto the queue
/// after their backoff from a detached timer, so a waiting retry never holds a worker.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    executor: Arc<ChunkExecutor>,
    retry_policy: RetryPolicy,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<TaskQueue>,
        executor: Arc<ChunkExecutor>,
        retry_policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            executor,
            retry_policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Spawn the workers; they run for the lifetime of the runtime
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!(concurrency = self.concurrency, "Starting chunk workers");

        (0..self.concurrency)
            .map(|worker_id| {
                let pool = self.clone();
                tokio::spawn(async move {
                    loop {
                        let task = pool.queue.pop().await;
                        pool.process(worker_id, task).await;
                    }
                })
            })
            .collect()
    }

    /// Run one task and apply the retry policy to its outcome
    pub async fn process(&self, worker_id: usize, task: ChunkTask) {
        tracing::debug!(
            worker_id,
            chunk_target = ?task.target,
            chunk_index = task.chunk_index,
            attempt = task.attempt,
            priority = ?task.priority,
            "Processing chunk task"
        );

        let error = match self.executor.execute(&task).await {
            Ok(()) => return,
            Err(error) => error,
        };

        match &error {
            TaskError::Retryable { kind, message } if self.retry_policy.should_retry(task.attempt) => {
                let delay = self.retry_policy.backoff(*kind, task.attempt);
                tracing::warn!(
                    chunk_target = ?task.target,
                    chunk_index = task.chunk_index,
                    attempt = task.attempt,
                    retry_kind = ?kind,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Chunk task failed, scheduling retry"
                );
                let queue = self.queue.clone();
                let retry = task.next_attempt();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    queue.push(retry);
                });
            }
            _ => {
                tracing::error!(
                    chunk_target = ?task.target,
                    chunk_index = task.chunk_index,
                    attempt = task.attempt,
                    error = %error,
                    "Chunk task failed permanently"
                );
                self.executor.give_up(&task, &error).await;
            }
        }
    }
}
