use crate::domain::speech::AudioFormat;
use crate::infrastructure::providers::ProviderError;
use crate::infrastructure::storage::StorageError;
use std::time::Duration;
use uuid::Uuid;

/// Scheduling tier of a chunk task. Lower sorts first, and every `Foreground` rank runs
/// before any `Background` rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Foreground(u32),
    Background(u32),
}

impl Priority {
    /// Chunks at or after the reader's position come first, nearest first; chunks before it
    /// fill in afterwards, nearest first as well.
    pub fn for_reading_position(chunk_index: usize, start_chunk: usize) -> Self {
        if chunk_index >= start_chunk {
            Priority::Foreground((chunk_index - start_chunk) as u32)
        } else {
            Priority::Background((start_chunk - chunk_index) as u32)
        }
    }
}

/// What a chunk task writes its result into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkTarget {
    Job { job_id: Uuid },
    Material { material_id: Uuid, content_hash: String },
}

#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub target: ChunkTarget,
    pub chunk_index: usize,
    pub text: String,
    pub voice: String,
    pub format: AudioFormat,
    pub priority: Priority,
    /// 1-based
    pub attempt: u32,
}

impl ChunkTask {
    pub fn next_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    Transient,
    RateLimited,
}

/// Failure of one chunk task attempt, inspected by the worker pool to decide rescheduling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("{message}")]
    Retryable { kind: RetryKind, message: String },
    #[error("{message}")]
    Permanent { message: String },
}

impl TaskError {
    pub fn transient(message: impl Into<String>) -> Self {
        TaskError::Retryable {
            kind: RetryKind::Transient,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        TaskError::Retryable {
            kind: RetryKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        TaskError::Permanent {
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            TaskError::Retryable {
                kind: RetryKind::RateLimited,
                ..
            }
        )
    }
}

impl From<ProviderError> for TaskError {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::Timeout(_) | ProviderError::Network(_) => TaskError::transient(message),
            ProviderError::RateLimited(_) => TaskError::rate_limited(message),
            ProviderError::Http { status, .. } if status >= 500 => TaskError::transient(message),
            ProviderError::Http { .. }
            | ProviderError::Unsupported(_)
            | ProviderError::NotConfigured(_) => TaskError::permanent(message),
        }
    }
}

impl From<StorageError> for TaskError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured(_) => TaskError::permanent(err.to_string()),
            _ => TaskError::transient(err.to_string()),
        }
    }
}

pub type TaskOutcome = Result<(), TaskError>;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per task, including the first one
    pub max_attempts: u32,
    pub transient_backoff: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            transient_backoff: Duration::from_secs(5),
            rate_limit_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Exponential delay before attempt `attempt + 1`
    pub fn backoff(&self, kind: RetryKind, attempt: u32) -> Duration {
        let base = match kind {
            RetryKind::Transient => self.transient_backoff,
            RetryKind::RateLimited => self.rate_limit_backoff,
        };
        let exponent = attempt.saturating_sub(1).min(16);
        base.saturating_mul(1u32 << exponent)
    }
}
