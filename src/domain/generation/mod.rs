pub mod executor;
pub mod queue;
pub mod settings;
pub mod task;
pub mod worker;

pub use executor::ChunkExecutor;
pub use queue::TaskQueue;
pub use settings::{stale_cutoff, GenerationSettings};
pub use task::{ChunkTarget, ChunkTask, Priority, RetryKind, RetryPolicy, TaskError, TaskOutcome};
pub use worker::WorkerPool;
