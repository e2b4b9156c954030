use super::task::{ChunkTask, Priority};
use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::Notify;

/// Shared priority queue feeding the worker pool.
///
/// Tasks pop in `Priority` order; equal priorities pop in insertion order.
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<Reverse<QueuedTask>>>,
    notify: Notify,
    sequence: AtomicU64,
}

struct QueuedTask {
    priority: Priority,
    sequence: u64,
    task: ChunkTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn push(&self, task: ChunkTask) {
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().push(Reverse(QueuedTask {
            priority: task.priority,
            sequence,
            task,
        }));
        self.notify.notify_one();
    }

    /// Wait until a task is available and take the highest-priority one
    pub async fn pop(&self) -> ChunkTask {
        loop {
            if let Some(task) = self.try_pop() {
                return task;
            }
            self.notify.notified().await;
        }
    }

    pub fn try_pop(&self) -> Option<ChunkTask> {
        self.heap.lock().pop().map(|Reverse(queued)| queued.task)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}
