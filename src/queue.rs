use crate::types::Task;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;

/// Thread-safe FIFO of pending probe tasks, shared by all scan workers.
///
/// The producer fully populates the queue before any worker starts
/// consuming, so the task count is a stable denominator for progress
/// reporting. `dequeue` never blocks; an empty queue is the signal for a
/// worker to exit its loop.
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Build the cartesian product of addresses and ports, in input order.
    pub fn build(addresses: &[IpAddr], ports: &[u16]) -> Self {
        let queue = Self::new();
        for &address in addresses {
            for &port in ports {
                queue.enqueue(Task { address, port });
            }
        }
        queue
    }

    pub fn enqueue(&self, task: Task) {
        self.inner.lock().unwrap().push_back(task);
    }

    /// Remove and return the oldest task, or `None` once drained.
    pub fn dequeue(&self) -> Option<Task> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
