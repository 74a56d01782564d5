use crate::types::ScanResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Monotonic completed-task counter with a denominator fixed at scan start.
pub struct Progress {
    completed: AtomicU64,
    total: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total,
        }
    }

    /// Record one finished task and return the overall percentage,
    /// clamped to 0..=100.
    pub fn increment(&self) -> u8 {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.percent_of(done)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn percent(&self) -> u8 {
        self.percent_of(self.completed())
    }

    fn percent_of(&self, done: u64) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (done.min(self.total) * 100 / self.total) as u8
    }
}

/// Append-only collection of open-port results.
///
/// Insertion order reflects arrival order across workers, not address/port
/// order; no deduplication happens beyond the queue's single-consumption
/// guarantee.
#[derive(Default)]
pub struct ResultSink {
    results: Mutex<Vec<ScanResult>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: ScanResult) {
        self.results.lock().unwrap().push(result);
    }

    pub fn len(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out everything collected so far, in arrival order.
    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.results.lock().unwrap().clone()
    }
}
