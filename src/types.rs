use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One (address, port) pair to probe. Immutable once enqueued; consumed
/// exactly once by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Task {
    pub address: IpAddr,
    pub port: u16,
}

/// Classification of a probed port. Refused, reset and timed-out connects
/// all count as `Closed`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    Open,
    Closed,
}

/// One result row for a discovered open port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub address: String,
    pub port: u16,
    pub service: String,
    pub status: PortStatus,
    pub banner: String,
    pub latency_ms: u64,
    pub timestamp: String,
}

/// Lifecycle of a single scan invocation.
///
/// `Paused` and `Running` are the only cyclic pair; every other transition
/// is one-directional and `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Completed)
    }
}

/// Events published by the engine while a scan runs.
///
/// `Result` fires once per open port, `Progress` once per completed task
/// (open or closed), `Error` on any non-fatal socket fault, and `Completed`
/// exactly once when the scan reaches its terminal state.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Result(ScanResult),
    Progress(u8),
    Error(String),
    Completed,
}

/// Aggregate counters and collected results for a finished scan.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub total: u64,
    pub completed: u64,
    pub open_count: u64,
    pub results: Vec<ScanResult>,
}
