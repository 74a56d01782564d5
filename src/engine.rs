//! The concurrent scan engine: controller, worker pool and probe loop.
//!
//! One [`ScanController`] owns one scan invocation. It builds the task
//! queue, spawns a fixed pool of workers, and mediates the
//! pause/resume/stop protocol. Pools, queue and state are created per
//! invocation and never reused, so no task or event can leak into a later
//! scan.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use ::time::{format_description::well_known, OffsetDateTime};

use crate::banner;
use crate::error::ScanError;
use crate::progress::{Progress, ResultSink};
use crate::queue::TaskQueue;
use crate::services::ServiceTable;
use crate::types::{PortStatus, ScanEvent, ScanReport, ScanResult, ScanState, Task};

const MAX_WORKERS: usize = 1024;

/// Inputs for one scan invocation.
///
/// Address and port lists are expected to be pre-validated and fully
/// expanded by the caller; the engine only rejects empty lists.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub addresses: Vec<IpAddr>,
    pub ports: Vec<u16>,
    /// Per-socket-operation timeout; there is no global scan deadline.
    pub timeout: Duration,
    pub workers: usize,
    /// Optional local address to bind outbound probe sockets to.
    pub source_addr: Option<IpAddr>,
    pub services: ServiceTable,
}

struct Shared {
    queue: TaskQueue,
    state: Mutex<ScanState>,
    cancel: CancellationToken,
    pause_tx: watch::Sender<bool>,
    events: mpsc::UnboundedSender<ScanEvent>,
    progress: Progress,
    sink: ResultSink,
    services: ServiceTable,
    timeout: Duration,
    source_addr: Option<IpAddr>,
}

impl Shared {
    fn state(&self) -> ScanState {
        *self.state.lock().unwrap()
    }

    fn pause(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != ScanState::Running {
            return false;
        }
        *state = ScanState::Paused;
        drop(state);
        let _ = self.pause_tx.send(true);
        debug!("scan paused");
        true
    }

    fn resume(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != ScanState::Paused {
            return false;
        }
        *state = ScanState::Running;
        drop(state);
        let _ = self.pause_tx.send(false);
        debug!("scan resumed");
        true
    }

    fn stop(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, ScanState::Stopping | ScanState::Completed) {
            return false;
        }
        *state = ScanState::Stopping;
        drop(state);
        self.cancel.cancel();
        debug!("scan stopping");
        true
    }
}

/// Cloneable control surface over a running scan, for consumers that need
/// to drive pause/resume/stop while another owner awaits completion.
#[derive(Clone)]
pub struct ScanHandle {
    shared: Arc<Shared>,
}

impl ScanHandle {
    pub fn state(&self) -> ScanState {
        self.shared.state()
    }

    pub fn pause(&self) -> bool {
        self.shared.pause()
    }

    pub fn resume(&self) -> bool {
        self.shared.resume()
    }

    pub fn stop(&self) -> bool {
        self.shared.stop()
    }
}

/// Owns the shared state and worker pool for a single scan invocation.
pub struct ScanController {
    shared: Arc<Shared>,
    events: Option<mpsc::UnboundedReceiver<ScanEvent>>,
    supervisor: JoinHandle<ScanReport>,
}

impl ScanController {
    /// Validate input, populate the task queue and launch the worker pool.
    ///
    /// Fails before any worker is spawned if either input list is empty.
    /// Must be called from within a tokio runtime.
    pub fn start(config: ScanConfig) -> Result<Self, ScanError> {
        if config.addresses.is_empty() {
            return Err(ScanError::EmptyAddresses);
        }
        if config.ports.is_empty() {
            return Err(ScanError::EmptyPorts);
        }

        let total = config.addresses.len() as u64 * config.ports.len() as u64;
        let workers = config.workers.clamp(1, MAX_WORKERS);
        let queue = TaskQueue::build(&config.addresses, &config.ports);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (pause_tx, _) = watch::channel(false);

        info!(
            "starting scan: addresses={} ports={} tasks={} workers={} timeout={}ms",
            config.addresses.len(),
            config.ports.len(),
            total,
            workers,
            config.timeout.as_millis()
        );

        let shared = Arc::new(Shared {
            queue,
            state: Mutex::new(ScanState::Idle),
            cancel: CancellationToken::new(),
            pause_tx,
            events: event_tx,
            progress: Progress::new(total),
            sink: ResultSink::new(),
            services: config.services,
            timeout: config.timeout,
            source_addr: config.source_addr,
        });

        *shared.state.lock().unwrap() = ScanState::Running;

        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(worker_loop(id, shared.clone()));
        }
        let supervisor = tokio::spawn(supervise(shared.clone(), pool));

        Ok(Self {
            shared,
            events: Some(event_rx),
            supervisor,
        })
    }

    /// Take the event stream. Each event is delivered exactly once;
    /// callable once per scan.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ScanEvent>> {
        self.events.take()
    }

    /// A cloneable handle sharing this scan's control state.
    pub fn handle(&self) -> ScanHandle {
        ScanHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.shared.state()
    }

    /// Halt task consumption without discarding the queue. Already-claimed
    /// in-flight probes run to completion under their timeout.
    /// No effect (returns false) unless the scan is Running.
    pub fn pause(&self) -> bool {
        self.shared.pause()
    }

    /// Return a paused scan to Running. No effect unless Paused.
    pub fn resume(&self) -> bool {
        self.shared.resume()
    }

    /// Request cooperative shutdown from any non-terminal state. Workers
    /// finish (never abandon) their current in-flight probe, so shutdown
    /// latency is bounded by one timeout period per in-flight task.
    pub fn stop(&self) -> bool {
        self.shared.stop()
    }

    /// Wait for every worker to exit and return the final report.
    pub async fn wait(self) -> ScanReport {
        self.supervisor.await.expect("scan supervisor panicked")
    }
}

/// Joins the whole pool, then flips the state to Completed and fires the
/// completion event exactly once.
async fn supervise(shared: Arc<Shared>, mut pool: JoinSet<()>) -> ScanReport {
    while pool.join_next().await.is_some() {}

    *shared.state.lock().unwrap() = ScanState::Completed;
    let _ = shared.events.send(ScanEvent::Completed);

    let report = ScanReport {
        total: shared.progress.total(),
        completed: shared.progress.completed(),
        open_count: shared.sink.len() as u64,
        results: shared.sink.snapshot(),
    };
    info!(
        "scan completed: {}/{} tasks, {} open",
        report.completed, report.total, report.open_count
    );
    report
}

/// One concurrency slot: pull a task, probe it, emit events, repeat until
/// the queue is drained or a stop is observed.
async fn worker_loop(id: usize, shared: Arc<Shared>) {
    let mut paused = shared.pause_tx.subscribe();
    debug!("worker {id} started");

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        // Park while paused without consuming from the queue. A stop
        // request wins over the pause gate.
        if *paused.borrow_and_update() {
            tokio::select! {
                _ = shared.cancel.cancelled() => break,
                _ = paused.changed() => continue,
            }
        }

        let Some(task) = shared.queue.dequeue() else {
            break;
        };
        probe(&shared, task).await;
    }

    debug!("worker {id} exiting");
}

enum ConnectOutcome {
    Open(TcpStream),
    Closed,
    Fault(std::io::Error),
}

/// Probe one task and emit its events. Socket faults never escape: they
/// become error events and the task still counts as complete. No retries.
async fn probe(shared: &Shared, task: Task) {
    let addr = SocketAddr::new(task.address, task.port);
    let started = Instant::now();

    match connect(addr, shared.source_addr, shared.timeout).await {
        ConnectOutcome::Open(stream) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            // The probe socket is closed before the banner connection opens.
            drop(stream);
            let grabbed = banner::grab(addr, shared.timeout).await;
            let result = ScanResult {
                address: task.address.to_string(),
                port: task.port,
                service: shared.services.lookup(task.port).to_string(),
                status: PortStatus::Open,
                banner: grabbed,
                latency_ms,
                timestamp: rfc3339_now(),
            };
            debug!(
                "open: {}:{} service={} latency={}ms",
                result.address, result.port, result.service, result.latency_ms
            );
            shared.sink.push(result.clone());
            let _ = shared.events.send(ScanEvent::Result(result));
        }
        ConnectOutcome::Closed => {}
        ConnectOutcome::Fault(err) => {
            warn!("probe fault: {addr}: {err}");
            let _ = shared.events.send(ScanEvent::Error(format!("{addr}: {err}")));
        }
    }

    let percent = shared.progress.increment();
    let _ = shared.events.send(ScanEvent::Progress(percent));
}

/// Classify a TCP connect attempt. Refused, reset and timed-out connects
/// are ordinary Closed outcomes; anything else is a reportable fault.
async fn connect(
    addr: SocketAddr,
    source: Option<IpAddr>,
    timeout: Duration,
) -> ConnectOutcome {
    match time::timeout(timeout, connect_from(addr, source)).await {
        Err(_) => ConnectOutcome::Closed,
        Ok(Ok(stream)) => ConnectOutcome::Open(stream),
        Ok(Err(err)) => match err.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => ConnectOutcome::Closed,
            _ => ConnectOutcome::Fault(err),
        },
    }
}

async fn connect_from(addr: SocketAddr, source: Option<IpAddr>) -> std::io::Result<TcpStream> {
    match source {
        None => TcpStream::connect(addr).await,
        Some(local) => {
            let socket = match local {
                IpAddr::V4(_) => TcpSocket::new_v4()?,
                IpAddr::V6(_) => TcpSocket::new_v6()?,
            };
            socket.bind(SocketAddr::new(local, 0))?;
            socket.connect(addr).await
        }
    }
}

fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
