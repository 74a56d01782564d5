use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

use portscan_rs::engine::{ScanConfig, ScanController};
use portscan_rs::error::ScanError;
use portscan_rs::services::ServiceTable;
use portscan_rs::types::{PortStatus, ScanEvent, ScanState};

fn localhost() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn config(addresses: Vec<IpAddr>, ports: Vec<u16>, timeout_ms: u64, workers: usize) -> ScanConfig {
    ScanConfig {
        addresses,
        ports,
        timeout: Duration::from_millis(timeout_ms),
        workers,
        source_addr: None,
        services: ServiceTable::well_known(),
    }
}

/// Reserve `n` ports that are guaranteed closed by binding ephemeral
/// listeners and dropping them before the scan starts.
async fn closed_ports(n: usize) -> Vec<u16> {
    let mut listeners = Vec::with_capacity(n);
    let mut ports = Vec::with_capacity(n);
    for _ in 0..n {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        ports.push(listener.local_addr().unwrap().port());
        listeners.push(listener);
    }
    drop(listeners);
    ports
}

#[tokio::test]
async fn empty_inputs_are_rejected() {
    let err = ScanController::start(config(vec![], vec![80], 100, 2))
        .err()
        .expect("empty address list must be rejected");
    assert!(matches!(err, ScanError::EmptyAddresses));

    let err = ScanController::start(config(vec![localhost()], vec![], 100, 2))
        .err()
        .expect("empty port list must be rejected");
    assert!(matches!(err, ScanError::EmptyPorts));
}

#[tokio::test]
async fn closed_port_yields_progress_but_no_result() {
    let mut controller =
        ScanController::start(config(vec![localhost()], vec![1], 200, 1)).unwrap();
    let mut events = controller.take_events().unwrap();

    let (mut progress, mut results, mut completions) = (0u32, 0u32, 0u32);
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Progress(percent) => {
                progress += 1;
                assert_eq!(percent, 100);
            }
            ScanEvent::Result(_) => results += 1,
            ScanEvent::Error(_) => {}
            ScanEvent::Completed => {
                completions += 1;
                break;
            }
        }
    }
    assert_eq!(progress, 1);
    assert_eq!(results, 0);
    assert_eq!(completions, 1);

    let report = controller.wait().await;
    assert_eq!(report.total, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.open_count, 0);
}

#[tokio::test]
async fn open_silent_listener_reports_no_banner() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        // accept probe and banner connections, answer neither
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                sleep(Duration::from_secs(2)).await;
                drop(stream);
            });
        }
    });

    let mut controller =
        ScanController::start(config(vec![localhost()], vec![port], 200, 1)).unwrap();
    let mut events = controller.take_events().unwrap();

    let mut open = None;
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Result(result) => open = Some(result),
            ScanEvent::Completed => break,
            _ => {}
        }
    }

    let result = open.expect("listener port should be reported open");
    assert_eq!(result.status, PortStatus::Open);
    assert_eq!(result.port, port);
    assert_eq!(result.banner, "No banner");

    let report = controller.wait().await;
    assert_eq!(report.open_count, 1);
}

#[tokio::test]
async fn greeting_listener_banner_is_captured_and_service_resolved() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let _ = stream.write_all(b"220 test-ftpd ready\r\n").await;
        }
    });

    let mut controller =
        ScanController::start(config(vec![localhost()], vec![port], 500, 1)).unwrap();
    let mut events = controller.take_events().unwrap();

    let mut open = None;
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Result(result) => open = Some(result),
            ScanEvent::Completed => break,
            _ => {}
        }
    }

    let result = open.expect("listener port should be reported open");
    assert!(result.banner.starts_with("220 test-ftpd ready"), "got {:?}", result.banner);
    assert!(result.banner.chars().count() <= 100);
    // ephemeral port is not in the well-known table
    assert_eq!(result.service, "Unknown");
    controller.wait().await;
}

#[tokio::test]
async fn sweep_counts_every_task_exactly_once() {
    let ports = closed_ports(100).await;
    let mut controller = ScanController::start(config(vec![localhost()], ports, 200, 4)).unwrap();
    let mut events = controller.take_events().unwrap();

    let (mut progress, mut results, mut completions) = (0u32, 0u32, 0u32);
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Progress(_) => progress += 1,
            ScanEvent::Result(_) => results += 1,
            ScanEvent::Error(_) => {}
            ScanEvent::Completed => {
                completions += 1;
                break;
            }
        }
    }
    assert_eq!(progress, 100);
    assert_eq!(results, 0);
    assert_eq!(completions, 1);

    let report = controller.wait().await;
    assert_eq!(report.total, 100);
    assert_eq!(report.completed, 100);
    assert_eq!(report.open_count, 0);
}

/// Pull events until the channel has been quiet for `window`.
async fn drain_until_quiet(events: &mut UnboundedReceiver<ScanEvent>, window: Duration) -> u32 {
    let mut drained = 0;
    while let Ok(Some(_)) = timeout(window, events.recv()).await {
        drained += 1;
    }
    drained
}

#[tokio::test]
async fn pause_halts_progress_and_resume_continues() {
    let ports = closed_ports(400).await;
    let total = ports.len() as u64;
    let mut controller = ScanController::start(config(vec![localhost()], ports, 200, 2)).unwrap();
    let mut events = controller.take_events().unwrap();

    // Workers have not been polled yet, so the pause lands before any
    // task can be claimed beyond the in-flight ones.
    assert!(controller.pause());
    assert_eq!(controller.state(), ScanState::Paused);

    // Let claimed in-flight probes finish, then require silence.
    let during_pause = drain_until_quiet(&mut events, Duration::from_millis(100)).await;
    let quiet = timeout(Duration::from_millis(300), events.recv()).await;
    assert!(quiet.is_err(), "events arrived while paused");

    assert!(controller.resume());
    let mut after_resume = 0u32;
    let mut completions = 0u32;
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Completed => {
                completions += 1;
                break;
            }
            ScanEvent::Progress(_) => after_resume += 1,
            _ => {}
        }
    }
    assert_eq!(completions, 1);

    let report = controller.wait().await;
    assert_eq!(report.completed, total, "every task still runs exactly once");
    // nothing was double-processed: pause-window events plus post-resume
    // events account for the whole task set
    assert!(u64::from(during_pause + after_resume) <= total + 1);
}

#[tokio::test]
async fn control_transitions_follow_state_machine() {
    let ports = closed_ports(200).await;
    let controller = ScanController::start(config(vec![localhost()], ports, 200, 1)).unwrap();

    assert_eq!(controller.state(), ScanState::Running);
    assert!(!controller.resume(), "resume is only valid from Paused");
    assert!(controller.pause());
    assert_eq!(controller.state(), ScanState::Paused);
    assert!(!controller.pause(), "pause is only valid from Running");
    assert!(controller.resume());
    assert_eq!(controller.state(), ScanState::Running);

    assert!(controller.stop());
    assert_eq!(controller.state(), ScanState::Stopping);
    assert!(!controller.stop(), "stop is idempotent");
    assert!(!controller.pause(), "Stopping cannot be paused");

    let handle = controller.handle();
    let report = controller.wait().await;
    assert_eq!(handle.state(), ScanState::Completed);
    assert!(handle.state().is_terminal());
    assert!(!handle.stop(), "terminal state rejects stop");
    assert!(report.completed <= report.total);
}

#[tokio::test]
async fn stop_reaches_terminal_state_within_timeout_bound() {
    let addresses = vec![localhost()];
    let ports: Vec<u16> = (1..=20000).collect();
    let mut controller = ScanController::start(config(addresses, ports, 300, 2)).unwrap();
    let handle = controller.handle();
    let mut events = controller.take_events().unwrap();

    // wait for the scan to make some progress, then cut it short
    let mut seen = 0;
    while seen < 3 {
        match events.recv().await {
            Some(ScanEvent::Progress(_)) => seen += 1,
            Some(_) => {}
            None => panic!("event stream ended prematurely"),
        }
    }
    assert!(handle.stop());

    // terminal within one socket timeout plus scheduling slack
    let report = timeout(Duration::from_secs(2), controller.wait())
        .await
        .expect("scan did not reach a terminal state in time");
    assert_eq!(handle.state(), ScanState::Completed);
    assert!(report.completed < report.total, "stop should leave tasks unclaimed");

    // after the terminal state: the tail of the stream holds exactly one
    // Completed and nothing after it
    let mut tail = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(200), events.recv()).await {
        tail.push(event);
    }
    let completions = tail
        .iter()
        .filter(|e| matches!(e, ScanEvent::Completed))
        .count();
    assert_eq!(completions, 1);
    assert!(matches!(tail.last(), Some(ScanEvent::Completed)));
}
