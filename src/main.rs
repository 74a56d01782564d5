use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};

use portscan_rs::engine::{ScanConfig, ScanController};
use portscan_rs::ports::parse_ports;
use portscan_rs::services::{profile_ports, ServiceTable, PROFILE_NAMES};
use portscan_rs::targets::{parse_targets, resolve_source};
use portscan_rs::types::{ScanEvent, ScanReport};

/// portscan-rs — concurrent TCP connect scanner with pause/resume control and banner grabbing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portscan-rs",
    version,
    about = "Concurrent TCP connect scanner with pause/resume control and banner grabbing.",
    long_about = None
)]
struct Cli {
    /// Target IPv4 address or CIDR block (e.g., 192.168.1.0/24).
    #[arg(long)]
    targets: String,

    /// Port specification (e.g., 1-1024 or 80,443,22).
    #[arg(long, default_value = "1-1024")]
    ports: String,

    /// Named port preset overriding --ports (common, web, database, full, quick).
    #[arg(long)]
    profile: Option<String>,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Number of parallel scan workers.
    #[arg(long, default_value_t = 10)]
    workers: usize,

    /// Bind outbound probes to this local interface name or address.
    #[arg(long)]
    interface: Option<String>,

    /// Write the final report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let addresses = parse_targets(&cli.targets)?;
    let ports = match cli.profile.as_deref() {
        Some(name) => profile_ports(&name.to_lowercase()).with_context(|| {
            format!(
                "unknown profile {name} (expected one of: {})",
                PROFILE_NAMES.join(", ")
            )
        })?,
        None => parse_ports(&cli.ports)?,
    };
    let source_addr = match cli.interface.as_deref() {
        Some(spec) => Some(resolve_source(spec)?),
        None => None,
    };

    let total = addresses.len() as u64 * ports.len() as u64;
    println!(
        "Scanning {} address(es) x {} port(s) = {} probes with {} workers...",
        addresses.len(),
        ports.len(),
        total,
        cli.workers
    );

    let mut controller = ScanController::start(ScanConfig {
        addresses,
        ports,
        timeout: Duration::from_millis(cli.timeout_ms),
        workers: cli.workers,
        source_addr,
        services: ServiceTable::well_known(),
    })?;

    // Ctrl-C requests a cooperative stop; in-flight probes finish first.
    let handle = controller.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping scan...");
            handle.stop();
        }
    });

    let mut events = controller
        .take_events()
        .expect("fresh controller has an event stream");

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?,
    );

    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Progress(percent) => bar.set_position(u64::from(percent)),
            ScanEvent::Result(result) => bar.println(format!(
                "open  {}:{}  {}  {}",
                result.address, result.port, result.service, result.banner
            )),
            ScanEvent::Error(message) => bar.println(format!("error: {message}")),
            ScanEvent::Completed => break,
        }
    }
    bar.finish_and_clear();

    let report = controller.wait().await;
    print_report_table(&report);

    if let Some(path) = cli.output.as_deref() {
        write_report_json(path, &report)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        println!("Wrote JSON report to {}", path.display());
    }

    Ok(())
}

fn print_report_table(report: &ScanReport) {
    let mut addr_w = "address".len();
    let mut svc_w = "service".len();
    let mut banner_w = "banner".len();
    for r in &report.results {
        addr_w = addr_w.max(r.address.len());
        svc_w = svc_w.max(r.service.len());
        banner_w = banner_w.max(r.banner.chars().count().min(60));
    }
    let port_w = "port".len().max(5);

    println!(
        "\nOpen ports: {} (completed {}/{} tasks)",
        report.open_count, report.completed, report.total
    );
    println!(
        "{:<addr_w$}  {:>port_w$}  {:<svc_w$}  {:<banner_w$}",
        "address",
        "port",
        "service",
        "banner",
        addr_w = addr_w,
        port_w = port_w,
        svc_w = svc_w,
        banner_w = banner_w
    );
    println!(
        "{:-<addr_w$}  {:-<port_w$}  {:-<svc_w$}  {:-<banner_w$}",
        "",
        "",
        "",
        "",
        addr_w = addr_w,
        port_w = port_w,
        svc_w = svc_w,
        banner_w = banner_w
    );
    for r in &report.results {
        let snippet: String = r.banner.chars().take(60).collect();
        println!(
            "{:<addr_w$}  {:>port_w$}  {:<svc_w$}  {:<banner_w$}",
            r.address,
            r.port,
            r.service,
            snippet,
            addr_w = addr_w,
            port_w = port_w,
            svc_w = svc_w,
            banner_w = banner_w
        );
    }
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
