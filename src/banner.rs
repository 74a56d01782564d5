use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

/// Generic probe payload; enough to elicit a response from HTTP servers and
/// harmless noise to most text protocols that greet on connect.
const PROBE: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";

const READ_LIMIT: usize = 1024;

/// Banners are trimmed to this many characters before being surfaced.
pub const MAX_BANNER_CHARS: usize = 100;

const NO_BANNER: &str = "No banner";

/// Best-effort banner grab against a port already proven open.
///
/// Opens a fresh short-lived connection, sends the generic probe and reads
/// whatever the service answers with, lossily decoded and trimmed. Every
/// failure mode (connect timeout, write failure, read timeout, empty read)
/// collapses to `"No banner"`; this function never fails.
pub async fn grab(addr: SocketAddr, timeout: Duration) -> String {
    match try_grab(addr, timeout).await {
        Some(banner) if !banner.is_empty() => banner,
        _ => NO_BANNER.to_string(),
    }
}

async fn try_grab(addr: SocketAddr, timeout: Duration) -> Option<String> {
    let mut stream = time::timeout(timeout, TcpStream::connect(addr))
        .await
        .ok()?
        .ok()?;
    time::timeout(timeout, stream.write_all(PROBE))
        .await
        .ok()?
        .ok()?;

    let mut buf = vec![0u8; READ_LIMIT];
    let n = time::timeout(timeout, stream.read(&mut buf))
        .await
        .ok()?
        .ok()?;
    if n == 0 {
        return None;
    }
    buf.truncate(n);

    let text = String::from_utf8_lossy(&buf).trim().to_string();
    Some(text.chars().take(MAX_BANNER_CHARS).collect())
}
