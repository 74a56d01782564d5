use thiserror::Error;

/// Errors surfaced synchronously when a scan is started.
///
/// Nothing inside a running scan produces a hard error: socket faults are
/// reported as non-fatal events and banner failures are absorbed entirely.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("address list is empty")]
    EmptyAddresses,
    #[error("port list is empty")]
    EmptyPorts,
}
