//! Library crate for portscan-rs: a concurrent TCP port-scan engine with
//! pause/resume/stop control, plus the input-expansion helpers its CLI uses.
pub mod banner;
pub mod engine;
pub mod error;
pub mod ports;
pub mod progress;
pub mod queue;
pub mod services;
pub mod targets;
pub mod types;
