//! Probe tooling for nvml-shim.
//!
//! This crate provides:
//! - Availability reports: which NVML entry points resolved and why gated
//!   groups were enabled or not
//! - Device inventory: a short walk over the visible GPUs through the shim
//! - Structured logs: JSONL records of probe runs
//! - Tracing setup for the `nvml-probe` binary

#![forbid(unsafe_code)]

pub mod devices;
pub mod error;
pub mod logging;
pub mod report;
pub mod structured_log;

pub use devices::{DeviceInfo, DeviceInventory};
pub use error::HarnessError;
pub use report::ProbeReport;
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
