//! Tracing initialization for the probe binary.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the `EnvFilter` directives.
pub const LOG_ENV: &str = "NVML_SHIM_LOG";

/// Filter used when `NVML_SHIM_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "nvml_shim=info";

static INIT: Once = Once::new();

/// Install a stderr `fmt` subscriber filtered by `NVML_SHIM_LOG`.
///
/// Format: `NVML_SHIM_LOG=nvml_shim=debug,nvml_shim_harness=info`.
/// Idempotent; a subscriber installed elsewhere first is left in place.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(filter)
            .try_init();
    });
}
