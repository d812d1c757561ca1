//! Harness error type.

use nvml_shim::{CallError, LoadError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("NVML load failed: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Process exit code for the CLI.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Load(_) => 2,
            Self::Call(_) => 3,
            Self::Io(_) | Self::Json(_) => 1,
        }
    }
}
