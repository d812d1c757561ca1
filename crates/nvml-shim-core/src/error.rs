//! Error taxonomy for loading and calling.
//!
//! Load errors are fatal for the loader that produced them and are cached, so
//! they are `Clone`. Call errors are ordinary values the caller may retry,
//! degrade on, or propagate.

use thiserror::Error;

use crate::ops::NvmlOp;
use crate::status::{NvmlReturn, status_name};

/// Unrecoverable failure while opening the library or resolving symbols.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// None of the candidate names could be opened.
    #[error("failed to open {}: {reason}", .candidates.join(", "))]
    LibraryNotFound {
        /// Names tried, in order.
        candidates: Vec<String>,
        /// Loader error from the last attempt.
        reason: String,
    },

    /// The library opened but a symbol that must exist did not resolve.
    #[error("symbol lookup failed on {symbol} - {reason}")]
    SymbolNotFound {
        symbol: &'static str,
        /// Dynamic-linker error string.
        reason: String,
    },
}

impl LoadError {
    /// The symbol that failed to resolve, if this is a symbol error.
    #[must_use]
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Self::SymbolNotFound { symbol, .. } => Some(*symbol),
            Self::LibraryNotFound { .. } => None,
        }
    }
}

/// Failure of a single wrapper call after loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The entry is not in the table: never loaded, or gated out on this
    /// driver. Nothing was invoked.
    #[error("{0}(...) is unavailable")]
    Unavailable(NvmlOp),

    /// The native call ran and reported a non-success status.
    #[error("{op}(...) failed: {message}")]
    Failed {
        op: NvmlOp,
        code: NvmlReturn,
        message: String,
    },
}

impl CallError {
    #[must_use]
    pub fn op(&self) -> NvmlOp {
        match self {
            Self::Unavailable(op) | Self::Failed { op, .. } => *op,
        }
    }

    /// Native status code, when the call actually ran.
    #[must_use]
    pub fn code(&self) -> Option<NvmlReturn> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            Self::Unavailable(_) => None,
        }
    }

    /// `true` for the capability-absent path.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Symbolic name of the native code, e.g. `NVML_ERROR_NOT_SUPPORTED`.
    #[must_use]
    pub fn code_name(&self) -> Option<&'static str> {
        self.code().map(status_name)
    }
}
