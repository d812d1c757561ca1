//! Driver-version probes that gate optional symbol groups.
//!
//! The probe is independent of the NVML library: it must answer before the
//! symbol table exists. The default asks the CUDA driver directly through
//! `cuDriverGetVersion`.

use std::ffi::c_int;

use nvml_shim_core::DriverVersion;

use crate::ffi::{CUDA_SUCCESS, FnCuDriverGetVersion};

/// Reports the installed driver version, or `None` when it cannot be queried.
pub trait DriverVersionProbe: Send + Sync {
    fn driver_version(&self) -> Option<DriverVersion>;
}

/// A probe that always reports the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDriverVersion(pub Option<DriverVersion>);

impl DriverVersionProbe for FixedDriverVersion {
    fn driver_version(&self) -> Option<DriverVersion> {
        self.0
    }
}

/// Queries `cuDriverGetVersion` from the first CUDA driver library that opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudaDriverProbe {
    candidates: Vec<String>,
}

impl CudaDriverProbe {
    #[must_use]
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    fn query(lib_name: &str) -> Option<DriverVersion> {
        tracing::debug!(library = lib_name, "querying CUDA driver version");

        // SAFETY: the CUDA driver exports `cuDriverGetVersion` with exactly
        // the `FnCuDriverGetVersion` signature; the out-parameter is a local.
        unsafe {
            let lib = match libloading::Library::new(lib_name) {
                Ok(lib) => lib,
                Err(err) => {
                    tracing::debug!(library = lib_name, error = %err, "driver library unavailable");
                    return None;
                }
            };
            let get_version: FnCuDriverGetVersion =
                match lib.get::<FnCuDriverGetVersion>(b"cuDriverGetVersion\0") {
                    Ok(sym) => *sym,
                    Err(err) => {
                        tracing::warn!(library = lib_name, error = %err, "cuDriverGetVersion missing");
                        return None;
                    }
                };

            let mut raw: c_int = 0;
            let status = get_version(&mut raw);
            // Keep the driver resident; unloading it mid-process is unsupported.
            std::mem::forget(lib);

            if status != CUDA_SUCCESS {
                tracing::warn!(library = lib_name, status, "cuDriverGetVersion failed");
                return None;
            }
            Some(DriverVersion::from_raw(raw))
        }
    }
}

impl DriverVersionProbe for CudaDriverProbe {
    fn driver_version(&self) -> Option<DriverVersion> {
        self.candidates.iter().find_map(|name| Self::query(name))
    }
}
