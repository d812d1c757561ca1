//! # nvml-shim-core
//!
//! Pure-logic half of the NVML binding layer: the closed catalog of bound
//! operations, their capability groups and driver-version gates, native status
//! codes, the error taxonomy, and loader configuration.
//!
//! Nothing here touches the dynamic linker. Actual loading and calling live in
//! the `nvml-shim` crate. No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod ops;
pub mod status;
pub mod version;

pub use config::LoaderConfig;
pub use error::{CallError, LoadError};
pub use ops::{CapabilityGroup, NvmlOp, Requirement};
pub use status::{AffinityScope, BrandType, NVML_SUCCESS, NvmlReturn, ShimStatus, status_name};
pub use version::DriverVersion;
