//! # nvml-shim
//!
//! Runtime-resolved bindings to NVIDIA's management library.
//!
//! `libnvidia-ml` is optional at build and run time. [`NvmlLoader`] opens it
//! on demand, resolves a fixed set of entry points into a [`SymbolTable`] in a
//! single pass, and exposes each entry point as a wrapper that returns
//! `Result<(), CallError>` with out-parameters carrying the data.
//!
//! # Architecture
//!
//! ```text
//! caller -> NvmlLoader::ensure_loaded()  (once: open -> resolve required -> gate -> resolve gated)
//! caller -> NvmlLoader::<wrapper>(...)   (table lookup -> native call -> status mapping)
//! ```
//!
//! Optional entry points belong to capability groups gated on the installed
//! CUDA driver version. A group whose gate fails is recorded as absent and its
//! wrappers return [`CallError::Unavailable`] without calling anything.
//!
//! ```rust,ignore
//! let nvml = nvml_shim::global();
//! nvml.ensure_loaded()?;
//! nvml.init()?;
//! if nvml.has_extended_capability_set() {
//!     let mut count = 0;
//!     nvml.device_get_count_v2(&mut count)?;
//! }
//! ```

pub mod ffi;
pub mod loader;
pub mod probe;
pub mod shim;
pub mod source;
pub mod table;

pub use ffi::NvmlDevice;
pub use loader::{NvmlLoader, global};
pub use probe::{CudaDriverProbe, DriverVersionProbe, FixedDriverVersion};
pub use shim::CallResult;
pub use source::{DynamicLibrary, DynamicLibraryOpener, LibraryOpener, SymbolSource};
pub use table::{GateOutcome, SymbolTable};

pub use nvml_shim_core::status;
pub use nvml_shim_core::{
    AffinityScope, BrandType, CallError, CapabilityGroup, DriverVersion, LoadError, LoaderConfig,
    NvmlOp, NvmlReturn, Requirement, ShimStatus,
};
