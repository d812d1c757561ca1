//! Native NVML handle and function-pointer types.
//!
//! Signatures mirror `nvml.h`. The symbol table stores untyped addresses; each
//! wrapper in [`crate::shim`] reinterprets its entry as exactly one of the
//! aliases below.

use std::ffi::{c_char, c_int, c_uint, c_ulong, c_void};

use nvml_shim_core::{AffinityScope, BrandType, NvmlReturn};

/// `nvmlDevice_t`: opaque device handle owned by the library.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NvmlDevice(*mut c_void);

// SAFETY: device handles are opaque tokens the library accepts from any thread.
unsafe impl Send for NvmlDevice {}
// SAFETY: see above; the handle is never dereferenced on the Rust side.
unsafe impl Sync for NvmlDevice {}

impl NvmlDevice {
    /// Unset handle, as passed into an out-parameter before the call.
    #[must_use]
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    #[must_use]
    pub const fn from_raw(raw: *mut c_void) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> *mut c_void {
        self.0
    }

    #[must_use]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for NvmlDevice {
    fn default() -> Self {
        Self::null()
    }
}

pub type FnInit = unsafe extern "C" fn() -> NvmlReturn;
pub type FnShutdown = unsafe extern "C" fn() -> NvmlReturn;
pub type FnDeviceGetHandleByPciBusId =
    unsafe extern "C" fn(pci_bus_id: *const c_char, device: *mut NvmlDevice) -> NvmlReturn;
pub type FnDeviceGetHandleByIndex =
    unsafe extern "C" fn(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn;
pub type FnDeviceGetIndex =
    unsafe extern "C" fn(device: NvmlDevice, index: *mut c_uint) -> NvmlReturn;
pub type FnDeviceSetCpuAffinity = unsafe extern "C" fn(device: NvmlDevice) -> NvmlReturn;
pub type FnDeviceClearCpuAffinity = unsafe extern "C" fn(device: NvmlDevice) -> NvmlReturn;
pub type FnSystemGetDriverVersion =
    unsafe extern "C" fn(version: *mut c_char, length: c_uint) -> NvmlReturn;
pub type FnDeviceGetCpuAffinity = unsafe extern "C" fn(
    device: NvmlDevice,
    cpu_set_size: c_uint,
    cpu_set: *mut c_ulong,
) -> NvmlReturn;
pub type FnErrorString = unsafe extern "C" fn(result: NvmlReturn) -> *const c_char;
pub type FnDeviceGetCpuAffinityWithinScope = unsafe extern "C" fn(
    device: NvmlDevice,
    node_set_size: c_uint,
    node_set: *mut c_ulong,
    scope: AffinityScope,
) -> NvmlReturn;
pub type FnDeviceGetBrand =
    unsafe extern "C" fn(device: NvmlDevice, brand: *mut BrandType) -> NvmlReturn;
pub type FnDeviceGetCountV2 = unsafe extern "C" fn(device_count: *mut c_uint) -> NvmlReturn;
pub type FnDeviceGetHandleByIndexV2 =
    unsafe extern "C" fn(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn;
pub type FnDeviceGetCudaComputeCapability =
    unsafe extern "C" fn(device: NvmlDevice, major: *mut c_int, minor: *mut c_int) -> NvmlReturn;

/// `CUresult cuDriverGetVersion(int *driverVersion)`, used only by the version probe.
pub type FnCuDriverGetVersion = unsafe extern "C" fn(driver_version: *mut c_int) -> c_int;

/// `CUDA_SUCCESS`.
pub const CUDA_SUCCESS: c_int = 0;
