//! Failure-normalized wrappers, one per bound NVML entry point.
//!
//! Every wrapper goes through [`NvmlLoader::call`]: absent entry → `Unavailable`
//! with nothing invoked; native success → `Ok(())`; anything else → `Failed`
//! plus a `warn` diagnostic carrying the symbol and the library's own error
//! text. Wrappers never load the library themselves and never retry.
//!
//! Out-parameters are handed to the native function as-is; whatever it writes
//! is what the caller sees.

use std::ffi::{CStr, c_char, c_int, c_uint, c_ulong};

use nvml_shim_core::{AffinityScope, BrandType, CallError, NVML_SUCCESS, NvmlOp, NvmlReturn};

use crate::ffi::{
    FnDeviceClearCpuAffinity, FnDeviceGetBrand, FnDeviceGetCountV2, FnDeviceGetCpuAffinity,
    FnDeviceGetCpuAffinityWithinScope, FnDeviceGetCudaComputeCapability,
    FnDeviceGetHandleByIndex, FnDeviceGetHandleByIndexV2, FnDeviceGetHandleByPciBusId,
    FnDeviceGetIndex, FnDeviceSetCpuAffinity, FnInit, FnShutdown, FnSystemGetDriverVersion,
    NvmlDevice,
};
use crate::loader::NvmlLoader;

/// Result of a wrapper call.
pub type CallResult = Result<(), CallError>;

fn buffer_len(len: usize) -> c_uint {
    c_uint::try_from(len).unwrap_or(c_uint::MAX)
}

impl NvmlLoader {
    /// Invoke-or-fail for one operation.
    ///
    /// # Safety
    ///
    /// `F` must be the function-pointer type of `op`'s native signature, and
    /// `invoke` must uphold that function's argument contract.
    unsafe fn call<F: Copy>(&self, op: NvmlOp, invoke: impl FnOnce(F) -> NvmlReturn) -> CallResult {
        let Some(table) = self.table() else {
            return Err(CallError::Unavailable(op));
        };
        // SAFETY: forwarded from the caller.
        let Some(func) = (unsafe { table.entry::<F>(op) }) else {
            return Err(CallError::Unavailable(op));
        };

        let code = invoke(func);
        if code == NVML_SUCCESS {
            return Ok(());
        }

        let message = table.error_string(code);
        tracing::warn!(symbol = op.symbol(), code, "{}(...) failed: {}", op.symbol(), message);
        Err(CallError::Failed { op, code, message })
    }

    /// Library text for a native status code, or `"unknown error"`.
    #[must_use]
    pub fn error_string(&self, code: NvmlReturn) -> String {
        match self.table() {
            Some(table) => table.error_string(code),
            None => nvml_shim_core::status::UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }

    /// `nvmlInit`.
    pub fn init(&self) -> CallResult {
        // SAFETY: FnInit is Init's signature; no arguments.
        unsafe { self.call(NvmlOp::Init, |f: FnInit| f()) }
    }

    /// `nvmlShutdown`.
    pub fn shutdown(&self) -> CallResult {
        // SAFETY: FnShutdown is Shutdown's signature; no arguments.
        unsafe { self.call(NvmlOp::Shutdown, |f: FnShutdown| f()) }
    }

    /// `nvmlDeviceGetHandleByPciBusId`.
    pub fn device_get_handle_by_pci_bus_id(
        &self,
        pci_bus_id: &CStr,
        device: &mut NvmlDevice,
    ) -> CallResult {
        // SAFETY: NUL-terminated string and a valid out-pointer.
        unsafe {
            self.call(NvmlOp::DeviceGetHandleByPciBusId, |f: FnDeviceGetHandleByPciBusId| {
                f(pci_bus_id.as_ptr(), device)
            })
        }
    }

    /// `nvmlDeviceGetHandleByIndex`.
    pub fn device_get_handle_by_index(&self, index: c_uint, device: &mut NvmlDevice) -> CallResult {
        // SAFETY: valid out-pointer.
        unsafe {
            self.call(NvmlOp::DeviceGetHandleByIndex, |f: FnDeviceGetHandleByIndex| {
                f(index, device)
            })
        }
    }

    /// `nvmlDeviceGetIndex`.
    pub fn device_get_index(&self, device: NvmlDevice, index: &mut c_uint) -> CallResult {
        // SAFETY: valid out-pointer; the handle is validated by the library.
        unsafe { self.call(NvmlOp::DeviceGetIndex, |f: FnDeviceGetIndex| f(device, index)) }
    }

    /// `nvmlDeviceSetCpuAffinity`.
    pub fn device_set_cpu_affinity(&self, device: NvmlDevice) -> CallResult {
        // SAFETY: handle only.
        unsafe { self.call(NvmlOp::DeviceSetCpuAffinity, |f: FnDeviceSetCpuAffinity| f(device)) }
    }

    /// `nvmlDeviceClearCpuAffinity`.
    pub fn device_clear_cpu_affinity(&self, device: NvmlDevice) -> CallResult {
        // SAFETY: handle only.
        unsafe {
            self.call(NvmlOp::DeviceClearCpuAffinity, |f: FnDeviceClearCpuAffinity| f(device))
        }
    }

    /// `nvmlSystemGetDriverVersion`, writing into `version`.
    pub fn system_get_driver_version(&self, version: &mut [c_char]) -> CallResult {
        let len = buffer_len(version.len());
        // SAFETY: pointer and length describe the caller's buffer.
        unsafe {
            self.call(NvmlOp::SystemGetDriverVersion, |f: FnSystemGetDriverVersion| {
                f(version.as_mut_ptr(), len)
            })
        }
    }

    /// `nvmlDeviceGetCpuAffinity`, filling `cpu_set` (one bit per CPU).
    pub fn device_get_cpu_affinity(&self, device: NvmlDevice, cpu_set: &mut [c_ulong]) -> CallResult {
        let len = buffer_len(cpu_set.len());
        // SAFETY: pointer and element count describe the caller's buffer.
        unsafe {
            self.call(NvmlOp::DeviceGetCpuAffinity, |f: FnDeviceGetCpuAffinity| {
                f(device, len, cpu_set.as_mut_ptr())
            })
        }
    }

    /// `nvmlDeviceGetCpuAffinityWithinScope` (CUDA 11 group).
    pub fn device_get_cpu_affinity_within_scope(
        &self,
        device: NvmlDevice,
        node_set: &mut [c_ulong],
        scope: AffinityScope,
    ) -> CallResult {
        let len = buffer_len(node_set.len());
        // SAFETY: pointer and element count describe the caller's buffer.
        unsafe {
            self.call(
                NvmlOp::DeviceGetCpuAffinityWithinScope,
                |f: FnDeviceGetCpuAffinityWithinScope| f(device, len, node_set.as_mut_ptr(), scope),
            )
        }
    }

    /// `nvmlDeviceGetBrand` (CUDA 11 group).
    pub fn device_get_brand(&self, device: NvmlDevice, brand: &mut BrandType) -> CallResult {
        // SAFETY: valid out-pointer.
        unsafe { self.call(NvmlOp::DeviceGetBrand, |f: FnDeviceGetBrand| f(device, brand)) }
    }

    /// `nvmlDeviceGetCount_v2` (CUDA 11 group).
    pub fn device_get_count_v2(&self, count: &mut c_uint) -> CallResult {
        // SAFETY: valid out-pointer.
        unsafe { self.call(NvmlOp::DeviceGetCountV2, |f: FnDeviceGetCountV2| f(count)) }
    }

    /// `nvmlDeviceGetHandleByIndex_v2` (CUDA 11 group).
    pub fn device_get_handle_by_index_v2(
        &self,
        index: c_uint,
        device: &mut NvmlDevice,
    ) -> CallResult {
        // SAFETY: valid out-pointer.
        unsafe {
            self.call(NvmlOp::DeviceGetHandleByIndexV2, |f: FnDeviceGetHandleByIndexV2| {
                f(index, device)
            })
        }
    }

    /// `nvmlDeviceGetCudaComputeCapability` (CUDA 11 group).
    pub fn device_get_cuda_compute_capability(
        &self,
        device: NvmlDevice,
        major: &mut c_int,
        minor: &mut c_int,
    ) -> CallResult {
        // SAFETY: valid out-pointers.
        unsafe {
            self.call(
                NvmlOp::DeviceGetCudaComputeCapability,
                |f: FnDeviceGetCudaComputeCapability| f(device, major, minor),
            )
        }
    }
}
