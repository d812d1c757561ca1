//! `extern "C"` stand-ins for the NVML entry points the harness drives.
//!
//! The visible device count and injected failures are process-wide, so tests
//! that call through the stubs hold the guard from `lock_and_reset`.

#![allow(dead_code)]

use std::ffi::{CStr, c_char, c_int, c_uint, c_ulong, c_void};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use nvml_shim::ffi::{
    FnDeviceClearCpuAffinity, FnDeviceGetBrand, FnDeviceGetCountV2, FnDeviceGetCpuAffinity,
    FnDeviceGetCpuAffinityWithinScope, FnDeviceGetCudaComputeCapability,
    FnDeviceGetHandleByIndex, FnDeviceGetHandleByIndexV2, FnDeviceGetHandleByPciBusId,
    FnDeviceGetIndex, FnDeviceSetCpuAffinity, FnErrorString, FnInit, FnShutdown,
    FnSystemGetDriverVersion,
};
use nvml_shim::status::{
    NVML_ERROR_DRIVER_NOT_LOADED, NVML_ERROR_GPU_IS_LOST, NVML_ERROR_INSUFFICIENT_SIZE,
    NVML_ERROR_INVALID_ARGUMENT, NVML_ERROR_NOT_FOUND, NVML_SUCCESS,
};
use nvml_shim::{
    AffinityScope, BrandType, DriverVersion, FixedDriverVersion, LibraryOpener, LoaderConfig,
    NvmlDevice, NvmlLoader, NvmlOp, NvmlReturn, SymbolSource,
};

pub const LIB: &str = "libnvidia-ml.so.1";
pub const STUB_DRIVER_VERSION: &[u8] = b"535.104.05\0";

const HANDLE_BASE: usize = 0x1000;
const NO_INDEX: u32 = u32::MAX;

pub static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static SHUTDOWN_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static HANDLE_BY_INDEX_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static HANDLE_BY_INDEX_V2_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static COUNT_V2_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static BRAND_CALLS: AtomicUsize = AtomicUsize::new(0);

static DEVICE_COUNT: AtomicU32 = AtomicU32::new(2);
static LOST_INDEX: AtomicU32 = AtomicU32::new(NO_INDEX);
static INIT_RESULT: AtomicI32 = AtomicI32::new(NVML_SUCCESS);

static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serialize stub users and restore the default two-device host.
pub fn lock_and_reset() -> MutexGuard<'static, ()> {
    let guard = TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for counter in [
        &INIT_CALLS,
        &SHUTDOWN_CALLS,
        &HANDLE_BY_INDEX_CALLS,
        &HANDLE_BY_INDEX_V2_CALLS,
        &COUNT_V2_CALLS,
        &BRAND_CALLS,
    ] {
        counter.store(0, Ordering::SeqCst);
    }
    DEVICE_COUNT.store(2, Ordering::SeqCst);
    LOST_INDEX.store(NO_INDEX, Ordering::SeqCst);
    INIT_RESULT.store(NVML_SUCCESS, Ordering::SeqCst);
    guard
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn set_device_count(count: u32) {
    DEVICE_COUNT.store(count, Ordering::SeqCst);
}

/// Make handle lookups for `index` report `NVML_ERROR_GPU_IS_LOST`.
pub fn lose_device(index: u32) {
    LOST_INDEX.store(index, Ordering::SeqCst);
}

/// Make `nvmlInit` report `NVML_ERROR_DRIVER_NOT_LOADED`.
pub fn fail_init() {
    INIT_RESULT.store(NVML_ERROR_DRIVER_NOT_LOADED, Ordering::SeqCst);
}

// ---------------------------------------------------------------------------
// Stub entry points
// ---------------------------------------------------------------------------

unsafe extern "C" fn stub_init() -> NvmlReturn {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    INIT_RESULT.load(Ordering::SeqCst)
}

unsafe extern "C" fn stub_shutdown() -> NvmlReturn {
    SHUTDOWN_CALLS.fetch_add(1, Ordering::SeqCst);
    NVML_SUCCESS
}

unsafe extern "C" fn stub_handle_by_pci_bus_id(
    _pci_bus_id: *const c_char,
    _device: *mut NvmlDevice,
) -> NvmlReturn {
    NVML_ERROR_NOT_FOUND
}

/// Shared by both handle-by-index entry points: refuses indices past the
/// device count with `NVML_ERROR_INVALID_ARGUMENT`, like the real library.
unsafe fn handle_for(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn {
    if index == LOST_INDEX.load(Ordering::SeqCst) {
        return NVML_ERROR_GPU_IS_LOST;
    }
    if index >= DEVICE_COUNT.load(Ordering::SeqCst) {
        return NVML_ERROR_INVALID_ARGUMENT;
    }
    unsafe { *device = NvmlDevice::from_raw((HANDLE_BASE + index as usize) as *mut c_void) };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_handle_by_index(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn {
    HANDLE_BY_INDEX_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { handle_for(index, device) }
}

unsafe extern "C" fn stub_handle_by_index_v2(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn {
    HANDLE_BY_INDEX_V2_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { handle_for(index, device) }
}

unsafe extern "C" fn stub_get_index(device: NvmlDevice, index: *mut c_uint) -> NvmlReturn {
    unsafe { *index = (device.as_raw() as usize).wrapping_sub(HANDLE_BASE) as c_uint };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_affinity(_device: NvmlDevice) -> NvmlReturn {
    NVML_SUCCESS
}

unsafe extern "C" fn stub_driver_version(version: *mut c_char, length: c_uint) -> NvmlReturn {
    if (length as usize) < STUB_DRIVER_VERSION.len() {
        return NVML_ERROR_INSUFFICIENT_SIZE;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(
            STUB_DRIVER_VERSION.as_ptr().cast::<c_char>(),
            version,
            STUB_DRIVER_VERSION.len(),
        );
    }
    NVML_SUCCESS
}

unsafe extern "C" fn stub_cpu_affinity(
    _device: NvmlDevice,
    _cpu_set_size: c_uint,
    _cpu_set: *mut c_ulong,
) -> NvmlReturn {
    NVML_SUCCESS
}

unsafe extern "C" fn stub_error_string(code: NvmlReturn) -> *const c_char {
    match code {
        NVML_SUCCESS => c"Success".as_ptr(),
        NVML_ERROR_INVALID_ARGUMENT => c"Invalid Argument".as_ptr(),
        NVML_ERROR_NOT_FOUND => c"Not Found".as_ptr(),
        NVML_ERROR_DRIVER_NOT_LOADED => c"Driver Not Loaded".as_ptr(),
        NVML_ERROR_GPU_IS_LOST => c"GPU is lost".as_ptr(),
        _ => std::ptr::null(),
    }
}

unsafe extern "C" fn stub_cpu_affinity_within_scope(
    _device: NvmlDevice,
    _node_set_size: c_uint,
    _node_set: *mut c_ulong,
    _scope: AffinityScope,
) -> NvmlReturn {
    NVML_SUCCESS
}

unsafe extern "C" fn stub_get_brand(device: NvmlDevice, brand: *mut BrandType) -> NvmlReturn {
    BRAND_CALLS.fetch_add(1, Ordering::SeqCst);
    let value = if device.as_raw() as usize == HANDLE_BASE {
        BrandType::TESLA
    } else {
        BrandType::GEFORCE
    };
    unsafe { *brand = value };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_get_count_v2(device_count: *mut c_uint) -> NvmlReturn {
    COUNT_V2_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *device_count = DEVICE_COUNT.load(Ordering::SeqCst) };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_compute_capability(
    _device: NvmlDevice,
    major: *mut c_int,
    minor: *mut c_int,
) -> NvmlReturn {
    unsafe {
        *major = 8;
        *minor = 6;
    }
    NVML_SUCCESS
}

/// Each cast goes through the op's `ffi` alias so a mismatched stub fails to compile.
fn stub_address(op: NvmlOp) -> usize {
    match op {
        NvmlOp::Init => stub_init as FnInit as usize,
        NvmlOp::Shutdown => stub_shutdown as FnShutdown as usize,
        NvmlOp::DeviceGetHandleByPciBusId => {
            stub_handle_by_pci_bus_id as FnDeviceGetHandleByPciBusId as usize
        }
        NvmlOp::DeviceGetHandleByIndex => stub_handle_by_index as FnDeviceGetHandleByIndex as usize,
        NvmlOp::DeviceGetIndex => stub_get_index as FnDeviceGetIndex as usize,
        NvmlOp::DeviceSetCpuAffinity => stub_affinity as FnDeviceSetCpuAffinity as usize,
        NvmlOp::DeviceClearCpuAffinity => stub_affinity as FnDeviceClearCpuAffinity as usize,
        NvmlOp::SystemGetDriverVersion => stub_driver_version as FnSystemGetDriverVersion as usize,
        NvmlOp::DeviceGetCpuAffinity => stub_cpu_affinity as FnDeviceGetCpuAffinity as usize,
        NvmlOp::ErrorString => stub_error_string as FnErrorString as usize,
        NvmlOp::DeviceGetCpuAffinityWithinScope => {
            stub_cpu_affinity_within_scope as FnDeviceGetCpuAffinityWithinScope as usize
        }
        NvmlOp::DeviceGetBrand => stub_get_brand as FnDeviceGetBrand as usize,
        NvmlOp::DeviceGetCountV2 => stub_get_count_v2 as FnDeviceGetCountV2 as usize,
        NvmlOp::DeviceGetHandleByIndexV2 => {
            stub_handle_by_index_v2 as FnDeviceGetHandleByIndexV2 as usize
        }
        NvmlOp::DeviceGetCudaComputeCapability => {
            stub_compute_capability as FnDeviceGetCudaComputeCapability as usize
        }
    }
}

// ---------------------------------------------------------------------------
// Symbol sources
// ---------------------------------------------------------------------------

pub struct StubLibrary {
    missing: Vec<NvmlOp>,
}

// SAFETY: `stub_address` pairs every op with a function of its `ffi` signature.
unsafe impl SymbolSource for StubLibrary {
    fn name(&self) -> &str {
        LIB
    }

    fn lookup(&self, symbol: &CStr) -> Result<NonNull<c_void>, String> {
        let name = symbol.to_string_lossy();
        NvmlOp::from_symbol(&name)
            .filter(|op| !self.missing.contains(op))
            .and_then(|op| NonNull::new(stub_address(op) as *mut c_void))
            .ok_or_else(|| format!("{LIB}: undefined symbol: {name}"))
    }
}

/// Opens [`StubLibrary`] under [`LIB`], or fails every open when `exists` is false.
pub struct StubOpener {
    pub missing: Vec<NvmlOp>,
    pub exists: bool,
}

// SAFETY: only hands out `StubLibrary`.
unsafe impl LibraryOpener for StubOpener {
    fn open(&self, name: &str) -> Result<Box<dyn SymbolSource>, String> {
        if !self.exists || name != LIB {
            return Err(format!("{name}: cannot open shared object file"));
        }
        Ok(Box::new(StubLibrary {
            missing: self.missing.clone(),
        }))
    }
}

/// Loader over the stub library with every op except `missing`.
pub fn loader(missing: Vec<NvmlOp>, exists: bool, driver: Option<DriverVersion>) -> NvmlLoader {
    NvmlLoader::new(LoaderConfig::default().with_library_candidates([LIB]))
        .with_opener(StubOpener { missing, exists })
        .with_probe(FixedDriverVersion(driver))
}
