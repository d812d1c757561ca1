//! In-process stand-ins for `libnvidia-ml`.
//!
//! `StubOpener` hands out `StubLibrary` symbol sources whose entries point at
//! the `extern "C"` functions below. Every stub bumps a counter so tests can
//! prove whether a native call happened.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_uint, c_ulong, c_void};
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use nvml_shim::{
    AffinityScope, BrandType, LibraryOpener, NvmlDevice, NvmlOp, NvmlReturn, SymbolSource,
};
use nvml_shim_core::status::{
    NVML_ERROR_INSUFFICIENT_SIZE, NVML_ERROR_NOT_FOUND, NVML_ERROR_NOT_SUPPORTED, NVML_SUCCESS,
};

pub const PRIMARY: &str = "libnvidia-ml.so";
pub const VERSIONED: &str = "libnvidia-ml.so.1";
pub const STUB_DRIVER_VERSION: &[u8] = b"535.104.05\0";
pub const STUB_PCI_BUS_ID: &CStr = c"00000000:01:00.0";
/// A code the stub `nvmlErrorString` has no text for.
pub const UNSTRINGABLE_CODE: NvmlReturn = 4242;

pub static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static SHUTDOWN_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static BRAND_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static COUNT_V2_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static AFFINITY_SET_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static AFFINITY_CLEAR_CALLS: AtomicUsize = AtomicUsize::new(0);
pub static OTHER_CALLS: AtomicUsize = AtomicUsize::new(0);

static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that read the shared call counters, and zero them.
pub fn lock_and_reset() -> MutexGuard<'static, ()> {
    let guard = TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for counter in [
        &INIT_CALLS,
        &SHUTDOWN_CALLS,
        &BRAND_CALLS,
        &COUNT_V2_CALLS,
        &AFFINITY_SET_CALLS,
        &AFFINITY_CLEAR_CALLS,
        &OTHER_CALLS,
    ] {
        counter.store(0, Ordering::SeqCst);
    }
    guard
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

// ---------------------------------------------------------------------------
// Stub entry points
// ---------------------------------------------------------------------------

unsafe extern "C" fn stub_init() -> NvmlReturn {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    NVML_SUCCESS
}

unsafe extern "C" fn stub_shutdown() -> NvmlReturn {
    SHUTDOWN_CALLS.fetch_add(1, Ordering::SeqCst);
    NVML_SUCCESS
}

/// Shutdown variant that always reports `NVML_ERROR_NOT_SUPPORTED`.
pub unsafe extern "C" fn stub_shutdown_not_supported() -> NvmlReturn {
    SHUTDOWN_CALLS.fetch_add(1, Ordering::SeqCst);
    NVML_ERROR_NOT_SUPPORTED
}

/// Shutdown variant returning a code `nvmlErrorString` cannot describe.
pub unsafe extern "C" fn stub_shutdown_unstringable() -> NvmlReturn {
    SHUTDOWN_CALLS.fetch_add(1, Ordering::SeqCst);
    UNSTRINGABLE_CODE
}

unsafe extern "C" fn stub_handle_by_pci_bus_id(
    pci_bus_id: *const c_char,
    device: *mut NvmlDevice,
) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    let requested = unsafe { CStr::from_ptr(pci_bus_id) };
    if requested != STUB_PCI_BUS_ID {
        return NVML_ERROR_NOT_FOUND;
    }
    unsafe { *device = NvmlDevice::from_raw(0x100 as *mut c_void) };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_handle_by_index(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *device = NvmlDevice::from_raw((0x1000 + index as usize) as *mut c_void) };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_get_index(device: NvmlDevice, index: *mut c_uint) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *index = (device.as_raw() as usize).wrapping_sub(0x1000) as c_uint };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_set_cpu_affinity(_device: NvmlDevice) -> NvmlReturn {
    AFFINITY_SET_CALLS.fetch_add(1, Ordering::SeqCst);
    NVML_SUCCESS
}

unsafe extern "C" fn stub_clear_cpu_affinity(_device: NvmlDevice) -> NvmlReturn {
    AFFINITY_CLEAR_CALLS.fetch_add(1, Ordering::SeqCst);
    NVML_SUCCESS
}

unsafe extern "C" fn stub_driver_version(version: *mut c_char, length: c_uint) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
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
    cpu_set_size: c_uint,
    cpu_set: *mut c_ulong,
) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    if cpu_set_size == 0 {
        return NVML_ERROR_INSUFFICIENT_SIZE;
    }
    unsafe { *cpu_set = 0b1011 };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_error_string(code: NvmlReturn) -> *const c_char {
    match code {
        NVML_SUCCESS => c"Success".as_ptr(),
        NVML_ERROR_NOT_SUPPORTED => c"Not Supported".as_ptr(),
        NVML_ERROR_NOT_FOUND => c"Not Found".as_ptr(),
        NVML_ERROR_INSUFFICIENT_SIZE => c"Insufficient Size".as_ptr(),
        _ => std::ptr::null(),
    }
}

unsafe extern "C" fn stub_cpu_affinity_within_scope(
    _device: NvmlDevice,
    node_set_size: c_uint,
    node_set: *mut c_ulong,
    scope: AffinityScope,
) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    if node_set_size == 0 {
        return NVML_ERROR_INSUFFICIENT_SIZE;
    }
    let mask = if scope == AffinityScope::SOCKET { 0b1111 } else { 0b0011 };
    unsafe { *node_set = mask };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_get_brand(_device: NvmlDevice, brand: *mut BrandType) -> NvmlReturn {
    BRAND_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *brand = BrandType::TESLA };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_get_count_v2(device_count: *mut c_uint) -> NvmlReturn {
    COUNT_V2_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *device_count = 4 };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_handle_by_index_v2(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *device = NvmlDevice::from_raw((0x1000 + index as usize) as *mut c_void) };
    NVML_SUCCESS
}

unsafe extern "C" fn stub_compute_capability(
    _device: NvmlDevice,
    major: *mut c_int,
    minor: *mut c_int,
) -> NvmlReturn {
    OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe {
        *major = 8;
        *minor = 6;
    }
    NVML_SUCCESS
}

// ---------------------------------------------------------------------------
// Symbol sources
// ---------------------------------------------------------------------------

/// Symbol name → address map for one stub library.
#[derive(Debug, Clone)]
pub struct StubSymbols {
    symbols: HashMap<&'static str, usize>,
}

impl StubSymbols {
    /// Every bound operation, each pointing at a well-behaved stub.
    pub fn full() -> Self {
        let mut symbols = HashMap::new();
        for op in NvmlOp::ALL {
            symbols.insert(op.symbol(), default_stub(op));
        }
        Self { symbols }
    }

    /// Only the required operations.
    pub fn required_only() -> Self {
        let mut stubs = Self::full();
        for op in NvmlOp::ALL.into_iter().filter(|op| !op.is_required()) {
            stubs.symbols.remove(op.symbol());
        }
        stubs
    }

    pub fn without(mut self, op: NvmlOp) -> Self {
        self.symbols.remove(op.symbol());
        self
    }

    /// Point `op` at `address`.
    ///
    /// # Safety
    ///
    /// `address` must be an `extern "C"` function with `op`'s native signature.
    pub unsafe fn with(mut self, op: NvmlOp, address: usize) -> Self {
        self.symbols.insert(op.symbol(), address);
        self
    }
}

fn default_stub(op: NvmlOp) -> usize {
    match op {
        NvmlOp::Init => stub_init as usize,
        NvmlOp::Shutdown => stub_shutdown as usize,
        NvmlOp::DeviceGetHandleByPciBusId => stub_handle_by_pci_bus_id as usize,
        NvmlOp::DeviceGetHandleByIndex => stub_handle_by_index as usize,
        NvmlOp::DeviceGetIndex => stub_get_index as usize,
        NvmlOp::DeviceSetCpuAffinity => stub_set_cpu_affinity as usize,
        NvmlOp::DeviceClearCpuAffinity => stub_clear_cpu_affinity as usize,
        NvmlOp::SystemGetDriverVersion => stub_driver_version as usize,
        NvmlOp::DeviceGetCpuAffinity => stub_cpu_affinity as usize,
        NvmlOp::ErrorString => stub_error_string as usize,
        NvmlOp::DeviceGetCpuAffinityWithinScope => stub_cpu_affinity_within_scope as usize,
        NvmlOp::DeviceGetBrand => stub_get_brand as usize,
        NvmlOp::DeviceGetCountV2 => stub_get_count_v2 as usize,
        NvmlOp::DeviceGetHandleByIndexV2 => stub_handle_by_index_v2 as usize,
        NvmlOp::DeviceGetCudaComputeCapability => stub_compute_capability as usize,
    }
}

pub struct StubLibrary {
    name: String,
    symbols: HashMap<&'static str, usize>,
}

// SAFETY: every address comes from `default_stub`, whose table pairs each op
// with a stub of its native signature, or from the caller of `with`.
unsafe impl SymbolSource for StubLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, symbol: &CStr) -> Result<NonNull<c_void>, String> {
        let name = symbol.to_string_lossy();
        self.symbols
            .get(name.as_ref())
            .and_then(|addr| NonNull::new(*addr as *mut c_void))
            .ok_or_else(|| format!("{}: undefined symbol: {name}", self.name))
    }
}

/// Opener that knows a fixed set of stub libraries by name.
#[derive(Clone, Default)]
pub struct StubOpener {
    libraries: HashMap<String, StubSymbols>,
    opens: Arc<AtomicUsize>,
}

impl StubOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, name: &str, symbols: StubSymbols) -> Self {
        self.libraries.insert(name.to_string(), symbols);
        self
    }

    /// Shared counter of `open` attempts, successful or not.
    pub fn open_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

// SAFETY: only hands out `StubLibrary` sources.
unsafe impl LibraryOpener for StubOpener {
    fn open(&self, name: &str) -> Result<Box<dyn SymbolSource>, String> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.libraries.get(name) {
            Some(stubs) => Ok(Box::new(StubLibrary {
                name: name.to_string(),
                symbols: stubs.symbols.clone(),
            })),
            None => Err(format!(
                "{name}: cannot open shared object file: No such file or directory"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with `warn`-and-above events captured, returning its result and the log text.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, log.contents())
}
