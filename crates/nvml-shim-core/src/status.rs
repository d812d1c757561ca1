//! Native NVML status codes and the shim's two-valued status.

use serde::{Deserialize, Serialize};

use crate::error::CallError;

/// `nvmlReturn_t`: the library's own status value.
pub type NvmlReturn = i32;

pub const NVML_SUCCESS: NvmlReturn = 0;
pub const NVML_ERROR_UNINITIALIZED: NvmlReturn = 1;
pub const NVML_ERROR_INVALID_ARGUMENT: NvmlReturn = 2;
pub const NVML_ERROR_NOT_SUPPORTED: NvmlReturn = 3;
pub const NVML_ERROR_NO_PERMISSION: NvmlReturn = 4;
pub const NVML_ERROR_ALREADY_INITIALIZED: NvmlReturn = 5;
pub const NVML_ERROR_NOT_FOUND: NvmlReturn = 6;
pub const NVML_ERROR_INSUFFICIENT_SIZE: NvmlReturn = 7;
pub const NVML_ERROR_INSUFFICIENT_POWER: NvmlReturn = 8;
pub const NVML_ERROR_DRIVER_NOT_LOADED: NvmlReturn = 9;
pub const NVML_ERROR_TIMEOUT: NvmlReturn = 10;
pub const NVML_ERROR_IRQ_ISSUE: NvmlReturn = 11;
pub const NVML_ERROR_LIBRARY_NOT_FOUND: NvmlReturn = 12;
pub const NVML_ERROR_FUNCTION_NOT_FOUND: NvmlReturn = 13;
pub const NVML_ERROR_CORRUPTED_INFOROM: NvmlReturn = 14;
pub const NVML_ERROR_GPU_IS_LOST: NvmlReturn = 15;
pub const NVML_ERROR_RESET_REQUIRED: NvmlReturn = 16;
pub const NVML_ERROR_OPERATING_SYSTEM: NvmlReturn = 17;
pub const NVML_ERROR_LIB_RM_VERSION_MISMATCH: NvmlReturn = 18;
pub const NVML_ERROR_IN_USE: NvmlReturn = 19;
pub const NVML_ERROR_MEMORY: NvmlReturn = 20;
pub const NVML_ERROR_NO_DATA: NvmlReturn = 21;
pub const NVML_ERROR_UNKNOWN: NvmlReturn = 999;

/// Message used when the library cannot stringify a failing code.
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";

/// Symbolic name of a native status code, for logs and reports.
///
/// This never replaces the library's own `nvmlErrorString`; it only labels
/// the number.
#[must_use]
pub fn status_name(code: NvmlReturn) -> &'static str {
    match code {
        NVML_SUCCESS => "NVML_SUCCESS",
        NVML_ERROR_UNINITIALIZED => "NVML_ERROR_UNINITIALIZED",
        NVML_ERROR_INVALID_ARGUMENT => "NVML_ERROR_INVALID_ARGUMENT",
        NVML_ERROR_NOT_SUPPORTED => "NVML_ERROR_NOT_SUPPORTED",
        NVML_ERROR_NO_PERMISSION => "NVML_ERROR_NO_PERMISSION",
        NVML_ERROR_ALREADY_INITIALIZED => "NVML_ERROR_ALREADY_INITIALIZED",
        NVML_ERROR_NOT_FOUND => "NVML_ERROR_NOT_FOUND",
        NVML_ERROR_INSUFFICIENT_SIZE => "NVML_ERROR_INSUFFICIENT_SIZE",
        NVML_ERROR_INSUFFICIENT_POWER => "NVML_ERROR_INSUFFICIENT_POWER",
        NVML_ERROR_DRIVER_NOT_LOADED => "NVML_ERROR_DRIVER_NOT_LOADED",
        NVML_ERROR_TIMEOUT => "NVML_ERROR_TIMEOUT",
        NVML_ERROR_IRQ_ISSUE => "NVML_ERROR_IRQ_ISSUE",
        NVML_ERROR_LIBRARY_NOT_FOUND => "NVML_ERROR_LIBRARY_NOT_FOUND",
        NVML_ERROR_FUNCTION_NOT_FOUND => "NVML_ERROR_FUNCTION_NOT_FOUND",
        NVML_ERROR_CORRUPTED_INFOROM => "NVML_ERROR_CORRUPTED_INFOROM",
        NVML_ERROR_GPU_IS_LOST => "NVML_ERROR_GPU_IS_LOST",
        NVML_ERROR_RESET_REQUIRED => "NVML_ERROR_RESET_REQUIRED",
        NVML_ERROR_OPERATING_SYSTEM => "NVML_ERROR_OPERATING_SYSTEM",
        NVML_ERROR_LIB_RM_VERSION_MISMATCH => "NVML_ERROR_LIB_RM_VERSION_MISMATCH",
        NVML_ERROR_IN_USE => "NVML_ERROR_IN_USE",
        NVML_ERROR_MEMORY => "NVML_ERROR_MEMORY",
        NVML_ERROR_NO_DATA => "NVML_ERROR_NO_DATA",
        NVML_ERROR_UNKNOWN => "NVML_ERROR_UNKNOWN",
        _ => "NVML_ERROR_UNRECOGNIZED",
    }
}

/// Two-valued outcome of a wrapper call. Carries no payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShimStatus {
    Success,
    Error,
}

impl ShimStatus {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl<T> From<&Result<T, CallError>> for ShimStatus {
    fn from(result: &Result<T, CallError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(_) => Self::Error,
        }
    }
}

/// `nvmlBrandType_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct BrandType(pub i32);

impl BrandType {
    pub const UNKNOWN: BrandType = BrandType(0);
    pub const QUADRO: BrandType = BrandType(1);
    pub const TESLA: BrandType = BrandType(2);
    pub const NVS: BrandType = BrandType(3);
    pub const GRID: BrandType = BrandType(4);
    pub const GEFORCE: BrandType = BrandType(5);
    pub const TITAN: BrandType = BrandType(6);
    pub const NVIDIA_RTX: BrandType = BrandType(13);
    pub const NVIDIA: BrandType = BrandType(14);
    pub const GEFORCE_RTX: BrandType = BrandType(15);
    pub const TITAN_RTX: BrandType = BrandType(16);

    #[must_use]
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "Unknown",
            1 => "Quadro",
            2 => "Tesla",
            3 => "NVS",
            4 => "GRID",
            5 => "GeForce",
            6 => "Titan",
            7 => "NVIDIA vApps",
            8 => "NVIDIA VPC",
            9 => "NVIDIA VCS",
            10 => "NVIDIA VWS",
            11 => "NVIDIA Cloud Gaming",
            12 => "Quadro RTX",
            13 => "NVIDIA RTX",
            14 => "NVIDIA",
            15 => "GeForce RTX",
            16 => "Titan RTX",
            _ => "Unrecognized",
        }
    }
}

/// `nvmlAffinityScope_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct AffinityScope(pub u32);

impl AffinityScope {
    /// Scope the affinity to the closest NUMA node.
    pub const NODE: AffinityScope = AffinityScope(0);
    /// Scope the affinity to the closest CPU socket.
    pub const SOCKET: AffinityScope = AffinityScope(1);
}
