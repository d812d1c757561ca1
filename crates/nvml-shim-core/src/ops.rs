//! Bound NVML operations and the capability groups that gate them.
//!
//! Every entry point the shim knows about is a variant of [`NvmlOp`]. The enum
//! is closed: the symbol table is a fixed-size array indexed by
//! [`NvmlOp::index`], so adding an operation means adding a variant here and a
//! row in [`NvmlOp::ALL`].

use std::ffi::CStr;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::DriverVersion;

/// Whether an operation must be present for the library to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Absence is a fatal load error.
    Required,
    /// Resolved only when the group's driver-version predicate passes.
    Gated(CapabilityGroup),
}

/// A named set of optional symbols that are available or absent together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityGroup {
    /// Entry points introduced alongside the CUDA 11 driver generation.
    Cuda11,
}

impl CapabilityGroup {
    /// Number of groups.
    pub const COUNT: usize = 1;

    /// All capability groups, in resolution order.
    pub const ALL: [CapabilityGroup; Self::COUNT] = [CapabilityGroup::Cuda11];

    /// Slot of this group in per-group arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Minimum driver version at which the group's symbols are guaranteed.
    #[must_use]
    pub const fn min_driver(self) -> DriverVersion {
        match self {
            Self::Cuda11 => DriverVersion::new(11, 0),
        }
    }

    /// Stable short name used in logs and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cuda11 => "cuda11",
        }
    }

    /// Operations belonging to this group.
    pub fn members(self) -> impl Iterator<Item = NvmlOp> {
        NvmlOp::ALL
            .into_iter()
            .filter(move |op| op.requirement() == Requirement::Gated(self))
    }
}

impl fmt::Display for CapabilityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of a bound NVML entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NvmlOp {
    Init,
    Shutdown,
    DeviceGetHandleByPciBusId,
    DeviceGetHandleByIndex,
    DeviceGetIndex,
    DeviceSetCpuAffinity,
    DeviceClearCpuAffinity,
    SystemGetDriverVersion,
    DeviceGetCpuAffinity,
    ErrorString,
    DeviceGetCpuAffinityWithinScope,
    DeviceGetBrand,
    DeviceGetCountV2,
    DeviceGetHandleByIndexV2,
    DeviceGetCudaComputeCapability,
}

impl NvmlOp {
    /// Number of operations; the length of the symbol table.
    pub const COUNT: usize = 15;

    /// Every operation, in resolution order. Required entries come first.
    pub const ALL: [NvmlOp; Self::COUNT] = [
        NvmlOp::Init,
        NvmlOp::Shutdown,
        NvmlOp::DeviceGetHandleByPciBusId,
        NvmlOp::DeviceGetHandleByIndex,
        NvmlOp::DeviceGetIndex,
        NvmlOp::DeviceSetCpuAffinity,
        NvmlOp::DeviceClearCpuAffinity,
        NvmlOp::SystemGetDriverVersion,
        NvmlOp::DeviceGetCpuAffinity,
        NvmlOp::ErrorString,
        NvmlOp::DeviceGetCpuAffinityWithinScope,
        NvmlOp::DeviceGetBrand,
        NvmlOp::DeviceGetCountV2,
        NvmlOp::DeviceGetHandleByIndexV2,
        NvmlOp::DeviceGetCudaComputeCapability,
    ];

    /// Slot of this operation in the symbol table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Exported symbol name, NUL-terminated for the dynamic linker.
    #[must_use]
    pub const fn c_symbol(self) -> &'static CStr {
        match self {
            Self::Init => c"nvmlInit",
            Self::Shutdown => c"nvmlShutdown",
            Self::DeviceGetHandleByPciBusId => c"nvmlDeviceGetHandleByPciBusId",
            Self::DeviceGetHandleByIndex => c"nvmlDeviceGetHandleByIndex",
            Self::DeviceGetIndex => c"nvmlDeviceGetIndex",
            Self::DeviceSetCpuAffinity => c"nvmlDeviceSetCpuAffinity",
            Self::DeviceClearCpuAffinity => c"nvmlDeviceClearCpuAffinity",
            Self::SystemGetDriverVersion => c"nvmlSystemGetDriverVersion",
            Self::DeviceGetCpuAffinity => c"nvmlDeviceGetCpuAffinity",
            Self::ErrorString => c"nvmlErrorString",
            Self::DeviceGetCpuAffinityWithinScope => c"nvmlDeviceGetCpuAffinityWithinScope",
            Self::DeviceGetBrand => c"nvmlDeviceGetBrand",
            Self::DeviceGetCountV2 => c"nvmlDeviceGetCount_v2",
            Self::DeviceGetHandleByIndexV2 => c"nvmlDeviceGetHandleByIndex_v2",
            Self::DeviceGetCudaComputeCapability => c"nvmlDeviceGetCudaComputeCapability",
        }
    }

    /// Exported symbol name.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        // Every literal above is ASCII.
        self.c_symbol().to_str().unwrap_or("<non-utf8 symbol>")
    }

    /// Whether the operation is required or belongs to a gated group.
    #[must_use]
    pub const fn requirement(self) -> Requirement {
        match self {
            Self::DeviceGetCpuAffinityWithinScope
            | Self::DeviceGetBrand
            | Self::DeviceGetCountV2
            | Self::DeviceGetHandleByIndexV2
            | Self::DeviceGetCudaComputeCapability => Requirement::Gated(CapabilityGroup::Cuda11),
            _ => Requirement::Required,
        }
    }

    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self.requirement(), Requirement::Required)
    }

    /// Look up an operation by its exported symbol name.
    #[must_use]
    pub fn from_symbol(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == name)
    }

    /// Required operations, in resolution order.
    pub fn required() -> impl Iterator<Item = NvmlOp> {
        Self::ALL.into_iter().filter(|op| op.is_required())
    }
}

impl fmt::Display for NvmlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
