//! Device walk through the call shim.
//!
//! Brackets the walk with `nvmlInit` / `nvmlShutdown`. With the CUDA 11 group
//! available the count comes from `nvmlDeviceGetCount_v2`; otherwise handles
//! are requested by index until the library reports the index out of range.

use std::ffi::{c_char, c_int, c_uint};

use serde::{Deserialize, Serialize};

use nvml_shim::status::{NVML_ERROR_INVALID_ARGUMENT, NVML_ERROR_NOT_FOUND};
use nvml_shim::{BrandType, CallError, NvmlDevice, NvmlLoader};

use crate::error::HarnessError;

/// `NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE`.
const DRIVER_VERSION_BUFFER: usize = 80;

/// Upper bound on the index walk used without `nvmlDeviceGetCount_v2`.
pub const MAX_DEVICES: c_uint = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub index: u32,
    /// Brand name, when the CUDA 11 group is available.
    pub brand: Option<String>,
    /// `major.minor`, when the CUDA 11 group is available.
    pub compute_capability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInventory {
    pub driver_version: String,
    pub devices: Vec<DeviceInfo>,
}

impl DeviceInventory {
    /// Load, init, walk every visible device, shut down.
    pub fn collect(nvml: &NvmlLoader) -> Result<Self, HarnessError> {
        nvml.ensure_loaded()?;
        nvml.init()?;
        let walked = walk(nvml);
        let shutdown = nvml.shutdown();
        let inventory = walked?;
        shutdown?;
        Ok(inventory)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn to_plain(&self) -> String {
        let mut out = format!("driver: {}\n", self.driver_version);
        if self.devices.is_empty() {
            out.push_str("no devices\n");
        }
        for d in &self.devices {
            out.push_str(&format!(
                "gpu {}: brand={} compute={}\n",
                d.index,
                d.brand.as_deref().unwrap_or("-"),
                d.compute_capability.as_deref().unwrap_or("-"),
            ));
        }
        out
    }
}

fn walk(nvml: &NvmlLoader) -> Result<DeviceInventory, HarnessError> {
    let mut buf: [c_char; DRIVER_VERSION_BUFFER] = [0; DRIVER_VERSION_BUFFER];
    nvml.system_get_driver_version(&mut buf)?;
    let driver_version = c_chars_to_string(&buf);

    let extended = nvml.has_extended_capability_set();
    let handles = if extended {
        let mut count: c_uint = 0;
        nvml.device_get_count_v2(&mut count)?;
        (0..count)
            .map(|i| {
                let mut device = NvmlDevice::null();
                nvml.device_get_handle_by_index_v2(i, &mut device)?;
                Ok::<_, HarnessError>(device)
            })
            .collect::<Result<Vec<_>, HarnessError>>()?
    } else {
        let mut handles = Vec::new();
        for i in 0..MAX_DEVICES {
            let mut device = NvmlDevice::null();
            match nvml.device_get_handle_by_index(i, &mut device) {
                Ok(()) => handles.push(device),
                Err(err) if is_end_of_devices(&err) => break,
                Err(err) => return Err(err.into()),
            }
        }
        handles
    };

    let mut devices = Vec::with_capacity(handles.len());
    for device in handles {
        let mut index: c_uint = 0;
        nvml.device_get_index(device, &mut index)?;

        let (brand, compute_capability) = if extended {
            let mut brand = BrandType::UNKNOWN;
            nvml.device_get_brand(device, &mut brand)?;
            let (mut major, mut minor): (c_int, c_int) = (0, 0);
            nvml.device_get_cuda_compute_capability(device, &mut major, &mut minor)?;
            (Some(brand.name().to_string()), Some(format!("{major}.{minor}")))
        } else {
            (None, None)
        };

        devices.push(DeviceInfo {
            index,
            brand,
            compute_capability,
        });
    }

    tracing::debug!(count = devices.len(), extended, "walked NVML devices");
    Ok(DeviceInventory {
        driver_version,
        devices,
    })
}

/// Codes `nvmlDeviceGetHandleByIndex` uses for an index past the last device.
fn is_end_of_devices(err: &CallError) -> bool {
    matches!(
        err.code(),
        Some(NVML_ERROR_INVALID_ARGUMENT | NVML_ERROR_NOT_FOUND)
    )
}

/// Text up to the first NUL of a C character buffer.
fn c_chars_to_string(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
