//! Loader configuration.
//!
//! Defaults follow the platform's NVML and CUDA driver library names. Two
//! environment variables adjust them when the config is built with
//! [`LoaderConfig::from_env`]:
//! - `NVML_SHIM_LIBRARY`: an explicit library path, tried before the defaults.
//! - `NVML_SHIM_DISABLE_GATED`: `1`/`true`/`yes`/`on` forces every
//!   version-gated capability group off, regardless of the driver.

/// Environment variable holding an explicit NVML library path.
pub const ENV_LIBRARY: &str = "NVML_SHIM_LIBRARY";
/// Environment variable that disables every gated capability group.
pub const ENV_DISABLE_GATED: &str = "NVML_SHIM_DISABLE_GATED";

#[cfg(windows)]
const DEFAULT_LIBRARIES: &[&str] = &["nvml.dll"];
// Unversioned name first, then the ABI-versioned one shipped by the driver.
#[cfg(not(windows))]
const DEFAULT_LIBRARIES: &[&str] = &["libnvidia-ml.so", "libnvidia-ml.so.1"];

#[cfg(windows)]
const DEFAULT_DRIVER_LIBRARIES: &[&str] = &["nvcuda.dll"];
#[cfg(not(windows))]
const DEFAULT_DRIVER_LIBRARIES: &[&str] = &["libcuda.so.1", "libcuda.so"];

/// Where to find the libraries and which optional groups may be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    library_candidates: Vec<String>,
    driver_candidates: Vec<String>,
    disable_gated: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            library_candidates: DEFAULT_LIBRARIES.iter().map(|s| (*s).to_string()).collect(),
            driver_candidates: DEFAULT_DRIVER_LIBRARIES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            disable_gated: false,
        }
    }
}

impl LoaderConfig {
    /// Defaults adjusted by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults adjusted by an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_LIBRARY).filter(|p| !p.trim().is_empty()) {
            config.library_candidates.insert(0, path.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_DISABLE_GATED) {
            config.disable_gated = parse_flag(&raw);
        }
        config
    }

    /// Replace the NVML candidate names.
    #[must_use]
    pub fn with_library_candidates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.library_candidates = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the CUDA driver candidate names used by the version probe.
    #[must_use]
    pub fn with_driver_candidates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.driver_candidates = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_gated_disabled(mut self, disabled: bool) -> Self {
        self.disable_gated = disabled;
        self
    }

    #[must_use]
    pub fn library_candidates(&self) -> &[String] {
        &self.library_candidates
    }

    #[must_use]
    pub fn driver_candidates(&self) -> &[String] {
        &self.driver_candidates
    }

    #[must_use]
    pub fn gated_disabled(&self) -> bool {
        self.disable_gated
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
