//! One-shot loader context.
//!
//! [`NvmlLoader`] owns the symbol table behind a [`OnceLock`]. The first call
//! to [`NvmlLoader::ensure_loaded`] runs the single resolution pass; every
//! concurrent or later caller observes that pass's outcome, success or
//! failure. A failed load is final for the lifetime of the loader.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use nvml_shim_core::{CapabilityGroup, LoadError, LoaderConfig};

use crate::probe::{CudaDriverProbe, DriverVersionProbe};
use crate::source::{DynamicLibraryOpener, LibraryOpener, SymbolSource};
use crate::table::{self, SymbolTable};

/// Loader and owner of the NVML symbol table.
pub struct NvmlLoader {
    config: LoaderConfig,
    opener: Box<dyn LibraryOpener>,
    probe: Box<dyn DriverVersionProbe>,
    state: OnceLock<Result<SymbolTable, LoadError>>,
    passes: AtomicUsize,
}

impl NvmlLoader {
    /// Loader using the host dynamic linker and the CUDA driver probe.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        let probe = CudaDriverProbe::new(config.driver_candidates().to_vec());
        Self {
            config,
            opener: Box::new(DynamicLibraryOpener),
            probe: Box::new(probe),
            state: OnceLock::new(),
            passes: AtomicUsize::new(0),
        }
    }

    /// Replace the library opener.
    #[must_use]
    pub fn with_opener(mut self, opener: impl LibraryOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    /// Replace the driver-version probe.
    #[must_use]
    pub fn with_probe(mut self, probe: impl DriverVersionProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Open the library and resolve the symbol table, once.
    ///
    /// Idempotent: later calls return the cached outcome without touching the
    /// dynamic linker. Concurrent first calls block until the single pass
    /// finishes.
    pub fn ensure_loaded(&self) -> Result<&SymbolTable, LoadError> {
        self.state.get_or_init(|| self.load()).as_ref().map_err(Clone::clone)
    }

    /// `true` once a load has succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.state.get(), Some(Ok(_)))
    }

    /// The published table, if a load has succeeded.
    #[must_use]
    pub fn table(&self) -> Option<&SymbolTable> {
        self.state.get().and_then(|state| state.as_ref().ok())
    }

    /// The cached load failure, if the load has run and failed.
    #[must_use]
    pub fn load_error(&self) -> Option<&LoadError> {
        self.state.get().and_then(|state| state.as_ref().err())
    }

    /// True iff every symbol of the CUDA 11 group resolved.
    #[must_use]
    pub fn has_extended_capability_set(&self) -> bool {
        self.has_capability(CapabilityGroup::Cuda11)
    }

    /// True iff the table is loaded and every member of `group` resolved.
    #[must_use]
    pub fn has_capability(&self, group: CapabilityGroup) -> bool {
        self.table().is_some_and(|table| table.has_capability(group))
    }

    /// Number of resolution passes this loader has executed (0 or 1).
    #[must_use]
    pub fn resolution_passes(&self) -> usize {
        self.passes.load(Ordering::Acquire)
    }

    fn open_library(&self) -> Result<Box<dyn SymbolSource>, LoadError> {
        let candidates = self.config.library_candidates();
        let mut last_error = String::from("no candidate library names configured");
        for name in candidates {
            tracing::debug!(library = %name, "attempting to load NVML");
            match self.opener.open(name) {
                Ok(source) => return Ok(source),
                Err(err) => {
                    tracing::debug!(library = %name, error = %err, "NVML candidate failed");
                    last_error = err;
                }
            }
        }
        Err(LoadError::LibraryNotFound {
            candidates: candidates.to_vec(),
            reason: last_error,
        })
    }

    fn load(&self) -> Result<SymbolTable, LoadError> {
        self.passes.fetch_add(1, Ordering::AcqRel);

        let result = self.open_library().and_then(|source| {
            // On failure `source` drops here and the library is closed; no
            // entry resolved from it has been published.
            let resolved =
                table::resolve(source.as_ref(), self.probe.as_ref(), self.config.gated_disabled())?;
            // Pinned for the rest of the process: the table hands out raw
            // code addresses from this library.
            let library: &'static dyn SymbolSource = Box::leak(source);
            Ok(SymbolTable::from_parts(
                library,
                resolved.entries,
                resolved.driver,
                resolved.gates,
            ))
        });

        match &result {
            Ok(table) => tracing::info!(
                library = table.library_name(),
                driver = ?table.driver_version(),
                cuda11 = table.has_capability(CapabilityGroup::Cuda11),
                "loaded NVML symbols"
            ),
            Err(err) => tracing::error!(error = %err, "NVML symbol load failed"),
        }
        result
    }
}

impl Default for NvmlLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl std::fmt::Debug for NvmlLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvmlLoader")
            .field("config", &self.config)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// Process-wide loader configured from the environment.
///
/// Created on first use. Callers that prefer an explicit context should hold
/// their own [`NvmlLoader`] instead.
pub fn global() -> &'static NvmlLoader {
    static GLOBAL: OnceLock<NvmlLoader> = OnceLock::new();
    GLOBAL.get_or_init(|| NvmlLoader::new(LoaderConfig::from_env()))
}
