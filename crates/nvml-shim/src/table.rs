//! The symbol table and the single resolution pass that fills it.
//!
//! Resolution builds the table in a local value and hands it out only when
//! every required entry (and every entry of each group whose gate passed) has
//! resolved. A failed pass leaves nothing behind.

use std::ffi::{CStr, c_void};
use std::ptr::NonNull;

use nvml_shim_core::status::UNKNOWN_ERROR_MESSAGE;
use nvml_shim_core::{CapabilityGroup, DriverVersion, LoadError, NvmlOp, NvmlReturn, Requirement};

use crate::ffi::FnErrorString;
use crate::probe::DriverVersionProbe;
use crate::source::SymbolSource;

type Entries = [Option<NonNull<c_void>>; NvmlOp::COUNT];

/// Outcome of evaluating one capability group's gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Driver meets the minimum; every member was resolved.
    Enabled,
    /// Driver is older than the minimum.
    DriverTooOld,
    /// The driver version could not be queried.
    DriverUnknown,
    /// Gated groups were switched off by configuration.
    Disabled,
}

impl GateOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::DriverTooOld => "driver_too_old",
            Self::DriverUnknown => "driver_unknown",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved entry points of one opened library. Immutable once built.
pub struct SymbolTable {
    entries: Entries,
    library: &'static dyn SymbolSource,
    driver: Option<DriverVersion>,
    gates: [GateOutcome; CapabilityGroup::COUNT],
}

// SAFETY: entries are code addresses inside a library that is never unloaded
// once the table exists; the table itself is never mutated after construction.
unsafe impl Send for SymbolTable {}
// SAFETY: see above.
unsafe impl Sync for SymbolTable {}

impl SymbolTable {
    /// Name of the library the table was resolved from.
    #[must_use]
    pub fn library_name(&self) -> &str {
        self.library.name()
    }

    /// Driver version seen by the gate, if it was queried and answered.
    #[must_use]
    pub fn driver_version(&self) -> Option<DriverVersion> {
        self.driver
    }

    /// Whether `op` resolved.
    #[must_use]
    pub fn contains(&self, op: NvmlOp) -> bool {
        self.entries[op.index()].is_some()
    }

    /// Raw address of `op`, or `None` for the null sentinel.
    #[must_use]
    pub fn address(&self, op: NvmlOp) -> Option<NonNull<c_void>> {
        self.entries[op.index()]
    }

    /// How the gate for `group` was decided.
    #[must_use]
    pub fn gate(&self, group: CapabilityGroup) -> GateOutcome {
        self.gates[group.index()]
    }

    /// True iff every member of `group` is present.
    #[must_use]
    pub fn has_capability(&self, group: CapabilityGroup) -> bool {
        group.members().all(|op| self.contains(op))
    }

    /// `(op, present)` for every bound operation, in resolution order.
    pub fn availability(&self) -> impl Iterator<Item = (NvmlOp, bool)> + '_ {
        NvmlOp::ALL.into_iter().map(|op| (op, self.contains(op)))
    }

    /// Typed view of an entry.
    ///
    /// # Safety
    ///
    /// `F` must be the function-pointer type of `op`'s native signature.
    #[inline]
    pub(crate) unsafe fn entry<F: Copy>(&self, op: NvmlOp) -> Option<F> {
        const { assert!(size_of::<F>() == size_of::<NonNull<c_void>>()) };
        self.entries[op.index()]
            // SAFETY: sizes match (checked above); the caller guarantees the type.
            .map(|addr| unsafe { std::mem::transmute_copy::<NonNull<c_void>, F>(&addr) })
    }

    /// Human-readable text for a native status, via the library's own
    /// `nvmlErrorString`. Falls back to `"unknown error"` when that entry is
    /// missing or returns null.
    #[must_use]
    pub fn error_string(&self, code: NvmlReturn) -> String {
        // SAFETY: `ErrorString` is bound with the `FnErrorString` signature.
        let Some(error_string) = (unsafe { self.entry::<FnErrorString>(NvmlOp::ErrorString) })
        else {
            return UNKNOWN_ERROR_MESSAGE.to_string();
        };
        // SAFETY: nvmlErrorString accepts any code and returns a static string or null.
        let text = unsafe { error_string(code) };
        if text.is_null() {
            return UNKNOWN_ERROR_MESSAGE.to_string();
        }
        // SAFETY: non-null results point at NUL-terminated static storage.
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }

    /// Build a table directly from a library and pre-resolved addresses.
    pub(crate) fn from_parts(
        library: &'static dyn SymbolSource,
        entries: Entries,
        driver: Option<DriverVersion>,
        gates: [GateOutcome; CapabilityGroup::COUNT],
    ) -> Self {
        Self {
            entries,
            library,
            driver,
            gates,
        }
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present: Vec<&str> = self
            .availability()
            .filter(|(_, present)| *present)
            .map(|(op, _)| op.symbol())
            .collect();
        f.debug_struct("SymbolTable")
            .field("library", &self.library.name())
            .field("driver", &self.driver)
            .field("present", &present)
            .finish()
    }
}

/// Entries resolved by one pass, before the library handle is pinned.
pub(crate) struct Resolved {
    pub(crate) entries: Entries,
    pub(crate) driver: Option<DriverVersion>,
    pub(crate) gates: [GateOutcome; CapabilityGroup::COUNT],
}

fn resolve_one(source: &dyn SymbolSource, op: NvmlOp) -> Result<NonNull<c_void>, LoadError> {
    source
        .lookup(op.c_symbol())
        .map_err(|reason| LoadError::SymbolNotFound {
            symbol: op.symbol(),
            reason,
        })
}

/// Run one resolution pass over `source`.
///
/// Required entries are resolved first; any miss aborts the pass. Each
/// capability group then consults the driver version (queried at most once
/// per pass). A group whose gate fails is left as null sentinels; a group
/// whose gate passes must resolve completely or the pass fails.
pub(crate) fn resolve(
    source: &dyn SymbolSource,
    probe: &dyn DriverVersionProbe,
    gated_disabled: bool,
) -> Result<Resolved, LoadError> {
    let mut entries: Entries = [None; NvmlOp::COUNT];

    for op in NvmlOp::required() {
        entries[op.index()] = Some(resolve_one(source, op)?);
    }

    let mut driver: Option<Option<DriverVersion>> = None;
    let mut gates = [GateOutcome::Disabled; CapabilityGroup::COUNT];

    for group in CapabilityGroup::ALL {
        let outcome = if gated_disabled {
            GateOutcome::Disabled
        } else {
            let version = *driver.get_or_insert_with(|| probe.driver_version());
            match version {
                None => GateOutcome::DriverUnknown,
                Some(v) if !v.satisfies(group.min_driver()) => GateOutcome::DriverTooOld,
                Some(_) => GateOutcome::Enabled,
            }
        };
        gates[group.index()] = outcome;

        if outcome == GateOutcome::Enabled {
            for op in group.members() {
                entries[op.index()] = Some(resolve_one(source, op)?);
            }
        } else {
            tracing::debug!(group = %group, ?outcome, min_driver = %group.min_driver(), "capability group unavailable");
        }
    }

    debug_assert!(
        NvmlOp::ALL
            .iter()
            .all(|op| op.requirement() != Requirement::Required || entries[op.index()].is_some())
    );

    Ok(Resolved {
        entries,
        driver: driver.flatten(),
        gates,
    })
}
