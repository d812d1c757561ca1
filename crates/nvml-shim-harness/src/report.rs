//! Availability report for a loaded symbol table.

use serde::{Deserialize, Serialize};

use nvml_shim::{CapabilityGroup, LoadError, NvmlLoader, NvmlOp, Requirement, SymbolTable};

use crate::structured_log::{LogEntry, LogLevel, Outcome};

/// Gate decision for one capability group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub name: String,
    pub min_driver: String,
    /// `enabled`, `driver_too_old`, `driver_unknown` or `disabled`.
    pub gate: String,
    pub available: bool,
}

/// Resolution state of one bound entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    /// Owning capability group; `None` for required entries.
    pub group: Option<String>,
    pub present: bool,
}

/// What one load pass found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub library: String,
    pub driver_version: Option<String>,
    pub extended_capability_set: bool,
    pub groups: Vec<GroupReport>,
    pub symbols: Vec<SymbolReport>,
}

impl ProbeReport {
    /// Load (if not already) and describe the outcome.
    pub fn collect(nvml: &NvmlLoader) -> Result<Self, LoadError> {
        let table = nvml.ensure_loaded()?;
        Ok(Self::from_table(table))
    }

    #[must_use]
    pub fn from_table(table: &SymbolTable) -> Self {
        let groups = CapabilityGroup::ALL
            .into_iter()
            .map(|group| GroupReport {
                name: group.name().to_string(),
                min_driver: group.min_driver().to_string(),
                gate: table.gate(group).as_str().to_string(),
                available: table.has_capability(group),
            })
            .collect();

        let symbols = table
            .availability()
            .map(|(op, present)| SymbolReport {
                symbol: op.symbol().to_string(),
                group: group_of(op).map(|g| g.name().to_string()),
                present,
            })
            .collect();

        Self {
            library: table.library_name().to_string(),
            driver_version: table.driver_version().map(|v| v.to_string()),
            extended_capability_set: table.has_capability(CapabilityGroup::Cuda11),
            groups,
            symbols,
        }
    }

    /// Render the report as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render the report as aligned plain text.
    #[must_use]
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("library:  {}\n", self.library));
        out.push_str(&format!(
            "driver:   {}\n",
            self.driver_version.as_deref().unwrap_or("unknown")
        ));
        out.push_str(&format!(
            "extended: {}\n\n",
            if self.extended_capability_set { "yes" } else { "no" }
        ));

        for group in &self.groups {
            out.push_str(&format!(
                "group {} (>= {}): {}\n",
                group.name, group.min_driver, group.gate
            ));
        }
        out.push('\n');

        let width = self.symbols.iter().map(|s| s.symbol.len()).max().unwrap_or(0);
        for s in &self.symbols {
            let state = if s.present { "present" } else { "absent" };
            let group = s.group.as_deref().unwrap_or("required");
            out.push_str(&format!("{:<width$}  {:<8}  {state}\n", s.symbol, group));
        }
        out
    }

    /// JSONL records: one `load`, one per group, one per symbol. Trace IDs
    /// are left for the emitter to assign.
    #[must_use]
    pub fn log_entries(&self) -> Vec<LogEntry> {
        let base = |level, event: &str| {
            let entry = LogEntry::new("", level, event).with_library(&self.library);
            match &self.driver_version {
                Some(driver) => entry.with_driver(driver),
                None => entry,
            }
        };

        let mut entries = vec![base(LogLevel::Info, "load").with_outcome(Outcome::Success)];
        for group in &self.groups {
            let outcome = if group.available { Outcome::Present } else { Outcome::Absent };
            entries.push(
                base(LogLevel::Info, "capability_group")
                    .with_group(&group.name)
                    .with_outcome(outcome)
                    .with_details(serde_json::json!({
                        "gate": group.gate,
                        "min_driver": group.min_driver,
                    })),
            );
        }
        for s in &self.symbols {
            let outcome = if s.present { Outcome::Present } else { Outcome::Absent };
            let mut entry = base(LogLevel::Debug, "symbol")
                .with_symbol(&s.symbol)
                .with_outcome(outcome);
            if let Some(group) = &s.group {
                entry = entry.with_group(group);
            }
            entries.push(entry);
        }
        entries
    }
}

/// JSONL record for a load that failed.
#[must_use]
pub fn load_failure_entry(err: &LoadError) -> LogEntry {
    let entry = LogEntry::new("", LogLevel::Error, "load")
        .with_outcome(Outcome::Error)
        .with_details(serde_json::json!({ "error": err.to_string() }));
    match err.symbol() {
        Some(symbol) => entry.with_symbol(symbol),
        None => entry,
    }
}

fn group_of(op: NvmlOp) -> Option<CapabilityGroup> {
    match op.requirement() {
        Requirement::Required => None,
        Requirement::Gated(group) => Some(group),
    }
}
