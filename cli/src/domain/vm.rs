//! VM-level value types shared by lifecycle services and presentation.

use serde::Serialize;
use vmops_common::{ManagedObjectReference, PowerState};

use crate::domain::datastore::DatastorePath;

/// Number of progress steps a cold migration reports.
pub const MIGRATION_TOTAL_STEPS: u32 = 4;

/// A located VM together with the properties lifecycle decisions need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    pub name: String,
    pub moref: ManagedObjectReference,
}

/// Inventory entry for `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    pub name: String,
    pub power_state: PowerState,
}

/// Details for `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub name: String,
    pub power_state: PowerState,
    pub num_cpu: u64,
    pub memory_mb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmx_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_disk: Option<String>,
}

/// Outcome of one best-effort phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum PhaseResult {
    Ok,
    Skipped,
    Failed(String),
}

impl PhaseResult {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseResult::Failed(_))
    }
}

/// Per-phase outcome of a destroy. Lookup and power-off failures abort the
/// destroy and never produce a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyReport {
    pub name: String,
    /// `false` when no VM by that name existed.
    pub found: bool,
    pub powered_off: PhaseResult,
    pub unregister: PhaseResult,
    pub delete_files: PhaseResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl DestroyReport {
    #[must_use]
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            found: false,
            powered_off: PhaseResult::Skipped,
            unregister: PhaseResult::Skipped,
            delete_files: PhaseResult::Skipped,
            folder: None,
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.unregister.is_failed() || self.delete_files.is_failed()
    }
}

/// Properties read before tearing a VM down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownTarget {
    pub power_state: PowerState,
    pub vmx_path: Option<DatastorePath>,
}
