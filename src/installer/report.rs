//! Plans and reports returned by the orchestrator.

use serde::Serialize;
use std::fmt;

use crate::component::InstallOutcome;
use crate::core::ValidationReport;
use crate::metadata::IntegrityReport;

/// What an install of a selection would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    /// Requested components plus dependencies, dependencies first.
    pub order: Vec<String>,
    /// `order` grouped into levels that may run concurrently.
    pub levels: Vec<Vec<String>>,
    /// Conflicts among `order`; non-empty aborts an install without `force`.
    pub conflicts: Vec<String>,
}

impl InstallPlan {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

impl fmt::Display for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.levels.iter().enumerate() {
            writeln!(f, "Level {}: {}", i + 1, level.join(", "))?;
        }
        for conflict in &self.conflicts {
            writeln!(f, "Conflict: {conflict}")?;
        }
        Ok(())
    }
}

/// Result of one install, update or uninstall run.
///
/// A run stops at the first failing level; components that never ran are
/// listed in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub succeeded: Vec<InstallOutcome>,
    /// Component name and error message.
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_names(&self) -> Vec<&str> {
        self.succeeded.iter().map(|o| o.component.as_str()).collect()
    }

    pub fn files_written(&self) -> usize {
        self.succeeded.iter().map(|o| o.files_written).sum()
    }

    pub fn files_removed(&self) -> usize {
        self.succeeded.iter().map(|o| o.files_removed).sum()
    }
}

/// Installed state of every known component, as shown by `crew list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub category: String,
    pub description: String,
    pub available_version: String,
    pub installed_version: Option<String>,
    pub dependencies: Vec<String>,
}

impl ComponentStatus {
    /// Installed at a version other than the one this installer ships.
    pub fn is_outdated(&self) -> bool {
        self.installed_version.as_ref().is_some_and(|v| v != &self.available_version)
    }
}

/// Result of `verify`: integrity scan plus per-component checks.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub integrity: IntegrityReport,
    pub components: Vec<(String, ValidationReport)>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.integrity.is_clean() && self.components.iter().all(|(_, report)| report.is_ok())
    }

    pub fn failing_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(_, report)| !report.is_ok())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
