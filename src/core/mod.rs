//! Core types shared by every installer subsystem.
//!
//! - [`error`] - [`InstallerError`], [`ErrorContext`] and [`user_friendly_error`]
//! - [`ValidationReport`] - the `(ok, reasons)` result of prerequisite,
//!   batch and post-install validation

pub mod error;

pub use error::{ErrorContext, InstallerError, user_friendly_error};

use std::fmt;

/// Outcome of a validation pass: empty means valid.
///
/// Validation never short-circuits: every check runs and every failure is
/// recorded, so callers can report all problems at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    reasons: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    /// Record `reason` when `condition` is false.
    pub fn check(&mut self, condition: bool, reason: impl FnOnce() -> String) {
        if !condition {
            self.reasons.push(reason());
        }
    }

    /// Append every reason from another report.
    pub fn merge(&mut self, other: ValidationReport) {
        self.reasons.extend(other.reasons);
    }

    pub fn is_ok(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn into_reasons(self) -> Vec<String> {
        self.reasons
    }

    /// Convert into an error naming `component` if any reason was recorded.
    pub fn into_result(self, component: &str) -> Result<(), InstallerError> {
        if self.reasons.is_empty() {
            Ok(())
        } else {
            Err(InstallerError::ValidationFailed {
                component: component.to_string(),
                reasons: self.reasons,
            })
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            return write!(f, "ok");
        }
        for (i, reason) in self.reasons.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {reason}")?;
        }
        Ok(())
    }
}

impl From<Vec<String>> for ValidationReport {
    fn from(reasons: Vec<String>) -> Self {
        Self {
            reasons,
        }
    }
}
