//! Error handling for the installer
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** for the failure modes callers branch on
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Validation**: [`InstallerError::ValidationFailed`], [`InstallerError::DangerousPath`],
//!   [`InstallerError::UnsafePath`], [`InstallerError::PermissionDenied`]
//! - **Dependencies**: [`InstallerError::ComponentNotFound`],
//!   [`InstallerError::CircularDependency`], [`InstallerError::MissingDependency`]
//! - **Conflicts**: [`InstallerError::Conflict`] (only raised by the orchestrator;
//!   the registry reports conflicts as data)
//! - **Copy**: [`InstallerError::CopyFailed`] carries `succeeded/total`
//! - **Integrity**: [`InstallerError::ChecksumMismatch`]
//! - **Metadata**: [`InstallerError::MetadataCorrupt`]
//!
//! Library functions return [`anyhow::Result`] and attach these variants as the
//! root error so that [`user_friendly_error`] can downcast them at the CLI
//! boundary.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crew_installer::core::{InstallerError, user_friendly_error};
//!
//! let err = anyhow::Error::from(InstallerError::CircularDependency {
//!     chain: "a → b → a".to_string(),
//! });
//! let ctx = user_friendly_error(err);
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for installer operations.
///
/// Each variant represents one failure mode from the install pipeline and
/// carries enough context (component, path, counts) to render a useful
/// message without the surrounding call stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallerError {
    /// Prerequisite or batch validation failed before any mutation.
    #[error("Validation failed for '{component}': {}", reasons.join("; "))]
    ValidationFailed {
        /// Component (or operation) that failed validation
        component: String,
        /// Every reason collected during validation
        reasons: Vec<String>,
    },

    /// Install target is, or lives inside, a protected system directory.
    #[error("Refusing to use protected system path as install target: {path}")]
    DangerousPath {
        /// The offending path as given
        path: String,
    },

    /// Path or file name contains traversal or suspicious characters.
    #[error("Unsafe path '{path}': {reason}")]
    UnsafePath {
        /// The offending path or file name
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// A required permission is missing.
    #[error("Permission denied: {operation} on {path}")]
    PermissionDenied {
        /// Capability that was probed (read, write, execute)
        operation: String,
        /// Path that was probed
        path: String,
    },

    /// Requested component has no registered factory.
    #[error("Component '{name}' is not registered")]
    ComponentNotFound {
        /// Unknown component name
        name: String,
        /// Closest registered name, if any is similar
        suggestion: Option<String>,
    },

    /// Two factories registered under the same name.
    #[error("Component '{name}' is already registered")]
    DuplicateComponent {
        /// Duplicated component name
        name: String,
    },

    /// Dependency graph contains a cycle.
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// Cycle rendered as `a → b → a`
        chain: String,
    },

    /// A declared dependency is not registered.
    #[error("Component '{name}' depends on unregistered component '{dependency}'")]
    MissingDependency {
        /// Component declaring the dependency
        name: String,
        /// The missing dependency
        dependency: String,
    },

    /// Selected components declare mutual conflicts.
    #[error("Conflicting components selected: {}", conflicts.join("; "))]
    Conflict {
        /// Human-readable conflict descriptions
        conflicts: Vec<String>,
    },

    /// Not every file of a component could be copied.
    #[error("Installed {succeeded}/{total} files for component '{component}'")]
    CopyFailed {
        /// Component being installed
        component: String,
        /// Files copied successfully
        succeeded: usize,
        /// Files attempted
        total: usize,
    },

    /// File content does not match the recorded hash.
    #[error("Checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File that was checked
        path: String,
        /// Recorded hash
        expected: String,
        /// Hash computed now
        actual: String,
    },

    /// A metadata or settings document could not be parsed.
    #[error("Metadata file '{path}' is corrupt: {reason}")]
    MetadataCorrupt {
        /// Document path
        path: String,
        /// Parser message
        reason: String,
    },

    /// Uninstall would break an installed component that depends on this one.
    #[error("Component '{name}' is required by installed component(s): {}", dependents.join(", "))]
    HasDependents {
        /// Component being removed
        name: String,
        /// Installed components depending on it
        dependents: Vec<String>,
    },

    /// An external tool requirement is not satisfied.
    #[error("Requirement not met for '{tool}' (need >= {required}): {reason}")]
    RequirementNotMet {
        /// Tool name, e.g. `node`
        tool: String,
        /// Minimum version
        required: String,
        /// What was found instead
        reason: String,
    },

    /// Installer configuration file problem.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

/// Error wrapper that adds details and a suggestion for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: InstallerError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: InstallerError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions where the
/// failure mode is recognized.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(installer_error) = error.downcast_ref::<InstallerError>() {
        return create_error_context(installer_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(InstallerError::PermissionDenied {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check ownership of the install directory or choose another --install-dir")
                .with_details(error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(InstallerError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check that the source directory contains the framework files");
            }
            _ => {}
        }
    }

    if let Some(json_error) = error.downcast_ref::<serde_json::Error>() {
        return ErrorContext::new(InstallerError::MetadataCorrupt {
            path: "unknown".to_string(),
            reason: json_error.to_string(),
        })
        .with_suggestion("Restore the file from .crew/backups or delete it to start fresh");
    }

    // Generic error - include the full error chain
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(InstallerError::Other {
        message,
    })
}

fn create_error_context(error: InstallerError) -> ErrorContext {
    match &error {
        InstallerError::DangerousPath {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Install into a project or home directory such as ~/.claude")
            .with_details("System directories are never valid install targets"),
        InstallerError::ComponentNotFound {
            suggestion: Some(candidate),
            ..
        } => {
            let hint = format!("Did you mean '{candidate}'? Run 'crew list' to see components");
            ErrorContext::new(error).with_suggestion(hint)
        }
        InstallerError::ComponentNotFound {
            ..
        } => ErrorContext::new(error).with_suggestion("Run 'crew list' to see available components"),
        InstallerError::CircularDependency {
            ..
        } => ErrorContext::new(error)
            .with_details("Component dependencies must form an acyclic graph; no install plan was produced"),
        InstallerError::Conflict {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Deselect one side of each conflict or pass --force to install anyway"),
        InstallerError::CopyFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("With staged commits enabled (the default) no file of this component was committed")
            .with_suggestion("Re-run with --verbose to see which file failed"),
        InstallerError::HasDependents {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Uninstall the dependent components too, or pass --force"),
        InstallerError::MetadataCorrupt {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Restore the file from .crew/backups or delete it to start fresh"),
        InstallerError::RequirementNotMet {
            tool,
            ..
        } => {
            let hint = format!("Install or upgrade '{tool}' and make sure it is on PATH");
            ErrorContext::new(error).with_suggestion(hint)
        }
        _ => ErrorContext::new(error),
    }
}
