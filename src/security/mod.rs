//! Security validation for install targets and component files
//!
//! Every filesystem mutation the installer performs is gated by a check in
//! this module:
//!
//! - [`validate_installation_target`] - the install root itself
//! - [`validate_filename`] / [`validate_component_files`] - each component file,
//!   as a batch, before anything in the batch is copied
//! - [`ensure_within_root`] - every resolved target path stays inside the
//!   install root (symlinks resolved)
//! - [`check_permissions`] - trial read/write/execute probes
//! - [`check_file_integrity`] - SHA-256 comparison (a query, never a mutation)
//!
//! The fixed deny-lists in [`crate::constants`] are a floor: after they pass,
//! paths are canonicalized through their nearest existing ancestor and checked
//! again, and file targets must be contained in the install root.

mod permissions;

pub use permissions::{Permission, check_permissions};

use anyhow::Result;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::constants::{
    INVALID_FILENAME_CHARS, PROTECTED_ROOTS, PROTECTED_TREES, SHELL_METACHARACTERS,
    SUSPICIOUS_PATH_SUBSTRINGS,
};
use crate::core::{InstallerError, ValidationReport};
use crate::utils::fs::{
    absolutize, calculate_checksum, canonicalize_existing_prefix, normalize_checksum,
};

/// Validates and resolves an install target.
///
/// Returns the absolute, cleaned, symlink-resolved path on success.
///
/// Rejected:
/// - input with a `..` component or an unexpanded `~`
/// - input containing shell metacharacters
/// - a protected root (`/`, `/home`, `C:\`, ...) exactly
/// - anything equal to or nested under a protected tree (`/etc`, `/usr`, ...)
///
/// # Examples
///
/// ```rust,no_run
/// use crew_installer::security::validate_installation_target;
/// use std::path::Path;
///
/// assert!(validate_installation_target(Path::new("/etc")).is_err());
/// assert!(validate_installation_target(Path::new("../x")).is_err());
/// ```
pub fn validate_installation_target(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();

    if raw.trim().is_empty() {
        return Err(unsafe_path(&raw, "empty path").into());
    }
    if let Some(ch) = raw.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(unsafe_path(&raw, &format!("contains shell metacharacter {ch:?}")).into());
    }
    ensure_no_suspicious_substring(&raw, &raw)?;

    let cleaned = absolutize(path)?;
    ensure_no_suspicious_substring(&cleaned.to_string_lossy(), &raw)?;
    ensure_not_protected(&cleaned, &raw)?;

    let resolved = canonicalize_existing_prefix(&cleaned)?;
    ensure_not_protected(&resolved, &raw)?;

    debug!(target = %resolved.display(), "Install target validated");
    Ok(resolved)
}

/// Whether `path` is a protected root or lies inside a protected tree.
#[must_use]
pub fn is_protected_path(path: &Path) -> bool {
    PROTECTED_ROOTS.iter().any(|root| paths_equal(path, Path::new(root)))
        || PROTECTED_TREES.iter().any(|tree| path_starts_with(path, Path::new(tree)))
}

fn ensure_no_suspicious_substring(candidate: &str, raw: &str) -> Result<()> {
    if let Some(pattern) = SUSPICIOUS_PATH_SUBSTRINGS.iter().find(|p| candidate.contains(*p)) {
        return Err(unsafe_path(raw, &format!("contains suspicious sequence {pattern:?}")).into());
    }
    Ok(())
}

fn ensure_not_protected(path: &Path, raw: &str) -> Result<(), InstallerError> {
    if is_protected_path(path) {
        return Err(InstallerError::DangerousPath {
            path: raw.to_string(),
        });
    }
    Ok(())
}

/// Validates a component-relative file name.
///
/// Names may contain `/`-separated subdirectories but no traversal, no
/// absolute prefix, and none of the suspicious characters.
pub fn validate_filename(name: &str) -> Result<(), InstallerError> {
    if name.trim().is_empty() {
        return Err(unsafe_path(name, "empty file name"));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| SHELL_METACHARACTERS.contains(c) || INVALID_FILENAME_CHARS.contains(c))
    {
        return Err(unsafe_path(name, &format!("contains suspicious character {ch:?}")));
    }
    if name.chars().any(char::is_control) {
        return Err(unsafe_path(name, "contains control characters"));
    }

    let path = Path::new(name);
    if path.is_absolute() || name.starts_with('/') {
        return Err(unsafe_path(name, "absolute paths are not allowed"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(unsafe_path(name, "contains parent directory reference (..)"));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path(name, "absolute paths are not allowed"));
            }
        }
    }
    Ok(())
}

/// Batch pre-flight for a component's files.
///
/// Every name is checked, every source must exist as a regular file, and
/// every target must resolve inside `target_dir`. All problems are collected;
/// callers treat a non-empty report as blocking the whole batch.
pub fn validate_component_files(
    names: &[String],
    source_dir: &Path,
    target_dir: &Path,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    for name in names {
        if let Err(e) = validate_filename(name) {
            report.fail(e.to_string());
            continue;
        }

        let source = source_dir.join(name);
        match fs::symlink_metadata(&source) {
            Ok(meta) if meta.file_type().is_file() => {}
            Ok(_) => report.fail(format!("Source is not a regular file: {}", source.display())),
            Err(_) => report.fail(format!("Source file not found: {}", source.display())),
        }

        let target = target_dir.join(name);
        if let Err(e) = ensure_within_root(&target, target_dir) {
            report.fail(e.to_string());
        }
    }

    report
}

/// Ensures `path` resolves inside `root` once symlinks are followed.
pub fn ensure_within_root(path: &Path, root: &Path) -> Result<()> {
    let resolved_root = canonicalize_existing_prefix(root)?;
    let resolved = canonicalize_existing_prefix(path)?;

    if !path_starts_with(&resolved, &resolved_root) {
        return Err(unsafe_path(
            &path.display().to_string(),
            &format!("escapes install root {}", root.display()),
        )
        .into());
    }
    if is_protected_path(&resolved) {
        return Err(InstallerError::DangerousPath {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(())
}

/// Compares a file's SHA-256 digest with `expected`.
///
/// `expected` may carry a `sha256:` prefix. Returns `Ok(false)` on mismatch;
/// errors only when the file cannot be read.
pub fn check_file_integrity(path: &Path, expected: &str) -> Result<bool> {
    let actual = calculate_checksum(path)?;
    Ok(actual == normalize_checksum(expected))
}

fn unsafe_path(path: &str, reason: &str) -> InstallerError {
    InstallerError::UnsafePath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(windows)]
fn path_starts_with(path: &Path, base: &Path) -> bool {
    let path = path.to_string_lossy().to_lowercase().replace('/', "\\");
    let base = base.to_string_lossy().to_lowercase().replace('/', "\\");
    let base = base.trim_end_matches('\\');
    path == base || path.starts_with(&format!("{base}\\"))
}

#[cfg(not(windows))]
fn path_starts_with(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

#[cfg(windows)]
fn paths_equal(a: &Path, b: &Path) -> bool {
    let a = a.to_string_lossy().to_lowercase().replace('/', "\\");
    let b = b.to_string_lossy().to_lowercase().replace('/', "\\");
    a.trim_end_matches('\\') == b.trim_end_matches('\\')
}

#[cfg(not(windows))]
fn paths_equal(a: &Path, b: &Path) -> bool {
    a == b
}
