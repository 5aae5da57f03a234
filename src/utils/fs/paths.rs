//! Path utilities for normalization and expansion.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path: drops `.` and resolves `..` against the
/// preceding component. Does not touch the filesystem.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if components.is_empty() {
                    components.push(component);
                }
            }
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// Makes `path` absolute against the current directory and normalizes it.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().context("Failed to read current directory")?.join(path)
    };
    Ok(normalize_path(&joined))
}

/// Canonicalizes the nearest existing ancestor of `path` and re-appends the
/// remaining components, so symlinks are resolved even for paths that do not
/// exist yet.
pub fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf> {
    let normalized = absolutize(path)?;
    let mut existing = normalized.as_path();
    let mut rest: Vec<&std::ffi::OsStr> = Vec::new();

    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }

    let mut resolved = existing
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", existing.display()))?;
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    Ok(strip_verbatim(resolved))
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path(input: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(input).with_context(|| format!("Failed to expand path: {input}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Forward-slash form of a relative path, used as a stable storage key.
#[must_use]
pub fn normalize_path_for_storage<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

#[cfg(windows)]
fn strip_verbatim(path: PathBuf) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix(r"\\?\") {
        Some(stripped) if !stripped.starts_with("UNC\\") => PathBuf::from(stripped),
        _ => path,
    }
}

#[cfg(not(windows))]
fn strip_verbatim(path: PathBuf) -> PathBuf {
    path
}
