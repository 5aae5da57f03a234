//! Trial-based permission probes.
//!
//! Metadata bits lie on network mounts, ACL-controlled volumes and read-only
//! bind mounts, so read and write are checked by actually opening and
//! creating files.

use anyhow::Result;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::trace;

/// A capability probed by [`check_permissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Execute,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// Returns the subset of `requested` that the current user lacks on `path`.
///
/// - read: open the file, or list the directory
/// - write: create and delete a probe file in the directory; open a file
///   for appending
/// - execute: executable bit (search bit for directories); always granted
///   on Windows
///
/// A path that does not exist yet is judged by its nearest existing parent,
/// since that is where it would be created.
pub fn check_permissions(path: &Path, requested: &[Permission]) -> Result<Vec<Permission>> {
    if !path.exists() {
        return match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => check_permissions(parent, requested),
            _ => Ok(requested.to_vec()),
        };
    }

    let mut missing = Vec::new();
    for permission in requested {
        let granted = match permission {
            Permission::Read => probe_read(path),
            Permission::Write => probe_write(path),
            Permission::Execute => probe_execute(path),
        };
        trace!(path = %path.display(), %permission, granted, "Permission probe");
        if !granted {
            missing.push(*permission);
        }
    }
    Ok(missing)
}

fn probe_read(path: &Path) -> bool {
    if path.is_dir() {
        fs::read_dir(path).is_ok()
    } else {
        fs::File::open(path).is_ok()
    }
}

fn probe_write(path: &Path) -> bool {
    if path.is_dir() {
        // Created and removed on drop
        tempfile::Builder::new().prefix(".crew-probe-").tempfile_in(path).is_ok()
    } else {
        fs::OpenOptions::new().append(true).open(path).is_ok()
    }
}

#[cfg(unix)]
fn probe_execute(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn probe_execute(path: &Path) -> bool {
    path.exists()
}
