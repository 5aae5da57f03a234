//! Integrity records and drift scans.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use tracing::{debug, warn};

use super::document::{FileHashRecord, IntegrityState};
use crate::utils::fs::{calculate_checksum, normalize_checksum};

/// Owning component inferred from a path relative to the install root.
///
/// `hooks/`, `agents/`, `commands/` and `mcp/` map to their component, a
/// file directly at the root belongs to `core`, anything else is `unknown`.
pub fn infer_component(relative_path: &str) -> &'static str {
    let normalized = relative_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./");
    match trimmed.split_once('/') {
        None => "core",
        Some(("hooks", _)) => "hooks",
        Some(("agents", _)) => "agents",
        Some(("commands", _)) => "commands",
        Some(("mcp", _)) => "mcp",
        Some(_) => "unknown",
    }
}

/// Per-file outcome of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Clean,
    Modified,
    Missing,
    /// Present but unreadable, or the stored hash is malformed.
    Corrupted,
}

/// Summary of one [`scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub total: usize,
    pub clean: usize,
    pub modified: Vec<String>,
    pub missing: Vec<String>,
    pub corrupted: Vec<String>,
}

impl IntegrityReport {
    /// `clean`, `modified` (drift only) or `degraded` (files missing or unreadable).
    pub fn status(&self) -> &'static str {
        if !self.missing.is_empty() || !self.corrupted.is_empty() {
            "degraded"
        } else if !self.modified.is_empty() {
            "modified"
        } else {
            "clean"
        }
    }

    pub fn is_clean(&self) -> bool {
        self.status() == "clean"
    }
}

fn is_valid_digest(hex: &str) -> bool {
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Recomputes one recorded hash.
pub fn check_record(install_root: &Path, relative_path: &str, record: &FileHashRecord) -> FileStatus {
    let path = install_root.join(relative_path);
    if !path.exists() {
        return FileStatus::Missing;
    }

    let expected = normalize_checksum(&record.hash);
    if !is_valid_digest(&expected) {
        return FileStatus::Corrupted;
    }

    match calculate_checksum(&path) {
        Ok(actual) if actual == expected => FileStatus::Clean,
        Ok(_) => FileStatus::Modified,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to hash tracked file");
            FileStatus::Corrupted
        }
    }
}

/// Checks every recorded file and writes the counts back into `state`.
pub fn scan(install_root: &Path, state: &mut IntegrityState) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();

    for (relative_path, record) in state.file_hashes() {
        report.total += 1;
        match check_record(install_root, relative_path, record) {
            FileStatus::Clean => report.clean += 1,
            FileStatus::Modified => report.modified.push(relative_path.clone()),
            FileStatus::Missing => report.missing.push(relative_path.clone()),
            FileStatus::Corrupted => report.corrupted.push(relative_path.clone()),
        }
    }

    state.last_scan = Some(Utc::now().to_rfc3339());
    state.total_files = Some(report.total);
    state.clean_files = Some(report.clean);
    state.modified_files = Some(report.modified.len());
    state.missing_files = Some(report.missing.len());
    state.corrupted_files = Some(report.corrupted.len());
    state.status = Some(report.status().to_string());

    debug!(
        total = report.total,
        clean = report.clean,
        modified = report.modified.len(),
        missing = report.missing.len(),
        corrupted = report.corrupted.len(),
        "Integrity scan finished"
    );
    Ok(report)
}
