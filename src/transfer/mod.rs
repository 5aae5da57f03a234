//! File Transfer: the only layer that writes component files.
//!
//! Every write is checked against the install root with
//! [`crate::security::ensure_within_root`] and, once it succeeds, recorded
//! twice: an [`Inventory`] entry (ownership) and an integrity hash in the
//! [`MetadataStore`] (drift detection).
//!
//! Two write strategies exist:
//!
//! - direct: each file is copied into place as soon as it is requested
//! - staged ([`StagedBatch`]): a component's files are written under
//!   `.crew/staging/` and renamed into place only after every one of them was
//!   written successfully

pub mod inventory;
mod staged;

pub use inventory::{EntryKind, Inventory, InventoryDocument, InventoryEntry};
pub use staged::StagedBatch;

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::constants::{MERGE_MARKER, MERGEABLE_FILES};
use crate::layout::InstallLayout;
use crate::metadata::{MetadataStore, infer_component};
use crate::security::ensure_within_root;
use crate::utils::fs::{
    atomic_write, ensure_dir, ensure_parent_dir, prefixed_checksum, remove_dir_if_empty,
};

/// How a merge-sensitive file was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Destination did not exist.
    Created,
    /// New content appended after the existing content.
    Merged,
    /// Destination replaced (`overwrite`, or not a merge-sensitive file).
    Replaced,
    /// Destination already held exactly the new content.
    Unchanged,
}

/// Whether `path` names a file that is merged rather than overwritten.
pub fn is_mergeable(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|name| MERGEABLE_FILES.contains(&name))
}

/// Copies `src` to `dst`, creating parent directories and carrying over the
/// source's permission bits. Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    ensure_parent_dir(dst)?;

    let mut reader = fs::File::open(src)
        .with_context(|| format!("Failed to open source file: {}", src.display()))?;
    let mut writer = fs::File::create(dst)
        .with_context(|| format!("Failed to create destination file: {}", dst.display()))?;
    let bytes = io::copy(&mut reader, &mut writer)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;

    let permissions = fs::metadata(src)
        .with_context(|| format!("Failed to read permissions of: {}", src.display()))?
        .permissions();
    fs::set_permissions(dst, permissions)
        .with_context(|| format!("Failed to set permissions on: {}", dst.display()))?;

    trace!(src = %src.display(), dst = %dst.display(), bytes, "Copied file");
    Ok(bytes)
}

/// Content a merge-sensitive file should end up with, or `None` when the
/// destination already holds exactly `new_content`.
///
/// Without `overwrite` an existing destination keeps its content and gets
/// the new content appended after a marker comment.
pub(crate) fn merged_content(dst: &Path, new_content: &[u8], overwrite: bool) -> Result<Option<(Vec<u8>, MergeOutcome)>> {
    if !dst.exists() {
        return Ok(Some((new_content.to_vec(), MergeOutcome::Created)));
    }
    if overwrite {
        return Ok(Some((new_content.to_vec(), MergeOutcome::Replaced)));
    }

    let existing =
        fs::read(dst).with_context(|| format!("Failed to read existing file: {}", dst.display()))?;
    if existing == new_content {
        return Ok(None);
    }

    let mut merged = existing;
    while merged.last() == Some(&b'\n') {
        merged.pop();
    }
    let marker = format!(
        "\n\n{MERGE_MARKER} (merged {}) -->\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    merged.extend_from_slice(marker.as_bytes());
    merged.extend_from_slice(new_content);
    Ok(Some((merged, MergeOutcome::Merged)))
}

/// Removes empty directories below `dir`, deepest first.
fn prune_empty_dirs(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            remove_dir_if_empty(entry.path())?;
        }
    }
    Ok(())
}

/// Tracked file operations below one install root.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    layout: InstallLayout,
    store: Arc<MetadataStore>,
    inventory: Arc<Inventory>,
}

impl FileTransfer {
    pub fn new(store: Arc<MetadataStore>, inventory: Arc<Inventory>) -> Self {
        Self {
            layout: store.layout().clone(),
            store,
            inventory,
        }
    }

    pub fn install_root(&self) -> &Path {
        self.layout.root()
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub(crate) fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Path of `target` relative to the install root.
    pub fn relative_path(&self, target: &Path) -> Result<PathBuf> {
        self.layout.relative(target).map(Path::to_path_buf).ok_or_else(|| {
            anyhow::anyhow!(
                "Path {} is outside the install root {}",
                target.display(),
                self.layout.root().display()
            )
        })
    }

    /// Records a written file as owned by `component` and stores its hash.
    pub(crate) fn track_files(&self, targets: &[PathBuf], component: &str) -> Result<()> {
        let mut inventory_paths = Vec::with_capacity(targets.len());
        let mut hashes = Vec::with_capacity(targets.len());
        for target in targets {
            let relative = self.relative_path(target)?;
            let size = fs::metadata(target).ok().map(|m| m.len());
            hashes.push((relative.clone(), prefixed_checksum(target)?, size));
            inventory_paths.push((relative, EntryKind::File));
        }
        self.inventory.record_many(&inventory_paths, component)?;
        self.store.record_file_hashes(&hashes)
    }

    fn owner_of(&self, target: &Path) -> Result<String> {
        let relative = self.relative_path(target)?;
        Ok(infer_component(&relative.to_string_lossy()).to_string())
    }

    /// Copies one file and records one inventory entry plus one integrity
    /// record, both keyed by the path relative to the install root.
    pub fn copy_file_with_inventory(&self, src: &Path, dst: &Path) -> Result<u64> {
        ensure_within_root(dst, self.layout.root())?;
        let bytes = copy_file(src, dst)?;
        self.track_files(&[dst.to_path_buf()], &self.owner_of(dst)?)?;
        Ok(bytes)
    }

    /// Copies a merge-sensitive file.
    ///
    /// An existing destination keeps its content and gets the new content
    /// appended after a `<!-- crew framework content (merged <time>) -->`
    /// marker, unless `overwrite` is set. Names not listed as merge-sensitive
    /// are copied normally.
    pub fn copy_file_with_merge(&self, src: &Path, dst: &Path, overwrite: bool) -> Result<MergeOutcome> {
        if !is_mergeable(dst) {
            let existed = dst.exists();
            self.copy_file_with_inventory(src, dst)?;
            return Ok(if existed { MergeOutcome::Replaced } else { MergeOutcome::Created });
        }

        ensure_within_root(dst, self.layout.root())?;
        let new_content =
            fs::read(src).with_context(|| format!("Failed to read source file: {}", src.display()))?;

        let outcome = match merged_content(dst, &new_content, overwrite)? {
            Some((content, outcome)) => {
                atomic_write(dst, &content)?;
                outcome
            }
            None => MergeOutcome::Unchanged,
        };
        debug!(dst = %dst.display(), ?outcome, "Wrote merge-sensitive file");

        self.track_files(&[dst.to_path_buf()], &self.owner_of(dst)?)?;
        Ok(outcome)
    }

    /// Creates `dir` if needed and records it, whether or not it pre-existed.
    pub fn ensure_directory_with_inventory(&self, dir: &Path, component: &str) -> Result<()> {
        ensure_within_root(dir, self.layout.root())?;
        ensure_dir(dir)?;
        let relative = self.relative_path(dir)?;
        if relative.as_os_str().is_empty() {
            // The root itself is never owned by a component
            return Ok(());
        }
        self.inventory.record(&relative, EntryKind::Directory, component)
    }

    /// Recursively copies `src` into `dst` through the tracked primitives.
    ///
    /// Returns the number of files copied.
    pub fn copy_directory(&self, src: &Path, dst: &Path, component: &str) -> Result<usize> {
        let mut copied = 0;
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to read source directory: {}", src.display()))?;
            let relative = entry.path().strip_prefix(src)?;
            let target = if relative.as_os_str().is_empty() {
                dst.to_path_buf()
            } else {
                dst.join(relative)
            };

            if entry.file_type().is_dir() {
                self.ensure_directory_with_inventory(&target, component)?;
            } else if entry.file_type().is_file() {
                ensure_within_root(&target, self.layout.root())?;
                copy_file(entry.path(), &target)?;
                self.track_files(&[target], component)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Deletes a tracked file and forgets its inventory and integrity
    /// records. Returns whether a file was deleted.
    pub fn remove_file_with_inventory(&self, path: &Path) -> Result<bool> {
        ensure_within_root(path, self.layout.root())?;
        let relative = self.relative_path(path)?;

        let removed = match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove file: {}", path.display()));
            }
        };

        self.inventory.remove(&relative)?;
        self.store.remove_file_hashes(&[relative])?;
        Ok(removed)
    }

    /// Removes everything the inventory attributes to `component`.
    ///
    /// Files go first, then directories deepest-first and only when empty.
    /// Paths for which `keep` returns true are left alone.
    pub fn remove_tracked(&self, component: &str, keep: impl Fn(&str) -> bool) -> Result<usize> {
        let entries = self.inventory.entries_for(component)?;
        let mut removed = 0;

        for (relative, entry) in &entries {
            if entry.kind == EntryKind::File && !keep(relative) {
                if self.remove_file_with_inventory(&self.layout.root().join(relative))? {
                    removed += 1;
                }
            }
        }

        let mut dirs: Vec<&String> = entries
            .iter()
            .filter(|(relative, entry)| entry.kind == EntryKind::Directory && !keep(relative))
            .map(|(relative, _)| relative)
            .collect();
        dirs.sort_by_key(|relative| std::cmp::Reverse(relative.matches('/').count()));

        for relative in dirs {
            let dir = self.layout.root().join(relative);
            prune_empty_dirs(&dir)?;
            if remove_dir_if_empty(&dir)? || !dir.exists() {
                self.inventory.remove(Path::new(relative))?;
            } else {
                debug!(dir = %dir.display(), "Keeping non-empty directory");
            }
        }

        Ok(removed)
    }

    /// Opens a staged batch for `component`.
    pub fn stage(&self, component: &str) -> Result<StagedBatch<'_>> {
        StagedBatch::new(self, component)
    }
}
