//! All-or-nothing commit of one component's files.
//!
//! Files are first written to `.crew/staging/<component>-<timestamp>/`,
//! mirroring their final layout. [`StagedBatch::commit`] renames them into
//! place only when no write failed; dropping an uncommitted batch deletes the
//! staging directory and leaves the install root untouched.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{FileTransfer, MergeOutcome, copy_file, is_mergeable, merged_content};
use crate::security::ensure_within_root;
use crate::utils::fs::{ensure_parent_dir, remove_dir_all};

#[derive(Debug)]
struct StagedFile {
    staged: PathBuf,
    target: PathBuf,
}

/// Files of one component waiting to be committed together.
#[derive(Debug)]
pub struct StagedBatch<'a> {
    transfer: &'a FileTransfer,
    component: String,
    dir: PathBuf,
    files: Vec<StagedFile>,
    unchanged: Vec<PathBuf>,
    finished: bool,
}

impl<'a> StagedBatch<'a> {
    pub(super) fn new(transfer: &'a FileTransfer, component: &str) -> Result<Self> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%6f");
        let dir = transfer.layout().staging_dir().join(format!("{component}-{stamp}"));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create staging directory: {}", dir.display()))?;
        debug!(component, dir = %dir.display(), "Opened staging batch");

        Ok(Self {
            transfer,
            component: component.to_string(),
            dir,
            files: Vec::new(),
            unchanged: Vec::new(),
            finished: false,
        })
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn staging_dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files staged so far.
    pub fn len(&self) -> usize {
        self.files.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn staged_path(&self, target: &Path) -> Result<PathBuf> {
        Ok(self.dir.join(self.transfer.relative_path(target)?))
    }

    /// Stages a plain copy of `src` destined for `dst`.
    pub fn stage_copy(&mut self, src: &Path, dst: &Path) -> Result<()> {
        ensure_within_root(dst, self.transfer.install_root())?;
        let staged = self.staged_path(dst)?;
        copy_file(src, &staged)?;
        self.files.push(StagedFile {
            staged,
            target: dst.to_path_buf(),
        });
        Ok(())
    }

    /// Stages `src` with the merge rules of
    /// [`FileTransfer::copy_file_with_merge`], computed against the current
    /// destination.
    pub fn stage_merge(&mut self, src: &Path, dst: &Path, overwrite: bool) -> Result<MergeOutcome> {
        if !is_mergeable(dst) {
            let existed = dst.exists();
            self.stage_copy(src, dst)?;
            return Ok(if existed { MergeOutcome::Replaced } else { MergeOutcome::Created });
        }

        ensure_within_root(dst, self.transfer.install_root())?;
        let new_content =
            fs::read(src).with_context(|| format!("Failed to read source file: {}", src.display()))?;

        match merged_content(dst, &new_content, overwrite)? {
            Some((content, outcome)) => {
                let staged = self.staged_path(dst)?;
                ensure_parent_dir(&staged)?;
                fs::write(&staged, content)
                    .with_context(|| format!("Failed to write staged file: {}", staged.display()))?;
                self.files.push(StagedFile {
                    staged,
                    target: dst.to_path_buf(),
                });
                Ok(outcome)
            }
            None => {
                self.unchanged.push(dst.to_path_buf());
                Ok(MergeOutcome::Unchanged)
            }
        }
    }

    /// Moves every staged file into place, then records them.
    ///
    /// Returns the number of files committed.
    pub fn commit(mut self) -> Result<usize> {
        self.check_unique_targets()?;
        let mut committed = Vec::with_capacity(self.files.len() + self.unchanged.len());

        for file in &self.files {
            ensure_parent_dir(&file.target)?;
            if let Err(rename_error) = fs::rename(&file.staged, &file.target) {
                // Staging may sit on another filesystem than a symlinked target
                debug!(error = %rename_error, "Rename failed, copying staged file instead");
                copy_file(&file.staged, &file.target).with_context(|| {
                    format!(
                        "Failed to commit {} ({} of {} files already committed)",
                        file.target.display(),
                        committed.len(),
                        self.files.len()
                    )
                })?;
            }
            committed.push(file.target.clone());
        }
        committed.extend(self.unchanged.iter().cloned());

        self.transfer.track_files(&committed, &self.component)?;
        self.finished = true;
        self.cleanup();

        debug!(component = %self.component, files = committed.len(), "Committed staging batch");
        Ok(committed.len())
    }

    /// Discards every staged file.
    pub fn abort(mut self) {
        self.finished = true;
        self.cleanup();
        debug!(component = %self.component, "Aborted staging batch");
    }

    fn cleanup(&self) {
        if let Err(e) = remove_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Failed to remove staging directory");
        }
        if let Some(parent) = self.dir.parent() {
            let _ = crate::utils::fs::remove_dir_if_empty(parent);
        }
    }

    /// Fails if a target was staged twice; the second write would win silently.
    fn check_unique_targets(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for target in self.files.iter().map(|f| &f.target).chain(self.unchanged.iter()) {
            if !seen.insert(target) {
                bail!("File {} was staged twice", target.display());
            }
        }
        Ok(())
    }
}

impl Drop for StagedBatch<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cleanup();
        }
    }
}
