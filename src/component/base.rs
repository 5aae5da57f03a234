//! Lifecycle shared by every component variant.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use super::{ComponentContext, ComponentMetadata, FilePair, InstallConfig, InstallOutcome};
use crate::constants::USER_DATA_DIRS;
use crate::core::{InstallerError, ValidationReport};
use crate::security::{
    Permission, check_permissions, validate_component_files, validate_installation_target,
};
use crate::transfer::{EntryKind, is_mergeable};
use crate::utils::fs::normalize_path_for_storage;

/// Where a component's files come from and go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// Top-level files of `<source>/<dir>/`, installed at the root.
    RootFiles { dir: &'static str },
    /// Every file below `<source>/<dir>/`, installed below `<root>/<dir>/`.
    Subtree { dir: &'static str },
}

impl SourceLayout {
    fn source_dir(&self, source_root: &Path) -> PathBuf {
        match self {
            Self::RootFiles { dir } | Self::Subtree { dir } => source_root.join(dir),
        }
    }

    fn target_dir(&self, install_root: &Path) -> PathBuf {
        match self {
            Self::RootFiles { .. } => install_root.to_path_buf(),
            Self::Subtree { dir } => install_root.join(dir),
        }
    }
}

/// Metadata, bound context and file list of one component instance.
#[derive(Debug, Clone)]
pub struct ComponentBase {
    metadata: ComponentMetadata,
    ctx: ComponentContext,
    layout: SourceLayout,
    source_dir: PathBuf,
    target_dir: PathBuf,
    files: Vec<FilePair>,
}

impl ComponentBase {
    /// Binds `metadata` to `ctx` and lists the component's files.
    ///
    /// A missing source directory yields an empty file list; it is reported
    /// by [`ComponentBase::validate_prerequisites`]. A placeholder context
    /// lists nothing and reads nothing from disk.
    pub fn new(metadata: ComponentMetadata, ctx: &ComponentContext, layout: SourceLayout) -> Self {
        let source_dir = layout.source_dir(ctx.source_root());
        let target_dir = layout.target_dir(ctx.install_root());
        let files = if ctx.is_placeholder() {
            Vec::new()
        } else {
            discover_files(&source_dir, &target_dir, layout)
        };
        Self {
            metadata,
            ctx: ctx.clone(),
            layout,
            source_dir,
            target_dir,
            files,
        }
    }

    pub fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    pub fn ctx(&self) -> &ComponentContext {
        &self.ctx
    }

    pub fn files(&self) -> &[FilePair] {
        &self.files
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Common prerequisite checks:
    ///
    /// - the install root is not a dangerous path
    /// - the install root (or its nearest parent) is writable
    /// - every dependency is installed or planned in the same run
    /// - the source directory exists and every file passes the batch check
    /// - every tool requirement is met
    pub fn validate_prerequisites(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        let root = self.ctx.install_root();

        if let Err(e) = validate_installation_target(root) {
            report.fail(e.to_string());
        }
        match check_permissions(root, &[Permission::Write]) {
            Ok(missing) => {
                report.check(missing.is_empty(), || format!("No write permission for {}", root.display()));
            }
            Err(e) => report.fail(format!("Failed to check permissions of {}: {e}", root.display())),
        }

        for dependency in &self.metadata.dependencies {
            let satisfied = self.ctx.is_planned(dependency)
                || self.ctx.store().is_component_installed(dependency).unwrap_or(false);
            report.check(satisfied, || {
                format!("Requires component '{dependency}', which is neither installed nor selected")
            });
        }

        if self.source_dir.is_dir() {
            let names: Vec<String> = self.files.iter().map(|f| f.name.clone()).collect();
            report.merge(validate_component_files(&names, &self.source_dir, &self.target_dir));
        } else {
            report.fail(format!("Source directory not found: {}", self.source_dir.display()));
        }

        for (tool, min_version) in &self.metadata.requirements {
            if let Err(e) = super::requirements::check_requirement(self.ctx.probe(), tool, min_version) {
                report.fail(e.to_string());
            }
        }

        if !report.is_ok() {
            debug!(component = self.name(), reasons = ?report.reasons(), "Prerequisites not met");
        }
        report
    }

    /// Writes every file not rejected by `skip`, then registers the component.
    ///
    /// With staged commits nothing reaches the install root unless every file
    /// was written; without, files already copied stay when a later one fails.
    pub fn install_files(
        &self,
        config: &InstallConfig,
        skip: impl Fn(&FilePair) -> bool,
    ) -> Result<InstallOutcome> {
        let span = info_span!("component", name = %self.name(), version = %self.metadata.version);
        let _enter = span.enter();

        let mut outcome = InstallOutcome {
            component: self.name().to_string(),
            dry_run: config.dry_run,
            ..Default::default()
        };

        let selected: Vec<&FilePair> = self
            .files
            .iter()
            .filter(|pair| {
                let keep = !(config.skip_existing && pair.target.exists()) && !skip(pair);
                if !keep {
                    outcome.files_skipped += 1;
                }
                keep
            })
            .collect();

        if config.dry_run {
            outcome.files_written = selected.len();
            info!(files = selected.len(), skipped = outcome.files_skipped, "Dry run, nothing written");
            return Ok(outcome);
        }

        let transfer = self.ctx.transfer();
        let track_target_dir = || match self.layout {
            SourceLayout::Subtree { .. } => {
                transfer.ensure_directory_with_inventory(&self.target_dir, self.name())
            }
            SourceLayout::RootFiles { .. } => Ok(()),
        };

        let total = self.files.len();
        let mut written = 0;
        if self.ctx.staged_commit() {
            let mut batch = transfer.stage(self.name())?;
            for pair in &selected {
                match batch.stage_merge(&pair.source, &pair.target, config.overwrite) {
                    Ok(_) => written += 1,
                    Err(e) => warn!(file = %pair.name, error = %e, "Failed to stage file"),
                }
            }
            if written < selected.len() {
                batch.abort();
                return Err(self.copy_failed(written + outcome.files_skipped, total));
            }
            track_target_dir()?;
            batch.commit()?;
        } else {
            track_target_dir()?;
            for pair in &selected {
                match transfer.copy_file_with_merge(&pair.source, &pair.target, config.overwrite) {
                    Ok(_) => written += 1,
                    Err(e) => warn!(file = %pair.name, error = %e, "Failed to copy file"),
                }
            }
            if written < selected.len() {
                return Err(self.copy_failed(written + outcome.files_skipped, total));
            }
        }

        self.ctx.store().add_component_registration(
            self.name(),
            &self.metadata.version,
            Some(&self.metadata.category),
        )?;

        outcome.files_written = written;
        info!(files = written, skipped = outcome.files_skipped, "Installed component");
        Ok(outcome)
    }

    fn copy_failed(&self, succeeded: usize, total: usize) -> anyhow::Error {
        InstallerError::CopyFailed {
            component: self.name().to_string(),
            succeeded,
            total,
        }
        .into()
    }

    /// Whether uninstall keeps `relative_path` under `preserve_user_data`.
    pub fn is_user_data(relative_path: &str) -> bool {
        relative_path.split('/').any(|segment| USER_DATA_DIRS.contains(&segment))
            || is_mergeable(Path::new(relative_path))
    }

    /// Removes the component's files and inventory entries, then its
    /// registration.
    pub fn uninstall_files(&self, config: &InstallConfig) -> Result<InstallOutcome> {
        let span = info_span!("component", name = %self.name());
        let _enter = span.enter();

        let transfer = self.ctx.transfer();
        let preserve = config.preserve_user_data;
        let keep = move |relative: &str| preserve && Self::is_user_data(relative);

        let mut outcome = InstallOutcome {
            component: self.name().to_string(),
            dry_run: config.dry_run,
            ..Default::default()
        };

        if config.dry_run {
            let tracked = self.ctx.inventory().entries_for(self.name())?;
            let mut targets: Vec<String> = self
                .files
                .iter()
                .filter(|pair| pair.target.exists())
                .filter_map(|pair| transfer.relative_path(&pair.target).ok())
                .map(normalize_path_for_storage)
                .collect();
            targets.extend(
                tracked.into_iter().filter(|(_, e)| e.kind == EntryKind::File).map(|(p, _)| p),
            );
            targets.sort();
            targets.dedup();
            outcome.files_removed = targets.iter().filter(|p| !keep(p)).count();
            info!(files = outcome.files_removed, "Dry run, nothing removed");
            return Ok(outcome);
        }

        for pair in &self.files {
            let relative = normalize_path_for_storage(transfer.relative_path(&pair.target)?);
            if keep(&relative) {
                outcome.files_skipped += 1;
                continue;
            }
            if transfer.remove_file_with_inventory(&pair.target)? {
                outcome.files_removed += 1;
            }
        }
        outcome.files_removed += transfer.remove_tracked(self.name(), &keep)?;

        self.ctx.store().remove_component_registration(self.name())?;
        info!(files = outcome.files_removed, kept = outcome.files_skipped, "Uninstalled component");
        Ok(outcome)
    }

    /// Recorded version, falling back to the legacy settings record.
    pub fn installed_version(&self) -> Result<Option<String>> {
        let store = self.ctx.store();
        match store.component_version(self.name())? {
            Some(version) => Ok(Some(version)),
            None => store.legacy_component_version(self.name()),
        }
    }

    /// Registration present and every file on disk.
    pub fn validate_installation(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        match self.installed_version() {
            Ok(Some(_)) => {}
            Ok(None) => report.fail(format!("Component '{}' is not registered", self.name())),
            Err(e) => report.fail(format!("Failed to read metadata: {e}")),
        }
        for pair in &self.files {
            report.check(pair.target.exists(), || format!("Missing file: {}", pair.target.display()));
        }
        report
    }
}

/// Lists the files of a component source directory, sorted by name.
fn discover_files(source_dir: &Path, target_dir: &Path, layout: SourceLayout) -> Vec<FilePair> {
    if !source_dir.is_dir() {
        return Vec::new();
    }

    let walker = match layout {
        SourceLayout::RootFiles { .. } => WalkDir::new(source_dir).max_depth(1),
        SourceLayout::Subtree { .. } => WalkDir::new(source_dir),
    };

    walker
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(source_dir).ok()?.to_path_buf();
            Some(FilePair {
                name: normalize_path_for_storage(&relative),
                source: entry.path().to_path_buf(),
                target: target_dir.join(&relative),
            })
        })
        .collect()
}
