//! Installer Orchestrator: drives registry, components and metadata for a run.
//!
//! An install of a selection goes through fixed phases:
//!
//! 1. **Plan**: resolve the selection and its dependencies into levels and
//!    collect conflicts. Conflicts abort the run unless `force` is set.
//! 2. **Validate**: every component's prerequisites are checked before
//!    anything is written. One failing component fails the whole run.
//! 3. **Execute**: levels run in order. Within a level components run one
//!    after another, or concurrently on the blocking pool when
//!    `max_parallel > 1`. The run stops after the first level with a failure;
//!    components of later levels are reported as skipped.
//! 4. **Stamp**: the `installation` and `framework` sections of the metadata
//!    document are refreshed.
//!
//! Metadata writes from concurrent components are serialized by the shared
//! [`MetadataStore`](crate::metadata::MetadataStore) lock.

mod report;

pub use report::{ComponentStatus, InstallPlan, InstallReport, VerifyReport};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::component::{Component, ComponentContext, InstallConfig, InstallOutcome};
use crate::constants::DEFAULT_MAX_PARALLEL;
use crate::core::{InstallerError, ValidationReport};
use crate::registry::ComponentRegistry;
use crate::utils::progress::InstallProgress;

/// Options for one orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub config: InstallConfig,
    /// Install despite conflicts; uninstall despite installed dependents.
    pub force: bool,
    /// Components installed concurrently within one level.
    pub max_parallel: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config: InstallConfig::default(),
            force: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Install,
    Update,
}

type Instances = Vec<(String, Arc<dyn Component>)>;

#[derive(Debug)]
pub struct Installer {
    registry: ComponentRegistry,
    ctx: ComponentContext,
    progress: Option<InstallProgress>,
}

impl Installer {
    pub fn new(registry: ComponentRegistry, ctx: ComponentContext) -> Self {
        Self {
            registry,
            ctx,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: InstallProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ComponentContext {
        &self.ctx
    }

    pub fn plan<S: AsRef<str>>(&self, selection: &[S]) -> Result<InstallPlan> {
        let order = self.registry.resolve_dependencies(selection)?;
        let levels = self.registry.installation_order(selection)?;
        let conflicts = self.registry.conflicts(&order);
        Ok(InstallPlan {
            order,
            levels,
            conflicts,
        })
    }

    /// Installs `selection` and its dependencies.
    ///
    /// Planning and validation errors are returned as `Err`; failures while
    /// copying are recorded in the report so the caller sees what succeeded.
    pub async fn install<S: AsRef<str>>(
        &self,
        selection: &[S],
        options: &RunOptions,
    ) -> Result<InstallReport> {
        let plan = self.plan(selection)?;
        let span = info_span!("install", components = ?plan.order, dry_run = options.config.dry_run);
        self.install_planned(plan, options).instrument(span).await
    }

    async fn install_planned(&self, plan: InstallPlan, options: &RunOptions) -> Result<InstallReport> {
        if plan.has_conflicts() {
            if options.force {
                warn!(conflicts = ?plan.conflicts, "Installing despite conflicts (--force)");
            } else {
                return Err(InstallerError::Conflict {
                    conflicts: plan.conflicts,
                }
                .into());
            }
        }

        if !options.config.dry_run && self.ctx.store().migrate_metadata()? {
            info!("Migrated legacy settings before install");
        }

        let instances = self.registry.create_component_instances(&plan.order, &self.ctx)?;
        validate_all(&instances)?;

        let levels: Vec<Instances> = plan
            .levels
            .iter()
            .map(|level| {
                instances.iter().filter(|(name, _)| level.contains(name)).cloned().collect()
            })
            .collect();

        let report = self.run_levels(levels, Operation::Install, options).await;
        self.finish(&report, options)?;
        Ok(report)
    }

    /// Re-installs installed components of `names` (all installed components
    /// when empty), dependencies first.
    ///
    /// Requested components that are not installed are reported as skipped.
    pub async fn update<S: AsRef<str>>(
        &self,
        names: &[S],
        options: &RunOptions,
    ) -> Result<InstallReport> {
        let store = self.ctx.store();
        if !options.config.dry_run {
            store.migrate_metadata()?;
        }

        let requested: Vec<String> = if names.is_empty() {
            self.installed_registered()?
        } else {
            names.iter().map(|n| n.as_ref().to_string()).collect()
        };
        let order = self.registry.resolve_dependencies(&requested)?;

        let mut targets = Vec::new();
        let mut not_installed = Vec::new();
        for name in order.iter().filter(|name| requested.contains(name)) {
            if store.is_component_installed(name)? {
                targets.push(name.clone());
            } else {
                warn!(component = %name, "Not installed; nothing to update");
                not_installed.push(name.clone());
            }
        }

        let ctx = self.ctx.clone().with_planned(targets.iter().cloned());
        let instances = targets
            .iter()
            .map(|name| Ok((name.clone(), self.registry.create(name, &ctx)?)))
            .collect::<Result<Instances>>()?;
        validate_all(&instances)?;

        let levels = instances.into_iter().map(|instance| vec![instance]).collect();
        let mut report = self
            .run_levels(levels, Operation::Update, options)
            .instrument(info_span!("update", components = ?targets))
            .await;
        report.skipped.extend(not_installed);
        self.finish(&report, options)?;
        Ok(report)
    }

    /// Removes `names` in reverse dependency order.
    ///
    /// Fails with [`InstallerError::HasDependents`] when an installed component
    /// outside the selection depends on one of them, unless `force` is set.
    pub async fn uninstall<S: AsRef<str>>(
        &self,
        names: &[S],
        options: &RunOptions,
    ) -> Result<InstallReport> {
        let store = self.ctx.store();
        // Legacy records move into the metadata document so removal clears them
        if !options.config.dry_run && store.migrate_metadata()? {
            info!("Migrated legacy settings before uninstall");
        }
        let selected: BTreeSet<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let installed: BTreeSet<String> = store.installed_components()?.into_iter().collect();

        let mut order = self.registry.resolve_dependencies(names)?;
        order.retain(|name| selected.contains(name));
        order.reverse();

        for name in &order {
            let dependents: Vec<String> = self
                .registry
                .dependents_of(name)
                .into_iter()
                .filter(|d| installed.contains(d) && !selected.contains(d))
                .collect();
            if dependents.is_empty() {
                continue;
            }
            if options.force {
                warn!(component = %name, ?dependents, "Removing despite installed dependents (--force)");
            } else {
                return Err(InstallerError::HasDependents {
                    name: name.clone(),
                    dependents,
                }
                .into());
            }
        }

        let span = info_span!("uninstall", components = ?order);
        let _enter = span.enter();

        let mut report = InstallReport {
            dry_run: options.config.dry_run,
            ..Default::default()
        };
        let progress = self.progress_for(order.len());
        let mut failed = false;
        for name in order {
            let component = self.registry.create(&name, &self.ctx)?;
            if failed {
                report.skipped.push(name);
                continue;
            }
            if !component.is_installed()? {
                debug!(component = %name, "Not installed; skipping uninstall");
                report.skipped.push(name);
                continue;
            }
            progress.set_message(format!("Removing {name}"));
            match component.uninstall(&options.config) {
                Ok(outcome) => {
                    info!(component = %name, removed = outcome.files_removed, "Uninstalled");
                    report.succeeded.push(outcome);
                }
                Err(e) => {
                    warn!(component = %name, error = %e, "Uninstall failed");
                    report.failed.push((name, format!("{e:#}")));
                    failed = true;
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(report)
    }

    /// Integrity scan plus `validate_installation` for every installed component.
    pub fn verify(&self) -> Result<VerifyReport> {
        let store = self.ctx.store();
        let integrity = store.scan_integrity().context("Integrity scan failed")?;

        let mut components = Vec::new();
        for name in store.installed_components()? {
            let report = if self.registry.contains(&name) {
                self.registry.create(&name, &self.ctx)?.validate_installation()
            } else {
                let mut report = ValidationReport::new();
                report.fail(format!("'{name}' is recorded as installed but is not a known component"));
                report
            };
            components.push((name, report));
        }

        info!(
            status = integrity.status(),
            components = components.len(),
            "Verification finished"
        );
        Ok(VerifyReport {
            integrity,
            components,
        })
    }

    /// Every registered component with its installed version.
    pub fn status(&self) -> Result<Vec<ComponentStatus>> {
        self.registry
            .all_metadata()
            .map(|metadata| {
                let component = self.registry.create(&metadata.name, &self.ctx)?;
                Ok(ComponentStatus {
                    name: metadata.name.clone(),
                    category: metadata.category.clone(),
                    description: metadata.description.clone(),
                    available_version: metadata.version.clone(),
                    installed_version: component.installed_version()?,
                    dependencies: metadata.dependencies.clone(),
                })
            })
            .collect()
    }

    fn installed_registered(&self) -> Result<Vec<String>> {
        let mut installed = self.ctx.store().installed_components()?;
        installed.retain(|name| {
            let known = self.registry.contains(name);
            if !known {
                warn!(component = %name, "Ignoring unknown installed component");
            }
            known
        });
        Ok(installed)
    }

    fn progress_for(&self, len: usize) -> InstallProgress {
        let progress = self.progress.clone().unwrap_or_default();
        progress.set_length(len as u64);
        progress
    }

    async fn run_levels(
        &self,
        levels: Vec<Instances>,
        operation: Operation,
        options: &RunOptions,
    ) -> InstallReport {
        let mut report = InstallReport {
            dry_run: options.config.dry_run,
            ..Default::default()
        };
        let total: usize = levels.iter().map(Vec::len).sum();
        let progress = self.progress_for(total);

        let mut levels = levels.into_iter();
        for (index, level) in levels.by_ref().enumerate() {
            debug!(level = index + 1, components = level.len(), "Running level");
            let results = if options.max_parallel > 1 && level.len() > 1 {
                run_concurrent(level, operation, &options.config, options.max_parallel, &progress)
                    .await
            } else {
                level
                    .into_iter()
                    .map(|(name, component)| {
                        progress.set_message(format!("{operation:?} {name}"));
                        let result = run_one(component.as_ref(), operation, &options.config);
                        progress.inc(1);
                        (name, result)
                    })
                    .collect()
            };

            let mut level_failed = false;
            for (name, result) in results {
                match result {
                    Ok(outcome) => {
                        info!(component = %name, "{outcome}");
                        report.succeeded.push(outcome);
                    }
                    Err(e) => {
                        warn!(component = %name, error = %e, "Component failed");
                        report.failed.push((name, format!("{e:#}")));
                        level_failed = true;
                    }
                }
            }
            if level_failed {
                break;
            }
        }

        report.skipped.extend(levels.flatten().map(|(name, _)| name));
        progress.finish_and_clear();
        report
    }

    fn finish(&self, report: &InstallReport, options: &RunOptions) -> Result<()> {
        if options.config.dry_run || report.succeeded.is_empty() {
            return Ok(());
        }
        self.ctx.store().stamp_installation()
    }
}

fn run_one(
    component: &dyn Component,
    operation: Operation,
    config: &InstallConfig,
) -> Result<InstallOutcome> {
    match operation {
        Operation::Install => component.install(config),
        Operation::Update => component.update(config),
    }
}

/// Runs one level on the blocking pool, at most `max_parallel` at a time.
/// Results come back in the level's (sorted) order.
async fn run_concurrent(
    level: Instances,
    operation: Operation,
    config: &InstallConfig,
    max_parallel: usize,
    progress: &InstallProgress,
) -> Vec<(String, Result<InstallOutcome>)> {
    let mut results: Vec<(usize, String, Result<InstallOutcome>)> = stream::iter(level.into_iter().enumerate())
        .map(|(index, (name, component))| {
            let config = config.clone();
            let progress = progress.clone();
            async move {
                let task_name = name.clone();
                let result = tokio::task::spawn_blocking(move || {
                    run_one(component.as_ref(), operation, &config)
                })
                .await
                .with_context(|| format!("Task for component '{task_name}' panicked"))
                .and_then(|r| r);
                progress.inc(1);
                (index, name, result)
            }
        })
        .buffer_unordered(max_parallel)
        .collect()
        .await;

    results.sort_by_key(|(index, _, _)| *index);
    results.into_iter().map(|(_, name, result)| (name, result)).collect()
}

/// Checks every component before any of them runs; all failures are reported.
fn validate_all(instances: &Instances) -> Result<()> {
    let mut reasons = Vec::new();
    for (name, component) in instances {
        let report = component.validate_prerequisites();
        reasons.extend(report.into_reasons().into_iter().map(|reason| format!("{name}: {reason}")));
    }
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(InstallerError::ValidationFailed {
            component: instances.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(", "),
            reasons,
        }
        .into())
    }
}

#[cfg(test)]
mod tests;
