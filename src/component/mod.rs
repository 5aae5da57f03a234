//! Component Model: the installable unit and its lifecycle.
//!
//! A component is a named, versioned bundle of files with declared
//! dependencies and conflicts. Concrete variants ([`CoreComponent`],
//! [`CommandsComponent`], [`HooksComponent`], [`McpComponent`],
//! [`AgentsComponent`]) share their lifecycle through [`ComponentBase`] and
//! override only what differs: extra prerequisite checks, structural
//! markers, or an update that keeps user edits.
//!
//! # Lifecycle
//!
//! ```text
//! registered -> constructed -> validated -> installed / updated / uninstalled -> queried
//! ```
//!
//! Instances are bound to one [`ComponentContext`] (install root, source
//! root, shared metadata store). The file list is derived from the source
//! root once, at construction.

mod base;
mod context;
pub mod requirements;

mod agents;
mod commands;
mod framework;
mod hooks;
mod mcp;

pub use agents::AgentsComponent;
pub use base::{ComponentBase, SourceLayout};
pub use commands::CommandsComponent;
pub use context::ComponentContext;
pub use framework::CoreComponent;
pub use hooks::HooksComponent;
pub use mcp::McpComponent;
pub use requirements::{SystemToolProbe, ToolProbe};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::ValidationReport;

/// Static description of a component. Immutable once registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub name: String,
    pub version: String,
    pub category: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Tool name to minimum version, e.g. `node -> 18`.
    #[serde(default)]
    pub requirements: BTreeMap<String, String>,
}

/// One file a component installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// Forward-slash path relative to the component's source directory.
    pub name: String,
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Options for install, update and uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallConfig {
    /// Run every check, mutate nothing.
    pub dry_run: bool,
    /// Replace merge-sensitive files (and user-edited hooks) instead of
    /// keeping their content.
    pub overwrite: bool,
    /// Leave target files that already exist untouched.
    pub skip_existing: bool,
    /// Keep user data (`logs/`, `memory/`, `user/`, merged documents) on
    /// uninstall.
    pub preserve_user_data: bool,
}

/// What one lifecycle operation did (or, in a dry run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOutcome {
    pub component: String,
    pub files_written: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub dry_run: bool,
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "would " } else { "" };
        if self.files_removed > 0 {
            write!(f, "{}: {prefix}remove {} file(s)", self.component, self.files_removed)
        } else {
            write!(f, "{}: {prefix}write {} file(s)", self.component, self.files_written)?;
            if self.files_skipped > 0 {
                write!(f, ", {} skipped", self.files_skipped)?;
            }
            Ok(())
        }
    }
}

/// The installable unit's contract.
///
/// Every method has a default that delegates to [`ComponentBase`]; variants
/// override the few that carry component-specific behavior.
pub trait Component: Send + Sync + fmt::Debug {
    fn base(&self) -> &ComponentBase;

    fn metadata(&self) -> &ComponentMetadata {
        self.base().metadata()
    }

    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Files this component installs. Never touches the disk.
    fn files_to_install(&self) -> &[FilePair] {
        self.base().files()
    }

    /// Checks that must pass before anything is written.
    fn validate_prerequisites(&self) -> ValidationReport {
        self.base().validate_prerequisites()
    }

    fn install(&self, config: &InstallConfig) -> Result<InstallOutcome> {
        self.validate_prerequisites().into_result(self.name())?;
        self.base().install_files(config, |_| false)
    }

    /// Re-runs [`Component::install`] unless a variant keeps customizations.
    fn update(&self, config: &InstallConfig) -> Result<InstallOutcome> {
        self.install(config)
    }

    fn uninstall(&self, config: &InstallConfig) -> Result<InstallOutcome> {
        self.base().uninstall_files(config)
    }

    fn is_installed(&self) -> Result<bool> {
        Ok(self.installed_version()?.is_some())
    }

    /// Recorded version, falling back to the legacy settings record.
    fn installed_version(&self) -> Result<Option<String>> {
        self.base().installed_version()
    }

    /// Registration exists and every file is present.
    fn validate_installation(&self) -> ValidationReport {
        self.base().validate_installation()
    }
}

/// The built-in components, keyed by name.
pub fn builtin_factories() -> Vec<(&'static str, ComponentFactory)> {
    vec![
        ("core", factory(CoreComponent::new)),
        ("commands", factory(CommandsComponent::new)),
        ("hooks", factory(HooksComponent::new)),
        ("mcp", factory(McpComponent::new)),
        ("agents", factory(AgentsComponent::new)),
    ]
}

/// Constructor stored by the registry.
pub type ComponentFactory = Arc<dyn Fn(&ComponentContext) -> Arc<dyn Component> + Send + Sync>;

/// Wraps a plain constructor as a [`ComponentFactory`].
pub fn factory<C>(make: fn(&ComponentContext) -> C) -> ComponentFactory
where
    C: Component + 'static,
{
    Arc::new(move |ctx: &ComponentContext| Arc::new(make(ctx)) as Arc<dyn Component>)
}

/// Metadata shared by the built-in components.
pub(crate) fn builtin_metadata(name: &str, category: &str, description: &str) -> ComponentMetadata {
    ComponentMetadata {
        name: name.to_string(),
        version: crate::constants::FRAMEWORK_VERSION.to_string(),
        category: category.to_string(),
        author: "crew framework".to_string(),
        description: description.to_string(),
        dependencies: if name == "core" { Vec::new() } else { vec!["core".to_string()] },
        conflicts: Vec::new(),
        requirements: BTreeMap::new(),
    }
}
