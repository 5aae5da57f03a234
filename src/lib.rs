//! crew - local component installer
//!
//! Installs a modular framework, organized as named **components** (bundles
//! of files), into an install directory such as `~/.claude`. Versions,
//! dependencies and file provenance are tracked so installs, updates and
//! uninstalls are idempotent and auditable.
//!
//! # Architecture Overview
//!
//! ```text
//!   cli ──> installer ──> registry ──> component ──> transfer ──> metadata
//!                                          │             │
//!                                          └─> security <┘
//! ```
//!
//! - [`security`] - install-target, file-name and containment checks
//! - [`metadata`] - the unified metadata document (`.crew/config/crew-metadata.json`),
//!   the user-facing `settings.json`, backups and integrity scans
//! - [`transfer`] - file copies with inventory tracking, merge of
//!   `CLAUDE.md`, staged commits
//! - [`component`] - the [`Component`](component::Component) trait and the
//!   built-in components (`core`, `commands`, `hooks`, `mcp`, `agents`)
//! - [`registry`] - factories, dependency resolution, conflicts
//! - [`installer`] - plan, install, update, uninstall and verify runs
//!
//! # On-disk layout
//!
//! ```text
//! <install root>/
//! ├── CLAUDE.md, RULES.md, ...     core
//! ├── commands/ hooks/ mcp/ agents/
//! ├── settings.json                user settings (legacy fields migrated out)
//! └── .crew/
//!     ├── config/crew-metadata.json
//!     ├── config/inventory.json
//!     ├── backups/settings/settings_<timestamp>.json
//!     └── staging/                 transient
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use crew_installer::component::ComponentContext;
//! use crew_installer::installer::{Installer, RunOptions};
//! use crew_installer::registry::ComponentRegistry;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = ComponentContext::new("/home/me/.claude", "/home/me/src/framework");
//! let installer = Installer::new(ComponentRegistry::with_builtins()?, ctx);
//! let report = installer.install(&["commands"], &RunOptions::default()).await?;
//! assert_eq!(report.succeeded_names(), ["core", "commands"]);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod component;
pub mod config;
pub mod constants;
pub mod core;
pub mod installer;
pub mod layout;
pub mod metadata;
pub mod registry;
pub mod security;
pub mod transfer;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
