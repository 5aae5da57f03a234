//! Integration test suite for crew
//!
//! End-to-end tests of install, update, uninstall and verify runs against
//! temporary install roots, plus smoke tests of the `crew` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `crew` binary, via `assert_cmd`
//! - **install_flows**: orchestrated install/update/uninstall runs
//! - **legacy_migration**: legacy settings fields and version records
//! - **partial_failure**: staged vs direct commits when a copy fails

mod cli;
mod install_flows;
mod legacy_migration;
mod partial_failure;
