//! Test utilities for crew-installer
//!
//! Helpers shared by unit and integration tests: an isolated install
//! environment with a framework source tree, a fixed tool probe, and
//! once-only logging setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use crew_installer::test_utils::TestEnvironment;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let env = TestEnvironment::new()?;
//! let installer = env.installer()?;
//! installer.install(&["core"], &Default::default()).await?;
//! assert!(env.installed("CLAUDE.md").exists());
//! # Ok(())
//! # }
//! ```

pub mod environment;
pub mod fixtures;

pub use environment::{FixedToolProbe, TestEnvironment};
pub use fixtures::SourceFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging
/// stays off.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
