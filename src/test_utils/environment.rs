//! Isolated install environment for tests.

use anyhow::{Result, bail};
use semver::Version;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use super::fixtures::SourceFixture;
use crate::component::{ComponentContext, ToolProbe};
use crate::installer::Installer;
use crate::registry::ComponentRegistry;

/// Tool probe answering with a fixed version (or "not found").
#[derive(Debug, Clone)]
pub struct FixedToolProbe(pub Option<Version>);

impl FixedToolProbe {
    pub fn found(version: &str) -> Self {
        Self(Version::parse(version).ok())
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl ToolProbe for FixedToolProbe {
    fn version(&self, tool: &str) -> Result<Version> {
        match &self.0 {
            Some(version) => Ok(version.clone()),
            None => bail!("'{tool}' not found on PATH"),
        }
    }
}

/// Temp directory holding an install root and a framework source tree.
///
/// The tool probe reports `node 20.0.0` so `mcp` installs without Node.js.
pub struct TestEnvironment {
    _temp_dir: TempDir,
    install_root: PathBuf,
    source_root: PathBuf,
    probe: Arc<dyn ToolProbe>,
    staged_commit: bool,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Self::with_fixture(&SourceFixture::framework())
    }

    pub fn with_fixture(fixture: &SourceFixture) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let install_root = temp_dir.path().join("install");
        let source_root = temp_dir.path().join("source");
        fs::create_dir_all(&install_root)?;
        fixture.write_to(&source_root)?;
        Ok(Self {
            _temp_dir: temp_dir,
            install_root,
            source_root,
            probe: Arc::new(FixedToolProbe::found("20.0.0")),
            staged_commit: true,
        })
    }

    #[must_use]
    pub fn with_probe(mut self, probe: impl ToolProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    #[must_use]
    pub fn with_staged_commit(mut self, staged: bool) -> Self {
        self.staged_commit = staged;
        self
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Fresh context; each call gets its own store over the same files.
    pub fn context(&self) -> ComponentContext {
        ComponentContext::new(&self.install_root, &self.source_root)
            .with_probe(Arc::clone(&self.probe))
            .with_staged_commit(self.staged_commit)
    }

    pub fn installer(&self) -> Result<Installer> {
        Ok(Installer::new(ComponentRegistry::with_builtins()?, self.context()))
    }

    pub fn installed(&self, relative: &str) -> PathBuf {
        self.install_root.join(relative)
    }

    pub fn read_installed(&self, relative: &str) -> Result<String> {
        Ok(fs::read_to_string(self.installed(relative))?)
    }

    pub fn write_installed(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.installed(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}
