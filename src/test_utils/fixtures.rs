//! Source-tree fixtures for the built-in components.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Files of a framework source tree, relative to the source root.
#[derive(Clone, Debug)]
pub struct SourceFixture {
    pub name: String,
    pub files: Vec<(String, String)>,
}

impl SourceFixture {
    /// One or more files for every built-in component.
    pub fn framework() -> Self {
        Self {
            name: "framework".to_string(),
            files: vec![
                ("core/CLAUDE.md".into(), "# Crew framework\n\n@RULES.md\n".into()),
                ("core/RULES.md".into(), "# Rules\n\n- Read before writing.\n".into()),
                ("commands/crew/build.md".into(), "# /crew:build\n\nBuild the project.\n".into()),
                ("commands/crew/test.md".into(), "# /crew:test\n\nRun the tests.\n".into()),
                ("hooks/pre_tool_use.sh".into(), "#!/bin/sh\nexit 0\n".into()),
                ("hooks/hooks.json".into(), "{\"PreToolUse\": []}\n".into()),
                ("mcp/servers.json".into(), "{\"servers\": {}}\n".into()),
                ("agents/reviewer.md".into(), "---\nname: reviewer\n---\nReview code.\n".into()),
            ],
        }
    }

    /// Only `core`, for tests that do not need the other components.
    pub fn core_only() -> Self {
        let mut fixture = Self::framework();
        fixture.name = "core_only".to_string();
        fixture.files.retain(|(path, _)| path.starts_with("core/"));
        fixture
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Writes the fixture below `root`; shell scripts are made executable.
    pub fn write_to(&self, root: &Path) -> Result<()> {
        for (relative, content) in &self.files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

            #[cfg(unix)]
            if relative.ends_with(".sh") {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
            }
        }
        Ok(())
    }
}
