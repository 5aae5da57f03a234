use std::fs;

use super::{Component, ComponentBase, ComponentContext, SourceLayout, builtin_metadata};
use crate::core::ValidationReport;

/// MCP server configurations under `mcp/`.
///
/// Needs Node.js 18 or newer on `PATH` to run the configured servers.
#[derive(Debug, Clone)]
pub struct McpComponent {
    base: ComponentBase,
}

impl McpComponent {
    pub fn new(ctx: &ComponentContext) -> Self {
        let mut metadata =
            builtin_metadata("mcp", "integration", "MCP server configurations");
        metadata.requirements.insert("node".to_string(), "18".to_string());
        Self {
            base: ComponentBase::new(metadata, ctx, SourceLayout::Subtree { dir: "mcp" }),
        }
    }
}

impl Component for McpComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    /// Every installed `.json` config must still parse.
    fn validate_installation(&self) -> ValidationReport {
        let mut report = self.base.validate_installation();
        for pair in self.files_to_install() {
            let is_json = pair.target.extension().is_some_and(|ext| ext == "json");
            if !is_json || !pair.target.exists() {
                continue;
            }
            let parsed = fs::read_to_string(&pair.target)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<serde_json::Value>(&content).map_err(|e| e.to_string())
                });
            if let Err(e) = parsed {
                report.fail(format!("Invalid MCP config {}: {e}", pair.target.display()));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{InstallConfig, ToolProbe};
    use anyhow::{Result, bail};
    use semver::Version;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct Node(Option<&'static str>);

    impl ToolProbe for Node {
        fn version(&self, tool: &str) -> Result<Version> {
            match self.0 {
                Some(v) => Ok(Version::parse(v)?),
                None => bail!("'{tool}' not found on PATH"),
            }
        }
    }

    fn context(root: &std::path::Path, node: Option<&'static str>) -> ComponentContext {
        let source = root.join("src");
        fs::create_dir_all(source.join("mcp")).unwrap();
        fs::write(source.join("mcp").join("context7.json"), r#"{"command":"npx"}"#).unwrap();
        let install = root.join("install");
        fs::create_dir_all(&install).unwrap();
        ComponentContext::new(install, source)
            .with_planned(["core", "mcp"])
            .with_probe(Arc::new(Node(node)))
    }

    #[test]
    fn test_requires_node() {
        let temp = tempdir().unwrap();
        let mcp = McpComponent::new(&context(temp.path(), None));
        assert_eq!(mcp.metadata().requirements.get("node").map(String::as_str), Some("18"));

        let report = mcp.validate_prerequisites();
        assert!(report.reasons().iter().any(|r| r.contains("node")));
        assert!(mcp.install(&InstallConfig::default()).is_err());
    }

    #[test]
    fn test_old_node_is_rejected() {
        let temp = tempdir().unwrap();
        let mcp = McpComponent::new(&context(temp.path(), Some("16.0.0")));
        assert!(!mcp.validate_prerequisites().is_ok());
    }

    #[test]
    fn test_install_and_detect_broken_config() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path(), Some("20.11.0"));
        let mcp = McpComponent::new(&ctx);
        mcp.install(&InstallConfig::default()).unwrap();
        assert!(mcp.validate_installation().is_ok());

        fs::write(ctx.install_root().join("mcp").join("context7.json"), "{ broken").unwrap();
        let report = mcp.validate_installation();
        assert!(report.reasons().iter().any(|r| r.contains("Invalid MCP config")));
    }
}
