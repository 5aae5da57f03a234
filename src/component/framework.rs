use super::{Component, ComponentBase, ComponentContext, SourceLayout, builtin_metadata};
use crate::core::ValidationReport;

/// Framework documents installed at the root of the install directory.
///
/// `CLAUDE.md` is merge-sensitive: an existing copy keeps the user's content.
#[derive(Debug, Clone)]
pub struct CoreComponent {
    base: ComponentBase,
}

impl CoreComponent {
    pub fn new(ctx: &ComponentContext) -> Self {
        let metadata =
            builtin_metadata("core", "core", "Framework documents and behavioral rules");
        Self {
            base: ComponentBase::new(metadata, ctx, SourceLayout::RootFiles { dir: "core" }),
        }
    }
}

impl Component for CoreComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn validate_installation(&self) -> ValidationReport {
        let mut report = self.base.validate_installation();
        let entry_point = self.base.ctx().install_root().join("CLAUDE.md");
        let ships_entry_point = self.files_to_install().iter().any(|f| f.name == "CLAUDE.md");
        report.check(!ships_entry_point || entry_point.is_file(), || {
            format!("Framework entry point missing: {}", entry_point.display())
        });
        report
    }
}
