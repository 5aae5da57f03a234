use super::{Component, ComponentBase, ComponentContext, SourceLayout, builtin_metadata};
use crate::core::ValidationReport;

/// Slash-command library under `commands/`.
#[derive(Debug, Clone)]
pub struct CommandsComponent {
    base: ComponentBase,
}

impl CommandsComponent {
    pub fn new(ctx: &ComponentContext) -> Self {
        let metadata = builtin_metadata("commands", "commands", "Slash command library");
        Self {
            base: ComponentBase::new(metadata, ctx, SourceLayout::Subtree { dir: "commands" }),
        }
    }
}

impl Component for CommandsComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn validate_installation(&self) -> ValidationReport {
        let mut report = self.base.validate_installation();
        let dir = self.base.target_dir();
        report.check(dir.is_dir(), || format!("Commands directory missing: {}", dir.display()));
        report
    }
}
