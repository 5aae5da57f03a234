use super::{Component, ComponentBase, ComponentContext, SourceLayout, builtin_metadata};
use crate::core::ValidationReport;

/// Agent definitions under `agents/`.
#[derive(Debug, Clone)]
pub struct AgentsComponent {
    base: ComponentBase,
}

impl AgentsComponent {
    pub fn new(ctx: &ComponentContext) -> Self {
        let metadata = builtin_metadata("agents", "agents", "Specialized agent definitions");
        Self {
            base: ComponentBase::new(metadata, ctx, SourceLayout::Subtree { dir: "agents" }),
        }
    }
}

impl Component for AgentsComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn validate_installation(&self) -> ValidationReport {
        let mut report = self.base.validate_installation();
        let dir = self.base.target_dir();
        report.check(dir.is_dir(), || format!("Agents directory missing: {}", dir.display()));
        report
    }
}
