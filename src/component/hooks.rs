use anyhow::Result;
use std::collections::BTreeMap;
use tracing::info;

use super::{
    Component, ComponentBase, ComponentContext, FilePair, InstallConfig, InstallOutcome,
    SourceLayout, builtin_metadata,
};
use crate::core::ValidationReport;
use crate::metadata::FileHashRecord;
use crate::security::{Permission, check_file_integrity, check_permissions};
use crate::utils::fs::normalize_path_for_storage;

/// Event hooks under `hooks/`.
///
/// Users customize hook scripts in place, so [`Component::update`] keeps any
/// hook whose content no longer matches what was installed, unless
/// `overwrite` is set.
#[derive(Debug, Clone)]
pub struct HooksComponent {
    base: ComponentBase,
}

impl HooksComponent {
    pub fn new(ctx: &ComponentContext) -> Self {
        let metadata = builtin_metadata("hooks", "integration", "Event hooks and helper scripts");
        Self {
            base: ComponentBase::new(metadata, ctx, SourceLayout::Subtree { dir: "hooks" }),
        }
    }

    /// A target that exists and differs from its recorded hash, or that was
    /// never installed by us.
    fn is_user_edited(&self, pair: &FilePair, recorded: &BTreeMap<String, FileHashRecord>) -> bool {
        if !pair.target.exists() {
            return false;
        }
        let Ok(relative) = pair.target.strip_prefix(self.base.ctx().install_root()) else {
            return false;
        };
        match recorded.get(&normalize_path_for_storage(relative)) {
            Some(record) => !check_file_integrity(&pair.target, &record.hash).unwrap_or(false),
            None => true,
        }
    }
}

impl Component for HooksComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn update(&self, config: &InstallConfig) -> Result<InstallOutcome> {
        self.validate_prerequisites().into_result(self.name())?;
        if config.overwrite {
            return self.base.install_files(config, |_| false);
        }

        let recorded = self
            .base
            .ctx()
            .store()
            .load_metadata()?
            .integrity
            .and_then(|integrity| integrity.file_hashes)
            .unwrap_or_default();

        self.base.install_files(config, |pair| {
            let edited = self.is_user_edited(pair, &recorded);
            if edited {
                info!(hook = %pair.name, "Keeping customized hook");
            }
            edited
        })
    }

    fn validate_installation(&self) -> ValidationReport {
        let mut report = self.base.validate_installation();
        for pair in self.files_to_install() {
            let is_script = pair.target.extension().is_some_and(|ext| ext == "sh");
            if !is_script || !pair.target.exists() {
                continue;
            }
            match check_permissions(&pair.target, &[Permission::Execute]) {
                Ok(missing) => report.check(missing.is_empty(), || {
                    format!("Hook script is not executable: {}", pair.target.display())
                }),
                Err(e) => report.fail(e.to_string()),
            }
        }
        report
    }
}
