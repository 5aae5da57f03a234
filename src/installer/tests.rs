use super::*;
use crate::component::{ComponentBase, ComponentMetadata, SourceLayout};
use crate::test_utils::{FixedToolProbe, SourceFixture, TestEnvironment};
use std::fs;

fn options() -> RunOptions {
    RunOptions::default()
}

#[test]
fn test_plan_levels() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    let plan = installer.plan(&["commands", "hooks"]).unwrap();
    assert_eq!(plan.order, ["core", "commands", "hooks"]);
    assert_eq!(
        plan.levels,
        vec![vec!["core".to_string()], vec!["commands".into(), "hooks".into()]]
    );
    assert!(plan.conflicts.is_empty());
}

#[test]
fn test_installer_debug_output() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap().with_progress(InstallProgress::hidden());
    let rendered = format!("{installer:?}");
    assert!(rendered.starts_with("Installer"));
    assert!(rendered.contains("InstallProgress"));
}

#[tokio::test]
async fn test_install_with_dependencies() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();

    let report = installer.install(&["commands"], &options()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded_names(), ["core", "commands"]);
    assert!(env.installed("CLAUDE.md").exists());
    assert!(env.installed("commands/crew/build.md").exists());

    let store = installer.context().store();
    assert_eq!(store.installed_components().unwrap(), ["commands", "core"]);
    let doc = store.load_metadata().unwrap();
    let installation = doc.installation.unwrap();
    assert_eq!(installation.installer_version.as_deref(), Some(crate::constants::INSTALLER_VERSION));
    assert!(doc.framework.unwrap().version.is_some());
}

#[tokio::test]
async fn test_install_twice_is_idempotent() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["core"], &options()).await.unwrap();
    let first = env.read_installed("CLAUDE.md").unwrap();

    let report = installer.install(&["core"], &options()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(env.read_installed("CLAUDE.md").unwrap(), first);
}

#[tokio::test]
async fn test_concurrent_level_installs_everything() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    let options = RunOptions {
        max_parallel: 4,
        ..Default::default()
    };

    let report = installer.install(&["commands", "hooks", "mcp", "agents"], &options).await.unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.succeeded_names(), ["core", "agents", "commands", "hooks", "mcp"]);
    assert_eq!(
        installer.context().store().installed_components().unwrap(),
        ["agents", "commands", "core", "hooks", "mcp"]
    );
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    let options = RunOptions {
        config: InstallConfig {
            dry_run: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let report = installer.install(&["commands"], &options).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.files_written(), 4);
    assert_eq!(fs::read_dir(env.install_root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_validation_failure_prevents_any_write() {
    let env = TestEnvironment::new().unwrap().with_probe(FixedToolProbe::found("16.0.0"));
    let installer = env.installer().unwrap();

    let err = installer.install(&["mcp"], &options()).await.unwrap_err();
    let Some(InstallerError::ValidationFailed { reasons, .. }) = err.downcast_ref() else {
        panic!("expected validation failure, got {err:?}");
    };
    assert!(reasons.iter().any(|r| r.starts_with("mcp:") && r.contains("node")));
    assert!(!env.installed("CLAUDE.md").exists());
    assert!(installer.context().store().installed_components().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_source_directory_fails_validation() {
    let env = TestEnvironment::with_fixture(&SourceFixture::core_only()).unwrap();
    let installer = env.installer().unwrap();
    let err = installer.install(&["agents"], &options()).await.unwrap_err();
    assert!(err.to_string().contains("Validation failed"));
    assert!(!env.installed("CLAUDE.md").exists());
}

#[derive(Debug)]
struct Exclusive {
    base: ComponentBase,
}

impl Component for Exclusive {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
}

fn exclusive(name: &'static str, conflicts: &'static str) -> crate::component::ComponentFactory {
    Arc::new(move |ctx: &ComponentContext| {
        let metadata = ComponentMetadata {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            category: "test".to_string(),
            dependencies: vec!["core".to_string()],
            conflicts: vec![conflicts.to_string()],
            ..Default::default()
        };
        Arc::new(Exclusive {
            base: ComponentBase::new(metadata, ctx, SourceLayout::Subtree { dir: "agents" }),
        }) as Arc<dyn Component>
    })
}

#[tokio::test]
async fn test_conflicts_abort_unless_forced() {
    let env = TestEnvironment::new().unwrap();
    let mut registry = ComponentRegistry::with_builtins().unwrap();
    registry.register_factory("x", exclusive("x", "y")).unwrap();
    registry.register_factory("y", exclusive("y", "x")).unwrap();
    let installer = Installer::new(registry, env.context());

    let err = installer.install(&["x", "y"], &options()).await.unwrap_err();
    let Some(InstallerError::Conflict { conflicts }) = err.downcast_ref() else {
        panic!("expected conflict, got {err:?}");
    };
    assert_eq!(conflicts.len(), 1);
    assert!(!env.installed("CLAUDE.md").exists());

    let forced = RunOptions {
        force: true,
        ..Default::default()
    };
    let report = installer.install(&["x", "y"], &forced).await.unwrap();
    assert!(report.is_success());
}

#[tokio::test]
async fn test_update_only_installed() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["commands"], &options()).await.unwrap();

    let report = installer.update(&["commands", "hooks"], &options()).await.unwrap();
    assert_eq!(report.succeeded_names(), ["commands"]);
    assert_eq!(report.skipped, ["hooks"]);
    assert!(!env.installed("hooks").exists());

    let all = installer.update::<&str>(&[], &options()).await.unwrap();
    assert_eq!(all.succeeded_names(), ["core", "commands"]);
}

#[tokio::test]
async fn test_uninstall_refuses_with_installed_dependents() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["commands"], &options()).await.unwrap();

    let err = installer.uninstall(&["core"], &options()).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<InstallerError>(),
        Some(&InstallerError::HasDependents {
            name: "core".into(),
            dependents: vec!["commands".into()],
        })
    );
    assert!(env.installed("CLAUDE.md").exists());

    let report = installer.uninstall(&["core", "commands"], &options()).await.unwrap();
    assert_eq!(report.succeeded_names(), ["commands", "core"]);
    assert!(!env.installed("commands").exists());
    assert!(installer.context().store().installed_components().unwrap().is_empty());
}

#[tokio::test]
async fn test_uninstall_not_installed_is_skipped() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    let report = installer.uninstall(&["agents"], &options()).await.unwrap();
    assert!(report.succeeded.is_empty());
    assert_eq!(report.skipped, ["agents"]);
}

#[tokio::test]
async fn test_verify_detects_modified_file() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["agents"], &options()).await.unwrap();

    let clean = installer.verify().unwrap();
    assert!(clean.is_ok(), "{clean:?}");

    env.write_installed("agents/reviewer.md", "changed\n").unwrap();
    fs::remove_file(env.installed("RULES.md")).unwrap();
    let report = installer.verify().unwrap();
    assert!(!report.is_ok());
    assert_eq!(report.integrity.modified, ["agents/reviewer.md"]);
    assert_eq!(report.integrity.missing, ["RULES.md"]);
    assert_eq!(report.failing_components(), ["core"]);
}

#[tokio::test]
async fn test_status_lists_every_component() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["core"], &options()).await.unwrap();

    let status = installer.status().unwrap();
    let names: Vec<_> = status.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["agents", "commands", "core", "hooks", "mcp"]);
    let core = status.iter().find(|s| s.name == "core").unwrap();
    assert_eq!(core.installed_version.as_deref(), Some(crate::constants::FRAMEWORK_VERSION));
    assert!(status.iter().filter(|s| s.name != "core").all(|s| s.installed_version.is_none()));
}
