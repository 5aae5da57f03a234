use crew_installer::component::InstallConfig;
use crew_installer::installer::RunOptions;
use crew_installer::metadata::MetadataStore;
use crew_installer::test_utils::{TestEnvironment, init_test_logging};
use crew_installer::transfer::Inventory;
use std::path::Path;

fn options(config: InstallConfig) -> RunOptions {
    RunOptions {
        config,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_lifecycle() {
    init_test_logging(None);
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();

    let report = installer
        .install(&["commands", "hooks", "agents", "mcp"], &RunOptions::default())
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.files_written(), 8);

    // A second store over the same root sees every registration
    let store = MetadataStore::new(env.install_root());
    assert_eq!(store.installed_components().unwrap(), ["agents", "commands", "core", "hooks", "mcp"]);
    let doc = store.load_metadata().unwrap();
    let integrity = doc.integrity.unwrap();
    assert_eq!(integrity.file_hashes().len(), 8);
    assert_eq!(integrity.file_hashes()["hooks/pre_tool_use.sh"].component, "hooks");

    let inventory = Inventory::new(store.layout().inventory_file());
    assert!(inventory.contains(Path::new("commands/crew/build.md")).unwrap());
    assert!(inventory.contains(Path::new("commands")).unwrap());

    assert!(installer.verify().unwrap().is_ok());
    let staging = env.installed(".crew/staging");
    assert!(!staging.exists() || std::fs::read_dir(&staging).unwrap().count() == 0);

    let report = installer
        .uninstall(&["agents", "commands", "hooks", "mcp", "core"], &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(report.succeeded_names(), ["mcp", "hooks", "commands", "agents", "core"]);
    for dir in ["agents", "commands", "hooks", "mcp"] {
        assert!(!env.installed(dir).exists(), "{dir} left behind");
    }
    assert!(!env.installed("CLAUDE.md").exists());
    assert!(store.installed_components().unwrap().is_empty());
}

#[tokio::test]
async fn test_existing_claude_md_is_appended_once() {
    let env = TestEnvironment::new().unwrap();
    env.write_installed("CLAUDE.md", "# My own notes\n").unwrap();
    let installer = env.installer().unwrap();

    installer.install(&["core"], &RunOptions::default()).await.unwrap();
    let merged = env.read_installed("CLAUDE.md").unwrap();
    assert!(merged.starts_with("# My own notes\n"));
    assert!(merged.contains("<!-- crew framework content"));
    assert!(merged.ends_with("@RULES.md\n"));

    let overwrite = options(InstallConfig {
        overwrite: true,
        ..Default::default()
    });
    installer.install(&["core"], &overwrite).await.unwrap();
    assert_eq!(env.read_installed("CLAUDE.md").unwrap(), "# Crew framework\n\n@RULES.md\n");
}

#[tokio::test]
async fn test_skip_existing_leaves_files_alone() {
    let env = TestEnvironment::new().unwrap();
    env.write_installed("RULES.md", "mine\n").unwrap();
    let installer = env.installer().unwrap();

    let report = installer
        .install(
            &["core"],
            &options(InstallConfig {
                skip_existing: true,
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    assert_eq!(report.succeeded[0].files_skipped, 1);
    assert_eq!(env.read_installed("RULES.md").unwrap(), "mine\n");
}

#[tokio::test]
async fn test_uninstall_keeps_user_data() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["agents"], &RunOptions::default()).await.unwrap();
    env.write_installed("agents/memory/notes.md", "remember\n").unwrap();

    let keep = options(InstallConfig {
        preserve_user_data: true,
        ..Default::default()
    });
    installer.uninstall(&["agents"], &keep).await.unwrap();
    assert!(!env.installed("agents/reviewer.md").exists());
    assert_eq!(env.read_installed("agents/memory/notes.md").unwrap(), "remember\n");
}

#[tokio::test]
async fn test_hooks_update_keeps_user_edits() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["hooks"], &RunOptions::default()).await.unwrap();
    env.write_installed("hooks/pre_tool_use.sh", "#!/bin/sh\necho customized\n").unwrap();

    let report = installer.update(&["hooks"], &RunOptions::default()).await.unwrap();
    assert_eq!(report.succeeded[0].files_skipped, 1);
    assert!(env.read_installed("hooks/pre_tool_use.sh").unwrap().contains("customized"));

    let overwrite = options(InstallConfig {
        overwrite: true,
        ..Default::default()
    });
    installer.update(&["hooks"], &overwrite).await.unwrap();
    assert_eq!(env.read_installed("hooks/pre_tool_use.sh").unwrap(), "#!/bin/sh\nexit 0\n");
}

#[tokio::test]
async fn test_dry_run_uninstall_changes_nothing() {
    let env = TestEnvironment::new().unwrap();
    let installer = env.installer().unwrap();
    installer.install(&["commands"], &RunOptions::default()).await.unwrap();

    let dry = options(InstallConfig {
        dry_run: true,
        ..Default::default()
    });
    let report = installer.uninstall(&["commands"], &dry).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.files_removed(), 2);
    assert!(env.installed("commands/crew/build.md").exists());
    assert!(installer.context().store().is_component_installed("commands").unwrap());
}
