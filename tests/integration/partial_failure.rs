use crew_installer::installer::RunOptions;
use crew_installer::test_utils::TestEnvironment;
use std::fs;

/// `CLAUDE.md` exists as a directory, so merging into it fails while
/// `RULES.md` copies fine.
fn blocked_environment(staged: bool) -> TestEnvironment {
    let env = TestEnvironment::new().unwrap().with_staged_commit(staged);
    fs::create_dir_all(env.installed("CLAUDE.md")).unwrap();
    env
}

#[tokio::test]
async fn test_staged_commit_writes_nothing_on_failure() {
    let env = blocked_environment(true);
    let installer = env.installer().unwrap();

    let report = installer.install(&["commands"], &RunOptions::default()).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "core");
    assert!(report.failed[0].1.contains("1/2"), "{}", report.failed[0].1);
    assert_eq!(report.skipped, ["commands"]);

    assert!(!env.installed("RULES.md").exists());
    assert!(!env.installed("commands").exists());
    assert!(installer.context().store().installed_components().unwrap().is_empty());
}

#[tokio::test]
async fn test_direct_copy_reports_partial_progress() {
    let env = blocked_environment(false);
    let installer = env.installer().unwrap();

    let report = installer.install(&["core"], &RunOptions::default()).await.unwrap();
    assert!(!report.is_success());
    assert!(report.failed[0].1.contains("1/2"), "{}", report.failed[0].1);

    // The file that did copy stays, but the component is not registered
    assert!(env.installed("RULES.md").exists());
    assert!(!installer.context().store().is_component_installed("core").unwrap());
}

#[tokio::test]
async fn test_failed_level_stops_later_levels() {
    let env = blocked_environment(true);
    let installer = env.installer().unwrap();
    let options = RunOptions {
        max_parallel: 4,
        ..Default::default()
    };

    let report = installer.install(&["agents", "hooks"], &options).await.unwrap();
    assert!(report.succeeded.is_empty());
    assert_eq!(report.skipped, ["agents", "hooks"]);
    assert!(!env.installed("agents").exists());
}
