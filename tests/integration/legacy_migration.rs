use crew_installer::component::{Component, CoreComponent, HooksComponent};
use crew_installer::installer::RunOptions;
use crew_installer::test_utils::TestEnvironment;
use serde_json::{Value, json};

fn write_legacy_settings(env: &TestEnvironment) {
    let settings = json!({
        "theme": "dark",
        "permissions": {"allow": ["Read"]},
        "components": {"core": {"version": "3.9.0", "installed_at": "2025-01-01T00:00:00Z"}},
        "framework": {"version": "3.9.0"}
    });
    env.write_installed("settings.json", &serde_json::to_string_pretty(&settings).unwrap())
        .unwrap();
}

#[test]
fn test_legacy_record_counts_as_installed() {
    let env = TestEnvironment::new().unwrap();
    write_legacy_settings(&env);

    let core = CoreComponent::new(&env.context());
    assert!(core.is_installed().unwrap());
    assert_eq!(core.installed_version().unwrap().as_deref(), Some("3.9.0"));
}

#[tokio::test]
async fn test_install_migrates_then_upgrades() {
    let env = TestEnvironment::new().unwrap();
    write_legacy_settings(&env);
    let installer = env.installer().unwrap();

    installer.install(&["core"], &RunOptions::default()).await.unwrap();

    let settings: Value = serde_json::from_str(&env.read_installed("settings.json").unwrap()).unwrap();
    assert_eq!(settings, json!({"theme": "dark", "permissions": {"allow": ["Read"]}}));

    let store = installer.context().store();
    let doc = store.load_metadata().unwrap();
    let core = &doc.components()["core"];
    assert_eq!(core.version, crew_installer::constants::FRAMEWORK_VERSION);
    assert_eq!(core.installed_at.as_deref(), Some("2025-01-01T00:00:00Z"));

    let backups = store.backups().list().unwrap();
    assert_eq!(backups.len(), 1);
    let backed_up: Value = serde_json::from_str(&std::fs::read_to_string(&backups[0]).unwrap()).unwrap();
    assert_eq!(backed_up["framework"]["version"], "3.9.0");
}

#[tokio::test]
async fn test_second_migration_is_a_no_op() {
    let env = TestEnvironment::new().unwrap();
    write_legacy_settings(&env);
    let installer = env.installer().unwrap();
    let store = installer.context().store();

    assert!(store.migrate_metadata().unwrap());
    assert!(!store.migrate_metadata().unwrap());
    assert_eq!(store.backups().list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_uninstall_clears_legacy_record() {
    let env = TestEnvironment::new().unwrap();
    let settings = json!({
        "theme": "dark",
        "components": {
            "core": {"version": "3.0.0"},
            "hooks": {"version": "3.0.0"}
        }
    });
    env.write_installed("settings.json", &serde_json::to_string_pretty(&settings).unwrap())
        .unwrap();
    let installer = env.installer().unwrap();
    assert!(HooksComponent::new(&env.context()).is_installed().unwrap());

    let report = installer.uninstall(&["hooks"], &RunOptions::default()).await.unwrap();
    assert_eq!(report.succeeded_names(), ["hooks"]);
    assert!(!HooksComponent::new(&env.context()).is_installed().unwrap());
    assert!(CoreComponent::new(&env.context()).is_installed().unwrap());

    let settings: Value = serde_json::from_str(&env.read_installed("settings.json").unwrap()).unwrap();
    assert_eq!(settings, json!({"theme": "dark"}));

    let again = installer.uninstall(&["hooks"], &RunOptions::default()).await.unwrap();
    assert!(again.succeeded.is_empty());
    assert_eq!(again.skipped, ["hooks"]);
}
