use assert_cmd::Command;
use crew_installer::test_utils::SourceFixture;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

struct CliEnv {
    temp: TempDir,
}

impl CliEnv {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        SourceFixture::framework().write_to(&temp.path().join("source")).unwrap();
        std::fs::create_dir_all(temp.path().join("home")).unwrap();
        Self {
            temp,
        }
    }

    fn install_root(&self) -> std::path::PathBuf {
        self.temp.path().join("install")
    }

    fn crew(&self) -> Command {
        let mut cmd = Command::cargo_bin("crew").unwrap();
        cmd.env("HOME", self.temp.path().join("home"))
            .env("NO_COLOR", "1")
            .env_remove("CREW_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--install-dir")
            .arg(self.install_root())
            .arg("--source")
            .arg(self.temp.path().join("source"))
            .arg("--no-progress");
        cmd
    }
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("crew")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("verify"));
}

#[test]
#[serial]
fn test_install_list_verify_uninstall() {
    let env = CliEnv::new();

    env.crew()
        .args(["install", "commands"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core, commands"))
        .stdout(predicate::str::contains("install complete"));
    assert!(env.install_root().join("commands/crew/test.md").exists());

    env.crew()
        .args(["list", "--installed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("commands"))
        .stdout(predicate::str::contains("hooks").not());

    env.crew().arg("verify").assert().success().stdout(predicate::str::contains("Installation verified"));

    env.crew()
        .args(["uninstall", "core"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required by installed component"));

    env.crew().args(["uninstall", "commands", "core"]).assert().success();
    assert!(!env.install_root().join("commands").exists());
}

#[test]
#[serial]
fn test_verify_fails_after_tampering() {
    let env = CliEnv::new();
    env.crew().args(["install", "core"]).assert().success();
    std::fs::write(env.install_root().join("RULES.md"), "tampered\n").unwrap();

    env.crew()
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("modified"))
        .stdout(predicate::str::contains("RULES.md"));
}

#[test]
#[serial]
fn test_unknown_component_suggests_name() {
    let env = CliEnv::new();
    env.crew()
        .args(["install", "agnets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("agnets"))
        .stderr(predicate::str::contains("agents"));
}

#[test]
#[serial]
fn test_plan_shows_levels_and_tree() {
    let env = CliEnv::new();
    env.crew()
        .args(["plan", "hooks", "agents", "--tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Level 1: core"))
        .stdout(predicate::str::contains("Level 2: agents, hooks"))
        .stdout(predicate::str::contains("└── core"));
    assert!(!env.install_root().exists());
}

#[test]
#[serial]
fn test_dangerous_install_dir_rejected() {
    let env = CliEnv::new();
    Command::cargo_bin("crew")
        .unwrap()
        .env("HOME", env.temp.path().join("home"))
        .env("NO_COLOR", "1")
        .env_remove("CREW_CONFIG")
        .args(["--install-dir", "/etc", "--source"])
        .arg(env.temp.path().join("source"))
        .args(["--no-progress", "install", "core"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/etc"));
}

#[test]
#[serial]
fn test_config_file_sets_install_dir() {
    let env = CliEnv::new();
    let config = env.temp.path().join("crew.toml");
    let root = env.temp.path().join("from-config");
    std::fs::write(&config, format!("install_dir = {:?}\nstaged_commit = false\n", root.display().to_string()))
        .unwrap();

    Command::cargo_bin("crew")
        .unwrap()
        .env("HOME", env.temp.path().join("home"))
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(&config)
        .arg("--source")
        .arg(env.temp.path().join("source"))
        .args(["--no-progress", "install", "core"])
        .assert()
        .success();
    assert!(root.join("CLAUDE.md").exists());
}
