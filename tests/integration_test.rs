use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;


use test_utils::{MockPackage, MockRepository};

/// Helper to create an isolated home for config and packages
fn setup_test_home() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Helper to get the binary command
fn plugpm_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_plugpm"));
    cmd.env("PLUGPM_CONFIG_DIR", home.join(".plugpm"))
        .env("PLUGPM_PACKAGES_DIR", home.join("packages"))
        .env("PLUGPM_USR", "/host/user")
        .env_remove("PLUGPM_LOG");
    cmd
}

/// Point the CLI at a single repository
fn configure_repo(home: &Path, url: &str, initial: &[&str]) {
    let config_dir = home.join(".plugpm");
    fs::create_dir_all(&config_dir).expect("Failed to create config dir");

    let initial: Vec<String> = initial.iter().map(|p| format!("\"{}\"", p)).collect();
    let config_content = format!(
        r#"repos = ["{}"]
initial_packages = [{}]

[network]
timeout_secs = 5
"#,
        url,
        initial.join(", ")
    );

    fs::write(config_dir.join("config.toml"), config_content).expect("Failed to write config");
}

#[test]
fn test_list_empty() {
    let home = setup_test_home();

    plugpm_cmd(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages installed."));
}

#[test]
fn test_config_set_and_show() {
    let home = setup_test_home();

    plugpm_cmd(home.path())
        .args(["config", "set", "network.timeout_secs", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("network.timeout_secs = \"3\""));

    assert!(home.path().join(".plugpm").join("config.toml").is_file());

    plugpm_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Timeout:          3s"));
}

#[test]
fn test_config_set_unknown_key() {
    let home = setup_test_home();

    plugpm_cmd(home.path())
        .args(["config", "set", "no.such.key", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_completions() {
    let home = setup_test_home();

    plugpm_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plugpm"));
}

#[test]
fn test_install_list_uninstall() {
    let home = setup_test_home();
    let mut server = MockRepository::new();
    let _mock = server.serve(&MockPackage::new("ifred", "1.2.0"), 1);
    configure_repo(home.path(), &server.server.url(), &[]);

    plugpm_cmd(home.path())
        .args(["install", "ifred"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ifred 1.2.0 installed"));

    assert!(home.path().join("packages/ifred/info.json").is_file());

    plugpm_cmd(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("ifred @ 1.2.0"));

    plugpm_cmd(home.path())
        .args(["uninstall", "ifred"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully uninstalled ifred"));

    assert!(!home.path().join("packages/ifred").exists());
}

#[test]
fn test_install_with_repo_flag() {
    let home = setup_test_home();
    let mut server = MockRepository::new();
    let _mock = server.serve(&MockPackage::new("ifred", "1.2.0"), 1);

    plugpm_cmd(home.path())
        .args(["install", "ifred", "--repo", &server.server.url()])
        .assert()
        .success();

    assert!(home.path().join("packages/ifred/info.json").is_file());
}

#[test]
fn test_install_unknown_package_fails() {
    let home = setup_test_home();
    let mut server = MockRepository::new();
    let _mock = server
        .server
        .mock("GET", "/download")
        .match_query(mockito::Matcher::Any)
        .with_status(404)
        .create();
    configure_repo(home.path(), &server.server.url(), &[]);

    plugpm_cmd(home.path())
        .args(["install", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to download ghost"));
}

#[test]
fn test_uninstall_not_installed() {
    let home = setup_test_home();

    plugpm_cmd(home.path())
        .args(["uninstall", "ghost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is not installed"));
}

#[test]
fn test_search_lists_catalog() {
    let home = setup_test_home();
    let mut server = MockRepository::new();
    let _mock = server.serve_catalog(&[("ifred", "IFred", "1.2.0"), ("other", "Other", "0.1.0")]);
    configure_repo(home.path(), &server.server.url(), &[]);

    plugpm_cmd(home.path())
        .arg("search")
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 packages"))
        .stdout(predicate::str::contains("ifred @ 1.2.0 - IFred"));

    plugpm_cmd(home.path())
        .args(["search", "oth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 package:"));
}

#[test]
fn test_info() {
    let home = setup_test_home();
    let mut server = MockRepository::new();
    let _mock = server
        .server
        .mock("GET", "/info")
        .match_query(mockito::Matcher::UrlEncoded("id".into(), "ifred".into()))
        .with_body(r#"{"success": true, "data": {"id": "ifred", "name": "IFred", "version": "1.2.0"}}"#)
        .create();
    configure_repo(home.path(), &server.server.url(), &[]);

    plugpm_cmd(home.path())
        .args(["info", "ifred"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IFred (ifred)"))
        .stdout(predicate::str::contains("Installed:      no"));
}

#[test]
fn test_env_installs_initial_packages() {
    let home = setup_test_home();
    let mut server = MockRepository::new();
    let _mock = server.serve(&MockPackage::new("ifred", "1.2.0"), 1);
    configure_repo(home.path(), &server.server.url(), &["ifred"]);

    let entry = home.path().join("packages").join("ifred");
    plugpm_cmd(home.path())
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("PLUGPM_USR=/host/user:"))
        .stdout(predicate::str::contains(entry.display().to_string()));
}
