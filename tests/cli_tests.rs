use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn valid_config() -> String {
    easyswap_sync::testkit::config::toml(11_155_111, Path::new("unused.db"))
}

#[test]
fn check_accepts_valid_config() {
    let file = write_temp_config(&valid_config());

    Command::cargo_bin("easyswap-sync")
        .unwrap()
        .arg("--config")
        .arg(file.path())
        .arg("--check")
        .env_remove("ANKR_API_KEY")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"));
}

#[test]
fn missing_config_exits_nonzero() {
    Command::cargo_bin("easyswap-sync")
        .unwrap()
        .args(["--config", "/nonexistent/easyswap-sync/config.toml", "--check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn invalid_config_reports_the_field() {
    let toml = valid_config().replace(
        "0xcEE5AA84032D4a53a0F9d2c33F36701c3eAD5895",
        "0x1234",
    );
    let file = write_temp_config(&toml);

    Command::cargo_bin("easyswap-sync")
        .unwrap()
        .arg("--config")
        .arg(file.path())
        .arg("--check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("contract_cfg.dex_address"));
}

#[test]
fn config_path_can_come_from_environment() {
    let file = write_temp_config(&valid_config());

    Command::cargo_bin("easyswap-sync")
        .unwrap()
        .env("EASYSWAP_SYNC_CONFIG", file.path())
        .arg("--check")
        .assert()
        .success();
}
