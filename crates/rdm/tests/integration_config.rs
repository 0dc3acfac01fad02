//! Integration tests for the config editing commands

use assert_cmd::cargo;
use predicates::str::contains;
use std::path::PathBuf;
use tempfile::TempDir;

/// Point the CLI at a temporary data directory through `RDM_HOME`.
fn rdm(temp_dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("rdm");
    cmd.env("RDM_HOME", temp_dir.path()).env_remove("RDM_LOG");
    cmd
}

fn config_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("config.json")
}

fn read_config(temp_dir: &TempDir) -> serde_json::Value {
    let contents = std::fs::read_to_string(config_path(temp_dir)).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[test]
fn test_path_uses_rdm_home() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir)
        .arg("path")
        .assert()
        .success()
        .stdout(contains(config_path(&temp_dir).to_string_lossy().as_ref()));
}

#[test]
fn test_list_without_config_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("No remotes configured"));
}

#[test]
fn test_add_writes_index_keyed_file() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir)
        .args(["add", "gdrive:", "~/GDrive"])
        .assert()
        .success()
        .stdout(contains("Added remote 'gdrive'"));
    rdm(&temp_dir)
        .args(["add", "b2", "/mnt/b2", "--args", "--read-only"])
        .assert()
        .success();

    let config = read_config(&temp_dir);
    assert_eq!(config["count"], 2);
    assert_eq!(config["items"]["0"]["remote_name"], "gdrive");
    assert_eq!(config["items"]["0"]["mount_point"], "~/GDrive");
    assert_eq!(
        config["items"]["0"]["mount_args"],
        "--dir-cache-time 1m0s\n--vfs-cache-mode full"
    );
    assert_eq!(config["items"]["1"]["mount_args"], "--read-only");
}

#[test]
fn test_add_duplicate_fails() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir).args(["add", "gdrive", "/mnt/a"]).assert().success();
    rdm(&temp_dir)
        .args(["add", "gdrive", "/mnt/b"])
        .assert()
        .failure()
        .stderr(contains("gdrive"));

    assert_eq!(read_config(&temp_dir)["count"], 1);
}

#[test]
fn test_edit_and_list() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir).args(["add", "gdrive", "/mnt/a"]).assert().success();
    rdm(&temp_dir)
        .args(["edit", "gdrive", "--mountpoint", "/mnt/gdrive", "--args", "--vfs-cache-mode writes"])
        .assert()
        .success()
        .stdout(contains("Updated remote 'gdrive'"));

    rdm(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("/mnt/gdrive"))
        .stdout(contains("--vfs-cache-mode writes"));

    let output = rdm(&temp_dir).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(items[0]["remote_name"], "gdrive");
    assert_eq!(items[0]["mount_point"], "/mnt/gdrive");
}

#[test]
fn test_edit_requires_a_change() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir).args(["add", "gdrive", "/mnt/a"]).assert().success();
    rdm(&temp_dir)
        .args(["edit", "gdrive"])
        .assert()
        .failure()
        .stderr(contains("Nothing to change"));
}

#[test]
fn test_remove_reindexes_items() {
    let temp_dir = TempDir::new().unwrap();
    for (name, path) in [("a", "/mnt/a"), ("b", "/mnt/b"), ("c", "/mnt/c")] {
        rdm(&temp_dir).args(["add", name, path]).assert().success();
    }

    rdm(&temp_dir)
        .args(["remove", "b"])
        .assert()
        .success()
        .stdout(contains("Removed remote 'b'"));

    let config = read_config(&temp_dir);
    assert_eq!(config["count"], 2);
    assert_eq!(config["items"]["0"]["remote_name"], "a");
    assert_eq!(config["items"]["1"]["remote_name"], "c");
}

#[test]
fn test_remove_unknown_fails() {
    let temp_dir = TempDir::new().unwrap();
    rdm(&temp_dir)
        .args(["remove", "ghost"])
        .assert()
        .failure()
        .stderr(contains("Remote 'ghost' not found"));
}

#[test]
fn test_explicit_config_path() {
    let temp_dir = TempDir::new().unwrap();
    let custom = temp_dir.path().join("nested/custom.json");
    rdm(&temp_dir)
        .args(["--config", custom.to_str().unwrap(), "add", "gdrive", "/mnt/a"])
        .assert()
        .success();

    assert!(custom.exists());
    assert!(!config_path(&temp_dir).exists());
}

#[test]
fn test_invalid_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(config_path(&temp_dir), "{\"count\": 2, \"items\": {}}").unwrap();
    rdm(&temp_dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(contains("missing"));
}
