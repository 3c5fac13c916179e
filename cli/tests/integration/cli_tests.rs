//! Argument parsing, validation and preflight behavior of the binary.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary with a clean, offline environment rooted in `dir`.
fn create_td_image(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("create-td-image"));
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env("TDX_TOOLS_DIR", dir.path())
        .env("OFFICIAL_UBUNTU_IMAGE", "http://127.0.0.1:9/")
        .env_remove("CLOUD_IMG")
        .env_remove("GUEST_USER")
        .env_remove("GUEST_PASSWORD")
        .env_remove("GUEST_HOSTNAME");
    cmd
}

fn tempdir() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

// --- Help and version ---

#[test]
fn test_help_flag_exits_zero() {
    let dir = tempdir();
    create_td_image(&dir)
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("-o, --output"))
        .stdout(predicate::str::contains("--boot-wait"));
}

#[test]
fn test_help_hides_password_default() {
    let dir = tempdir();
    create_td_image(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("123456").not());
}

#[test]
fn test_version_flag() {
    let dir = tempdir();
    create_td_image(&dir)
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains("create-td-image"));
}

// --- Usage errors exit 1 ---

#[test]
fn test_invalid_option_exits_one_with_usage() {
    let dir = tempdir();
    create_td_image(&dir)
        .arg("-x")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_non_numeric_size_exits_one() {
    let dir = tempdir();
    create_td_image(&dir).args(["-s", "lots"]).assert().code(1);
}

// --- Configuration errors exit 1 before any work ---

#[test]
fn test_custom_image_flag_is_unsupported() {
    let dir = tempdir();
    create_td_image(&dir)
        .arg("-c")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("-c"));
}

#[test]
fn test_output_without_qcow2_suffix_is_rejected() {
    let dir = tempdir();
    create_td_image(&dir)
        .args(["-o", "guest.img"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(".qcow2"));
    assert!(!dir.path().join("SHA256SUMS").exists());
}

#[test]
fn test_output_named_like_cloud_image_is_rejected() {
    let dir = tempdir();
    create_td_image(&dir)
        .env("CLOUD_IMG", "base.qcow2")
        .args(["-o", "base.qcow2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("different name"));
}

#[test]
fn test_missing_repo_is_rejected() {
    let dir = tempdir();
    create_td_image(&dir)
        .args(["-r", "no-such-repo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no-such-repo"));
}

#[test]
fn test_invalid_hostname_is_rejected() {
    let dir = tempdir();
    create_td_image(&dir)
        .args(["-n", "bad_host!"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid hostname"));
}

#[test]
fn test_zero_size_is_rejected() {
    let dir = tempdir();
    create_td_image(&dir)
        .args(["-s", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid image size"));
}

// --- Preflight ---

#[test]
fn test_missing_tools_fail_before_download_and_clean_manifest() {
    let dir = tempdir();
    let empty_path = tempdir();
    std::fs::write(dir.path().join("SHA256SUMS"), "left by an interrupted run").expect("seed");
    create_td_image(&dir)
        .env("PATH", empty_path.path())
        .args(["-o", "out.qcow2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Please install qemu-img"));
    assert!(!dir.path().join("SHA256SUMS").exists());
    assert!(!dir.path().join("out.qcow2").exists());
}

#[test]
fn test_no_color_accepts_any_non_empty_value() {
    let dir = tempdir();
    let empty_path = tempdir();
    create_td_image(&dir)
        .env("NO_COLOR", "yesplease")
        .env("PATH", empty_path.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Please install qemu-img"))
        .stderr(predicate::str::contains("Usage:").not());
}
