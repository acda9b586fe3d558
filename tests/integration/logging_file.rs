//! Running the binary with file log output writes structured logs.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_file_output_receives_json_logs() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("ws");
    let config_home = temp_dir.path().join("config");
    fs::create_dir_all(&workspace).unwrap();
    fs::create_dir_all(&config_home).unwrap();
    let log_file = temp_dir.path().join("logs").join("storyprompt.log");

    let bin = env!("CARGO_BIN_EXE_storyprompt");
    let output = Command::new(bin)
        .env("XDG_CONFIG_HOME", config_home.as_os_str())
        .env_remove("STORYPROMPT_LOG")
        .env_remove("STORYPROMPT_LOG_FORMAT")
        .env_remove("STORYPROMPT_LOG_OUTPUT")
        .arg("--workspace")
        .arg(&workspace)
        .arg("--log-level")
        .arg("info")
        .arg("--log-format")
        .arg("json")
        .arg("--log-output")
        .arg("file")
        .arg("--log-file")
        .arg(&log_file)
        .arg("gate")
        .arg("check")
        .arg("Why did Marcus keep the Buick after Duluth?")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "gate check should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("PASS"));

    let content = fs::read_to_string(&log_file).unwrap();
    let first = content.lines().next().expect("log file should not be empty");
    let entry: serde_json::Value = serde_json::from_str(first).unwrap();
    assert_eq!(entry["level"], "INFO");
    assert!(content.contains("Command finished"));
}

#[test]
fn test_quiet_writes_no_log_file() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    let log_file = temp_dir.path().join("quiet.log");

    let bin = env!("CARGO_BIN_EXE_storyprompt");
    let output = Command::new(bin)
        .env("XDG_CONFIG_HOME", temp_dir.path().join("config").as_os_str())
        .arg("--workspace")
        .arg(&workspace)
        .arg("--quiet")
        .arg("--log-output")
        .arg("file")
        .arg("--log-file")
        .arg(&log_file)
        .arg("catalog")
        .arg("list")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(!log_file.exists());
}
