//! CLI tests for the `shellpilot` binary.
//!
//! Spawns the binary and checks output and exit codes. Nothing here reaches
//! the network: `run` either fails on the missing credential or exits on the
//! sentinel before the first oracle call.

use std::io::Write;
use std::process::{Command, Stdio};

use shellpilot::exit_codes;
use shellpilot::io::config::{OracleConfig, PilotConfig, load_config, write_config};

const KEY_VAR: &str = "SHELLPILOT_CLI_TEST_KEY";

fn config_with_key_var(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("shellpilot.toml");
    let cfg = PilotConfig {
        oracle: OracleConfig {
            api_key_env: KEY_VAR.to_string(),
            ..OracleConfig::default()
        },
        ..PilotConfig::default()
    };
    write_config(&path, &cfg).expect("write config");
    path
}

#[test]
fn classify_reads_plan_from_stdin() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut child = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .arg("classify")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn classify");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"cd src\ntouch app.py\nnpm run dev\n# comment\nnode index.js\n")
        .expect("write plan");
    let output = child.wait_with_output().expect("wait classify");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "cd src\tcd src",
            "create app.py\ttouch app.py",
            "filtered\tnpm run dev",
            "skip\t# comment",
            "shell\tnode index.js",
        ]
    );
}

#[test]
fn run_without_credential_fails_fast() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_with_key_var(temp.path());

    let output = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .env_remove(KEY_VAR)
        .args(["run", "--config"])
        .arg(&config)
        .stdin(Stdio::null())
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(KEY_VAR), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn run_exit_sentinel_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_with_key_var(temp.path());

    let output = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .env(KEY_VAR, "test-key")
        .args(["run", "--task", "Exit", "--config"])
        .arg(&config)
        .stdin(Stdio::null())
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn run_with_closed_stdin_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = config_with_key_var(temp.path());

    let status = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .env(KEY_VAR, "test-key")
        .args(["run", "--config"])
        .arg(&config)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .expect("run");

    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn init_writes_defaults_and_refuses_to_overwrite() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .arg("init")
        .stdout(Stdio::null())
        .status()
        .expect("init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    let path = temp.path().join("shellpilot.toml");
    assert_eq!(load_config(&path).expect("load"), PilotConfig::default());

    let again = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .arg("init")
        .output()
        .expect("init again");
    assert_eq!(again.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&again.stderr).contains("--force"));

    let forced = Command::new(env!("CARGO_BIN_EXE_shellpilot"))
        .current_dir(temp.path())
        .args(["init", "--force"])
        .stdout(Stdio::null())
        .status()
        .expect("init --force");
    assert_eq!(forced.code(), Some(exit_codes::OK));
}
