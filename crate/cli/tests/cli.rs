//! Tests of the `tpm-locker` binary that do not need a TPM.
//!
//! The tests requiring tpm2-tss and a TPM (or simulator) are gated behind the
//! `tpm` feature:
//! ```sh
//! TSS2_FAPICONF=/tmp/fapi-config.json cargo test --features tpm -- --ignored
//! ```
use std::{fs, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;
use tpm_locker::{Command as LockerCommand, Transcript};

const PROG_NAME: &str = "tpm-locker";
const MISSING_LIBRARY: &str = "/nonexistent/libtss2-fapi.so.1";
// TSS2_FAPI_RC_GENERAL_FAILURE
const GENERAL_FAILURE: i64 = 0x60001;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(PROG_NAME).unwrap();
    for var in [
        "TPM_LOCKER_CONF",
        "TPM_LOCKER_FAPI_LIB",
        "TPM_LOCKER_RC_LIB",
        "TPM_LOCKER_LOCKOUT_SECRET",
        "TPM_LOCKER_AUTH_SECRET",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn transcript(command: LockerCommand, stdout: &[u8]) -> Transcript {
    Transcript::parse(command, &String::from_utf8_lossy(stdout))
}

#[test]
fn test_no_arguments() {
    cmd()
        .assert()
        .success()
        .stdout("No arguments specified\n");
}

#[test]
fn test_no_arguments_does_not_load_the_library() {
    cmd()
        .args(["--fapi-lib", MISSING_LIBRARY])
        .assert()
        .success()
        .stdout(predicate::str::contains("No arguments specified"));
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init").and(predicate::str::contains("enc")));
}

#[test]
fn test_unknown_command() {
    cmd().arg("decrypt").assert().failure();
}

#[test]
fn test_missing_library() {
    for (name, command) in [
        ("test", LockerCommand::Test),
        ("init", LockerCommand::Init),
        ("enc", LockerCommand::Encrypt),
    ] {
        let output = cmd()
            .args([name, "--fapi-lib", MISSING_LIBRARY])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));
        let transcript = transcript(command, &output.stdout);
        assert_eq!(transcript.report.command, command);
        assert_eq!(transcript.report.result, GENERAL_FAILURE);
        assert!(transcript.report.message.contains(MISSING_LIBRARY));
    }
}

#[test]
fn test_missing_library_from_config_file() {
    let dir = TempDir::new().unwrap();
    let conf = dir.path().join("tpm-locker.toml");
    fs::write(&conf, format!("[fapi]\nlibrary = \"{MISSING_LIBRARY}\"\n")).unwrap();
    let output = cmd()
        .arg("init")
        .env("TPM_LOCKER_CONF", &conf)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let transcript = transcript(LockerCommand::Init, &output.stdout);
    assert_eq!(transcript.report.result, GENERAL_FAILURE);
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let conf = dir.path().join("tpm-locker.toml");
    fs::write(&conf, "[keys]\napplication_key_path = \"relative\"\n").unwrap();
    let output = cmd()
        .args(["enc", "--conf"])
        .arg(&conf)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let transcript = transcript(LockerCommand::Encrypt, &output.stdout);
    assert_eq!(transcript.report.result, GENERAL_FAILURE);
    assert!(transcript.report.message.contains("application_key_path"));
}

#[test]
fn test_logs_go_to_stderr() {
    let output = cmd()
        .args(["test", "--fapi-lib", MISSING_LIBRARY])
        .env("RUST_LOG", "debug")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    // the report is the only line on stdout
    assert_eq!(stdout.lines().count(), 1);
    assert!(!output.stderr.is_empty());
}

#[cfg(feature = "tpm")]
mod tpm {
    use tpm_locker::{Command as LockerCommand, RESULT_NO_OUTPUT};

    use super::{cmd, transcript};

    #[test]
    #[ignore = "Requires tpm2-tss and a TPM or simulator"]
    fn test_init_twice_then_enc() {
        for _ in 0..2 {
            let output = cmd().arg("init").output().unwrap();
            let transcript = transcript(LockerCommand::Init, &output.stdout);
            assert!(output.status.success(), "{:?}", transcript.report);
            assert_eq!(transcript.report.message, "success");
        }
        let output = cmd().arg("enc").output().unwrap();
        assert!(output.status.success());
        let transcript = transcript(LockerCommand::Encrypt, &output.stdout);
        assert_ne!(transcript.report.result, RESULT_NO_OUTPUT);
        assert_eq!(transcript.payload[0], "128");
    }

    #[test]
    #[ignore = "Requires tpm2-tss and a TPM or simulator"]
    fn test_module_info() {
        let output = cmd().arg("test").output().unwrap();
        assert!(output.status.success());
        let transcript = transcript(LockerCommand::Test, &output.stdout);
        assert!(transcript.report.is_success());
        assert!(!transcript.payload.is_empty());
    }
}
