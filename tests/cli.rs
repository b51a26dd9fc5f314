use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_input(dir: &TempDir, source: &str) -> std::path::PathBuf {
    let path = dir.path().join("input.idl");
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn test_translates_file() {
    let temp = TempDir::new().unwrap();
    let input = write_input(&temp, "typedef long MyLong;\nenum Color { RED, GREEN };\n");
    let output = temp.path().join("out.rs");

    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg(&input).arg(&output);
    cmd.assert().success();

    let source = fs::read_to_string(&output).unwrap();
    assert!(source.starts_with("// Generated from MIDL by comidl. Do not edit."));
    assert!(source.contains("pub mod idl {"));
    assert!(source.contains("pub type MyLong = i32;"));
    assert!(source.contains("pub const GREEN: Color = 1;"));
}

#[test]
fn test_config_flags() {
    let temp = TempDir::new().unwrap();
    let input = write_input(&temp, "typedef long MyLong;");
    let output = temp.path().join("out.rs");

    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg(&input)
        .arg(&output)
        .args(["--package", "shell", "--types-path", "crate::types"])
        .args(["--indent", "2", "--no-header"]);
    cmd.assert().success();

    let source = fs::read_to_string(&output).unwrap();
    assert!(source.starts_with("pub mod shell {\n"));
    assert!(source.contains("\n  use crate::types::*;\n"));
}

#[test]
fn test_parse_failure_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let input = write_input(&temp, "[object, uuid(1234) interface IFoo { }");
    let output = temp.path().join("out.rs");

    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg(&input).arg(&output);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("syntax error"));

    assert!(!output.exists());
}

#[test]
fn test_missing_input() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.rs");

    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg(temp.path().join("missing.idl")).arg(&output);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));

    assert!(!output.exists());
}

#[test]
fn test_warning_keeps_success() {
    let temp = TempDir::new().unwrap();
    let input = write_input(&temp, "coclass Widget { interface IWidget; };\ntypedef double Real;");
    let output = temp.path().join("out.rs");

    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg(&input).arg(&output);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("skipped coclass 'Widget'"));

    let source = fs::read_to_string(&output).unwrap();
    assert!(source.contains("pub type Real = f64;"));
}

#[test]
fn test_quiet_hides_warnings() {
    let temp = TempDir::new().unwrap();
    let input = write_input(&temp, "coclass Widget { interface IWidget; };");
    let output = temp.path().join("out.rs");

    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg(&input).arg(&output).arg("-q");
    cmd.assert().success().stderr(predicate::str::is_empty());
}

#[test]
fn test_help() {
    let mut cmd = cargo_bin_cmd!("comidl");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Translate MIDL interface definitions"));
}
