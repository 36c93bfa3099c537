//! End-to-end tests for the docuval binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn docuval() -> Command {
    Command::cargo_bin("docuval").unwrap()
}

#[test]
fn test_schema_list_shows_builtin_types() {
    docuval()
        .args(["schema", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invoice"))
        .stdout(predicate::str::contains("contract"))
        .stdout(predicate::str::contains("service_delivery_record"));
}

#[test]
fn test_schema_show_lists_fields_and_rules() {
    docuval()
        .args(["schema", "show", "invoice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invoice_number"))
        .stdout(predicate::str::contains("Rules:"));
}

#[test]
fn test_schema_show_unknown_type_fails() {
    docuval()
        .args(["schema", "show", "purchase_order"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("purchase_order"));
}

#[test]
fn test_schema_check_valid_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"memo": {{"fields": [{{"name": "subject", "kind": "regex", "pattern": "subject:\\s*(.+)"}}]}}}}"#
    )
    .unwrap();

    docuval()
        .args(["schema", "check"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("compiled"));
}

#[test]
fn test_schema_check_rejects_bad_pattern() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"memo": {{"fields": [{{"name": "subject", "kind": "regex", "pattern": "([unclosed"}}]}}}}"#
    )
    .unwrap();

    docuval()
        .args(["schema", "check"])
        .arg(file.path())
        .assert()
        .failure();
}

#[test]
fn test_process_missing_file_fails() {
    docuval()
        .args(["process", "/nonexistent/invoice.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_process_unsupported_extension_fails() {
    let file = tempfile::NamedTempFile::with_suffix(".docx").unwrap();
    docuval()
        .arg("process")
        .arg(file.path())
        .assert()
        .failure();
}

#[test]
fn test_batch_no_matches_fails() {
    docuval()
        .args(["batch", "/nonexistent/*.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_config_path_prints_location() {
    docuval()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file"));
}
