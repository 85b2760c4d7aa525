use assert_cmd::Command;
use predicates::prelude::*;

fn heron() -> Command {
    Command::cargo_bin("heron").unwrap()
}

#[test]
fn runs_a_program_and_prints_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("answer.heron");
    std::fs::write(
        &path,
        "module Answer { function Main() { return 6 * 7; } }",
    )
    .unwrap();

    heron()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn missing_files_fail_with_a_diagnostic() {
    heron()
        .arg("no/such/file.heron")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ModuleNotFound"));
}

#[test]
fn runtime_failures_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boom.heron");
    std::fs::write(
        &path,
        "module Boom { function Main() { return 1 / 0; } }",
    )
    .unwrap();

    heron()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("DivisionByZero"));
}

#[test]
fn explicit_config_files_are_honored() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("heron.toml");
    std::fs::write(&config, "max_threads = 2\n").unwrap();
    let path = dir.path().join("sum.heron");
    std::fs::write(
        &path,
        "module Sum { function Main() { return reduce (a, b in [1,2,3,4]) a + b; } }",
    )
    .unwrap();

    heron()
        .arg(&path)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[10]"));
}
