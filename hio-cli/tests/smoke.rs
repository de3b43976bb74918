use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn create_write_read_list_unlink_happy_path() {
    let td = assert_fs::TempDir::new().unwrap();

    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "create", "ds", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created ds generation 1"));

    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "write", "ds", "1", "E", "hello there"])
        .assert()
        .success();

    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "read", "ds", "1", "E", "11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello there"));

    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "list", "ds"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ds"));

    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "unlink", "ds", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unlinked ds generation 1"));

    td.child("0.hio/ds/1").assert(predicate::path::missing());
}

#[test]
fn read_of_unwritten_element_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "create", "ds", "1"])
        .assert()
        .success();

    Command::cargo_bin("hio")
        .unwrap()
        .args(["--root", td.path().to_str().unwrap(), "read", "ds", "1", "missing", "4"])
        .assert()
        .failure();
}
