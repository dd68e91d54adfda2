use std::fs;
use std::net::TcpListener;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ferry(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ferry").expect("ferry binary");
    cmd.env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .env_remove("RUST_LOG");
    cmd
}

fn closed_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind")
        .local_addr()
        .expect("addr")
        .port()
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    ferry(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("copy"))
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("hosts"));
}

#[test]
fn hosts_add_then_list() {
    let home = TempDir::new().unwrap();
    ferry(&home)
        .args(["hosts", "add", "web", "10.0.0.9", "--user", "deploy", "--password", "s3cret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added 'web'"));

    ferry(&home)
        .args(["hosts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web"))
        .stdout(predicate::str::contains("10.0.0.9:22"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("s3cret").not());

    let stored = fs::read_to_string(home.path().join(".ferry/hosts.yaml")).unwrap();
    assert!(stored.contains("address: 10.0.0.9"));
}

#[test]
fn hosts_list_json_is_parseable() {
    let home = TempDir::new().unwrap();
    ferry(&home)
        .args(["hosts", "add", "db", "10.0.0.10:2200"])
        .assert()
        .success();

    let output = ferry(&home).args(["hosts", "list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["name"], "db");
    assert_eq!(rows[0]["address"], "10.0.0.10:2200");
    assert_eq!(rows[0]["auth"], "none");
}

#[test]
fn removing_unknown_host_fails() {
    let home = TempDir::new().unwrap();
    ferry(&home)
        .args(["hosts", "remove", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn dry_run_lists_tasks_without_connecting() {
    let home = TempDir::new().unwrap();
    let src = home.path().join("site");
    fs::create_dir_all(src.join("css")).unwrap();
    fs::write(src.join("index.html"), "<html/>").unwrap();
    fs::write(src.join("css/app.css"), "body{}").unwrap();

    // Nothing listens on this port; a dry run must not notice.
    let port = closed_port().to_string();
    ferry(&home)
        .args(["copy", "--host", "127.0.0.1", "--port", &port, "--dry-run"])
        .arg(&src)
        .arg("/var/www")
        .assert()
        .success()
        .stdout(predicate::str::contains("/var/www/css/app.css"))
        .stdout(predicate::str::contains("/var/www/index.html"))
        .stdout(predicate::str::contains("2 directories, 2 files"));
}

#[test]
fn dry_run_file_into_directory_keeps_name() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("a.txt");
    fs::write(&file, "hello").unwrap();

    let output = ferry(&home)
        .args(["copy", "--host", "127.0.0.1", "--dry-run", "--json"])
        .arg(&file)
        .arg("/tmp/")
        .output()
        .unwrap();
    assert!(output.status.success());
    let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tasks[0]["destination"], "/tmp/a.txt");
    assert_eq!(tasks[0]["is_dir"], false);
}

#[test]
fn ping_refused_port_fails() {
    let home = TempDir::new().unwrap();
    let port = closed_port().to_string();
    ferry(&home)
        .args(["ping", "--host", "127.0.0.1", "--port", &port, "--timeout-ms", "500"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not reachable"));
}

#[test]
fn copy_missing_local_path_fails() {
    let home = TempDir::new().unwrap();
    ferry(&home)
        .args(["copy", "--host", "127.0.0.1"])
        .arg(home.path().join("missing"))
        .arg("/tmp/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}
