//! Inventory error-message, file layout and YAML shape integration tests.

use assert_fs::prelude::*;
use ferry_core::{
    inventory,
    types::{Credentials, Endpoint, HostName},
    InventoryError,
};
use predicates::prelude::*;
use rstest::rstest;
use std::fs;

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ferry/hosts.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = inventory::load_at(home.path()).unwrap_err();
    assert!(matches!(err, InventoryError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("hosts.yaml"), "got: {err}");
}

#[test]
fn saved_inventory_is_plain_yaml_mapping() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    inventory::add_at(
        home.path(),
        HostName::from("edge-1"),
        Endpoint::new("172.16.100.101").with_credentials(Credentials::password("1234-abcd")),
    )
    .expect("add");

    home.child(".ferry/hosts.yaml")
        .assert(predicate::str::contains("edge-1:"))
        .assert(predicate::str::contains("address: 172.16.100.101"))
        .assert(predicate::str::contains("port").not());
}

#[test]
fn hand_written_inventory_loads_with_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ferry/hosts.yaml")
        .write_str(
            "build:\n  address: build.internal\n  user: ci\n  credentials:\n    private_key_path: /home/ci/.ssh/id_ed25519\n",
        )
        .expect("write");

    let endpoint = inventory::resolve_at(home.path(), "build").expect("resolve");
    assert_eq!(endpoint.socket_address(), "build.internal:22");
    assert_eq!(endpoint.effective_user(), "ci");
    assert_eq!(
        endpoint.credentials.private_key_path.as_deref(),
        Some(std::path::Path::new("/home/ci/.ssh/id_ed25519"))
    );
}

#[rstest]
#[case("", 0)]
#[case("a:\n  address: 10.0.0.1\n", 1)]
#[case("a:\n  address: 10.0.0.1\nb:\n  address: 10.0.0.2\n  port: 2222\n", 2)]
fn load_counts_entries(#[case] yaml: &str, #[case] expected: usize) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ferry/hosts.yaml").write_str(yaml).expect("write");
    assert_eq!(inventory::load_at(home.path()).expect("load").len(), expected);
}

#[test]
fn add_replaces_existing_entry() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let name = HostName::from("web");
    assert!(inventory::add_at(home.path(), name.clone(), Endpoint::new("a"))
        .expect("first add")
        .is_none());
    let previous = inventory::add_at(home.path(), name.clone(), Endpoint::new("b"))
        .expect("second add")
        .expect("previous entry");
    assert_eq!(previous.address, "a");

    let removed = inventory::remove_at(home.path(), &name).expect("remove");
    assert_eq!(removed.address, "b");
    let contents = fs::read_to_string(inventory::inventory_path_at(home.path())).expect("read");
    assert!(!contents.contains("web"));
}
