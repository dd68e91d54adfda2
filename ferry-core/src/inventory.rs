//! Named host inventory.
//!
//! # Storage layout
//!
//! ```text
//! ~/.ferry/
//!   hosts.yaml    (name -> endpoint mapping, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home, used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()` and delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::InventoryError;
use crate::types::{Endpoint, HostName};

/// Hosts keyed by name, sorted for deterministic output.
pub type Inventory = BTreeMap<HostName, Endpoint>;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.ferry/`. Pure, no I/O.
pub fn ferry_dir_at(home: &Path) -> PathBuf {
    home.join(".ferry")
}

/// `<home>/.ferry/hosts.yaml`. Pure, no I/O.
pub fn inventory_path_at(home: &Path) -> PathBuf {
    ferry_dir_at(home).join("hosts.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the inventory at `<home>/.ferry/hosts.yaml`.
///
/// Returns an empty inventory if the file does not exist yet, and
/// `InventoryError::Parse` (with path + line context) if the YAML is malformed.
pub fn load_at(home: &Path) -> Result<Inventory, InventoryError> {
    let path = inventory_path_at(home);
    if !path.exists() {
        return Ok(Inventory::new());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Inventory::new());
    }
    serde_yaml::from_str(&contents).map_err(|e| InventoryError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Inventory, InventoryError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the inventory.
///
/// Write flow: serialize → `hosts.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, inventory: &Inventory) -> Result<(), InventoryError> {
    let dir = ferry_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = inventory_path_at(home);
    let tmp_path = path.with_file_name("hosts.yaml.tmp");

    let yaml = serde_yaml::to_string(inventory)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(inventory: &Inventory) -> Result<(), InventoryError> {
    save_at(&home()?, inventory)
}

// ---------------------------------------------------------------------------
// 4. Mutations
// ---------------------------------------------------------------------------

/// Insert or replace `name`. Returns the endpoint previously stored under it.
pub fn add_at(
    home: &Path,
    name: HostName,
    endpoint: Endpoint,
) -> Result<Option<Endpoint>, InventoryError> {
    let mut inventory = load_at(home)?;
    let previous = inventory.insert(name, endpoint);
    save_at(home, &inventory)?;
    Ok(previous)
}

/// `add_at` convenience wrapper.
pub fn add(name: HostName, endpoint: Endpoint) -> Result<Option<Endpoint>, InventoryError> {
    add_at(&home()?, name, endpoint)
}

/// Remove `name`, failing with `HostNotFound` if it is not registered.
pub fn remove_at(home: &Path, name: &HostName) -> Result<Endpoint, InventoryError> {
    let mut inventory = load_at(home)?;
    let removed = inventory
        .remove(name)
        .ok_or_else(|| InventoryError::HostNotFound {
            name: name.0.clone(),
        })?;
    save_at(home, &inventory)?;
    Ok(removed)
}

/// `remove_at` convenience wrapper.
pub fn remove(name: &HostName) -> Result<Endpoint, InventoryError> {
    remove_at(&home()?, name)
}

// ---------------------------------------------------------------------------
// 5. Resolve
// ---------------------------------------------------------------------------

/// Look `target` up by name; unknown names are treated as a literal address.
pub fn resolve_at(home: &Path, target: &str) -> Result<Endpoint, InventoryError> {
    let inventory = load_at(home)?;
    Ok(inventory
        .get(&HostName::from(target))
        .cloned()
        .unwrap_or_else(|| Endpoint::new(target)))
}

/// `resolve_at` convenience wrapper.
pub fn resolve(target: &str) -> Result<Endpoint, InventoryError> {
    resolve_at(&home()?, target)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, InventoryError> {
    dirs::home_dir().ok_or(InventoryError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), InventoryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), InventoryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), InventoryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), InventoryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credentials;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn inventory_path_is_correct() {
        let home = make_home();
        assert!(inventory_path_at(home.path()).ends_with(".ferry/hosts.yaml"));
    }

    #[test]
    fn missing_file_is_empty_inventory() {
        let home = make_home();
        assert!(load_at(home.path()).expect("load").is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = make_home();
        let mut inventory = Inventory::new();
        inventory.insert(
            HostName::from("web"),
            Endpoint::new("10.0.0.7")
                .with_port(2222)
                .with_user("deploy")
                .with_credentials(Credentials::password("s3cret")),
        );
        save_at(home.path(), &inventory).expect("save");
        assert_eq!(load_at(home.path()).expect("load"), inventory);
    }

    #[test]
    fn save_cleans_up_tmp_and_restricts_mode() {
        let home = make_home();
        save_at(home.path(), &Inventory::new()).expect("save");
        let path = inventory_path_at(home.path());
        assert!(!path.with_file_name("hosts.yaml.tmp").exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn resolve_falls_back_to_literal_address() {
        let home = make_home();
        add_at(home.path(), HostName::from("db"), Endpoint::new("10.0.0.9")).expect("add");

        assert_eq!(resolve_at(home.path(), "db").unwrap().address, "10.0.0.9");
        assert_eq!(
            resolve_at(home.path(), "192.168.1.4").unwrap(),
            Endpoint::new("192.168.1.4")
        );
    }

    #[test]
    fn remove_unknown_host_is_not_found() {
        let home = make_home();
        let err = remove_at(home.path(), &HostName::from("ghost")).unwrap_err();
        assert!(matches!(err, InventoryError::HostNotFound { .. }));
    }
}
