//! Ferry core library: endpoint types, sync options and the host inventory.
//!
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`InventoryError`]
//! - [`inventory`]: load / save / resolve named hosts

pub mod error;
pub mod inventory;
pub mod types;

pub use error::InventoryError;
pub use types::{Credentials, Endpoint, HostName, SyncOptions};
