pub mod copy;
pub mod exec;
pub mod hosts;
pub mod ping;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use ferry_core::{inventory, Endpoint};
use ferry_sync::LogSink;

/// Target host selection shared by `copy`, `exec` and `ping`.
///
/// `--host` is looked up in the inventory first; anything else on the
/// command line overrides the stored entry.
#[derive(Args, Debug)]
pub struct HostArgs {
    /// Inventory name or address (`host` or `host:port`).
    #[arg(long, short = 'H', value_name = "HOST")]
    pub host: String,

    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// Password, also used as the private key passphrase.
    #[arg(long)]
    pub password: Option<String>,

    /// Private key file.
    #[arg(long, short = 'i', value_name = "FILE")]
    pub identity: Option<PathBuf>,

    /// Dial timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl HostArgs {
    pub fn endpoint(&self) -> Result<Endpoint> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        self.endpoint_at(&home)
    }

    fn endpoint_at(&self, home: &Path) -> Result<Endpoint> {
        let mut endpoint = inventory::resolve_at(home, &self.host)
            .with_context(|| format!("failed to resolve host '{}'", self.host))?;
        if let Some(port) = self.port {
            endpoint.port = port;
        }
        if let Some(user) = &self.user {
            endpoint.user = user.clone();
        }
        if let Some(password) = &self.password {
            endpoint.credentials.password = Some(password.clone());
        }
        if let Some(identity) = &self.identity {
            endpoint.credentials.private_key_path = Some(identity.clone());
        }
        if self.timeout_ms.is_some() {
            endpoint.timeout_ms = self.timeout_ms;
        }
        Ok(endpoint)
    }
}

/// Prints info messages to stdout; debug goes to the log.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::HostName;
    use tempfile::TempDir;

    fn args(host: &str) -> HostArgs {
        HostArgs {
            host: host.into(),
            port: None,
            user: None,
            password: None,
            identity: None,
            timeout_ms: None,
        }
    }

    #[test]
    fn unknown_host_is_an_address() {
        let home = TempDir::new().unwrap();
        let endpoint = args("10.0.0.9").endpoint_at(home.path()).unwrap();
        assert_eq!(endpoint, Endpoint::new("10.0.0.9"));
    }

    #[test]
    fn flags_override_inventory_entry() {
        let home = TempDir::new().unwrap();
        inventory::add_at(
            home.path(),
            HostName::from("web"),
            Endpoint::new("10.0.0.9").with_user("deploy").with_port(2222),
        )
        .unwrap();

        let mut a = args("web");
        a.user = Some("admin".into());
        a.timeout_ms = Some(5_000);
        let endpoint = a.endpoint_at(home.path()).unwrap();

        assert_eq!(endpoint.address, "10.0.0.9");
        assert_eq!(endpoint.port, 2222);
        assert_eq!(endpoint.user, "admin");
        assert_eq!(endpoint.timeout_ms, Some(5_000));
    }
}
