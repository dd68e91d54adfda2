//! Domain types shared by the engine and the CLI.
//!
//! All types are serializable/deserializable via serde + serde_yaml so they can
//! live in the host inventory.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Port used when an endpoint does not name one.
pub const DEFAULT_PORT: u16 = 22;

/// Login used when an endpoint does not name one.
pub const DEFAULT_USER: &str = "root";

/// Dial timeout used when an endpoint does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for an entry in the host inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostName(pub String);

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for HostName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HostName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secret material used to authenticate against an endpoint.
///
/// The password doubles as the passphrase for encrypted private keys.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// PEM-encoded private key held in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
}

impl Credentials {
    /// Password-only credentials.
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.private_key.is_none() && self.private_key_path.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("private_key_path", &self.private_key_path)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A remote host the engine can dial.
///
/// Constructed once per target host and reused across operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,

    /// `0` or absent means [`DEFAULT_PORT`].
    #[serde(default, skip_serializing_if = "is_zero_port")]
    pub port: u16,

    /// Empty means [`DEFAULT_USER`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(default, skip_serializing_if = "Credentials::is_empty")]
    pub credentials: Credentials,

    /// Dial timeout in milliseconds; absent or `0` means [`DEFAULT_TIMEOUT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn is_zero_port(port: &u16) -> bool {
    *port == 0
}

impl Endpoint {
    /// An endpoint for `address` with every other field defaulted.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: 0,
            user: String::new(),
            credentials: Credentials::default(),
            timeout_ms: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// `host:port`, leaving addresses that already carry a port untouched.
    pub fn socket_address(&self) -> String {
        if self.address.contains(':') {
            return self.address.clone();
        }
        let port = if self.port == 0 { DEFAULT_PORT } else { self.port };
        format!("{}:{}", self.address, port)
    }

    pub fn effective_user(&self) -> &str {
        if self.user.is_empty() {
            DEFAULT_USER
        } else {
            &self.user
        }
    }

    pub fn effective_timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.effective_user(), self.socket_address())
    }
}

// ---------------------------------------------------------------------------
// Sync options
// ---------------------------------------------------------------------------

/// Behaviour switches for a copy invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Probe remote existence with `ls` over the shell channel instead of an
    /// SFTP stat.
    #[serde(default)]
    pub use_shell_existence_check: bool,

    /// Never compare fingerprints: every file is transferred and nothing is
    /// verified afterwards.
    #[serde(default)]
    pub skip_checksum: bool,
}
