//! Connection manager: client configuration, single attempts and bounded retry.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use ferry_core::Endpoint;

use crate::error::{SyncError, TransportError};
use crate::sink::LogSink;
use crate::transport::{Channels, Dialer};

/// Total dial attempts for [`Connector::connect_with_retry`].
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Client cipher preference, most preferred first.
pub const CIPHERS: &[&str] = &[
    "aes128-ctr",
    "aes192-ctr",
    "aes256-ctr",
    "aes128-gcm@openssh.com",
    "aes128-cbc",
    "3des-cbc",
    "aes192-cbc",
    "aes256-cbc",
];

/// One way of proving identity, tried in the order stored in [`ClientConfig`].
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// PEM key held in memory.
    PrivateKey {
        pem: String,
        passphrase: Option<String>,
    },
    /// PEM key read from disk by the transport.
    PrivateKeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Password(String),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::PrivateKey { passphrase, .. } => f
                .debug_struct("PrivateKey")
                .field("encrypted", &passphrase.is_some())
                .finish(),
            AuthMethod::PrivateKeyFile { path, passphrase } => f
                .debug_struct("PrivateKeyFile")
                .field("path", path)
                .field("encrypted", &passphrase.is_some())
                .finish(),
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Everything a [`Dialer`] needs to open a session.
///
/// Host keys are not verified: any key the server presents is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub address: String,
    pub user: String,
    pub timeout: Duration,
    pub auth: Vec<AuthMethod>,
    pub ciphers: Vec<String>,
}

impl ClientConfig {
    /// Derive the configuration for `endpoint`.
    ///
    /// Authentication order: in-memory key, key file (only if it exists),
    /// password. The password doubles as the key passphrase.
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        let creds = &endpoint.credentials;
        let passphrase = creds.password.clone().filter(|p| !p.is_empty());

        let mut auth = Vec::new();
        if let Some(pem) = creds.private_key.as_ref().filter(|k| !k.is_empty()) {
            auth.push(AuthMethod::PrivateKey {
                pem: pem.clone(),
                passphrase: passphrase.clone(),
            });
        }
        if let Some(path) = creds.private_key_path.as_ref().filter(|p| p.exists()) {
            auth.push(AuthMethod::PrivateKeyFile {
                path: path.clone(),
                passphrase: passphrase.clone(),
            });
        }
        if let Some(password) = passphrase {
            auth.push(AuthMethod::Password(password));
        }

        Self {
            address: endpoint.socket_address(),
            user: endpoint.effective_user().to_string(),
            timeout: endpoint.effective_timeout(),
            auth,
            ciphers: CIPHERS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Opens channel pairs to one endpoint.
///
/// The client configuration is derived on first use and reused afterwards.
pub struct Connector<D: Dialer> {
    endpoint: Endpoint,
    dialer: D,
    config: OnceLock<ClientConfig>,
    sink: Arc<dyn LogSink>,
}

impl<D: Dialer> Connector<D> {
    pub fn new(endpoint: Endpoint, dialer: D, sink: Arc<dyn LogSink>) -> Self {
        Self {
            endpoint,
            dialer,
            config: OnceLock::new(),
            sink,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub fn is_configured(&self) -> bool {
        self.config.get().is_some()
    }

    pub fn client_config(&self) -> &ClientConfig {
        self.config
            .get_or_init(|| ClientConfig::from_endpoint(&self.endpoint))
    }

    /// One attempt: dial, authenticate, then open the file-transfer sub-channel.
    pub fn connect(&self) -> Result<Channels<D::Shell, D::Fs>, TransportError> {
        let shell = self.dialer.dial(self.client_config())?;
        let fs = self.dialer.open_fs(&shell)?;
        Ok(Channels { fs, shell })
    }

    /// [`connect`](Self::connect), retried up to [`MAX_ATTEMPTS`] times while the
    /// failure is transient. Any other failure ends the loop at once.
    pub fn connect_with_retry(&self) -> Result<Channels<D::Shell, D::Fs>, SyncError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.connect() {
                Ok(channels) => return Ok(channels),
                Err(err) if attempt < MAX_ATTEMPTS && err.is_transient() => {
                    self.sink.info(&format!(
                        "trying to reconnect to {} due to error occur: {err}",
                        self.endpoint.socket_address()
                    ));
                    thread::sleep(RETRY_DELAY);
                }
                Err(err) => {
                    return Err(SyncError::Connection {
                        address: self.endpoint.socket_address(),
                        attempts: attempt,
                        source: err,
                    })
                }
            }
        }
    }

    /// A command session only, single attempt.
    pub fn open_shell(&self) -> Result<D::Shell, SyncError> {
        self.dialer
            .dial(self.client_config())
            .map_err(|err| SyncError::Connection {
                address: self.endpoint.socket_address(),
                attempts: 1,
                source: err,
            })
    }
}
