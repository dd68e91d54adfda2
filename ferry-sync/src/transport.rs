//! Seams to the remote-shell transport.
//!
//! The engine never speaks SSH itself. It drives three collaborators:
//! a [`Dialer`] that yields an authenticated session, the session's
//! command channel ([`RemoteShell`]) and the file-transfer sub-channel
//! layered on top of it ([`RemoteFs`]). [`crate::ssh`] implements them with
//! libssh2, [`crate::loopback`] against a local directory.

use std::io::Write;
use std::sync::Arc;

use crate::connect::ClientConfig;
use crate::error::TransportError;

/// Result of a structured stat on the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub is_dir: bool,
    pub size: u64,
    /// Permission bits, when the server reports them.
    pub mode: Option<u32>,
}

/// Command execution over an authenticated session.
pub trait RemoteShell {
    /// Run `command` and return its combined stdout + stderr.
    ///
    /// A non-zero exit status is reported as [`TransportError::Command`].
    fn run(&self, command: &str) -> Result<Vec<u8>, TransportError>;

    /// Run `command`, handing each stdout line and then each stderr line to
    /// `on_line` as it is read.
    fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(), TransportError>;
}

/// File-transfer sub-channel.
pub trait RemoteFs {
    /// Missing paths are reported as [`TransportError::NotFound`].
    fn stat(&self, path: &str) -> Result<RemoteMetadata, TransportError>;

    /// Create `path` and any missing parents. Existing directories are fine.
    fn mkdir_all(&self, path: &str) -> Result<(), TransportError>;

    /// Create or truncate `path` for writing.
    fn create(&self, path: &str) -> Result<Box<dyn Write + '_>, TransportError>;

    fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError>;
}

/// Establishes sessions for a negotiated client configuration.
pub trait Dialer {
    type Shell: RemoteShell;
    type Fs: RemoteFs;

    /// Dial, handshake and authenticate.
    fn dial(&self, config: &ClientConfig) -> Result<Self::Shell, TransportError>;

    /// Open the file-transfer sub-channel over an authenticated session.
    fn open_fs(&self, shell: &Self::Shell) -> Result<Self::Fs, TransportError>;
}

impl<T: RemoteShell + ?Sized> RemoteShell for Arc<T> {
    fn run(&self, command: &str) -> Result<Vec<u8>, TransportError> {
        (**self).run(command)
    }

    fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(), TransportError> {
        (**self).run_streamed(command, on_line)
    }
}

impl<T: RemoteFs + ?Sized> RemoteFs for Arc<T> {
    fn stat(&self, path: &str) -> Result<RemoteMetadata, TransportError> {
        (**self).stat(path)
    }

    fn mkdir_all(&self, path: &str) -> Result<(), TransportError> {
        (**self).mkdir_all(path)
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + '_>, TransportError> {
        (**self).create(path)
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        (**self).chmod(path, mode)
    }
}

/// The live channel pair for one invocation. Dropping it tears both down,
/// sub-channel first.
pub struct Channels<S, F> {
    pub fs: F,
    pub shell: S,
}
