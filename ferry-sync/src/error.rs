//! Error types for ferry-sync.

use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;

use crate::digest::Fingerprint;

/// libssh2 `LIBSSH2_ERROR_SOCKET_DISCONNECT`.
const SSH_SOCKET_DISCONNECT: i32 = -13;
/// libssh2 `LIBSSH2_ERROR_SOCKET_RECV`.
const SSH_SOCKET_RECV: i32 = -43;

/// Failures reported by a transport (shell channel, SFTP sub-channel, dialer).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote path does not exist.
    #[error("no such file: {path}")]
    NotFound { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A session-level libssh2 failure.
    #[error("ssh error {code}: {message}")]
    Ssh { code: i32, message: String },

    /// An SFTP status other than "no such file".
    #[error("sftp error {code}: {message}")]
    Sftp { code: i32, message: String },

    /// Every configured authentication method was rejected.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// A remote command exited non-zero. `output` holds whatever it printed.
    #[error("command `{command}` exited with status {status}: {output}")]
    Command {
        command: String,
        status: i32,
        output: String,
    },

    /// A remote command succeeded but printed nothing where a value was expected.
    #[error("command `{command}` returned no output")]
    EmptyOutput { command: String },
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        match self {
            TransportError::NotFound { .. } => true,
            TransportError::Io(err) => err.kind() == ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Network-level disconnects that are safe to retry: connection reset and
    /// unexpected end of stream. Transport messages count when they carry
    /// `connection reset by peer` or the literal `EOF` marker.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Io(err)
                if matches!(err.kind(), ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof) =>
            {
                return true;
            }
            TransportError::Ssh { code, .. }
                if *code == SSH_SOCKET_DISCONNECT || *code == SSH_SOCKET_RECV =>
            {
                return true;
            }
            _ => {}
        }
        let message = match self {
            TransportError::Io(err) => err.to_string(),
            TransportError::Ssh { message, .. } | TransportError::Sftp { message, .. } => {
                message.clone()
            }
            _ => return false,
        };
        message.to_ascii_lowercase().contains("connection reset by peer")
            || message.contains("EOF")
    }
}

/// All errors that can arise from a copy or command invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Dial, handshake, authentication or sub-channel setup failed.
    #[error("failed to connect to {address} after {attempts} attempt(s): {source}")]
    Connection {
        address: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// A remote path exists with the wrong type.
    #[error("remote path {path} exists but is not a directory")]
    PathConflict { path: String },

    /// A local file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Streaming bytes into a remote file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A remote filesystem operation (stat, mkdir, create, chmod) failed.
    #[error("remote operation on {path} failed: {source}")]
    Remote {
        path: String,
        #[source]
        source: TransportError,
    },

    /// A remote command could not be run.
    #[error("command `{command}` failed: {source}")]
    Command {
        command: String,
        #[source]
        source: TransportError,
    },

    /// The remote fingerprint after transfer differs from the local one.
    #[error(
        "sha256 sum not match {local}({local_digest}) != {remote}({remote_digest}), maybe network corruption?"
    )]
    IntegrityMismatch {
        local: PathBuf,
        local_digest: Fingerprint,
        remote: String,
        remote_digest: Fingerprint,
    },
}

/// Convenience constructor for [`SyncError::Read`].
pub(crate) fn read_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Read {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Remote`].
pub(crate) fn remote_err(path: impl Into<String>, source: TransportError) -> SyncError {
    SyncError::Remote {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn reset_and_eof_are_transient() {
        let reset = TransportError::Io(io::Error::new(
            ErrorKind::ConnectionReset,
            "Connection reset by peer (os error 104)",
        ));
        assert!(reset.is_transient());

        let eof = TransportError::Io(io::Error::from(ErrorKind::UnexpectedEof));
        assert!(eof.is_transient());

        let ssh = TransportError::Ssh {
            code: SSH_SOCKET_DISCONNECT,
            message: "socket disconnected".into(),
        };
        assert!(ssh.is_transient());

        let wrapped = TransportError::Ssh {
            code: -1,
            message: "Failed getting banner: EOF".into(),
        };
        assert!(wrapped.is_transient());
    }

    #[test]
    fn refused_and_auth_failures_are_not_transient() {
        let refused = TransportError::Io(io::Error::from(ErrorKind::ConnectionRefused));
        assert!(!refused.is_transient());

        let auth = TransportError::Auth {
            message: "Username/PublicKey combination invalid".into(),
        };
        assert!(!auth.is_transient());
    }

    #[test]
    fn eof_must_be_the_literal_marker() {
        let geofence = TransportError::Sftp {
            code: 4,
            message: "failure on /srv/geofence/zones.json".into(),
        };
        assert!(!geofence.is_transient());

        let lowercase = TransportError::Ssh {
            code: -1,
            message: "unexpected eof while reading key".into(),
        };
        assert!(!lowercase.is_transient());

        let command = TransportError::Command {
            command: "cat /srv/geofence".into(),
            status: 1,
            output: "EOF".into(),
        };
        assert!(!command.is_transient());
    }

    #[test]
    fn not_found_covers_io_kind() {
        assert!(TransportError::NotFound { path: "/x".into() }.is_not_found());
        assert!(TransportError::Io(io::Error::from(ErrorKind::NotFound)).is_not_found());
        assert!(!TransportError::Sftp {
            code: 3,
            message: "permission denied".into()
        }
        .is_not_found());
    }

    #[test]
    fn integrity_mismatch_names_both_sides() {
        let err = SyncError::IntegrityMismatch {
            local: PathBuf::from("/src/a.txt"),
            local_digest: Fingerprint::from_hex("aaaa"),
            remote: "/tmp/a.txt".into(),
            remote_digest: Fingerprint::from_hex("bbbb"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/src/a.txt(aaaa)"));
        assert!(msg.contains("/tmp/a.txt(bbbb)"));
    }
}
