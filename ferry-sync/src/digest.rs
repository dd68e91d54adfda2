//! SHA-256 content fingerprints, computed locally or on the remote host.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::command::{one_line, shell_quote};
use crate::error::{read_err, SyncError};
use crate::sink::LogSink;
use crate::transport::RemoteShell;

/// Lowercase hex SHA-256 digest identifying file content.
///
/// An empty fingerprint means "not obtained" and never equals a real digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Wrap textual digest output, trimming surrounding whitespace.
    pub fn from_hex(text: &str) -> Self {
        Self(text.trim().to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fingerprint of an in-memory buffer.
pub fn digest(bytes: &[u8]) -> Fingerprint {
    Fingerprint(hex::encode(Sha256::digest(bytes)))
}

/// Fingerprint of everything `reader` yields, hashed incrementally.
pub fn digest_reader(mut reader: impl Read) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Fingerprint of a local file, streamed without loading it into memory.
pub fn digest_file(path: &Path) -> Result<Fingerprint, SyncError> {
    let file = File::open(path).map_err(|e| read_err(path, e))?;
    digest_reader(file).map_err(|e| read_err(path, e))
}

/// Fingerprint of a remote file, computed by `sha256sum` on the remote host.
///
/// Returns an empty fingerprint when the command cannot be run; callers treat
/// that as "not confirmed equal" rather than as a failure.
pub fn remote_digest<S>(shell: &S, remote_path: &str, sink: &dyn LogSink) -> Fingerprint
where
    S: RemoteShell + ?Sized,
{
    let command = format!(
        "sha256sum {} | cut -d\" \" -f1",
        shell_quote(remote_path)
    );
    match one_line(shell, &command, "") {
        Ok(output) => Fingerprint::from_hex(&output),
        Err(err) => {
            sink.info(&format!(
                "failed to calculate remote sha256 sum {remote_path}: {err}"
            ));
            Fingerprint::empty()
        }
    }
}
