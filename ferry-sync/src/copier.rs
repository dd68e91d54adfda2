//! Recursive copier.
//!
//! Walks a local tree in lock-step with remote directory creation. For each
//! file:
//!
//! 1. Probe the destination (stat or shell, per options).
//! 2. If present with the same size, compare fingerprints → skip if equal.
//! 3. Create/replace the remote file, copy permission bits, stream bytes.
//! 4. Re-hash remotely and compare with the local fingerprint.
//!
//! The first failure aborts the whole walk and is returned unchanged.

use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ferry_core::SyncOptions;
use serde::Serialize;

use crate::digest::{digest_file, remote_digest};
use crate::error::{read_err, remote_err, SyncError};
use crate::probe::{ExistenceCheck, Prober};
use crate::remote_path;
use crate::sink::LogSink;
use crate::transport::{RemoteFs, RemoteShell};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a transferred file was checked afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Remote fingerprint matched the local one.
    Verified,
    /// The remote fingerprint could not be obtained; the copy was accepted.
    Unverified,
    /// Checksums are disabled.
    NotChecked,
}

/// Result of one transfer task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    DirectoryEnsured {
        destination: String,
    },
    Skipped {
        source: PathBuf,
        destination: String,
    },
    Transferred {
        source: PathBuf,
        destination: String,
        bytes: u64,
        verification: Verification,
    },
}

// ---------------------------------------------------------------------------
// Copier
// ---------------------------------------------------------------------------

/// Copies one local path to a planned remote destination over a borrowed
/// channel pair.
pub struct Copier<'a, S: ?Sized, F: ?Sized> {
    shell: &'a S,
    fs: &'a F,
    options: SyncOptions,
    sink: &'a dyn LogSink,
    outcomes: Vec<TaskOutcome>,
}

impl<'a, S, F> Copier<'a, S, F>
where
    S: RemoteShell + ?Sized,
    F: RemoteFs + ?Sized,
{
    pub fn new(shell: &'a S, fs: &'a F, options: SyncOptions, sink: &'a dyn LogSink) -> Self {
        Self {
            shell,
            fs,
            options,
            sink,
            outcomes: Vec::new(),
        }
    }

    /// Outcomes so far, in task order.
    pub fn outcomes(&self) -> &[TaskOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<TaskOutcome> {
        self.outcomes
    }

    /// Copy `local` (file or directory) to `destination`.
    pub fn copy(&mut self, local: &Path, destination: &str) -> Result<(), SyncError> {
        let meta = fs::metadata(local).map_err(|e| read_err(local, e))?;
        if meta.is_dir() {
            self.copy_dir(local, destination)
        } else {
            self.copy_file(local, &meta, destination)
        }
    }

    fn copy_dir(&mut self, local: &Path, destination: &str) -> Result<(), SyncError> {
        let entries = sorted_entries(local)?;
        self.fs
            .mkdir_all(destination)
            .map_err(|e| remote_err(destination, e))?;
        self.outcomes.push(TaskOutcome::DirectoryEnsured {
            destination: destination.to_string(),
        });

        for name in entries {
            let child = local.join(&name);
            let target = remote_path::join(destination, &name);
            self.copy(&child, &target)?;
        }
        Ok(())
    }

    fn copy_file(&mut self, local: &Path, meta: &Metadata, destination: &str) -> Result<(), SyncError> {
        if self.is_current(local, meta, destination)? {
            self.sink.info(&format!(
                "remote dst {destination} already exists and is the latest version, skip copying process"
            ));
            self.outcomes.push(TaskOutcome::Skipped {
                source: local.to_path_buf(),
                destination: destination.to_string(),
            });
            return Ok(());
        }

        let bytes = self.transfer(local, meta, destination)?;
        let verification = self.verify(local, destination)?;
        self.sink.debug(&format!(
            "copied {} to {destination} ({bytes} bytes, {verification:?})",
            local.display()
        ));
        self.outcomes.push(TaskOutcome::Transferred {
            source: local.to_path_buf(),
            destination: destination.to_string(),
            bytes,
            verification,
        });
        Ok(())
    }

    /// Whether `destination` already holds the same bytes as `local`.
    fn is_current(&self, local: &Path, meta: &Metadata, destination: &str) -> Result<bool, SyncError> {
        if self.options.skip_checksum {
            return Ok(false);
        }
        let strategy = if self.options.use_shell_existence_check {
            ExistenceCheck::Shell
        } else {
            ExistenceCheck::Stat
        };
        let prober = Prober::new(self.shell, self.fs, strategy, self.sink);
        if !prober.exists(destination).exists() {
            return Ok(false);
        }

        let remote = match self.fs.stat(destination) {
            Ok(remote) => remote,
            Err(err) => {
                self.sink
                    .debug(&format!("stat {destination} before compare failed: {err}"));
                return Ok(false);
            }
        };
        if remote.is_dir || remote.size != meta.len() {
            return Ok(false);
        }

        let local_digest = digest_file(local)?;
        Ok(local_digest == remote_digest(self.shell, destination, self.sink))
    }

    fn transfer(&self, local: &Path, meta: &Metadata, destination: &str) -> Result<u64, SyncError> {
        let mut source = File::open(local).map_err(|e| read_err(local, e))?;
        let mut target = self
            .fs
            .create(destination)
            .map_err(|e| remote_err(destination, e))?;
        self.fs
            .chmod(destination, file_mode(meta))
            .map_err(|e| remote_err(destination, e))?;

        let bytes = io::copy(&mut source, &mut target).map_err(|e| SyncError::Write {
            path: destination.to_string(),
            source: e,
        })?;
        target.flush().map_err(|e| SyncError::Write {
            path: destination.to_string(),
            source: e,
        })?;
        Ok(bytes)
    }

    fn verify(&self, local: &Path, destination: &str) -> Result<Verification, SyncError> {
        if self.options.skip_checksum {
            return Ok(Verification::NotChecked);
        }
        let remote_digest = remote_digest(self.shell, destination, self.sink);
        if remote_digest.is_empty() {
            self.sink.info(&format!(
                "remote sha256 sum of {destination} unavailable, accepting copy unverified"
            ));
            return Ok(Verification::Unverified);
        }
        let local_digest = digest_file(local)?;
        if local_digest != remote_digest {
            return Err(SyncError::IntegrityMismatch {
                local: local.to_path_buf(),
                local_digest,
                remote: destination.to_string(),
                remote_digest,
            });
        }
        Ok(Verification::Verified)
    }
}

/// Entry names of `dir`, sorted by file name.
fn sorted_entries(dir: &Path) -> Result<Vec<String>, SyncError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
        let entry = entry.map_err(|e| read_err(dir, e))?;
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names
        .into_iter()
        .map(|n| n.to_string_lossy().into_owned())
        .collect())
}

#[cfg(unix)]
fn file_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
