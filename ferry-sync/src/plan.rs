//! Destination planning and task expansion.
//!
//! ## Planning rules
//!
//! 1. A local file copied onto an existing remote directory lands inside it
//!    under its own name.
//! 2. The parent of the destination must be a directory: it is created when
//!    missing, and anything else there is a [`SyncError::PathConflict`].
//! 3. A local directory copied onto an existing remote file is a
//!    [`SyncError::PathConflict`].
//! 4. A local directory containing no files only needs its destination
//!    directory to exist; no copier runs.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{read_err, remote_err, SyncError};
use crate::probe::RemoteState;
use crate::remote_path;
use crate::transport::RemoteFs;

/// What a top-level copy has to do once the destination is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Make sure `destination` exists as a directory, nothing else.
    EnsureDirectory { destination: String },
    /// Run the recursive copier into `destination`.
    Copy { destination: String },
}

impl Plan {
    pub fn destination(&self) -> &str {
        match self {
            Plan::EnsureDirectory { destination } | Plan::Copy { destination } => destination,
        }
    }
}

/// One unit of planned work: a directory level or a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferTask {
    pub source: PathBuf,
    pub destination: String,
    pub is_dir: bool,
}

/// Settle the destination for `local` -> `remote`, creating the destination's
/// parent directory when it is missing.
///
/// `remote_state` is the already-probed state of `remote`.
pub fn plan<F>(
    local: &Path,
    local_meta: &Metadata,
    remote: &str,
    remote_state: RemoteState,
    fs: &F,
) -> Result<Plan, SyncError>
where
    F: RemoteFs + ?Sized,
{
    if local_meta.is_dir() && remote_state == RemoteState::File {
        return Err(SyncError::PathConflict {
            path: remote_path::clean(remote),
        });
    }

    let destination = if !local_meta.is_dir() && remote_state == RemoteState::Directory {
        remote_path::join(remote, &file_name(local))
    } else {
        remote_path::clean(remote)
    };

    let parent = remote_path::parent(&destination);
    match fs.stat(&parent) {
        Ok(meta) if meta.is_dir => {}
        Ok(_) => return Err(SyncError::PathConflict { path: parent }),
        Err(err) if err.is_not_found() => {
            fs.mkdir_all(&parent).map_err(|e| remote_err(&parent, e))?;
        }
        Err(err) => return Err(remote_err(&parent, err)),
    }

    if local_meta.is_dir() && count_files(local) == 0 {
        return Ok(Plan::EnsureDirectory { destination });
    }
    Ok(Plan::Copy { destination })
}

/// Number of non-directory entries anywhere below `dir`. Unreadable entries
/// are not counted.
pub fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .count()
}

/// Pre-order task list for copying `local` to `destination`: each directory
/// precedes its children, siblings in file-name order.
pub fn expand(local: &Path, destination: &str) -> Result<Vec<TransferTask>, SyncError> {
    let mut tasks = Vec::new();
    for entry in WalkDir::new(local).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(local).to_path_buf();
            read_err(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(local).unwrap_or(entry.path());
        let mut target = remote_path::clean(destination);
        for component in relative.components() {
            target = remote_path::join(&target, &component.as_os_str().to_string_lossy());
        }
        tasks.push(TransferTask {
            source: entry.path().to_path_buf(),
            destination: target,
            is_dir: entry.file_type().is_dir(),
        });
    }
    Ok(tasks)
}

fn file_name(local: &Path) -> String {
    local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
