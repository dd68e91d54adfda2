//! Top-level copy invocation: plan, connect, copy, report.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ferry_core::{Endpoint, SyncOptions};
use serde::Serialize;

use crate::connect::Connector;
use crate::copier::{Copier, TaskOutcome, Verification};
use crate::error::{read_err, remote_err, SyncError};
use crate::plan::{plan, Plan};
use crate::probe::stat_state;
use crate::sink::{LogSink, TracingSink};
use crate::ssh::SshDialer;
use crate::transport::{Dialer, RemoteFs};

/// Summary of one copy invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub local: PathBuf,
    /// Destination as requested.
    pub remote: String,
    /// Destination after planning.
    pub destination: String,
    pub outcomes: Vec<TaskOutcome>,
}

impl CopyReport {
    pub fn transferred(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Transferred { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Skipped { .. }))
            .count()
    }

    /// Transfers accepted without a remote fingerprint.
    pub fn unverified(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    TaskOutcome::Transferred {
                        verification: Verification::Unverified,
                        ..
                    }
                )
            })
            .count()
    }

    pub fn bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o {
                TaskOutcome::Transferred { bytes, .. } => *bytes,
                _ => 0,
            })
            .sum()
    }
}

/// Copies local paths to one endpoint. Each [`Syncer::copy`] opens and tears
/// down its own channel pair.
pub struct Syncer<D: Dialer> {
    connector: Connector<D>,
    options: SyncOptions,
    sink: Arc<dyn LogSink>,
}

impl<D: Dialer> Syncer<D> {
    pub fn new(endpoint: Endpoint, dialer: D, options: SyncOptions, sink: Arc<dyn LogSink>) -> Self {
        Self {
            connector: Connector::new(endpoint, dialer, sink.clone()),
            options,
            sink,
        }
    }

    pub fn connector(&self) -> &Connector<D> {
        &self.connector
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Copy `local` (file or directory) to `remote`.
    pub fn copy(&self, local: &Path, remote: &str) -> Result<CopyReport, SyncError> {
        let started_at = Utc::now();
        let local_meta = fs::metadata(local).map_err(|e| read_err(local, e))?;

        self.sink.info(&format!(
            "remote copy files src {} to dst {}:{remote}",
            local.display(),
            self.connector.endpoint().socket_address()
        ));
        let channels = self.connector.connect_with_retry()?;

        let state = stat_state(&channels.fs, remote, &*self.sink);
        let settled = plan(local, &local_meta, remote, state, &channels.fs)?;

        let outcomes = match &settled {
            Plan::EnsureDirectory { destination } => {
                channels
                    .fs
                    .mkdir_all(destination)
                    .map_err(|e| remote_err(destination.as_str(), e))?;
                vec![TaskOutcome::DirectoryEnsured {
                    destination: destination.clone(),
                }]
            }
            Plan::Copy { destination } => {
                let mut copier =
                    Copier::new(&channels.shell, &channels.fs, self.options, &*self.sink);
                copier.copy(local, destination)?;
                copier.into_outcomes()
            }
        };

        Ok(CopyReport {
            started_at,
            finished_at: Utc::now(),
            local: local.to_path_buf(),
            remote: remote.to_string(),
            destination: settled.destination().to_string(),
            outcomes,
        })
    }
}

/// Copy `local` to `remote` on `endpoint` over SSH, logging through the
/// process-wide logger.
pub fn copy(
    endpoint: Endpoint,
    local: &Path,
    remote: &str,
    options: SyncOptions,
) -> Result<CopyReport, SyncError> {
    Syncer::new(endpoint, SshDialer, options, Arc::new(TracingSink)).copy(local, remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackDialer, LoopbackRemote};
    use crate::sink::MemorySink;
    use tempfile::TempDir;

    fn syncer(remote_root: &TempDir) -> Syncer<LoopbackDialer> {
        Syncer::new(
            Endpoint::new("loopback"),
            LoopbackDialer::new(LoopbackRemote::new(remote_root.path())),
            SyncOptions::default(),
            Arc::new(MemorySink::new()),
        )
    }

    #[test]
    fn missing_local_path_fails_before_dialing() {
        let remote_root = TempDir::new().unwrap();
        let syncer = syncer(&remote_root);

        let err = syncer.copy(Path::new("/no/such/source"), "/tmp/").unwrap_err();
        assert!(matches!(err, SyncError::Read { .. }));
        assert_eq!(syncer.connector().dialer().attempts(), 0);
    }

    #[test]
    fn report_counts_outcomes() {
        let local = TempDir::new().unwrap();
        let remote_root = TempDir::new().unwrap();
        fs::write(local.path().join("a.txt"), "hello").unwrap();
        fs::write(local.path().join("b.txt"), "world!").unwrap();
        fs::create_dir_all(remote_root.path().join("dst")).unwrap();
        fs::write(remote_root.path().join("dst/a.txt"), "hello").unwrap();

        let report = syncer(&remote_root).copy(local.path(), "/dst").unwrap();
        assert_eq!(report.destination, "/dst");
        assert_eq!(report.transferred(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.unverified(), 0);
        assert_eq!(report.bytes(), 6);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn report_serializes_outcome_tags() {
        let local = TempDir::new().unwrap();
        let remote_root = TempDir::new().unwrap();
        let file = local.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let report = syncer(&remote_root).copy(&file, "/x/a.txt").unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["destination"], "/x/a.txt");
        assert_eq!(json["outcomes"][0]["outcome"], "transferred");
        assert_eq!(json["outcomes"][0]["verification"], "verified");
    }
}
