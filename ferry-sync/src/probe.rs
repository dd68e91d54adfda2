//! Remote existence probing.
//!
//! Two strategies: a structured SFTP stat (default) and an `ls -l | wc -l`
//! shell fallback for hosts without SFTP stat access. The fallback counts
//! listing lines, so it cannot tell files from directories and reports any
//! non-empty listing as a file. Engine callers only use it for leaf files.

use serde::Serialize;

use crate::command::{one_line, shell_quote};
use crate::remote_path;
use crate::sink::LogSink;
use crate::transport::{RemoteFs, RemoteShell};

/// What a probe found at a remote path. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Absent,
    File,
    Directory,
}

impl RemoteState {
    pub fn exists(self) -> bool {
        self != RemoteState::Absent
    }
}

/// Which probe the copier uses for leaf files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistenceCheck {
    #[default]
    Stat,
    Shell,
}

/// Classify `path` with an SFTP stat.
///
/// Failures other than "not found" are logged and reported as absent, so a
/// flaky stat leads to a transfer rather than an aborted sync.
pub fn stat_state<F>(fs: &F, path: &str, sink: &dyn LogSink) -> RemoteState
where
    F: RemoteFs + ?Sized,
{
    match fs.stat(path) {
        Ok(meta) if meta.is_dir => RemoteState::Directory,
        Ok(_) => RemoteState::File,
        Err(err) if err.is_not_found() => RemoteState::Absent,
        Err(err) => {
            sink.info(&format!("failed to detect remote file exists {path}: {err}"));
            RemoteState::Absent
        }
    }
}

/// Classify `path` by counting `ls -l` output lines on the remote host.
pub fn shell_state<S>(shell: &S, path: &str, sink: &dyn LogSink) -> RemoteState
where
    S: RemoteShell + ?Sized,
{
    let (dir, name) = remote_path::split(path);
    let command = format!(
        "ls -l {} 2>/dev/null | wc -l",
        shell_quote(&remote_path::join(&dir, &name))
    );
    let output = match one_line(shell, &command, " ") {
        Ok(output) => output,
        Err(err) => {
            sink.info(&format!("remote file exist command failed for {path}: {err}"));
            return RemoteState::Absent;
        }
    };
    match output.trim().parse::<u64>() {
        Ok(0) => RemoteState::Absent,
        Ok(_) => RemoteState::File,
        Err(err) => {
            sink.info(&format!(
                "unexpected remote file exist output for {path} ({output:?}): {err}"
            ));
            RemoteState::Absent
        }
    }
}

/// Probe bound to one channel pair and one strategy.
pub struct Prober<'a, S: ?Sized, F: ?Sized> {
    shell: &'a S,
    fs: &'a F,
    strategy: ExistenceCheck,
    sink: &'a dyn LogSink,
}

impl<'a, S, F> Prober<'a, S, F>
where
    S: RemoteShell + ?Sized,
    F: RemoteFs + ?Sized,
{
    pub fn new(shell: &'a S, fs: &'a F, strategy: ExistenceCheck, sink: &'a dyn LogSink) -> Self {
        Self {
            shell,
            fs,
            strategy,
            sink,
        }
    }

    pub fn exists(&self, path: &str) -> RemoteState {
        match self.strategy {
            ExistenceCheck::Stat => stat_state(self.fs, path, self.sink),
            ExistenceCheck::Shell => shell_state(self.shell, path, self.sink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackRemote;
    use crate::sink::MemorySink;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, std::sync::Arc<LoopbackRemote>) {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("srv/app")).unwrap();
        fs::write(root.path().join("srv/app/a.txt"), "hello").unwrap();
        fs::write(root.path().join("srv/app/a.txt.bak"), "old").unwrap();
        let remote = LoopbackRemote::new(root.path());
        (root, remote)
    }

    #[test]
    fn stat_classifies_all_states() {
        let (_root, remote) = fixture();
        let sink = MemorySink::new();
        assert_eq!(stat_state(&*remote, "/srv/app", &sink), RemoteState::Directory);
        assert_eq!(stat_state(&*remote, "/srv/app/a.txt", &sink), RemoteState::File);
        assert_eq!(stat_state(&*remote, "/srv/app/b.txt", &sink), RemoteState::Absent);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn shell_probe_detects_presence() {
        let (_root, remote) = fixture();
        let sink = MemorySink::new();
        assert_eq!(shell_state(&*remote, "/srv/app/a.txt", &sink), RemoteState::File);
        assert_eq!(shell_state(&*remote, "/srv/app/a", &sink), RemoteState::Absent);
        assert_eq!(shell_state(&*remote, "/srv/app", &sink), RemoteState::File);
    }

    #[test]
    fn prober_dispatches_on_strategy() {
        let (_root, remote) = fixture();
        let sink = MemorySink::new();
        let by_stat = Prober::new(&*remote, &*remote, ExistenceCheck::Stat, &sink);
        let by_shell = Prober::new(&*remote, &*remote, ExistenceCheck::Shell, &sink);
        assert_eq!(by_stat.exists("/srv/app"), RemoteState::Directory);
        assert_eq!(by_shell.exists("/srv/app"), RemoteState::File);
        assert!(remote.stats().commands.iter().any(|c| c.starts_with("ls -l")));
    }

    #[test]
    fn unreachable_shell_counts_as_absent() {
        let (_root, remote) = fixture();
        remote.set_shell_unreachable(true);
        let sink = MemorySink::new();
        assert_eq!(shell_state(&*remote, "/srv/app/a.txt", &sink), RemoteState::Absent);
        assert!(sink.contains("remote file exist command failed"));
    }
}
