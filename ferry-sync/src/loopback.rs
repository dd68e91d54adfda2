//! In-process transport rooted at a local directory.
//!
//! Remote path `/srv/app/a.txt` maps to `<root>/srv/app/a.txt`. The shell side
//! understands the commands the engine itself issues (`sha256sum`, `ls -l |
//! wc -l`) plus `echo`; anything else exits 127. Faults can be queued to
//! exercise retry, mismatch and unreachable-host paths.

use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connect::ClientConfig;
use crate::digest::digest_reader;
use crate::error::TransportError;
use crate::remote_path;
use crate::transport::{Dialer, RemoteFs, RemoteMetadata, RemoteShell};

/// Replacement answer for the next remote `sha256sum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOverride {
    Value(String),
    /// The command channel drops as if the host went away.
    Unavailable,
}

/// What the engine did to the loopback host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    pub commands: Vec<String>,
    pub files_created: Vec<String>,
    /// Directories that did not exist before a `mkdir_all`.
    pub dirs_created: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    stats: LoopbackStats,
    digest_overrides: VecDeque<DigestOverride>,
    refused: HashSet<String>,
    shell_unreachable: bool,
}

pub struct LoopbackRemote {
    root: PathBuf,
    state: Mutex<State>,
}

impl LoopbackRemote {
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            root: root.into(),
            state: Mutex::new(State::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `remote` lives on the local disk.
    pub fn local_path(&self, remote: &str) -> PathBuf {
        let cleaned = remote_path::clean(remote);
        self.root.join(cleaned.trim_start_matches('/'))
    }

    pub fn stats(&self) -> LoopbackStats {
        self.lock().stats.clone()
    }

    pub fn push_digest_override(&self, answer: DigestOverride) {
        self.lock().digest_overrides.push_back(answer);
    }

    /// Make `create` fail for `path`.
    pub fn refuse_create(&self, path: &str) {
        self.lock().refused.insert(remote_path::clean(path));
    }

    /// Make every command fail with a connection reset.
    pub fn set_shell_unreachable(&self, unreachable: bool) {
        self.lock().shell_unreachable = unreachable;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn execute(&self, command: &str) -> Result<Vec<u8>, TransportError> {
        let unreachable = {
            let mut state = self.lock();
            state.stats.commands.push(command.to_string());
            state.shell_unreachable
        };
        if unreachable {
            return Err(connection_reset());
        }

        if let Some(rest) = command.strip_prefix("sha256sum ") {
            let arg = rest.split(" | ").next().unwrap_or_default();
            return self.sha256sum(&unquote(arg));
        }
        if let Some(rest) = command.strip_prefix("ls -l ") {
            let arg = rest.split(" 2>/dev/null").next().unwrap_or_default();
            return Ok(format!("{}\n", self.listing_lines(&unquote(arg))).into_bytes());
        }
        if let Some(text) = command.strip_prefix("echo ") {
            return Ok(format!("{text}\n").into_bytes());
        }

        let program = command.split_whitespace().next().unwrap_or_default();
        Err(TransportError::Command {
            command: command.to_string(),
            status: 127,
            output: format!("sh: {program}: command not found"),
        })
    }

    fn sha256sum(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let answer = self.lock().digest_overrides.pop_front();
        match answer {
            Some(DigestOverride::Value(value)) => return Ok(format!("{value}\n").into_bytes()),
            Some(DigestOverride::Unavailable) => return Err(connection_reset()),
            None => {}
        }
        match File::open(self.local_path(path)) {
            Ok(file) => Ok(format!("{}\n", digest_reader(file)?).into_bytes()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Ok(format!("sha256sum: {path}: No such file or directory\n").into_bytes())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Line count `ls -l <path> | wc -l` would print.
    fn listing_lines(&self, path: &str) -> usize {
        let local = self.local_path(path);
        match fs::metadata(&local) {
            Ok(meta) if meta.is_dir() => {
                fs::read_dir(&local).map(|entries| entries.count()).unwrap_or(0) + 1
            }
            Ok(_) => 1,
            Err(_) => 0,
        }
    }
}

impl RemoteShell for LoopbackRemote {
    fn run(&self, command: &str) -> Result<Vec<u8>, TransportError> {
        self.execute(command)
    }

    fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(), TransportError> {
        let output = self.execute(command)?;
        for line in String::from_utf8_lossy(&output).lines() {
            on_line(line);
        }
        Ok(())
    }
}

impl RemoteFs for LoopbackRemote {
    fn stat(&self, path: &str) -> Result<RemoteMetadata, TransportError> {
        let meta = fs::metadata(self.local_path(path)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => TransportError::NotFound {
                path: path.to_string(),
            },
            _ => TransportError::Io(err),
        })?;
        Ok(RemoteMetadata {
            is_dir: meta.is_dir(),
            size: meta.len(),
            mode: mode_of(&meta),
        })
    }

    fn mkdir_all(&self, path: &str) -> Result<(), TransportError> {
        let cleaned = remote_path::clean(path);
        let mut current = if cleaned.starts_with('/') {
            "/".to_string()
        } else {
            String::new()
        };
        for part in cleaned.split('/').filter(|p| !p.is_empty()) {
            current = remote_path::join(&current, part);
            let local = self.local_path(&current);
            match fs::metadata(&local) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    return Err(TransportError::Io(io::Error::new(
                        ErrorKind::AlreadyExists,
                        format!("{current} is not a directory"),
                    )))
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    fs::create_dir(&local)?;
                    self.lock().stats.dirs_created.push(current.clone());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + '_>, TransportError> {
        let cleaned = remote_path::clean(path);
        if self.lock().refused.contains(&cleaned) {
            return Err(TransportError::Io(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("create {cleaned} refused"),
            )));
        }
        let file = File::create(self.local_path(&cleaned))?;
        self.lock().stats.files_created.push(cleaned);
        Ok(Box::new(file))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        set_mode(&self.local_path(path), mode)?;
        Ok(())
    }
}

/// Dialer handing out the same loopback host on every successful attempt.
pub struct LoopbackDialer {
    remote: Arc<LoopbackRemote>,
    failures: Mutex<VecDeque<TransportError>>,
    attempts: AtomicU32,
    last_config: Mutex<Option<ClientConfig>>,
}

impl LoopbackDialer {
    pub fn new(remote: Arc<LoopbackRemote>) -> Self {
        Self {
            remote,
            failures: Mutex::new(VecDeque::new()),
            attempts: AtomicU32::new(0),
            last_config: Mutex::new(None),
        }
    }

    pub fn remote(&self) -> &Arc<LoopbackRemote> {
        &self.remote
    }

    /// Fail the next dial with `err`. Queued failures are used in order.
    pub fn fail_next(&self, err: TransportError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(err);
    }

    /// Dial attempts so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Configuration passed to the latest dial.
    pub fn last_config(&self) -> Option<ClientConfig> {
        self.last_config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Dialer for LoopbackDialer {
    type Shell = Arc<LoopbackRemote>;
    type Fs = Arc<LoopbackRemote>;

    fn dial(&self, config: &ClientConfig) -> Result<Self::Shell, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap_or_else(|e| e.into_inner()) = Some(config.clone());
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(self.remote.clone()),
        }
    }

    fn open_fs(&self, shell: &Self::Shell) -> Result<Self::Fs, TransportError> {
        Ok(shell.clone())
    }
}

fn connection_reset() -> TransportError {
    TransportError::Io(io::Error::new(
        ErrorKind::ConnectionReset,
        "connection reset by peer",
    ))
}

/// Undo the quoting applied by [`crate::command::shell_quote`].
fn unquote(arg: &str) -> String {
    let arg = arg.trim();
    match arg.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')) {
        Some(inner) => inner.replace("'\\''", "'"),
        None => arg.to_string(),
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::shell_quote;
    use crate::digest::digest;
    use tempfile::TempDir;

    #[test]
    fn sha256sum_hashes_mapped_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();
        let remote = LoopbackRemote::new(root.path());

        let out = remote.run("sha256sum /a.txt | cut -d\" \" -f1").unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), digest(b"hello").as_str());
    }

    #[test]
    fn quoted_paths_round_trip() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("it's here"), "x").unwrap();
        let remote = LoopbackRemote::new(root.path());

        let command = format!("ls -l {} 2>/dev/null | wc -l", shell_quote("/it's here"));
        assert_eq!(remote.run(&command).unwrap(), b"1\n");
    }

    #[test]
    fn mkdir_all_records_only_new_directories() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("srv")).unwrap();
        let remote = LoopbackRemote::new(root.path());

        remote.mkdir_all("/srv/app/static").unwrap();
        remote.mkdir_all("/srv/app").unwrap();
        assert_eq!(
            remote.stats().dirs_created,
            vec!["/srv/app".to_string(), "/srv/app/static".to_string()]
        );
    }

    #[test]
    fn mkdir_all_through_a_file_fails() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("file"), "x").unwrap();
        let remote = LoopbackRemote::new(root.path());
        assert!(remote.mkdir_all("/file/sub").is_err());
    }

    #[test]
    fn dialer_replays_queued_failures() {
        let root = TempDir::new().unwrap();
        let dialer = LoopbackDialer::new(LoopbackRemote::new(root.path()));
        dialer.fail_next(connection_reset());
        let config = ClientConfig::from_endpoint(&ferry_core::Endpoint::new("h"));

        assert!(dialer.dial(&config).is_err());
        assert!(dialer.dial(&config).is_ok());
        assert_eq!(dialer.attempts(), 2);
        assert_eq!(dialer.last_config(), Some(config));
    }
}
