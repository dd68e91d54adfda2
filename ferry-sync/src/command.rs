//! Remote command execution: one-shot, one-line and streamed.

use std::sync::Arc;

use ferry_core::Endpoint;

use crate::connect::Connector;
use crate::error::{SyncError, TransportError};
use crate::sink::LogSink;
use crate::transport::{Dialer, RemoteShell};

/// Quote `value` for a POSIX shell. Plain path-like strings pass through.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%,=".contains(c));
    if plain {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Run `command` and fold its output onto one line, replacing line breaks
/// with `sep`. Empty output is an error.
pub fn one_line<S>(shell: &S, command: &str, sep: &str) -> Result<String, TransportError>
where
    S: RemoteShell + ?Sized,
{
    let output = shell.run(command)?;
    let data = String::from_utf8_lossy(&output);
    if data.is_empty() {
        return Err(TransportError::EmptyOutput {
            command: command.to_string(),
        });
    }
    Ok(data.replace("\r\n", sep).replace('\n', sep))
}

/// Runs commands on one endpoint. Every call opens its own session.
pub struct RemoteHost<D: Dialer> {
    connector: Connector<D>,
    sink: Arc<dyn LogSink>,
}

impl<D: Dialer> RemoteHost<D> {
    pub fn new(endpoint: Endpoint, dialer: D, sink: Arc<dyn LogSink>) -> Self {
        Self {
            connector: Connector::new(endpoint, dialer, sink.clone()),
            sink,
        }
    }

    pub fn connector(&self) -> &Connector<D> {
        &self.connector
    }

    /// Open a session and close it again.
    pub fn ping(&self) -> Result<(), SyncError> {
        let shell = self.connector.open_shell()?;
        drop(shell);
        Ok(())
    }

    /// Combined stdout + stderr of `command`.
    pub fn run(&self, command: &str) -> Result<Vec<u8>, SyncError> {
        let shell = self.connector.open_shell()?;
        self.sink.debug(&format!(
            "[ssh {}] run: {command}",
            self.connector.endpoint().socket_address()
        ));
        shell.run(command).map_err(|e| command_err(command, e))
    }

    /// Output of `command` on one line, line breaks replaced with `sep`.
    pub fn run_to_string(&self, command: &str, sep: &str) -> Result<String, SyncError> {
        let shell = self.connector.open_shell()?;
        one_line(&shell, command, sep).map_err(|e| command_err(command, e))
    }

    /// Run `command`, sending stdout and then stderr to the log sink line by line.
    pub fn run_streamed(&self, command: &str) -> Result<(), SyncError> {
        let shell = self.connector.open_shell()?;
        let sink = self.sink.clone();
        shell
            .run_streamed(command, &mut |line| sink.info(line))
            .map_err(|e| command_err(command, e))
    }
}

fn command_err(command: &str, source: TransportError) -> SyncError {
    SyncError::Command {
        command: command.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackDialer, LoopbackRemote};
    use crate::sink::MemorySink;
    use tempfile::TempDir;

    fn host(root: &TempDir) -> (RemoteHost<LoopbackDialer>, Arc<MemorySink>) {
        let remote = LoopbackRemote::new(root.path());
        let sink = Arc::new(MemorySink::new());
        let host = RemoteHost::new(
            Endpoint::new("loopback"),
            LoopbackDialer::new(remote),
            sink.clone(),
        );
        (host, sink)
    }

    #[test]
    fn quote_leaves_plain_paths_alone() {
        assert_eq!(shell_quote("/tmp/a.txt"), "/tmp/a.txt");
        assert_eq!(shell_quote("/tmp/my file"), "'/tmp/my file'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn run_to_string_joins_lines() {
        let root = TempDir::new().unwrap();
        let (host, _) = host(&root);
        let line = host.run_to_string("echo 111", " ").unwrap();
        assert_eq!(line, "111 ");
    }

    #[test]
    fn run_streamed_sends_lines_to_sink() {
        let root = TempDir::new().unwrap();
        let (host, sink) = host(&root);
        host.run_streamed("echo 111111111").unwrap();
        assert!(sink.contains("111111111"));
    }

    #[test]
    fn unknown_command_surfaces_as_command_error() {
        let root = TempDir::new().unwrap();
        let (host, _) = host(&root);
        let err = host.run("frobnicate --now").unwrap_err();
        match err {
            SyncError::Command { command, .. } => assert_eq!(command, "frobnicate --now"),
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[test]
    fn ping_dials_once() {
        let root = TempDir::new().unwrap();
        let (host, _) = host(&root);
        host.ping().unwrap();
        assert_eq!(host.connector().dialer().attempts(), 1);
    }
}
