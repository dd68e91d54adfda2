//! libssh2-backed transport.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use ssh2::{ErrorCode, ExtendedData, FileStat, MethodType, Session, Sftp};

use crate::connect::{AuthMethod, ClientConfig};
use crate::error::TransportError;
use crate::remote_path;
use crate::transport::{Dialer, RemoteFs, RemoteMetadata, RemoteShell};

/// `LIBSSH2_FX_NO_SUCH_FILE`.
const SFTP_NO_SUCH_FILE: i32 = 2;

impl From<ssh2::Error> for TransportError {
    fn from(err: ssh2::Error) -> Self {
        let message = err.message().to_string();
        match err.code() {
            ErrorCode::Session(code) => TransportError::Ssh { code, message },
            ErrorCode::SFTP(code) => TransportError::Sftp { code, message },
        }
    }
}

/// Dials TCP, negotiates the cipher preference and authenticates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshDialer;

impl Dialer for SshDialer {
    type Shell = SshSession;
    type Fs = SshSftp;

    fn dial(&self, config: &ClientConfig) -> Result<SshSession, TransportError> {
        let addr = config
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransportError::Ssh {
                code: 0,
                message: format!("{} did not resolve", config.address),
            })?;
        let tcp = TcpStream::connect_timeout(&addr, config.timeout)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(config.timeout.as_millis()).unwrap_or(u32::MAX));
        let ciphers = config.ciphers.join(",");
        if !ciphers.is_empty() {
            session.method_pref(MethodType::CryptCs, &ciphers)?;
            session.method_pref(MethodType::CryptSc, &ciphers)?;
        }
        session.handshake()?;
        // The timeout bounds connection setup only.
        session.set_timeout(0);

        authenticate(&session, config)?;
        Ok(SshSession {
            session,
            address: config.address.clone(),
        })
    }

    fn open_fs(&self, shell: &SshSession) -> Result<SshSftp, TransportError> {
        Ok(SshSftp {
            sftp: shell.session.sftp()?,
        })
    }
}

fn authenticate(session: &Session, config: &ClientConfig) -> Result<(), TransportError> {
    let mut failures = Vec::new();
    for method in &config.auth {
        let attempt = match method {
            AuthMethod::PrivateKey { pem, passphrase } => session.userauth_pubkey_memory(
                &config.user,
                None,
                pem,
                passphrase.as_deref(),
            ),
            AuthMethod::PrivateKeyFile { path, passphrase } => {
                session.userauth_pubkey_file(&config.user, None, path, passphrase.as_deref())
            }
            AuthMethod::Password(password) => session.userauth_password(&config.user, password),
        };
        match attempt {
            Ok(()) if session.authenticated() => return Ok(()),
            Ok(()) => {}
            Err(err) => failures.push(err.message().to_string()),
        }
    }
    let message = if failures.is_empty() {
        format!("no usable credentials for {}", config.user)
    } else {
        failures.join("; ")
    };
    Err(TransportError::Auth { message })
}

/// An authenticated session. Disconnects on drop.
pub struct SshSession {
    session: Session,
    address: String,
}

impl SshSession {
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl RemoteShell for SshSession {
    fn run(&self, command: &str) -> Result<Vec<u8>, TransportError> {
        let mut channel = self.session.channel_session()?;
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(command)?;

        let mut output = Vec::new();
        channel.read_to_end(&mut output)?;
        channel.wait_close()?;

        match channel.exit_status()? {
            0 => Ok(output),
            status => Err(TransportError::Command {
                command: command.to_string(),
                status,
                output: String::from_utf8_lossy(&output).trim_end().to_string(),
            }),
        }
    }

    fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(), TransportError> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        for line in BufReader::new(&mut channel).lines() {
            on_line(&line?);
        }
        for line in BufReader::new(channel.stderr()).lines() {
            on_line(&line?);
        }
        channel.wait_close()?;

        match channel.exit_status()? {
            0 => Ok(()),
            status => Err(TransportError::Command {
                command: command.to_string(),
                status,
                output: String::new(),
            }),
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let _ = self.session.disconnect(None, "bye", None);
    }
}

/// SFTP sub-channel of an [`SshSession`].
pub struct SshSftp {
    sftp: Sftp,
}

impl SshSftp {
    fn not_found_or(path: &str, err: ssh2::Error) -> TransportError {
        match err.code() {
            ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => TransportError::NotFound {
                path: path.to_string(),
            },
            _ => err.into(),
        }
    }
}

impl RemoteFs for SshSftp {
    fn stat(&self, path: &str) -> Result<RemoteMetadata, TransportError> {
        let stat = self
            .sftp
            .stat(Path::new(path))
            .map_err(|e| Self::not_found_or(path, e))?;
        Ok(RemoteMetadata {
            is_dir: stat.is_dir(),
            size: stat.size.unwrap_or(0),
            mode: stat.perm.map(|p| p & 0o7777),
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
            match self.stat(&current) {
                Ok(meta) if meta.is_dir => {}
                Ok(_) => {
                    return Err(TransportError::Sftp {
                        code: 0,
                        message: format!("{current} exists and is not a directory"),
                    })
                }
                Err(err) if err.is_not_found() => {
                    self.sftp.mkdir(Path::new(&current), 0o755)?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + '_>, TransportError> {
        let file = self
            .sftp
            .create(Path::new(path))
            .map_err(|e| Self::not_found_or(path, e))?;
        Ok(Box::new(file))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        let stat = FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode),
            atime: None,
            mtime: None,
        };
        self.sftp.setstat(Path::new(path), stat)?;
        Ok(())
    }
}
