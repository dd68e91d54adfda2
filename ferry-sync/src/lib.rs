//! # ferry-sync
//!
//! One-way file synchronisation over SSH.
//!
//! [`Syncer::copy`] settles the destination layout, opens a command session
//! plus an SFTP sub-channel (retrying transient disconnects), then walks the
//! local tree. A file is skipped when the remote copy has the same size and
//! sha256 fingerprint. Otherwise it is replaced and its fingerprint re-checked
//! remotely. [`RemoteHost`] runs plain commands against the same endpoint.
//!
//! The transport is abstracted behind [`transport::Dialer`];
//! [`ssh::SshDialer`] is the production implementation and
//! [`loopback::LoopbackDialer`] serves a local directory.

pub mod command;
pub mod connect;
pub mod copier;
pub mod digest;
pub mod engine;
pub mod error;
pub mod loopback;
pub mod plan;
pub mod probe;
pub mod remote_path;
pub mod sink;
pub mod ssh;
pub mod transport;

pub use command::RemoteHost;
pub use connect::{ClientConfig, Connector};
pub use copier::{TaskOutcome, Verification};
pub use digest::Fingerprint;
pub use engine::{copy, CopyReport, Syncer};
pub use error::{SyncError, TransportError};
pub use plan::TransferTask;
pub use probe::RemoteState;
pub use sink::{LogSink, MemorySink, TracingSink};
