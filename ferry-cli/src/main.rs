//! Ferry: copy files to remote hosts over SSH.
//!
//! # Usage
//!
//! ```text
//! ferry copy --host <name|addr> <local> <remote> [--shell-exists] [--skip-checksum] [--dry-run] [--json]
//! ferry exec --host <name|addr> [--stream] -- <command>...
//! ferry ping --host <name|addr>
//! ferry hosts list [--json]
//! ferry hosts add <name> <address> [--port N] [--user U] [--password P] [--identity FILE]
//! ferry hosts remove <name>
//! ```

mod commands;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{
    copy::CopyArgs, exec::ExecArgs, hosts::HostsCommand, ping::PingArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    version,
    about = "Copy files and directory trees to remote hosts over SSH",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a local file or directory to a remote path, skipping current files.
    Copy(CopyArgs),

    /// Run a command on a remote host.
    Exec(ExecArgs),

    /// Check that a remote host accepts a session.
    Ping(PingArgs),

    /// Manage the host inventory (~/.ferry/hosts.yaml).
    Hosts {
        #[command(subcommand)]
        command: HostsCommand,
    },
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
struct LogArgs {
    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    log_level: String,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn init_tracing(args: &LogArgs) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt().with_env_filter(filter).with_target(false);

    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let writer = Mutex::new(file);
            if args.log_json {
                let _ = builder.json().with_writer(writer).try_init();
            } else {
                let _ = builder.with_ansi(false).with_writer(writer).try_init();
            }
        }
        None if args.log_json => {
            let _ = builder.json().with_writer(std::io::stderr).try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log)?;
    match cli.command {
        Commands::Copy(args) => args.run(),
        Commands::Exec(args) => args.run(),
        Commands::Ping(args) => args.run(),
        Commands::Hosts { command } => commands::hosts::run(command),
    }
}
