//! `ferry copy`: one-way copy of a file or tree to a remote path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use ferry_core::SyncOptions;
use ferry_sync::plan::expand;
use ferry_sync::{remote_path, CopyReport, TaskOutcome, TransferTask, Verification};

use super::HostArgs;

#[derive(Args, Debug)]
pub struct CopyArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Local file or directory.
    pub local: PathBuf,

    /// Remote destination. An existing remote directory receives a file under
    /// its own name.
    pub remote: String,

    /// Probe remote files with `ls` over the shell instead of SFTP stat.
    #[arg(long)]
    pub shell_exists: bool,

    /// Transfer every file and skip post-transfer verification.
    #[arg(long)]
    pub skip_checksum: bool,

    /// List the transfer tasks without connecting.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CopyArgs {
    pub fn run(self) -> Result<()> {
        if self.dry_run {
            return self.dry_run();
        }

        let endpoint = self.host.endpoint()?;
        let options = SyncOptions {
            use_shell_existence_check: self.shell_exists,
            skip_checksum: self.skip_checksum,
        };
        let report = ferry_sync::copy(endpoint.clone(), &self.local, &self.remote, options)
            .with_context(|| {
                format!(
                    "copy {} to {endpoint}:{} failed",
                    self.local.display(),
                    self.remote
                )
            })?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        print_report(&report, &endpoint.to_string());
        Ok(())
    }

    /// Without a connection the remote state is unknown, so a trailing `/`
    /// stands in for "existing directory".
    fn dry_run(&self) -> Result<()> {
        let destination = if self.local.is_file() && self.remote.ends_with('/') {
            let name = self
                .local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            remote_path::join(&self.remote, &name)
        } else {
            self.remote.clone()
        };
        let tasks = expand(&self.local, &destination)
            .with_context(|| format!("cannot walk {}", self.local.display()))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&tasks)?);
            return Ok(());
        }
        print_tasks(&tasks);
        Ok(())
    }
}

fn print_tasks(tasks: &[TransferTask]) {
    for task in tasks {
        let marker = if task.is_dir { "d" } else { "f" };
        println!(
            "[dry-run] {marker}  {} -> {}",
            task.source.display(),
            task.destination
        );
    }
    let files = tasks.iter().filter(|t| !t.is_dir).count();
    println!(
        "[dry-run] {} directories, {files} files",
        tasks.len() - files
    );
}

fn print_report(report: &CopyReport, host: &str) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} {} -> {host}:{} ({} transferred, {} skipped, {} bytes, {}ms)",
        "✓".green().bold(),
        report.local.display(),
        report.destination,
        report.transferred(),
        report.skipped(),
        report.bytes(),
        elapsed.num_milliseconds(),
    );

    for outcome in &report.outcomes {
        match outcome {
            TaskOutcome::DirectoryEnsured { destination } => {
                println!("  {}  {destination}/", "d".bright_black())
            }
            TaskOutcome::Skipped { destination, .. } => println!("  ·  {destination}"),
            TaskOutcome::Transferred {
                destination,
                verification,
                ..
            } => match verification {
                Verification::Unverified => println!(
                    "  {}  {destination} {}",
                    "✎".yellow(),
                    "(unverified)".yellow()
                ),
                _ => println!("  ✎  {destination}"),
            },
        }
    }

    if report.unverified() > 0 {
        println!(
            "{}",
            format!(
                "{} file(s) could not be verified remotely; re-run to confirm.",
                report.unverified()
            )
            .yellow()
        );
    }
}
