//! `ferry exec`: run a command remotely.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ferry_sync::ssh::SshDialer;
use ferry_sync::RemoteHost;

use super::{HostArgs, StdoutSink};

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Print output line by line as it arrives (stdout first, then stderr).
    #[arg(long)]
    pub stream: bool,

    /// Command and arguments, joined with spaces.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl ExecArgs {
    pub fn run(self) -> Result<()> {
        let endpoint = self.host.endpoint()?;
        let command = self.command.join(" ");
        let host = RemoteHost::new(endpoint.clone(), SshDialer, Arc::new(StdoutSink));

        if self.stream {
            host.run_streamed(&command)
                .with_context(|| format!("`{command}` failed on {endpoint}"))?;
            return Ok(());
        }

        let output = host
            .run(&command)
            .with_context(|| format!("`{command}` failed on {endpoint}"))?;
        std::io::stdout().write_all(&output)?;
        Ok(())
    }
}
