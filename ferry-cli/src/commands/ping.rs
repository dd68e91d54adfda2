//! `ferry ping`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use ferry_sync::ssh::SshDialer;
use ferry_sync::{RemoteHost, TracingSink};

use super::HostArgs;

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub host: HostArgs,
}

impl PingArgs {
    pub fn run(self) -> Result<()> {
        let endpoint = self.host.endpoint()?;
        RemoteHost::new(endpoint.clone(), SshDialer, Arc::new(TracingSink))
            .ping()
            .with_context(|| format!("{endpoint} is not reachable"))?;
        println!("{} {endpoint} reachable", "✓".green().bold());
        Ok(())
    }
}
