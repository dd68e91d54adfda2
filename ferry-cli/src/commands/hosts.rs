//! `ferry hosts list|add|remove`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ferry_core::{inventory, Credentials, Endpoint, HostName};

#[derive(Subcommand, Debug)]
pub enum HostsCommand {
    /// List inventory entries.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add or replace an inventory entry.
    Add(AddArgs),

    /// Remove an inventory entry.
    Remove {
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Short name used with `--host`.
    pub name: String,

    /// Address (`host` or `host:port`).
    pub address: String,

    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// Stored in the inventory file (mode 0600).
    #[arg(long)]
    pub password: Option<String>,

    #[arg(long, short = 'i', value_name = "FILE")]
    pub identity: Option<PathBuf>,

    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

pub fn run(cmd: HostsCommand) -> Result<()> {
    match cmd {
        HostsCommand::List { json } => list(json),
        HostsCommand::Add(args) => add(args),
        HostsCommand::Remove { name } => remove(&name),
    }
}

#[derive(Tabled, Serialize)]
struct HostRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "address")]
    address: String,
    #[tabled(rename = "user")]
    user: String,
    #[tabled(rename = "auth")]
    auth: String,
}

fn auth_label(credentials: &Credentials) -> String {
    let mut parts = Vec::new();
    if credentials.private_key.is_some() {
        parts.push("key");
    }
    if credentials.private_key_path.is_some() {
        parts.push("key file");
    }
    if credentials.password.is_some() {
        parts.push("password");
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

fn list(json: bool) -> Result<()> {
    let hosts = inventory::load().context("failed to load host inventory")?;
    let rows: Vec<HostRow> = hosts
        .iter()
        .map(|(name, endpoint)| HostRow {
            name: name.to_string(),
            address: endpoint.socket_address(),
            user: endpoint.effective_user().to_string(),
            auth: auth_label(&endpoint.credentials),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No hosts registered.");
        println!("Run: ferry hosts add <name> <address>");
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let mut endpoint = Endpoint::new(&args.address);
    if let Some(port) = args.port {
        endpoint = endpoint.with_port(port);
    }
    if let Some(user) = args.user {
        endpoint = endpoint.with_user(user);
    }
    endpoint.credentials = Credentials {
        password: args.password,
        private_key: None,
        private_key_path: args.identity,
    };
    endpoint.timeout_ms = args.timeout_ms;

    let name = HostName::from(args.name);
    let previous = inventory::add(name.clone(), endpoint.clone())
        .with_context(|| format!("failed to save host '{name}'"))?;
    let verb = if previous.is_some() { "updated" } else { "added" };
    println!("{} {verb} '{name}' ({endpoint})", "✓".green().bold());
    Ok(())
}

fn remove(name: &str) -> Result<()> {
    let name = HostName::from(name);
    inventory::remove(&name).with_context(|| format!("failed to remove host '{name}'"))?;
    println!("{} removed '{name}'", "✓".green().bold());
    Ok(())
}
