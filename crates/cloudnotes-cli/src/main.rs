//! cloudnotes CLI - Nextcloud Notes from the command line
//!
//! Logs in through Login Flow v2, stores the app password in the system
//! keychain and reads or writes notes through the Notes API.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::{run_login, run_logout};
use crate::commands::capabilities::run_capabilities;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::get::run_get;
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloudnotes=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile)?,
        Commands::Login { timeout } => run_login(profile, timeout).await?,
        Commands::Logout => run_logout(profile).await?,
        Commands::Status { json } => run_status(profile, json).await?,
        Commands::Capabilities => run_capabilities(profile).await?,
        Commands::List { json } => run_list(profile, json).await?,
        Commands::Get { id } => run_get(profile, id).await?,
        Commands::Add { content } => run_add(profile, &content).await?,
        Commands::Edit { id, content } => run_edit(profile, id, &content).await?,
        Commands::Delete { id } => run_delete(profile, id).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
