//! Note Reviewer CLI - offline note review with queued sync
//!
//! Notes are written to a local database first; `sync` and `watch` push the
//! queued changes to the records service and pull newer remote notes.

mod cli;
mod commands;
mod error;


use clap::Parser;
use reviewer_core::config::ClientConfig;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::clear::run_clear;
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
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

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "reviewer=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = ClientConfig::from_env()?;
    let context = Context::new(config, cli.db_path, cli.vault)?;

    match cli.command {
        Commands::Add { title, content } => run_add(title, &content, &context).await?,
        Commands::Edit { id, title, content } => run_edit(&id, title, content, &context).await?,
        Commands::Delete { id } => run_delete(&id, &context).await?,
        Commands::Show { id, json } => run_show(&id, json, &context).await?,
        Commands::List {
            unsynced,
            limit,
            json,
        } => run_list(unsynced, limit, json, &context).await?,
        Commands::Status { json } => run_status(json, &context).await?,
        Commands::Sync { json } => run_sync(json, &context).await?,
        Commands::Watch { interval } => run_watch(interval, &context).await?,
        Commands::Clear { yes } => run_clear(yes, &context).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
