mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{add::AddArgs, config::ConfigArgs, list::ListArgs};

#[derive(Parser)]
#[command(author, version, about = "Personal blood-pressure journal")]
struct Cli {
    /// Path to the configuration file. Defaults to ./.tensio/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new blood-pressure reading
    Add(AddArgs),
    /// List all recorded readings, oldest first
    List(ListArgs),
    /// Show or update the journal configuration
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli { config, command } = Cli::parse();

    match command {
        Commands::Add(args) => commands::add::execute(config, args)?,
        Commands::List(args) => commands::list::execute(config, args)?,
        Commands::Config(args) => commands::config::execute(config, args)?,
    }

    Ok(())
}
