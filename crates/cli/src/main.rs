//! drivesync CLI - dsync command

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli_lib::{config, logging};
use std::path::PathBuf;

mod cmd;

/// drivesync - keep watched files in sync with their remote copies
#[derive(Parser)]
#[command(name = "dsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config_dir>/drivesync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch files and sync them until interrupted
    Watch {
        /// Files to watch, in addition to watch.paths
        paths: Vec<PathBuf>,

        /// React to every change immediately
        #[arg(long)]
        no_debounce: bool,
    },
    /// Compare each file with its remote copy once
    Check {
        /// Files to check, in addition to watch.paths
        paths: Vec<PathBuf>,
    },
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    List,
    /// Print the config file path
    Path {
        /// Write the example config if no file exists
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = cli.config.clone().or_else(config::config_file_path);
    let config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };

    let _log_guard = logging::init(&config.log)?;

    match cli.command {
        Commands::Watch { paths, no_debounce } => cmd::watch::run(config, paths, no_debounce).await,
        Commands::Check { paths } => cmd::check::run(config, paths).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list(&config, source.as_deref()).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
