//! Configuration management command
//!
//! Shows the effective configuration and where it lives.

use anyhow::{Context, Result};
use cli_lib::config::{self, Config};
use owo_colors::OwoColorize;
use std::path::Path;

/// List the effective configuration
pub async fn run_list(config: &Config, source: Option<&Path>) -> Result<()> {
    println!("{}", "Configuration".bold());
    match source {
        Some(path) if path.exists() => {
            println!("{}: {}\n", "Location".dimmed(), path.display().dimmed())
        }
        Some(path) => println!(
            "{}: {} {}\n",
            "Location".dimmed(),
            path.display().dimmed(),
            "(not found, using defaults)".yellow()
        ),
        None => println!("{}\n", "Using defaults".dimmed()),
    }

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    for line in rendered.lines() {
        if line.starts_with('[') {
            println!("{}", line.yellow());
        } else if let Some((key, value)) = line.split_once(" = ") {
            println!("  {} = {}", key.cyan(), value);
        } else if !line.is_empty() {
            println!("  {}", line);
        } else {
            println!();
        }
    }

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    if create && !config_path.exists() {
        config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
