//! One-shot check command

use anyhow::{Context, Result};
use cli_lib::check::{self, FileStatus};
use cli_lib::config::Config;
use cli_lib::{gateway, notifier};
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(config: Config, paths: Vec<PathBuf>) -> Result<()> {
    let config = config.with_extra_paths(paths);
    config.validate_for_watch()?;

    let oracle = gateway::build(&config)?;
    let notifier = notifier::build(false, &config.notify.app_name);
    let report = tokio::task::spawn_blocking(move || check::check(&config, oracle, notifier))
        .await
        .context("Check panicked")??;

    for (path, status) in &report.files {
        let label = match status {
            FileStatus::InSync => "in sync".green().to_string(),
            FileStatus::Conflict => "conflict".red().bold().to_string(),
            FileStatus::Unknown => "unknown".yellow().to_string(),
            FileStatus::Failed(e) => format!("{} {}", "error".red().bold(), e.to_string().dimmed()),
        };
        println!("{:<12} {}", label, path.display());
    }

    report.ensure_clean()
}
