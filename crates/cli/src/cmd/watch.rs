//! Run the sync pipeline until interrupted

use anyhow::{Context, Result};
use cli_lib::config::{self, Config};
use cli_lib::locks::InstanceLock;
use cli_lib::pipeline::Pipeline;
use cli_lib::{gateway, notifier};
use engine::PeriodicReconciler;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use watcher::NotifySource;

pub async fn run(config: Config, paths: Vec<PathBuf>, no_debounce: bool) -> Result<()> {
    let mut config = config.with_extra_paths(paths);
    if no_debounce {
        config.debounce.enabled = false;
    }
    config.validate_for_watch()?;

    let state_dir = config::state_dir().context("Could not determine state directory")?;
    let _lock = InstanceLock::acquire(&state_dir)?;

    let oracle = gateway::build(&config)?;
    let notifier = notifier::build(config.notify.desktop, &config.notify.app_name);
    let source = NotifySource::new().context("Failed to initialize file notifications")?;
    let pipeline = Pipeline::build(&config, source, oracle, notifier)?;
    let registry = pipeline.registry();

    println!(
        "{} {} file(s){}",
        "Watching".green().bold(),
        registry.len(),
        if config.debounce.enabled {
            format!(" (cooldown {}ms)", config.debounce.cooldown_ms).dimmed().to_string()
        } else {
            " (no debounce)".dimmed().to_string()
        }
    );
    for path in registry.paths() {
        println!("  {}", path.display().cyan());
    }

    // Startup reconciliation runs the oracle; keep it off the runtime threads
    let running = tokio::task::spawn_blocking(move || pipeline.start())
        .await
        .context("Pipeline start panicked")??;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = tokio::spawn(
        PeriodicReconciler::new(running.registry(), config.poll_interval()).run(shutdown_rx),
    );

    let mut health = tokio::time::interval(Duration::from_secs(1));
    tokio::select! {
        res = shutdown_signal() => res?,
        _ = async {
            loop {
                health.tick().await;
                if running.watcher_exited() {
                    break;
                }
            }
        } => warn!("Change watcher exited, shutting down"),
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = reconciler.await {
        warn!("Reconciler task failed: {}", e);
    }

    tokio::task::spawn_blocking(move || running.shutdown())
        .await
        .context("Pipeline shutdown panicked")??;

    println!("{}", "Stopped".dimmed());
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Received Ctrl-C");
    }

    Ok(())
}
