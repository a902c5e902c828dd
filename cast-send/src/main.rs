//! cast-send - Background daemon for scheduled publishing
//!
//! Runs the hub's two recurring tasks: "publish-due" and "refresh-metrics".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use libsocialcast::scheduler::{add_standard_tasks, Scheduler};
use libsocialcast::server::AppState;
use libsocialcast::{CastError, Config, Result};
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cast-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
cast-send - Background daemon for scheduled publishing

DESCRIPTION:
    cast-send is a long-running daemon that publishes social posts whose
    scheduled time has arrived and periodically refreshes engagement
    metrics for published posts.

    On startup it registers two recurring tasks, guarded so that only the
    fleet's processing node runs them and a task group is never registered
    twice:

        publish-due      every 5 minutes (scheduler.publish_interval_secs)
        refresh-metrics  every 60 minutes (scheduler.metrics_interval_secs)

USAGE:
    # Run in foreground (logs to stderr)
    cast-send

    # Run one publish sweep and exit
    cast-send --once

    # Enable verbose logging
    cast-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (tasks are deregistered)

CONFIGURATION:
    Configuration file: ~/.config/socialcast/config.toml
    Override with SOCIALCAST_CONFIG / SOCIALCAST_DB_PATH

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit (for testing)
    #[arg(long)]
    once: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("SOCIALCAST_LOG_LEVEL", "debug");
    }
    libsocialcast::logging::init_default();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => {}
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let state = AppState::new(config).await?;

    info!("cast-send daemon starting");

    if cli.once {
        let published = state.publish.publish_due_scheduled().await?;
        info!("cast-send: processed {} post(s) once, exiting", published);
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let scheduler_config = &state.config.scheduler;
    let mut scheduler = Scheduler::new(state.store.clone(), scheduler_config.processing_node);
    add_standard_tasks(
        &mut scheduler,
        state.publish.clone(),
        state.metrics.clone(),
        Duration::from_secs(scheduler_config.publish_interval_secs),
        Duration::from_secs(scheduler_config.metrics_interval_secs),
    );

    let started = scheduler.start().await?;
    info!("Registered {} recurring task(s)", started);

    // Wait for a shutdown signal
    while !shutdown.load(Ordering::Relaxed) {
        sleep(Duration::from_secs(1)).await;
    }

    info!("Shutdown requested, stopping tasks");
    scheduler.shutdown().await;
    info!("cast-send daemon stopped");

    Ok(())
}

/// SIGINT/SIGTERM set the shutdown flag; the main loop drains and exits.
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| CastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}
