//! cast-serve - HTTP server for the social hub
//!
//! Serves the OAuth coordinator, the insights API, and the social proxy.

use clap::Parser;
use libsocialcast::server::{build_router, AppState};
use libsocialcast::Config;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cast-serve")]
#[command(version)]
#[command(about = "HTTP server for OAuth, insights, and the social proxy")]
#[command(long_about = "\
cast-serve - HTTP server for the social hub

DESCRIPTION:
    Serves three endpoint groups under the configured mount prefix
    (default /modules):

        /SocialHub/oauth/{platform}/{start|callback|uninstall|delete}
        /api/social/insights/{platform}/{postId}?site=<siteKey>
        /social-proxy/*

USAGE:
    cast-serve
    cast-serve --bind 0.0.0.0:8090

CONFIGURATION:
    Configuration file: ~/.config/socialcast/config.toml
    Override with SOCIALCAST_CONFIG / SOCIALCAST_DB_PATH

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Bind address (overrides server.bind from the config file)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    libsocialcast::logging::init_default();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let mount = config.server.mount.clone();

    let state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to initialize: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;

    info!("cast-serve listening on {} (mount: {})", bind, mount);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("cast-serve stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
