#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # lastseen
//!
//! Location webhook for a GPS tracking client (OwnTracks-style HTTP mode).
//!
//! Each location ping is classified: inside a configured hidden zone the zone
//! name is recorded, otherwise the nearest named amenity from OpenStreetMap
//! (via Overpass) is used when it is close enough. The last label and battery
//! level are kept for anyone who asks.
//!
//! ## Subcommands
//!
//! - `lastseen serve` (default) — run the HTTP server
//! - `lastseen check-config` — print the resolved configuration and exit
//!
//! ## API surface
//!
//! | Method | Path            | Auth | Description                          |
//! |--------|-----------------|------|--------------------------------------|
//! | GET    | `/api/health`   | No   | Liveness probe                       |
//! | POST   | `/`             | Opt  | Ingest a location report, returns [] |
//! | GET    | `/`             | Opt  | `{location, battery}`                |
//! | POST   | `/api/location` | Opt  | Same as `POST /`                     |
//! | GET    | `/api/location` | Opt  | Same as `GET /`                      |
//!
//! "Opt" routes require `Authorization: Bearer <token>` only when a token is
//! configured.
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap subcommands, server lifecycle
//! config.rs        — TOML + env-var configuration, hidden zones
//! geo.rs           — Haversine distance, hidden-zone lookup
//! poi.rs           — Overpass client, POI ranking, label policy
//! store.rs         — location/battery state, optional JSON file
//! auth.rs          — optional Bearer token middleware
//! state.rs         — AppState shared by handlers
//! routes/
//!   mod.rs         — router assembly
//!   health.rs      — GET /api/health
//!   location.rs    — POST/GET webhook handlers
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use lastseen::{AppState, Config, LocationStore, OverpassClient};

/// Location webhook with hidden zones and nearby-POI labels.
#[derive(Parser)]
#[command(name = "lastseen", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
    /// Load the configuration, print it, and exit.
    CheckConfig {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig { config }) => check_config(config.as_deref()),
        Some(Commands::Serve { config }) => run_server(config.as_deref()).await,
        None => run_server(None).await,
    }
}

fn check_config(config_path: Option<&str>) -> ExitCode {
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("listen:   {}", config.server.listen);
    println!("overpass: {}", config.overpass.url);
    println!(
        "store:    {}",
        config.store.path.as_deref().unwrap_or("(memory)")
    );
    println!(
        "auth:     {}",
        if config.auth.token.is_some() {
            "bearer token"
        } else {
            "none"
        }
    );
    println!("zones:    {}", config.zones.len());
    for zone in &config.zones {
        println!(
            "  - {} ({:.6}, {:.6}) r={} km",
            zone.name, zone.lat, zone.lon, zone.radius
        );
    }
    ExitCode::SUCCESS
}

async fn run_server(config_path: Option<&str>) -> ExitCode {
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("lastseen v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Hidden zones: {}", config.zones.len());
    info!("Overpass endpoint: {}", config.overpass.url);

    if config.auth.token.is_none() {
        warn!("No auth token configured, location routes are open");
    }

    let store = match &config.store.path {
        Some(path) => match LocationStore::open(path).await {
            Ok(store) => store,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            info!("No state file configured, keeping state in memory");
            LocationStore::in_memory()
        }
    };

    let overpass = match OverpassClient::new(&config.overpass) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build Overpass client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let listen = config.server.listen.clone();
    let app = lastseen::routes::router(AppState::new(config, store, overpass));

    let listener = match TcpListener::bind(&listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {listen}: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Listening on {listen}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Goodbye");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}
