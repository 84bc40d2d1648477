//! ClassWatch hub (cwm-hub) - Main entry point
//!
//! Receives student webcam frames over HTTP, runs them through the
//! attention pipeline and streams results to dashboards over SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cwm_common::config::HubConfig;
use cwm_common::db::init_database;
use cwm_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cwm_hub::classifier::HttpClassifier;
use cwm_hub::db::SqliteStorage;
use cwm_hub::session::SessionManager;
use cwm_hub::similarity::CenterCropLocator;
use cwm_hub::{build_router, AppState, FramePipeline};

/// Command-line arguments for cwm-hub
#[derive(Parser, Debug)]
#[command(name = "cwm-hub")]
#[command(about = "Classroom attention monitoring hub")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CLASSWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "CLASSWATCH_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides config file)
    #[arg(short, long, env = "CLASSWATCH_DATABASE")]
    database: Option<PathBuf>,

    /// Attention classifier endpoint (overrides config file)
    #[arg(long, env = "CLASSWATCH_CLASSIFIER_URL")]
    classifier_url: Option<String>,
}

impl Args {
    fn apply_overrides(&self, config: &mut HubConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(database) = &self.database {
            config.database_path = database.clone();
        }
        if let Some(url) = &self.classifier_url {
            config.classifier_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cwm_hub=info,cwm_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting ClassWatch hub v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config =
        HubConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database: {}", config.database_path.display());

    let classifier = HttpClassifier::new(
        config.classifier_url.clone(),
        Duration::from_millis(config.classifier_timeout_ms),
    )
    .context("Failed to create classifier client")?;
    info!("Classifier endpoint: {}", classifier.endpoint());

    let storage = Arc::new(SqliteStorage::new(pool));
    let sessions = Arc::new(SessionManager::new(storage));
    let events = EventBus::new(config.event_capacity);
    let pipeline = Arc::new(FramePipeline::from_config(
        &config,
        sessions,
        Arc::new(classifier),
        Arc::new(CenterCropLocator),
        events,
    ));

    info!(
        "Similarity threshold {}, frame threshold {}, alert threshold {}",
        config.similarity_threshold, config.frame_threshold, config.alert_threshold
    );

    let state = AppState::new(pipeline).with_allowed_origin(config.allowed_origin.clone());
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_addr, config.port))?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
