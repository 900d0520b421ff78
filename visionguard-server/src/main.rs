// VisionGuard stream server
// Defaults -> config file -> VISIONGUARD_* environment -> CLI flags

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use visionguard_server::cli::Cli;
use visionguard_server::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    config.apply_env().context("Invalid VISIONGUARD_* environment")?;
    cli.apply(&mut config);

    init_logging(&config);
    info!("Starting VisionGuard server v{}", env!("CARGO_PKG_VERSION"));

    config.validate().context("Invalid configuration")?;

    let api_key = config.resolve_api_key(|name| std::env::var(name).ok());
    match &api_key {
        Some(key) => {
            // Never log the full key
            let prefix: String = key.chars().take(8).collect();
            info!("{} loaded ({}...)", config.llm.provider.env_var_name(), prefix);
        }
        None => warn!("No API key for {}", config.llm.provider.as_str()),
    }

    let addr = config.bind_address();
    let state = AppState::from_config(config, api_key)?;
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(
        "Listening on http://{} (ws://{}/ws/stream, default mode {})",
        addr, addr, state.config.default_mode
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init();
    }
}

/// Wait for shutdown signal
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
