use agri_serve::{config, server};
use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parses `RUST_LOG`-style directives, e.g. `info` or `agri_serve=debug,tower_http=info`.
fn log_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| {
        anyhow::anyhow!(
            "Invalid log filter '{}': {}. Use a level (error, warn, info, debug, trace) or target=level directives",
            directives,
            e
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration comes first so its log level can seed the subscriber
    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.server.logs.level.clone());

    let filter = match log_filter(&log_level) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    info!("Starting agri-serve with log level: {}", log_level);
    info!(
        "Models: disease={}, irrigation={}, yield={}",
        config.models.disease_model_path,
        config.models.irrigation_model_path,
        config.models.yield_model_path
    );

    server::run(config).await?;

    Ok(())
}
