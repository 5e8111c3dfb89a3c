mod types;

pub use types::*;

use crate::Result;
use std::env;
use tracing::debug;

pub async fn load() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

    debug!("Loading configuration from: {}", config_path);

    let config_str = tokio::fs::read_to_string(&config_path).await?;
    let mut config = parse(&config_str)?;
    apply_env_overrides(&mut config);

    Ok(config)
}

pub fn parse(yaml: &str) -> Result<Config> {
    // An empty file is a valid, all-defaults configuration.
    if yaml.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = env::var("PREDICTIONS_DB_PATH") {
        config.server.database_path = path;
    }
    if let Ok(key) = env::var("LLM_API_KEY") {
        config.llm.get_or_insert_with(LlmConfig::default).api_key = key;
    }
}
