use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::{Config, Token};

/// Environment variables checked, in order, for the GitHub token.
pub const TOKEN_VARS: [&str; 2] = ["TOKEN", "GITHUB_TOKEN"];

/// Loads a static YAML config file (no secrets) and injects the token from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let mut config: Config = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;

    if config.org.trim().is_empty() {
        anyhow::bail!("Config field `org` must not be empty");
    }
    if config.aggregate.repo.trim().is_empty() {
        anyhow::bail!("Config field `aggregate.repo` must not be empty");
    }

    let token = TOKEN_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .with_context(|| {
            error!(vars = ?TOKEN_VARS, "No GitHub token in environment");
            format!("{} environment variable not set", TOKEN_VARS.join(" or "))
        })?;
    config.token = Token(token);

    config.trace_loaded();
    Ok(config)
}
