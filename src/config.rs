use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Runtime configuration for both jobs. Built by [`crate::load_config::load_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Organization holding the package repositories.
    pub org: String,
    /// GitHub token, injected from the environment.
    #[serde(skip)]
    pub token: Token,
    #[serde(default = "default_clone_dir")]
    pub clone_dir: PathBuf,
    /// Unprivileged user the build tools run as (`runuser -u <user> --`).
    #[serde(default)]
    pub build_user: Option<String>,
    #[serde(default = "default_topic")]
    pub package_topic: String,
    #[serde(default = "default_prefix")]
    pub package_prefix: String,
    #[serde(default = "default_commitish")]
    pub target_commitish: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub aggregate: AggregateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Repository holding the aggregate release.
    pub repo: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// pacman repository name; index files are `<db_name>.db` etc.
    /// Defaults to the organization name.
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

impl Config {
    pub fn db_name(&self) -> &str {
        self.aggregate.db_name.as_deref().unwrap_or(&self.org)
    }

    pub fn trace_loaded(&self) {
        info!(
            org = %self.org,
            clone_dir = %self.clone_dir.display(),
            aggregate_repo = %self.aggregate.repo,
            aggregate_tag = %self.aggregate.tag,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// API token. `Debug` never prints the value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Token(pub String);

impl Token {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

fn default_clone_dir() -> PathBuf {
    PathBuf::from("/home/docker/.clones")
}

fn default_topic() -> String {
    "pkg".to_string()
}

fn default_prefix() -> String {
    "pkg-".to_string()
}

fn default_commitish() -> String {
    "main".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_tag() -> String {
    "latest".to_string()
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}
