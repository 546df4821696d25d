use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the dispatcher, the aggregator and their backends.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API returned {status} for {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error("no packages found in organization {0}")]
    NoPackages(String),

    #[error("failed to create release {tag} in {repo}: {detail}")]
    ReleaseCreation {
        repo: String,
        tag: String,
        detail: String,
    },
}

impl MirrorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
