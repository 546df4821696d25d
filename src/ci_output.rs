//! Step outputs for the CI runner.
//!
//! GitHub Actions reads `key=value` lines from the file named by
//! `$GITHUB_OUTPUT`. Outside of CI the lines go to stdout instead.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::info;

use crate::error::{MirrorError, Result};

pub const GITHUB_OUTPUT_VAR: &str = "GITHUB_OUTPUT";

#[derive(Debug, Clone, Default)]
pub struct CiOutput {
    path: Option<PathBuf>,
}

impl CiOutput {
    pub fn from_env() -> Self {
        CiOutput {
            path: std::env::var_os(GITHUB_OUTPUT_VAR).map(PathBuf::from),
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        CiOutput {
            path: Some(path.into()),
        }
    }

    pub fn stdout() -> Self {
        CiOutput { path: None }
    }

    pub fn set(&self, key: &str, value: impl std::fmt::Display) -> Result<()> {
        let line = format!("{key}={value}");
        info!(output = %line, "Setting CI output");
        match &self.path {
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| MirrorError::io(path, e))?;
                writeln!(file, "{line}").map_err(|e| MirrorError::io(path, e))
            }
            None => {
                println!("{line}");
                Ok(())
            }
        }
    }

    /// Signal whether the aggregate release was left unchanged.
    pub fn set_skip(&self, skip: bool) -> Result<()> {
        self.set("skip", skip)
    }
}
