#![doc = "aur-mirror: build AUR packages from a GitHub organization and publish a pacman repository."]

//! Two one-shot jobs share this crate:
//! - [`dispatch`] builds every `pkg`-tagged repository and tags new versions.
//! - [`aggregate`] folds every package release into one aggregate release
//!   carrying the pacman index.
//!
//! Backends sit behind the traits in [`contract`]; the binary wires the real
//! ones in [`cli`].

pub mod aggregate;
pub mod build;
pub mod ci_output;
pub mod cli;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod github;
pub mod load_config;
pub mod reconcile;
pub mod repo_index;

pub use cli::{run, Cli, Commands};
