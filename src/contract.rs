//! # contract: data types and backend traits for the mirroring jobs
//!
//! The dispatcher and the aggregator never talk to GitHub or spawn build
//! tools directly. They go through three traits:
//! - [`GitHub`]: the subset of the REST API both jobs need.
//! - [`PackageBuilder`]: fetches an AUR package and resolves its version.
//! - [`RepoIndexer`]: maintains the pacman repository database.
//!
//! Real implementations live in [`crate::github`], [`crate::build`] and
//! [`crate::repo_index`]. The traits are annotated for `mockall` so tests can
//! drive both jobs without network access or an Arch toolchain.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A repository as listed by `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub clone_url: String,
}

impl Repository {
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }
}

/// A package to mirror, derived from a `pkg`-tagged repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// AUR package name (repository name minus the configured prefix).
    pub name: String,
    /// Name of the repository in the organization.
    pub repo: String,
    pub clone_url: String,
}

/// Outcome of a successful build: the version the release tag is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub package: String,
    pub repo: String,
    /// `pkgver-pkgrel`
    pub version: String,
    pub tag: String,
}

impl BuildResult {
    pub fn new(package: &Package, version: impl Into<String>) -> Self {
        let version = version.into();
        BuildResult {
            package: package.name.clone(),
            repo: package.repo.clone(),
            tag: format!("aur/{version}"),
            version,
        }
    }
}

/// A release asset. `repository` is filled in by the caller after listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub repository: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Body of `POST /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl NewRelease {
    /// A published, non-prerelease release named after its tag.
    pub fn for_tag(tag: &str, target_commitish: &str) -> Self {
        NewRelease {
            tag_name: tag.to_string(),
            target_commitish: target_commitish.to_string(),
            name: tag.to_string(),
            body: String::new(),
            draft: false,
            prerelease: false,
        }
    }
}

/// GitHub REST operations used by the dispatcher and the aggregator.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GitHub: Send + Sync {
    /// All repositories of an organization, across every page.
    async fn list_org_repos(&self, org: &str) -> Result<Vec<Repository>>;

    /// Whether `refs/tags/<tag>` exists in the repository.
    async fn tag_exists(&self, owner: &str, repo: &str, tag: &str) -> Result<bool>;

    async fn create_release(&self, owner: &str, repo: &str, release: NewRelease)
        -> Result<Release>;

    /// `None` when no release carries the tag.
    async fn get_release_by_tag(&self, owner: &str, repo: &str, tag: &str)
        -> Result<Option<Release>>;

    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>>;

    /// Stream an asset's content into `dest`.
    async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<()>;

    /// Upload the file at `path` to the release under `name`.
    async fn upload_asset(&self, release: &Release, path: &Path, name: &str)
        -> Result<ReleaseAsset>;

    async fn delete_asset(&self, owner: &str, repo: &str, asset_id: u64) -> Result<()>;
}

/// Fetches and builds a single package, returning its `pkgver-pkgrel`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PackageBuilder: Send + Sync {
    /// Start from an empty clone directory.
    fn prepare_workspace(&self, clone_dir: &Path) -> Result<()>;

    /// Build `package` below `clone_dir`. The package directory is
    /// `clone_dir/<package.name>`.
    fn build(&self, package: &Package, clone_dir: &Path) -> Result<String>;
}

/// Maintains a pacman repository database.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait RepoIndexer: Send + Sync {
    /// Add (or update) package archives in the database at `db`.
    fn add(&self, db: &Path, packages: &[PathBuf]) -> Result<()>;

    /// Remove packages by name from the database at `db`.
    fn remove(&self, db: &Path, names: &[String]) -> Result<()>;
}
