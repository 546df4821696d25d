//! Dispatcher: build every `pkg`-tagged repository and tag its current version.
//!
//! The flow is linear:
//!   - list organization repositories and keep the ones carrying the package topic
//!   - fetch and build each package in a fresh clone directory
//!   - create a release `aur/<pkgver-pkgrel>` where the tag does not exist yet
//!
//! A failing build only drops that package (its directory is removed). A
//! rejected release creation aborts the run.

use std::fs;
use std::path::Path;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::contract::{BuildResult, GitHub, NewRelease, Package, PackageBuilder};
use crate::error::{MirrorError, Result};

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub discovered: usize,
    /// Packages whose build failed; no release was attempted for them.
    pub failed: Vec<String>,
    pub up_to_date: Vec<BuildResult>,
    pub created: Vec<BuildResult>,
}

/// Repositories carrying the package topic, mapped to packages. Fails when there are none.
pub async fn discover_packages<G>(github: &G, config: &Config) -> Result<Vec<Package>>
where
    G: GitHub + ?Sized,
{
    let repos = github.list_org_repos(&config.org).await?;
    let packages: Vec<Package> = repos
        .into_iter()
        .filter(|repo| repo.has_topic(&config.package_topic))
        .map(|repo| Package {
            name: repo
                .name
                .strip_prefix(config.package_prefix.as_str())
                .unwrap_or(&repo.name)
                .to_string(),
            clone_url: if repo.ssh_url.is_empty() {
                repo.clone_url
            } else {
                repo.ssh_url
            },
            repo: repo.name,
        })
        .collect();

    if packages.is_empty() {
        error!(org = %config.org, topic = %config.package_topic, "No packages found.");
        return Err(MirrorError::NoPackages(config.org.clone()));
    }
    info!(count = packages.len(), "Discovered packages");
    Ok(packages)
}

/// Builds each package below `clone_dir`. Returns the successful builds and
/// the names of the packages that failed.
pub fn build_packages<B>(
    builder: &B,
    clone_dir: &Path,
    packages: &[Package],
) -> (Vec<BuildResult>, Vec<String>)
where
    B: PackageBuilder + ?Sized,
{
    let mut built = Vec::new();
    let mut failed = Vec::new();

    for package in packages {
        info!(package = %package.name, repo = %package.repo, "[DISPATCH] Building package");
        match builder.build(package, clone_dir) {
            Ok(version) => {
                let result = BuildResult::new(package, version);
                info!(package = %result.package, tag = %result.tag, "[DISPATCH] Build succeeded");
                built.push(result);
            }
            Err(e) => {
                error!(package = %package.name, error = %e, "[DISPATCH][ERROR] Failed to fetch version");
                let pkg_dir = clone_dir.join(&package.name);
                if pkg_dir.exists() {
                    if let Err(e) = fs::remove_dir_all(&pkg_dir) {
                        warn!(path = %pkg_dir.display(), error = ?e, "Failed to remove package directory");
                    }
                }
                failed.push(package.name.clone());
            }
        }
    }
    (built, failed)
}

/// Creates a release for every build whose tag is missing. Returns `(created, up_to_date)`.
pub async fn publish_tags<G>(
    github: &G,
    config: &Config,
    builds: Vec<BuildResult>,
) -> Result<(Vec<BuildResult>, Vec<BuildResult>)>
where
    G: GitHub + ?Sized,
{
    let mut created = Vec::new();
    let mut up_to_date = Vec::new();

    for build in builds {
        info!(repo = %build.repo, tag = %build.tag, "[DISPATCH] Checking tag");
        if github.tag_exists(&config.org, &build.repo, &build.tag).await? {
            info!(repo = %build.repo, "[DISPATCH] {} is up to date", build.repo);
            up_to_date.push(build);
            continue;
        }

        let release = NewRelease::for_tag(&build.tag, &config.target_commitish);
        match github.create_release(&config.org, &build.repo, release).await {
            Ok(created_release) => {
                info!(repo = %build.repo, tag = %created_release.tag_name, "[DISPATCH] Release created");
                created.push(build);
            }
            Err(e) => {
                error!(repo = %build.repo, tag = %build.tag, error = %e, "[DISPATCH][ERROR] Failed to create release");
                return Err(e);
            }
        }
    }
    Ok((created, up_to_date))
}

/// Full dispatcher run.
pub async fn dispatch<G, B>(github: &G, builder: &B, config: &Config) -> Result<DispatchReport>
where
    G: GitHub + ?Sized,
    B: PackageBuilder + ?Sized,
{
    info!("[DISPATCH] Starting dispatcher");
    let packages = discover_packages(github, config).await?;

    builder.prepare_workspace(&config.clone_dir)?;
    let (built, failed) = build_packages(builder, &config.clone_dir, &packages);
    if let Err(e) = fs::remove_dir_all(&config.clone_dir) {
        warn!(path = %config.clone_dir.display(), error = ?e, "Failed to remove clone directory");
    }

    let (created, up_to_date) = publish_tags(github, config, built).await?;
    info!(
        created = created.len(),
        up_to_date = up_to_date.len(),
        failed = failed.len(),
        "[DISPATCH] Dispatcher finished"
    );
    Ok(DispatchReport {
        discovered: packages.len(),
        failed,
        up_to_date,
        created,
    })
}
