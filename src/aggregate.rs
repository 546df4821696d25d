//! Release aggregator: converge the aggregate release with every package release.
//!
//! The aggregate release (tag `latest` by default) holds all package
//! archives plus the pacman index built from them. A run:
//!   - fetches the aggregate release, creating it when missing
//!   - collects the assets of every package repository's releases
//!   - stops early, signalling `skip=true`, when the asset names already match
//!   - downloads what the aggregate lacks plus the current index archives
//!   - folds new packages into the index with `repo-add` and drops stale ones
//!   - deletes remote assets that are no longer produced and uploads new ones
//!
//! Listing failures for a single repository are logged and that repository is
//! skipped. Every other failure aborts the run; there is no rollback.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::ci_output::CiOutput;
use crate::config::Config;
use crate::contract::{GitHub, NewRelease, Package, Release, ReleaseAsset, RepoIndexer};
use crate::dispatch::discover_packages;
use crate::error::{MirrorError, Result};
use crate::reconcile::{package_name, AggregateReleaseState};
use crate::repo_index::{canonicalize, is_package_archive, IndexFiles};

#[derive(Debug)]
pub enum AggregateOutcome {
    /// Remote asset names already matched; nothing was touched.
    Skipped,
    Updated(AggregateReport),
}

#[derive(Debug, Default)]
pub struct AggregateReport {
    pub release_id: u64,
    pub downloaded: Vec<String>,
    /// Package archives folded into the index.
    pub indexed: Vec<String>,
    /// Package names dropped from the index.
    pub unindexed: Vec<String>,
    pub deleted: Vec<String>,
    pub uploaded: Vec<String>,
}

/// Fetch the aggregate release, creating it when the tag has no release.
pub async fn ensure_release<G>(github: &G, config: &Config) -> Result<Release>
where
    G: GitHub + ?Sized,
{
    let repo = &config.aggregate.repo;
    let tag = &config.aggregate.tag;
    if let Some(release) = github.get_release_by_tag(&config.org, repo, tag).await? {
        info!(release_id = release.id, tag = %tag, "[RELEASE] Found aggregate release");
        return Ok(release);
    }
    info!(repo = %repo, tag = %tag, "[RELEASE] Aggregate release missing, creating it");
    github
        .create_release(
            &config.org,
            repo,
            NewRelease::for_tag(tag, &config.target_commitish),
        )
        .await
}

/// Assets of every release of every package repository, de-duplicated by name.
/// Within a repository assets keep the listing order, newest release first.
pub async fn collect_package_assets<G>(
    github: &G,
    config: &Config,
    packages: &[Package],
) -> Vec<ReleaseAsset>
where
    G: GitHub + ?Sized,
{
    let mut seen = BTreeSet::new();
    let mut assets = Vec::new();
    for package in packages {
        let releases = match github.list_releases(&config.org, &package.repo).await {
            Ok(releases) => releases,
            Err(e) => {
                error!(owner = %config.org, repo = %package.repo, error = %e, "[RELEASE][ERROR] Failed to list releases");
                continue;
            }
        };
        for asset in releases.into_iter().flat_map(|r| r.assets) {
            if seen.insert(asset.name.clone()) {
                info!(asset = %asset.name, repo = %package.repo, " ==> Found");
                assets.push(asset);
            } else {
                debug!(asset = %asset.name, repo = %package.repo, "Duplicate asset name ignored");
            }
        }
    }
    assets
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| MirrorError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| MirrorError::io(dir, e))
}

/// Full aggregator run. Writes `skip=<bool>` to `ci` once the comparison is known.
pub async fn aggregate<G, I>(
    github: &G,
    indexer: &I,
    config: &Config,
    ci: &CiOutput,
) -> Result<AggregateOutcome>
where
    G: GitHub + ?Sized,
    I: RepoIndexer + ?Sized,
{
    info!("[RELEASE] Starting release aggregation");
    let packages: Vec<Package> = discover_packages(github, config)
        .await?
        .into_iter()
        .filter(|p| p.repo != config.aggregate.repo)
        .collect();
    if packages.is_empty() {
        error!(org = %config.org, "No packages found.");
        return Err(MirrorError::NoPackages(config.org.clone()));
    }

    let release = ensure_release(github, config).await?;
    let remote: BTreeMap<String, ReleaseAsset> = release
        .assets
        .iter()
        .map(|a| (a.name.clone(), a.clone()))
        .collect();

    let package_assets = collect_package_assets(github, config, &packages).await;
    let index = IndexFiles::new(config.db_name());
    let index_names = index.names();
    let local = package_assets
        .iter()
        .map(|a| a.name.as_str())
        .chain(index_names.iter().copied());

    let state = AggregateReleaseState::new(release.id, remote.keys().cloned(), local);
    if state.is_converged() {
        info!(release_id = release.id, "[RELEASE] Aggregate release is up to date, skipping");
        ci.set_skip(true)?;
        return Ok(AggregateOutcome::Skipped);
    }

    // Without both remote archives the index is rebuilt from every package.
    let remote_index: Vec<&ReleaseAsset> =
        index.archives().iter().filter_map(|n| remote.get(*n)).collect();
    let update_in_place = remote_index.len() == index.archives().len();
    let newest = newest_archives(&package_assets);
    if !update_in_place && newest.is_empty() {
        info!(release_id = release.id, "[RELEASE] No package archives published yet, skipping");
        ci.set_skip(true)?;
        return Ok(AggregateOutcome::Skipped);
    }
    ci.set_skip(false)?;

    let assets_dir = &config.aggregate.assets_dir;
    reset_dir(assets_dir)?;
    let mut report = AggregateReport {
        release_id: release.id,
        ..Default::default()
    };

    if update_in_place {
        for asset in remote_index {
            download(github, asset, assets_dir, &mut report).await?;
        }
    }

    let mut new_archives: Vec<PathBuf> = Vec::new();
    for asset in &package_assets {
        if update_in_place && remote.contains_key(&asset.name) {
            continue;
        }
        let path = download(github, asset, assets_dir, &mut report).await?;
        if newest.contains(asset.name.as_str()) {
            new_archives.push(path);
            report.indexed.push(asset.name.clone());
        }
    }

    let db_path = assets_dir.join(&index.db_archive);
    if !new_archives.is_empty() {
        info!(count = new_archives.len(), "[RELEASE] Adding packages to repository index");
        indexer.add(&db_path, &new_archives)?;
    }

    if update_in_place {
        let provided: BTreeSet<&str> = package_assets
            .iter()
            .filter(|a| is_package_archive(&a.name))
            .filter_map(|a| package_name(&a.name))
            .collect();
        let stale: BTreeSet<String> = state
            .stale_packages(&index_names)
            .filter(|name| is_package_archive(name))
            .filter_map(package_name)
            .filter(|name| !provided.contains(name))
            .map(str::to_string)
            .collect();
        if !stale.is_empty() {
            report.unindexed = stale.into_iter().collect();
            info!(packages = ?report.unindexed, "[RELEASE] Removing stale packages from repository index");
            indexer.remove(&db_path, &report.unindexed)?;
        }
    }

    if !db_path.exists() {
        return Err(MirrorError::Command {
            command: "repo-add".to_string(),
            detail: format!("no repository index at {}", db_path.display()),
        });
    }
    canonicalize(assets_dir, &index)?;

    let plan = state.plan(&index_names);
    for name in &plan.delete {
        if let Some(asset) = remote.get(name) {
            info!(asset = %name, "[RELEASE] Deleting stale asset");
            github
                .delete_asset(&config.org, &config.aggregate.repo, asset.id)
                .await?;
            report.deleted.push(name.clone());
        }
    }
    for name in &plan.upload {
        info!(asset = %name, "[RELEASE] Uploading asset");
        github
            .upload_asset(&release, &assets_dir.join(name), name)
            .await?;
        report.uploaded.push(name.clone());
    }

    info!(
        deleted = report.deleted.len(),
        uploaded = report.uploaded.len(),
        "[RELEASE] Aggregate release reconciled"
    );
    Ok(AggregateOutcome::Updated(report))
}

/// The newest archive of each package: the first one listed for its package name.
fn newest_archives(assets: &[ReleaseAsset]) -> BTreeSet<&str> {
    let mut by_package: BTreeMap<&str, &str> = BTreeMap::new();
    for asset in assets.iter().filter(|a| is_package_archive(&a.name)) {
        let key = package_name(&asset.name).unwrap_or(&asset.name);
        by_package.entry(key).or_insert(asset.name.as_str());
    }
    by_package.into_values().collect()
}

async fn download<G>(
    github: &G,
    asset: &ReleaseAsset,
    dir: &Path,
    report: &mut AggregateReport,
) -> Result<PathBuf>
where
    G: GitHub + ?Sized,
{
    info!(asset = %asset.name, " ==> Downloading");
    let dest = dir.join(&asset.name);
    github.download_asset(asset, &dest).await?;
    report.downloaded.push(asset.name.clone());
    Ok(dest)
}
