//! # github: `GitHub` trait implementation over the REST API
//!
//! [`GitHubClient`] is a thin `reqwest` wrapper. Every request is
//! authenticated with the configured token and pinned to the
//! `2022-11-28` API version. Non-success statuses become
//! [`MirrorError::Api`] carrying the response body. Endpoints where a 404
//! is an answer rather than a failure map it to `false`/`None`.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{Config, Token};
use crate::contract::{GitHub, NewRelease, Release, ReleaseAsset, Repository};
use crate::error::{MirrorError, Result};

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";

pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: Token,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: Token) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;
        info!(api_url, "Initialized GitHub client");
        Ok(GitHubClient {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url, config.token.clone())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(reqwest::Method::GET, &format!("{}{}", self.api_url, path))
    }

    /// Collects every page of a list endpoint. `path` must not carry a query.
    async fn get_all_pages<T>(&self, path: &str) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let resp = self
                .get(path)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let batch: Vec<T> = expect_status(resp, StatusCode::OK).await?.json().await?;
            let size = batch.len();
            items.extend(batch);
            debug!(path, page, size, "Fetched page");
            if size < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

/// Passes the response through when it has the expected status.
async fn expect_status(resp: Response, expected: StatusCode) -> Result<Response> {
    if resp.status() == expected {
        return Ok(resp);
    }
    Err(api_error(resp).await)
}

async fn api_error(resp: Response) -> MirrorError {
    let status = resp.status().as_u16();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
    MirrorError::Api { status, url, body }
}

/// Strips the RFC 6570 suffix (`{?name,label}`) from a release upload URL.
pub fn upload_endpoint(upload_url: &str) -> &str {
    match upload_url.find('{') {
        Some(idx) => &upload_url[..idx],
        None => upload_url,
    }
}

#[async_trait]
impl GitHub for GitHubClient {
    async fn list_org_repos(&self, org: &str) -> Result<Vec<Repository>> {
        let repos: Vec<Repository> = self.get_all_pages(&format!("/orgs/{org}/repos")).await?;
        info!(org, count = repos.len(), "Listed organization repositories");
        Ok(repos)
    }

    async fn tag_exists(&self, owner: &str, repo: &str, tag: &str) -> Result<bool> {
        let resp = self
            .get(&format!("/repos/{owner}/{repo}/git/ref/tags/{tag}"))
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(api_error(resp).await),
        }
    }

    async fn create_release(
        &self,
        owner: &str,
        repo: &str,
        release: NewRelease,
    ) -> Result<Release> {
        let url = format!("{}/repos/{owner}/{repo}/releases", self.api_url);
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&release)
            .send()
            .await?;
        if resp.status() != StatusCode::CREATED {
            let err = api_error(resp).await;
            return Err(MirrorError::ReleaseCreation {
                repo: format!("{owner}/{repo}"),
                tag: release.tag_name,
                detail: err.to_string(),
            });
        }
        let created: Release = resp.json().await?;
        info!(owner, repo, tag = %created.tag_name, id = created.id, "Created release");
        Ok(created)
    }

    async fn get_release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<Release>> {
        let resp = self
            .get(&format!("/repos/{owner}/{repo}/releases/tags/{tag}"))
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(Some(resp.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(api_error(resp).await),
        }
    }

    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let mut releases: Vec<Release> = self
            .get_all_pages(&format!("/repos/{owner}/{repo}/releases"))
            .await?;
        for asset in releases.iter_mut().flat_map(|r| r.assets.iter_mut()) {
            asset.repository = repo.to_string();
        }
        Ok(releases)
    }

    async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<()> {
        let resp = self
            .request(reqwest::Method::GET, &asset.browser_download_url)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await?;
        let resp = expect_status(resp, StatusCode::OK).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| MirrorError::io(dest, e))?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?)
                .await
                .map_err(|e| MirrorError::io(dest, e))?;
        }
        file.flush().await.map_err(|e| MirrorError::io(dest, e))?;
        debug!(asset = %asset.name, path = %dest.display(), "Downloaded asset");
        Ok(())
    }

    async fn upload_asset(
        &self,
        release: &Release,
        path: &Path,
        name: &str,
    ) -> Result<ReleaseAsset> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| MirrorError::io(path, e))?;
        let resp = self
            .request(reqwest::Method::POST, upload_endpoint(&release.upload_url))
            .query(&[("name", name)])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;
        let asset: ReleaseAsset = expect_status(resp, StatusCode::CREATED).await?.json().await?;
        info!(release = release.id, asset = %asset.name, "Uploaded asset");
        Ok(asset)
    }

    async fn delete_asset(&self, owner: &str, repo: &str, asset_id: u64) -> Result<()> {
        let url = format!("{}/repos/{owner}/{repo}/releases/assets/{asset_id}", self.api_url);
        let resp = self.request(reqwest::Method::DELETE, &url).send().await?;
        expect_status(resp, StatusCode::NO_CONTENT).await?;
        info!(owner, repo, asset_id, "Deleted asset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_endpoint_strips_uri_template() {
        assert_eq!(
            upload_endpoint("https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}"),
            "https://uploads.github.com/repos/o/r/releases/1/assets"
        );
        assert_eq!(upload_endpoint("https://example.test/up"), "https://example.test/up");
    }
}
