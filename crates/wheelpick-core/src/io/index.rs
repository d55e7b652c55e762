//! Package index lookups.
//!
//! JSON API repositories answer `GET {url}/pypi/{name}/{version}/json` with a
//! `urls` array; legacy repositories serve a simple-index HTML page at
//! `{url}/{name}/` whose anchors carry the digest in the URL fragment.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::FetchError;
use crate::repo::Repository;
use crate::types::{PackageName, Version};

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r##"(?is)<a\s[^>]*?href\s*=\s*"(?P<href>[^"#]*)(?:#(?P<fragment>[^"]*))?"[^>]*>\s*(?P<name>[^<]+?)\s*</a>"##,
    )
    .expect("anchor pattern is valid")
});

/// A file the index publishes for a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseFile {
    /// Distribution filename.
    pub filename: String,
    /// Absolute download URL.
    pub url: String,
    /// Hex digests by lowercase algorithm name.
    #[serde(default)]
    pub digests: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct JsonRelease {
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

/// Lists the files of one release on a repository.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Files published for `name` at `version`.
    async fn release_files(
        &self,
        repo: &Repository,
        name: &PackageName,
        version: &Version,
    ) -> Result<Vec<ReleaseFile>, FetchError>;
}

/// [`IndexClient`] over HTTP, with basic auth from the repository.
#[derive(Debug, Clone)]
pub struct HttpIndexClient {
    client: Client,
}

impl HttpIndexClient {
    /// Wrap an HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_text(&self, repo: &Repository, url: &str, package: &str) -> Result<(Url, String), FetchError> {
        let metadata_err = |source| FetchError::Metadata {
            package: package.to_string(),
            source,
        };
        debug!("GET {url}");
        let response = repo
            .authorize(self.client.get(url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(metadata_err)?;
        let final_url = response.url().clone();
        let body = response.text().await.map_err(metadata_err)?;
        Ok((final_url, body))
    }
}

#[async_trait]
impl IndexClient for HttpIndexClient {
    async fn release_files(
        &self,
        repo: &Repository,
        name: &PackageName,
        version: &Version,
    ) -> Result<Vec<ReleaseFile>, FetchError> {
        if repo.is_legacy() {
            let url = format!("{}/{name}/", repo.url());
            let (page_url, html) = self.get_text(repo, &url, name).await?;
            return Ok(parse_simple_index(&html, &page_url));
        }

        let url = format!("{}/pypi/{name}/{version}/json", repo.url());
        let (_, body) = self.get_text(repo, &url, name).await?;
        let release: JsonRelease =
            serde_json::from_str(&body).map_err(|e| FetchError::InvalidMetadata {
                package: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(release.urls)
    }
}

/// Extract the file anchors of a simple-index page. Relative links are
/// resolved against `base`; a `#algorithm=digest` fragment becomes the
/// file's digest.
pub fn parse_simple_index(html: &str, base: &Url) -> Vec<ReleaseFile> {
    ANCHOR
        .captures_iter(html)
        .filter_map(|caps| {
            let href = caps["href"].replace("&amp;", "&");
            let url = match base.join(&href) {
                Ok(url) => url,
                Err(e) => {
                    debug!("Skipping link {href}: {e}");
                    return None;
                }
            };
            let digests = caps
                .name("fragment")
                .and_then(|f| f.as_str().split_once('='))
                .map(|(algorithm, digest)| (algorithm.to_ascii_lowercase(), digest.to_ascii_lowercase()))
                .into_iter()
                .collect();
            Some(ReleaseFile {
                filename: caps["name"].to_string(),
                url: url.to_string(),
                digests,
            })
        })
        .collect()
}
