//! Artifact downloads with streaming SHA256 verification.
//!
//! Bytes go to `{target}/{filename}.part` and are renamed into place only
//! after the digest check passes.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::FetchError;
use crate::repo::{Repository, RepositoryRegistry};
use crate::types::FileHash;
use crate::verify::PackageReport;

/// A single artifact to fetch.
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    /// Repository whose credentials authorize the request.
    pub repo: &'a Repository,
    /// Artifact URL.
    pub url: &'a str,
    /// Filename to store the artifact under.
    pub filename: &'a str,
    /// Declared hash; only SHA256 is re-checked on the downloaded bytes.
    pub expected_hash: Option<&'a FileHash>,
}

impl DownloadRequest<'_> {
    /// Stream the artifact into `target` and return its final path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Download`] for HTTP failures,
    /// [`FetchError::Io`] for filesystem failures,
    /// [`FetchError::InvalidFilename`] when the filename would escape
    /// `target` and [`FetchError::HashMismatch`] when the SHA256 digest
    /// differs; no file is left behind in that case.
    pub async fn execute(self, client: &Client, target: &Path) -> Result<PathBuf, FetchError> {
        if !is_plain_filename(self.filename) {
            return Err(FetchError::InvalidFilename {
                filename: self.filename.to_string(),
            });
        }
        let dest = target.join(self.filename);
        let part = target.join(format!("{}.part", self.filename));
        let http_err = |source| FetchError::Download {
            url: self.url.to_string(),
            source,
        };
        let io_err = |source| FetchError::Io {
            path: part.clone(),
            source,
        };

        debug!("Downloading {} -> {}", self.url, dest.display());
        let response = self
            .repo
            .authorize(client.get(self.url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_err)?;

        let mut file = File::create(&part).await.map_err(io_err)?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_err)?;
            file.write_all(&chunk).await.map_err(io_err)?;
            hasher.write_all(&chunk).map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        let mismatch = self
            .expected_hash
            .filter(|h| h.is_sha256() && !h.matches_digest(&actual));
        if let Some(expected) = mismatch {
            tokio::fs::remove_file(&part).await.ok();
            return Err(FetchError::HashMismatch {
                filename: self.filename.to_string(),
                expected: expected.clone(),
                actual: format!("sha256:{actual}"),
            });
        }

        tokio::fs::rename(&part, &dest).await.map_err(|source| FetchError::Io {
            path: dest.clone(),
            source,
        })?;
        Ok(dest)
    }
}

fn is_plain_filename(filename: &str) -> bool {
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !filename.contains(['/', '\\'])
}

/// Download the artifact located for a package into `target`.
///
/// # Errors
///
/// Returns [`FetchError::MissingUrl`] when verification located nothing,
/// [`FetchError::UnknownRepository`] when the package's repository is not
/// registered, or any error of [`DownloadRequest::execute`].
pub async fn download_package(
    client: &Client,
    registry: &RepositoryRegistry,
    report: &PackageReport,
    target: &Path,
) -> Result<PathBuf, FetchError> {
    let package = report.package();
    let (candidate, url) = report.located().ok_or_else(|| FetchError::MissingUrl {
        package: package.name().to_string(),
    })?;
    let repo = registry
        .get(package.repository())
        .ok_or_else(|| FetchError::UnknownRepository {
            package: package.name().to_string(),
            repository: package.repository().to_string(),
        })?;

    DownloadRequest {
        repo,
        url,
        filename: &candidate.filename,
        expected_hash: Some(&candidate.hash),
    }
    .execute(client, target)
    .await
}
