//! IO modules - side effects (network, filesystem)

pub mod download;
pub mod index;

use std::path::PathBuf;

use thiserror::Error;

use crate::package::Diagnostic;
use crate::types::FileHash;

/// Errors raised while looking up metadata or downloading artifacts.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The package index request failed.
    #[error("Can not download metadata for package {package}: {source}")]
    Metadata {
        /// Package being looked up.
        package: String,
        /// Underlying error.
        source: reqwest::Error,
    },

    /// The package index answered with something unreadable.
    #[error("Invalid metadata for package {package}: {reason}")]
    InvalidMetadata {
        /// Package being looked up.
        package: String,
        /// What was wrong.
        reason: String,
    },

    /// The artifact request failed.
    #[error("Can not download package {url}: {source}")]
    Download {
        /// Artifact URL.
        url: String,
        /// Underlying error.
        source: reqwest::Error,
    },

    /// Writing the artifact failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The index or the downloaded bytes disagree with the declared hash.
    #[error("Unmatched package \"{filename}\" hash {expected} != {actual}.")]
    HashMismatch {
        /// Affected file.
        filename: String,
        /// Hash declared in the lockfile.
        expected: FileHash,
        /// `algorithm:digest` actually seen.
        actual: String,
    },

    /// An artifact filename that is not a single path component.
    #[error("Refusing to store \"{filename}\" outside the target directory.")]
    InvalidFilename {
        /// Offending filename.
        filename: String,
    },

    /// No candidate of the package could be located on the index.
    #[error(
        "The source lock file does not contain a correct reference for package {package} with required python version and CPU architecture."
    )]
    MissingUrl {
        /// Package name.
        package: String,
    },

    /// A package names a repository the registry does not know.
    #[error("Could not find repository '{repository}' for package {package}.")]
    UnknownRepository {
        /// Package name.
        package: String,
        /// Repository name.
        repository: String,
    },
}

impl FetchError {
    /// The diagnostic recorded when the run continues past this error.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::HashMismatch {
                filename,
                expected,
                actual,
            } => Diagnostic::HashMismatch {
                filename: filename.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            other => Diagnostic::Fetch(other.to_string()),
        }
    }
}

/// HTTP client shared by index lookups and downloads.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(crate::USER_AGENT).build()
}
