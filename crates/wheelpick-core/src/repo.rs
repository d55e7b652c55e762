//! Package repositories and the per-run registry that names them.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use reqwest::{RequestBuilder, Url};
use thiserror::Error;
use tracing::debug;

/// Name of the repository packages without a source entry come from.
pub const DEFAULT_REPOSITORY: &str = "pypi.org";

/// Base URL of [`DEFAULT_REPOSITORY`] unless overridden.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

/// Errors raised while registering repositories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A repository URL is not an absolute `http(s)` URL.
    #[error("Invalid URL '{url}' for repository '{name}'")]
    InvalidUrl {
        /// Repository name.
        name: String,
        /// Offending URL.
        url: String,
    },
}

/// HTTP basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password, if any.
    pub password: Option<String>,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A package index: either a JSON API (`{url}/pypi/{name}/{version}/json`)
/// or a legacy simple index (`{url}/{name}/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    name: String,
    url: String,
    legacy: bool,
    credentials: Option<Credentials>,
}

impl Repository {
    /// Create a JSON API repository without credentials.
    pub fn new(name: impl Into<String>, url: &str) -> Self {
        Self {
            name: name.into(),
            url: url.trim_end_matches('/').to_string(),
            legacy: false,
            credentials: None,
        }
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether this is a legacy simple index.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Stored credentials (from `auth.toml` or the source URL).
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Prefix of the environment variables that override the stored
    /// credentials: the upper-cased name with every other character replaced
    /// by `_` (`pypi.org` reads `PYPI_ORG_USERNAME` / `PYPI_ORG_PASSWORD`).
    pub fn env_prefix(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Credentials to send, with environment variables taking precedence.
    pub fn effective_credentials(&self) -> Option<Credentials> {
        self.effective_credentials_with(|key| std::env::var(key).ok())
    }

    /// [`Self::effective_credentials`] with a custom variable lookup.
    pub fn effective_credentials_with<F>(&self, lookup: F) -> Option<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = self.env_prefix();
        let non_empty = |v: String| (!v.is_empty()).then_some(v);

        let username = lookup(&format!("{prefix}_USERNAME"))
            .and_then(non_empty)
            .or_else(|| self.credentials.as_ref().map(|c| c.username.clone()))?;
        let password = lookup(&format!("{prefix}_PASSWORD"))
            .and_then(non_empty)
            .or_else(|| self.credentials.as_ref().and_then(|c| c.password.clone()));

        Some(Credentials { username, password })
    }

    /// Attach basic auth to a request when credentials are available.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.effective_credentials() {
            Some(c) => request.basic_auth(c.username, c.password),
            None => request,
        }
    }
}

/// Every repository known to one run, by name.
///
/// Always contains [`DEFAULT_REPOSITORY`].
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    repositories: HashMap<String, Repository>,
    default_url: String,
}

impl RepositoryRegistry {
    /// A registry holding only the default repository at `default_url`.
    pub fn new(default_url: &str) -> Self {
        let default = Repository::new(DEFAULT_REPOSITORY, default_url);
        let default_url = default.url.clone();
        Self {
            repositories: HashMap::from([(DEFAULT_REPOSITORY.to_string(), default)]),
            default_url,
        }
    }

    /// The default repository.
    pub fn default_repository(&self) -> &Repository {
        &self.repositories[DEFAULT_REPOSITORY]
    }

    /// Look up a repository by name.
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.get(name)
    }

    /// Number of registered repositories.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Always `false`; the default repository is never removed.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Look up a repository, creating it at the default URL when unknown.
    pub fn get_or_create(&mut self, name: &str) -> &mut Repository {
        let default_url = &self.default_url;
        self.repositories
            .entry(name.to_string())
            .or_insert_with(|| Repository::new(name, default_url))
    }

    /// Store credentials for a repository, creating it if needed.
    pub fn set_credentials(&mut self, name: &str, credentials: Credentials) {
        self.get_or_create(name).credentials = Some(credentials);
    }

    /// Register a lockfile source entry.
    ///
    /// The repository keeps its stored credentials; when it has none, a
    /// `user:password@` part of the URL supplies them, percent-decoded. The
    /// URL itself is stored without that part.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidUrl`] unless `url` is an absolute
    /// `http` or `https` URL.
    pub fn register_source(
        &mut self,
        name: &str,
        url: &str,
        legacy: bool,
    ) -> Result<&Repository, RepositoryError> {
        let invalid = || RepositoryError::InvalidUrl {
            name: name.to_string(),
            url: url.to_string(),
        };
        let mut parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }

        let embedded = (!parsed.username().is_empty()).then(|| {
            Credentials::new(url_decode(parsed.username()), parsed.password().map(url_decode))
        });
        if embedded.is_some() {
            parsed.set_username("").map_err(|()| invalid())?;
            parsed.set_password(None).map_err(|()| invalid())?;
        }

        let repo = self.get_or_create(name);
        repo.url = parsed.as_str().trim_end_matches('/').to_string();
        repo.legacy = legacy;
        if repo.credentials.is_none() {
            repo.credentials = embedded;
        }
        debug!("Repository {} -> {} (legacy: {})", repo.name, repo.url, repo.legacy);
        Ok(repo)
    }
}

fn url_decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_URL)
    }
}
