//! Lockfile readers.
//!
//! Supported formats form a closed set ([`LockfileFormat`]) tried in a fixed
//! priority order. Every format yields the same [`PackageRecord`]s; only
//! Poetry contributes repository credentials (from its `auth.toml`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::package::{FileRecord, PackageRecord};
use crate::paths::{filename_from_url, poetry_auth_path};
use crate::repo::{Credentials, RepositoryError, RepositoryRegistry};
use crate::types::{FileHash, PackageName, Version};

/// Errors raised while locating or reading a lockfile.
#[derive(Error, Debug)]
pub enum LockfileError {
    /// The given lockfile path does not exist.
    #[error("The source file \"{0}\" does not exist.")]
    NotFound(PathBuf),

    /// The filename matches no supported format.
    #[error("The source file {0} is not supported.")]
    Unsupported(PathBuf),

    /// No supported lockfile was found in the searched directory.
    #[error("No supported source file (poetry.lock, pdm.lock) found in {0}.")]
    NotDiscovered(PathBuf),

    /// Reading a file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A file is not valid TOML of the expected shape.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A package source entry names an unusable repository URL.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A supported lockfile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockfileFormat {
    /// `poetry.lock`
    Poetry,
    /// `pdm.lock`
    Pdm,
}

impl LockfileFormat {
    /// Formats in the order they are tried.
    pub const PRIORITY: [Self; 2] = [Self::Poetry, Self::Pdm];

    /// Filename suffix identifying the format.
    pub fn filename(self) -> &'static str {
        match self {
            Self::Poetry => "poetry.lock",
            Self::Pdm => "pdm.lock",
        }
    }

    /// Group every package belongs to unless the lockfile says otherwise.
    pub fn default_group(self) -> &'static str {
        match self {
            Self::Poetry => "main",
            Self::Pdm => "default",
        }
    }

    /// Format of a lockfile path, judged by its filename suffix.
    ///
    /// # Errors
    ///
    /// Returns [`LockfileError::Unsupported`] when no format matches.
    pub fn detect(path: &Path) -> Result<Self, LockfileError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        Self::PRIORITY
            .into_iter()
            .find(|format| name.ends_with(format.filename()))
            .ok_or_else(|| LockfileError::Unsupported(path.to_path_buf()))
    }
}

impl std::fmt::Display for LockfileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.filename())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawLockfile {
    #[serde(default)]
    package: Vec<RawPackage>,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    files: HashMap<String, Vec<RawFile>>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,
    #[serde(rename = "python-versions", alias = "requires_python")]
    python_versions: Option<String>,
    category: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    files: Option<Vec<RawFile>>,
    source: Option<RawSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFile {
    file: Option<String>,
    url: Option<String>,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    reference: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuth {
    #[serde(rename = "http-basic", default)]
    http_basic: BTreeMap<String, RawBasicAuth>,
}

#[derive(Debug, Deserialize)]
struct RawBasicAuth {
    username: String,
    password: Option<String>,
}

/// A lockfile on disk together with its format.
#[derive(Debug, Clone)]
pub struct LockfileSource {
    path: PathBuf,
    format: LockfileFormat,
}

impl LockfileSource {
    /// Wrap a path whose format is already known. Nothing is read.
    pub fn new(path: impl Into<PathBuf>, format: LockfileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Open an explicitly named lockfile.
    ///
    /// # Errors
    ///
    /// Returns [`LockfileError::NotFound`] if the file does not exist and
    /// [`LockfileError::Unsupported`] if its name matches no format.
    pub fn open(path: &Path) -> Result<Self, LockfileError> {
        if !path.exists() {
            return Err(LockfileError::NotFound(path.to_path_buf()));
        }
        Ok(Self::new(path, LockfileFormat::detect(path)?))
    }

    /// Find a lockfile in `dir`: the first format in priority order that
    /// some file (in sorted name order) ends with.
    ///
    /// # Errors
    ///
    /// Returns [`LockfileError::Io`] if the directory cannot be listed and
    /// [`LockfileError::NotDiscovered`] if nothing matches.
    pub async fn discover(dir: &Path) -> Result<Self, LockfileError> {
        let io_err = |source| LockfileError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(dir).await.map_err(io_err)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if entry.file_type().await.is_ok_and(|t| t.is_file()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        for format in LockfileFormat::PRIORITY {
            if let Some(name) = names.iter().find(|n| n.ends_with(format.filename())) {
                debug!("Discovered {format} lockfile {name}");
                return Ok(Self::new(dir.join(name), format));
            }
        }
        Err(LockfileError::NotDiscovered(dir.to_path_buf()))
    }

    /// Lockfile path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lockfile format.
    pub fn format(&self) -> LockfileFormat {
        self.format
    }

    /// Register the credentials this format's tool stores.
    ///
    /// Poetry reads `auth.toml` from its config directory; PDM stores none
    /// that are readable here.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file exists but cannot be read or
    /// parsed.
    pub async fn load_credentials(&self, registry: &mut RepositoryRegistry) -> Result<usize, LockfileError> {
        match self.format {
            LockfileFormat::Poetry => match poetry_auth_path() {
                Some(path) => load_poetry_credentials(&path, registry).await,
                None => Ok(0),
            },
            LockfileFormat::Pdm => Ok(0),
        }
    }

    /// Read the packages belonging to the default group or one of `groups`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lockfile cannot be read or parsed, or if a
    /// package source has an invalid URL.
    pub async fn packages(
        &self,
        groups: &[String],
        registry: &mut RepositoryRegistry,
    ) -> Result<Vec<PackageRecord>, LockfileError> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|source| LockfileError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.parse_packages(&content, groups, registry)
    }

    /// [`Self::packages`] on already loaded content.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not a lockfile of this format or a
    /// package source has an invalid URL.
    pub fn parse_packages(
        &self,
        content: &str,
        groups: &[String],
        registry: &mut RepositoryRegistry,
    ) -> Result<Vec<PackageRecord>, LockfileError> {
        let mut data: RawLockfile = toml::from_str(content).map_err(|source| LockfileError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let default_group = self.format.default_group();
        let wanted = |group: &str| group == default_group || groups.iter().any(|g| g == group);

        let mut records = Vec::new();
        for raw in std::mem::take(&mut data.package) {
            let in_group = match (&raw.category, raw.groups.is_empty()) {
                (Some(category), true) => wanted(category),
                (None, true) => true,
                (category, false) => {
                    raw.groups.iter().any(|g| wanted(g)) || category.as_deref().is_some_and(wanted)
                }
            };
            if !in_group {
                debug!("Skipping {} (not in requested groups)", raw.name);
                continue;
            }

            let repository = match &raw.source {
                Some(source) => register_source(source, &raw.name, registry)?,
                None => registry.default_repository().name().to_string(),
            };

            let raw_files = raw.files.clone().unwrap_or_else(|| {
                let versioned = format!("{} {}", raw.name, raw.version);
                data.metadata
                    .files
                    .get(&raw.name)
                    .or_else(|| data.metadata.files.get(&versioned))
                    .cloned()
                    .unwrap_or_default()
            });

            records.push(PackageRecord {
                name: PackageName::new(&raw.name),
                version: Version::new(&raw.version),
                runtime_constraint: raw.python_versions,
                repository,
                files: file_records(&raw.name, raw_files),
            });
        }
        Ok(records)
    }
}

fn register_source(
    source: &RawSource,
    package: &str,
    registry: &mut RepositoryRegistry,
) -> Result<String, RepositoryError> {
    let legacy = match source.kind.as_str() {
        "legacy" => true,
        "" | "pypi" => false,
        other => {
            debug!("{package}: '{other}' source, using the default repository");
            return Ok(registry.default_repository().name().to_string());
        }
    };
    if source.reference.is_empty() || source.url.is_empty() {
        return Ok(registry.default_repository().name().to_string());
    }
    let repo = registry.register_source(&source.reference, &source.url, legacy)?;
    Ok(repo.name().to_string())
}

fn file_records(package: &str, raw_files: Vec<RawFile>) -> Vec<FileRecord> {
    raw_files
        .into_iter()
        .filter_map(|raw| {
            let filename = match (raw.file, raw.url) {
                (Some(file), _) => file,
                (None, Some(url)) => filename_from_url(&url).to_string(),
                (None, None) => return None,
            };
            match FileHash::parse(&raw.hash) {
                Ok(hash) => Some(FileRecord::new(filename, hash)),
                Err(e) => {
                    warn!("{package}: ignoring {filename}: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Register the `[http-basic.<name>]` entries of a Poetry `auth.toml`.
/// A missing file registers nothing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_poetry_credentials(
    path: &Path,
    registry: &mut RepositoryRegistry,
) -> Result<usize, LockfileError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No Poetry credentials at {}", path.display());
            return Ok(0);
        }
        Err(source) => {
            return Err(LockfileError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let auth: RawAuth = toml::from_str(&content).map_err(|source| LockfileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let count = auth.http_basic.len();
    for (name, basic) in auth.http_basic {
        debug!("Loaded credentials for repository {name}");
        registry.set_credentials(&name, Credentials::new(basic.username, basic.password));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HASH_A: &str = "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn poetry() -> LockfileSource {
        LockfileSource::new("poetry.lock", LockfileFormat::Poetry)
    }

    fn pdm() -> LockfileSource {
        LockfileSource::new("pdm.lock", LockfileFormat::Pdm)
    }

    #[test]
    fn detect_by_suffix() {
        assert_eq!(LockfileFormat::detect(Path::new("/x/poetry.lock")).unwrap(), LockfileFormat::Poetry);
        assert_eq!(LockfileFormat::detect(Path::new("app.pdm.lock")).unwrap(), LockfileFormat::Pdm);
        assert!(matches!(
            LockfileFormat::detect(Path::new("Pipfile.lock")),
            Err(LockfileError::Unsupported(_))
        ));
    }

    #[test]
    fn poetry_groups_and_inline_files() {
        let content = format!(
            r#"
[[package]]
name = "cffi"
version = "1.15.1"
python-versions = "*"
category = "main"
files = [
    {{file = "cffi-1.15.1.tar.gz", hash = "{HASH_A}"}},
]

[[package]]
name = "pytest"
version = "7.4.0"
python-versions = ">=3.7"
category = "dev"
files = [
    {{file = "pytest-7.4.0-py3-none-any.whl", hash = "{HASH_B}"}},
]

[[package]]
name = "six"
version = "1.16.0"
python-versions = ">=2.7"
groups = ["main", "docs"]
files = []
"#
        );
        let mut registry = RepositoryRegistry::default();
        let main = poetry().parse_packages(&content, &[], &mut registry).unwrap();
        let names: Vec<&str> = main.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["cffi", "six"]);
        assert_eq!(main[0].files, [FileRecord::new("cffi-1.15.1.tar.gz", FileHash::parse(HASH_A).unwrap())]);
        assert_eq!(main[0].repository, "pypi.org");
        assert_eq!(main[0].runtime_constraint.as_deref(), Some("*"));

        let all = poetry()
            .parse_packages(&content, &["dev".to_string()], &mut registry)
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].runtime_constraint.as_deref(), Some(">=3.7"));
    }

    #[test]
    fn poetry_metadata_files_table() {
        let content = format!(
            r#"
[[package]]
name = "six"
version = "1.16.0"
python-versions = ">=2.7"

[metadata]
lock-version = "1.1"

[metadata.files]
six = [
    {{file = "six-1.16.0-py2.py3-none-any.whl", hash = "{HASH_A}"}},
    {{file = "six-1.16.0.tar.gz", hash = "not-a-hash"}},
]
"#
        );
        let mut registry = RepositoryRegistry::default();
        let records = poetry().parse_packages(&content, &[], &mut registry).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].files.len(), 1);
        assert_eq!(records[0].files[0].filename, "six-1.16.0-py2.py3-none-any.whl");
    }

    #[test]
    fn sources_register_repositories() {
        let content = format!(
            r#"
[[package]]
name = "internal-lib"
version = "2.0.0"
python-versions = ">=3.8"
files = [{{file = "internal_lib-2.0.0.tar.gz", hash = "{HASH_A}"}}]

[package.source]
type = "legacy"
url = "https://user:pw@pkgs.example/simple/"
reference = "private"

[[package]]
name = "vendored"
version = "0.1.0"
python-versions = "*"
files = []

[package.source]
type = "directory"
url = "../vendored"
reference = ""
"#
        );
        let mut registry = RepositoryRegistry::default();
        let records = poetry().parse_packages(&content, &[], &mut registry).unwrap();
        assert_eq!(records[0].repository, "private");
        assert_eq!(records[1].repository, "pypi.org");

        let private = registry.get("private").unwrap();
        assert!(private.is_legacy());
        assert_eq!(private.url(), "https://pkgs.example/simple");
        assert_eq!(private.credentials().unwrap().username, "user");
    }

    #[test]
    fn invalid_source_url_is_an_error() {
        let content = r#"
[[package]]
name = "x"
version = "1.0"

[package.source]
type = "legacy"
url = "pkgs.example/simple"
reference = "broken"
"#;
        let mut registry = RepositoryRegistry::default();
        assert!(matches!(
            poetry().parse_packages(content, &[], &mut registry),
            Err(LockfileError::Repository(_))
        ));
    }

    #[test]
    fn pdm_records() {
        let content = format!(
            r#"
[metadata]
groups = ["default", "test"]
lock_version = "4.4"

[[package]]
name = "requests"
version = "2.31.0"
requires_python = ">=3.7"
groups = ["default"]
files = [
    {{url = "https://files.example/requests-2.31.0-py3-none-any.whl", hash = "{HASH_A}"}},
    {{file = "requests-2.31.0.tar.gz", hash = "{HASH_B}"}},
]

[[package]]
name = "pytest"
version = "7.4.0"
requires_python = ">=3.7"
groups = ["test"]
files = []
"#
        );
        let mut registry = RepositoryRegistry::default();
        let records = pdm().parse_packages(&content, &[], &mut registry).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].runtime_constraint.as_deref(), Some(">=3.7"));
        let files: Vec<&str> = records[0].files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(files, ["requests-2.31.0-py3-none-any.whl", "requests-2.31.0.tar.gz"]);
    }

    #[test]
    fn malformed_lockfile_is_a_parse_error() {
        let mut registry = RepositoryRegistry::default();
        assert!(matches!(
            poetry().parse_packages("[[package]]\nname = 1", &[], &mut registry),
            Err(LockfileError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn discover_prefers_poetry() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pdm.lock"), "").unwrap();
        std::fs::write(dir.path().join("poetry.lock"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        let source = LockfileSource::discover(dir.path()).await.unwrap();
        assert_eq!(source.format(), LockfileFormat::Poetry);
        assert_eq!(source.path(), dir.path().join("poetry.lock"));

        let empty = TempDir::new().unwrap();
        assert!(matches!(
            LockfileSource::discover(empty.path()).await,
            Err(LockfileError::NotDiscovered(_))
        ));
    }

    #[test]
    fn open_checks_existence_and_format() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            LockfileSource::open(&dir.path().join("poetry.lock")),
            Err(LockfileError::NotFound(_))
        ));
        let other = dir.path().join("requirements.txt");
        std::fs::write(&other, "").unwrap();
        assert!(matches!(LockfileSource::open(&other), Err(LockfileError::Unsupported(_))));
    }

    #[tokio::test]
    async fn poetry_auth_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.toml");
        std::fs::write(
            &path,
            r#"
[http-basic.private]
username = "alice"
password = "s3cret"

[http-basic.tokens]
username = "__token__"
"#,
        )
        .unwrap();

        let mut registry = RepositoryRegistry::default();
        assert_eq!(load_poetry_credentials(&path, &mut registry).await.unwrap(), 2);
        let private = registry.get("private").unwrap();
        assert_eq!(private.credentials(), Some(&Credentials::new("alice", Some("s3cret".into()))));
        assert_eq!(private.url(), "https://pypi.org");
        assert_eq!(registry.get("tokens").unwrap().credentials().unwrap().password, None);

        let missing = dir.path().join("missing.toml");
        assert_eq!(load_poetry_credentials(&missing, &mut registry).await.unwrap(), 0);
    }
}
