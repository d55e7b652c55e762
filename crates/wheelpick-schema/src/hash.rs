//! Declared content hashes in `algorithm:hexdigest` notation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced when parsing an `algorithm:hexdigest` hash string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The string has no `:` separating algorithm and digest.
    #[error("Invalid file hash '{0}': expected 'algorithm:hexdigest'")]
    MissingSeparator(String),

    /// Algorithm or digest is empty.
    #[error("Invalid file hash '{0}': empty algorithm or digest")]
    Empty(String),

    /// The digest contains characters other than ASCII hex digits.
    #[error("Invalid file hash '{0}': digest is not hexadecimal")]
    NotHex(String),
}

/// A declared content hash in lockfile notation, e.g. `sha256:7f3c...`.
///
/// The algorithm name is stored lowercase (it is the key the package index
/// uses for its digest map), the digest as lowercase hex.
///
/// # Example
///
/// ```
/// use wheelpick_schema::FileHash;
///
/// let hash = FileHash::parse("sha256:ABCD").unwrap();
/// assert_eq!(hash.algorithm(), "sha256");
/// assert!(hash.matches_digest("abcd"));
/// assert_eq!(hash.to_string(), "sha256:abcd");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHash {
    algorithm: String,
    digest: String,
}

impl FileHash {
    /// Parse `algorithm:hexdigest`, splitting at the first `:`.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the separator is missing, either half is
    /// empty, or the digest is not hexadecimal.
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let (algorithm, digest) = s
            .split_once(':')
            .ok_or_else(|| HashError::MissingSeparator(s.to_string()))?;
        let (algorithm, digest) = (algorithm.trim(), digest.trim());

        if algorithm.is_empty() || digest.is_empty() {
            return Err(HashError::Empty(s.to_string()));
        }
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::NotHex(s.to_string()));
        }

        Ok(Self {
            algorithm: algorithm.to_ascii_lowercase(),
            digest: digest.to_ascii_lowercase(),
        })
    }

    /// Lowercase algorithm name (`sha256`, `md5`, `blake2b_256`, ...).
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Lowercase hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Whether the declared algorithm is SHA-256, which downloads re-verify
    /// while streaming.
    pub fn is_sha256(&self) -> bool {
        self.algorithm == "sha256"
    }

    /// Compare against a hex digest reported for the same algorithm.
    pub fn matches_digest(&self, digest: &str) -> bool {
        self.digest.eq_ignore_ascii_case(digest.trim())
    }
}

impl std::fmt::Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl std::str::FromStr for FileHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FileHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FileHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
