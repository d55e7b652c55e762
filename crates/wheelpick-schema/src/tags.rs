//! Distribution filename grammar.
//!
//! Wheels follow `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`,
//! where every field except the optional build tag is mandatory and the
//! python and platform fields may hold several `.`-joined tags (one file
//! published for several targets, e.g. `manylinux_2_17_x86_64.manylinux2014_x86_64`).
//! Source archives are only recognized in their `{name}-{version}.tar.gz` form
//! with a purely numeric dotted version.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use regex::Regex;

static SOURCE_ARCHIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[\w.-]+)-(?P<version>[\d.]+)\.tar\.gz$")
        .expect("source archive pattern is valid")
});

/// Error returned for filenames that are neither a wheel nor a source archive.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    /// The filename matches neither distribution grammar.
    #[error("'{0}' is not a wheel or source archive filename")]
    Malformed(String),
}

/// The tags carried by a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelFilename {
    /// Distribution name, as spelled in the filename (`_` for separators).
    pub name: String,
    /// Distribution version.
    pub version: String,
    /// Optional build tag; always starts with a digit.
    pub build_tag: Option<String>,
    /// Language (python) tag, e.g. `cp39`, `py3`, `py2.py3`.
    pub language_tag: String,
    /// ABI tag, e.g. `cp39`, `abi3`, `none`.
    pub abi_tag: String,
    /// Platform tag, possibly compound, e.g. `any`, `win_amd64`,
    /// `manylinux_2_17_x86_64.manylinux2014_x86_64`.
    pub platform_tag: String,
}

impl WheelFilename {
    /// Parse a wheel filename.
    ///
    /// # Errors
    ///
    /// Returns [`FilenameError::Malformed`] unless the stem splits into five
    /// or six non-empty `-` separated fields with a version (and build tag,
    /// when present) starting with a digit. Path separators are never part
    /// of a filename.
    pub fn parse(filename: &str) -> Result<Self, FilenameError> {
        let malformed = || FilenameError::Malformed(filename.to_string());
        if filename.contains(['/', '\\']) {
            return Err(malformed());
        }
        let stem = filename.strip_suffix(".whl").ok_or_else(malformed)?;

        let fields: Vec<&str> = stem.split('-').collect();
        if fields.iter().any(|f| f.is_empty()) {
            return Err(malformed());
        }

        let (name, version, build_tag, language_tag, abi_tag, platform_tag) = match fields[..] {
            [name, version, language, abi, platform] => {
                (name, version, None, language, abi, platform)
            }
            [name, version, build, language, abi, platform] => {
                if !starts_with_digit(build) {
                    return Err(malformed());
                }
                (name, version, Some(build), language, abi, platform)
            }
            _ => return Err(malformed()),
        };

        if !starts_with_digit(version) {
            return Err(malformed());
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            build_tag: build_tag.map(str::to_string),
            language_tag: language_tag.to_string(),
            abi_tag: abi_tag.to_string(),
            platform_tag: platform_tag.to_string(),
        })
    }

    /// Individual tags of a compound platform tag.
    pub fn platform_tags(&self) -> impl Iterator<Item = &str> {
        self.platform_tag.split('.')
    }

    /// Individual tags of a compound language tag.
    pub fn language_tags(&self) -> impl Iterator<Item = &str> {
        self.language_tag.split('.')
    }
}

/// A `{name}-{version}.tar.gz` source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDistFilename {
    /// Distribution name.
    pub name: String,
    /// Dotted numeric version.
    pub version: String,
}

impl SourceDistFilename {
    /// Parse a source archive filename.
    ///
    /// # Errors
    ///
    /// Returns [`FilenameError::Malformed`] for anything but
    /// `{name}-{digits-and-dots}.tar.gz`.
    pub fn parse(filename: &str) -> Result<Self, FilenameError> {
        let caps = SOURCE_ARCHIVE
            .captures(filename)
            .ok_or_else(|| FilenameError::Malformed(filename.to_string()))?;
        Ok(Self {
            name: caps["name"].to_string(),
            version: caps["version"].to_string(),
        })
    }
}

/// A parsed distribution filename.
///
/// # Example
///
/// ```
/// use wheelpick_schema::DistFilename;
///
/// let wheel = DistFilename::parse("cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl").unwrap();
/// assert!(wheel.is_wheel());
///
/// let sdist = DistFilename::parse("cffi-1.15.1.tar.gz").unwrap();
/// assert!(!sdist.is_wheel());
///
/// assert!(DistFilename::parse("cffi-1.15.1.zip").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistFilename {
    /// A prebuilt, tagged binary distribution.
    Wheel(WheelFilename),
    /// A source archive that needs a local build.
    Source(SourceDistFilename),
}

impl DistFilename {
    /// Parse a filename as a wheel first, then as a source archive.
    ///
    /// # Errors
    ///
    /// Returns [`FilenameError::Malformed`] when neither grammar matches.
    pub fn parse(filename: &str) -> Result<Self, FilenameError> {
        if let Ok(wheel) = WheelFilename::parse(filename) {
            return Ok(Self::Wheel(wheel));
        }
        SourceDistFilename::parse(filename).map(Self::Source)
    }

    /// Whether this is a wheel.
    pub fn is_wheel(&self) -> bool {
        matches!(self, Self::Wheel(_))
    }

    /// Distribution name as spelled in the filename.
    pub fn name(&self) -> &str {
        match self {
            Self::Wheel(w) => &w.name,
            Self::Source(s) => &s.name,
        }
    }

    /// Distribution version as spelled in the filename.
    pub fn version(&self) -> &str {
        match self {
            Self::Wheel(w) => &w.version,
            Self::Source(s) => &s.version,
        }
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}
