//! Lockfile package records and their resolution.
//!
//! A [`PackageRecord`] is what a lockfile reader produces for one locked
//! package. [`ResolvedPackage::resolve`] runs the runtime constraint check and
//! the candidate selector on it; the result is immutable and is later paired
//! with a [`Verification`](crate::verify::Verification) for reporting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraint;
use crate::resolver::{self, CandidateFile};
pub use crate::types::{FileHash, PackageName, PlatformProfile, Version};

/// One file listed for a package in the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Distribution filename (`cffi-1.15.1-cp311-cp311-win_amd64.whl`).
    pub filename: String,
    /// Declared hash, `algorithm:hexdigest`.
    pub hash: FileHash,
}

impl FileRecord {
    /// Create a file record.
    pub fn new(filename: impl Into<String>, hash: FileHash) -> Self {
        Self {
            filename: filename.into(),
            hash,
        }
    }
}

/// A locked package as read from a lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: PackageName,
    /// Pinned version.
    pub version: Version,
    /// Runtime version constraint, e.g. `>=3.7,<4.0`.
    pub runtime_constraint: Option<String>,
    /// Name of the repository the package is fetched from.
    pub repository: String,
    /// Every file the lockfile lists for this version.
    pub files: Vec<FileRecord>,
}

/// A per-package anomaly, rendered under the package's report line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The runtime version does not satisfy the package's constraint.
    #[error("The python version is not supported by this package.")]
    UnsupportedRuntime,

    /// No listed file is usable on the requested platform.
    #[error("No file matches the requested python version and platform.")]
    NoCompatibleCandidate,

    /// Only the source archive is usable although binaries exist.
    #[error("This package will require a build.")]
    RequiresLocalBuild,

    /// The index reports a different digest than the lockfile declares.
    #[error("Unmatched hash for \"{filename}\": {expected} != {actual}")]
    HashMismatch {
        /// Affected file.
        filename: String,
        /// Hash declared in the lockfile.
        expected: FileHash,
        /// `algorithm:digest` reported by the index or computed on download.
        actual: String,
    },

    /// A metadata or download failure recorded instead of stopping the run.
    #[error("{0}")]
    Fetch(String),
}

/// How a resolved package will be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// The best candidate is a wheel.
    Binary,
    /// The best candidate is a source archive.
    SourceBuild,
    /// No usable candidate.
    Unresolved,
}

/// Resolution result for one package: ranked candidates (best first) and
/// the diagnostics produced while ranking them.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    name: PackageName,
    version: Version,
    runtime_constraint: Option<String>,
    repository: String,
    candidates: Vec<CandidateFile>,
    requires_local_build: bool,
    saw_incompatible_binary: bool,
    diagnostics: Vec<Diagnostic>,
}

impl ResolvedPackage {
    /// Resolve a record against a profile. Never fails: every anomaly becomes
    /// a [`Diagnostic`].
    pub fn resolve(record: &PackageRecord, profile: &PlatformProfile) -> Self {
        let mut diagnostics = Vec::new();

        let constraint = record
            .runtime_constraint
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "*");
        if !constraint::is_satisfied_by(constraint, profile.runtime_version()) {
            diagnostics.push(Diagnostic::UnsupportedRuntime);
        }

        let selection = resolver::select(&record.files, &record.name, profile);
        if selection.candidates.is_empty() {
            diagnostics.push(Diagnostic::NoCompatibleCandidate);
        }
        if selection.requires_local_build {
            diagnostics.push(Diagnostic::RequiresLocalBuild);
        }

        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            runtime_constraint: constraint.map(str::to_string),
            repository: record.repository.clone(),
            candidates: selection.candidates,
            requires_local_build: selection.requires_local_build,
            saw_incompatible_binary: selection.saw_incompatible_binary,
            diagnostics,
        }
    }

    /// Package name.
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// Pinned version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Runtime constraint, `None` when absent or `*`.
    pub fn runtime_constraint(&self) -> Option<&str> {
        self.runtime_constraint.as_deref()
    }

    /// Repository name used for metadata lookup and download.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Candidates, best first; a source archive, if any, is always last.
    pub fn candidates(&self) -> &[CandidateFile] {
        &self.candidates
    }

    /// The preferred candidate.
    pub fn best(&self) -> Option<&CandidateFile> {
        self.candidates.first()
    }

    /// Whether only the source archive is usable although binaries exist.
    pub fn requires_local_build(&self) -> bool {
        self.requires_local_build
    }

    /// Whether a Linux binary was rejected for its platform tag.
    pub fn saw_incompatible_binary(&self) -> bool {
        self.saw_incompatible_binary
    }

    /// Resolution diagnostics, in the order they were raised.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Install status implied by the best candidate.
    pub fn status(&self) -> ResolutionStatus {
        match self.best() {
            Some(c) if c.is_wheel() => ResolutionStatus::Binary,
            Some(_) => ResolutionStatus::SourceBuild,
            None => ResolutionStatus::Unresolved,
        }
    }
}
