//! Metadata verification, the second phase of a package's lifecycle.
//!
//! Resolution ([`ResolvedPackage`]) never changes once built. Matching its
//! candidates against the files the index publishes yields a separate
//! [`Verification`]; the two are combined into a [`PackageReport`] for
//! downloading and display.

use std::path::Path;

use tracing::debug;

use crate::io::FetchError;
use crate::io::index::{IndexClient, ReleaseFile};
use crate::package::{Diagnostic, ResolutionStatus, ResolvedPackage};
use crate::repo::RepositoryRegistry;
use crate::resolver::CandidateFile;

/// Caller policy for verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Record hash mismatches as diagnostics instead of failing.
    pub ignore_hash: bool,
    /// Only consider source archives.
    pub no_binary: bool,
}

/// The candidate chosen for download and where to get it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedArtifact {
    /// Position in [`ResolvedPackage::candidates`].
    pub index: usize,
    /// Download URL reported by the index.
    pub url: String,
}

/// Outcome of matching a package against its index metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    located: Option<LocatedArtifact>,
    diagnostics: Vec<Diagnostic>,
    fatal: bool,
}

impl Verification {
    /// A verification that failed outright.
    pub fn failed(error: &FetchError) -> Self {
        let mut verification = Self::default();
        verification.absorb(error);
        verification
    }

    /// The located artifact, if any.
    pub fn located(&self) -> Option<&LocatedArtifact> {
        self.located.as_ref()
    }

    /// Diagnostics raised during verification and download.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether a failure was recorded for this package.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Record an error as a warning without failing the package.
    pub fn note(&mut self, error: &FetchError) {
        self.diagnostics.push(error.to_diagnostic());
    }

    /// Record an error the run continues past. Marks the package fatal.
    pub fn absorb(&mut self, error: &FetchError) {
        self.diagnostics.push(error.to_diagnostic());
        self.fatal = true;
    }
}

/// Match the index's release files against a package's candidates.
///
/// A candidate gets a URL when the index lists its filename with the same
/// digest for the declared algorithm. The located artifact is the first
/// candidate, in rank order, that got one. With `no_binary`, wheels on the
/// index are ignored.
///
/// # Errors
///
/// Returns [`FetchError::HashMismatch`] for a digest mismatch unless
/// `ignore_hash` is set. Then the mismatch is kept as a diagnostic and the
/// candidate gets no URL, so the next matching candidate is located.
pub fn match_release_files(
    package: &ResolvedPackage,
    files: &[ReleaseFile],
    options: VerifyOptions,
) -> Result<Verification, FetchError> {
    let candidates = package.candidates();
    let mut urls: Vec<Option<&str>> = vec![None; candidates.len()];
    let mut diagnostics = Vec::new();

    for file in files {
        if options.no_binary && is_wheel_filename(&file.filename) {
            continue;
        }
        let Some(index) = candidates.iter().position(|c| c.filename == file.filename) else {
            continue;
        };
        let candidate = &candidates[index];
        let algorithm = candidate.hash.algorithm();
        match file.digests.get(algorithm) {
            Some(digest) if candidate.hash.matches_digest(digest) => {}
            reported => {
                let error = FetchError::HashMismatch {
                    filename: candidate.filename.clone(),
                    expected: candidate.hash.clone(),
                    actual: format!("{algorithm}:{}", reported.map_or("<none>", String::as_str)),
                };
                if !options.ignore_hash {
                    return Err(error);
                }
                diagnostics.push(error.to_diagnostic());
                continue;
            }
        }
        urls[index] = Some(&file.url);
    }

    let located = urls
        .into_iter()
        .enumerate()
        .find_map(|(index, url)| url.map(|url| LocatedArtifact {
            index,
            url: url.to_string(),
        }));
    if let Some(located) = &located {
        debug!("{}: located {}", package.name(), candidates[located.index].filename);
    }

    Ok(Verification {
        located,
        diagnostics,
        fatal: false,
    })
}

/// Look up a package on its repository and match the result.
///
/// Packages without candidates are not looked up.
///
/// # Errors
///
/// Returns [`FetchError::UnknownRepository`] for an unregistered repository,
/// any error of the index client, or a hash mismatch per
/// [`match_release_files`].
pub async fn verify(
    index: &dyn IndexClient,
    registry: &RepositoryRegistry,
    package: &ResolvedPackage,
    options: VerifyOptions,
) -> Result<Verification, FetchError> {
    if package.candidates().is_empty() {
        return Ok(Verification::default());
    }
    let repo = registry
        .get(package.repository())
        .ok_or_else(|| FetchError::UnknownRepository {
            package: package.name().to_string(),
            repository: package.repository().to_string(),
        })?;
    let files = index
        .release_files(repo, package.name(), package.version())
        .await?;
    match_release_files(package, &files, options)
}

fn is_wheel_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("whl"))
}

/// A resolved package together with its verification.
#[derive(Debug, Clone)]
pub struct PackageReport {
    package: ResolvedPackage,
    verification: Verification,
}

impl PackageReport {
    /// Pair a resolution with its verification.
    pub fn new(package: ResolvedPackage, verification: Verification) -> Self {
        Self {
            package,
            verification,
        }
    }

    /// The resolution result.
    pub fn package(&self) -> &ResolvedPackage {
        &self.package
    }

    /// The verification result.
    pub fn verification(&self) -> &Verification {
        &self.verification
    }

    /// Mutable verification, for recording failures after the fact.
    pub fn verification_mut(&mut self) -> &mut Verification {
        &mut self.verification
    }

    /// The located candidate and its URL.
    pub fn located(&self) -> Option<(&CandidateFile, &str)> {
        let located = self.verification.located()?;
        let candidate = self.package.candidates().get(located.index)?;
        Some((candidate, located.url.as_str()))
    }

    /// Filename of the located candidate, empty when nothing was located.
    pub fn filename(&self) -> &str {
        self.located().map_or("", |(c, _)| c.filename.as_str())
    }

    /// Whether the located candidate is a wheel.
    pub fn is_wheel(&self) -> bool {
        self.located().is_some_and(|(c, _)| c.is_wheel())
    }

    /// Install status of the located candidate. A failed package, or one
    /// with nothing located, is [`ResolutionStatus::Unresolved`].
    pub fn status(&self) -> ResolutionStatus {
        match self.located() {
            _ if self.is_fatal() => ResolutionStatus::Unresolved,
            Some((c, _)) if c.is_wheel() => ResolutionStatus::Binary,
            Some(_) => ResolutionStatus::SourceBuild,
            None => ResolutionStatus::Unresolved,
        }
    }

    /// Resolution diagnostics followed by verification diagnostics.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.package
            .diagnostics()
            .iter()
            .chain(self.verification.diagnostics())
    }

    /// Whether a failure was recorded.
    pub fn is_fatal(&self) -> bool {
        self.verification.is_fatal()
    }
}
