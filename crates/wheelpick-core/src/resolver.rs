//! Candidate selection.
//!
//! Picks, among every file the lockfile lists for one package, the ones
//! usable on a [`PlatformProfile`] and ranks them. Wheels are ranked by
//! listing order with later entries first; the source archive always goes
//! last as the build fallback.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, trace};

use crate::compat;
use crate::package::FileRecord;
use crate::types::{DistFilename, FileHash, PackageName, PlatformProfile};

/// A usable file for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    /// Distribution filename.
    pub filename: String,
    /// Declared hash.
    pub hash: FileHash,
    /// Parsed filename tags.
    pub parsed: DistFilename,
}

impl CandidateFile {
    /// Whether this candidate is a wheel rather than a source archive.
    pub fn is_wheel(&self) -> bool {
        self.parsed.is_wheel()
    }
}

/// Outcome of [`select`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Usable candidates, best first.
    pub candidates: Vec<CandidateFile>,
    /// The source archive is the only usable file although binaries exist.
    pub requires_local_build: bool,
    /// A wheel was rejected for its platform tag on a Linux profile.
    pub saw_incompatible_binary: bool,
}

/// Rank the files of one package for `profile`.
///
/// Filenames that are neither wheels nor `{name}-{version}.tar.gz` archives
/// are skipped. A wheel is kept when its interpreter tags and its platform
/// tag are both compatible. Every kept wheel is pushed to the front, so of
/// two compatible wheels the one listed later wins. When the lockfile lists
/// several source archives the last one is used.
///
/// The result depends only on the arguments.
pub fn select(files: &[FileRecord], name: &PackageName, profile: &PlatformProfile) -> Selection {
    let mut ranked: VecDeque<CandidateFile> = VecDeque::new();
    let mut source: Option<CandidateFile> = None;
    let mut saw_incompatible_binary = false;

    for file in files {
        let parsed = match DistFilename::parse(&file.filename) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!("{name}: {e}");
                continue;
            }
        };

        if let DistFilename::Wheel(wheel) = &parsed {
            if !compat::is_interpreter_compatible(&wheel.language_tag, &wheel.abi_tag, profile) {
                trace!("{name}: {} rejected by interpreter tags", file.filename);
                continue;
            }
            if !compat::is_platform_tag_compatible(&wheel.platform_tag, profile) {
                trace!("{name}: {} rejected by platform tag", file.filename);
                saw_incompatible_binary |= profile.is_linux();
                continue;
            }
        }

        let candidate = CandidateFile {
            filename: file.filename.clone(),
            hash: file.hash.clone(),
            parsed,
        };
        if candidate.is_wheel() {
            ranked.push_front(candidate);
        } else if let Some(previous) = source.replace(candidate) {
            debug!("{name}: several source archives listed, ignoring {}", previous.filename);
        }
    }

    let requires_local_build = ranked.is_empty() && source.is_some() && saw_incompatible_binary;

    let mut candidates: Vec<CandidateFile> = ranked.into();
    candidates.extend(source);

    Selection {
        candidates,
        requires_local_build,
        saw_incompatible_binary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelpick_schema::{Implementation, Libc, Machine, RuntimeVersion};

    /// Files published for cffi 1.15.1, in lockfile (alphabetical) order.
    const CFFI: &[&str] = &[
        "cffi-1.15.1-cp27-cp27m-macosx_10_9_x86_64.whl",
        "cffi-1.15.1-cp27-cp27m-manylinux1_i686.whl",
        "cffi-1.15.1-cp27-cp27m-manylinux1_x86_64.whl",
        "cffi-1.15.1-cp27-cp27m-win32.whl",
        "cffi-1.15.1-cp27-cp27m-win_amd64.whl",
        "cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl",
        "cffi-1.15.1-cp27-cp27mu-manylinux1_x86_64.whl",
        "cffi-1.15.1-cp310-cp310-macosx_10_9_x86_64.whl",
        "cffi-1.15.1-cp310-cp310-macosx_11_0_arm64.whl",
        "cffi-1.15.1-cp310-cp310-manylinux_2_17_aarch64.manylinux2014_aarch64.whl",
        "cffi-1.15.1-cp310-cp310-manylinux_2_17_ppc64le.manylinux2014_ppc64le.whl",
        "cffi-1.15.1-cp310-cp310-manylinux_2_17_s390x.manylinux2014_s390x.whl",
        "cffi-1.15.1-cp310-cp310-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
        "cffi-1.15.1-cp310-cp310-musllinux_1_1_i686.whl",
        "cffi-1.15.1-cp310-cp310-musllinux_1_1_x86_64.whl",
        "cffi-1.15.1-cp310-cp310-win32.whl",
        "cffi-1.15.1-cp310-cp310-win_amd64.whl",
        "cffi-1.15.1-cp311-cp311-macosx_10_9_x86_64.whl",
        "cffi-1.15.1-cp311-cp311-macosx_11_0_arm64.whl",
        "cffi-1.15.1-cp311-cp311-manylinux_2_17_aarch64.manylinux2014_aarch64.whl",
        "cffi-1.15.1-cp311-cp311-manylinux_2_17_ppc64le.manylinux2014_ppc64le.whl",
        "cffi-1.15.1-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
        "cffi-1.15.1-cp311-cp311-musllinux_1_1_x86_64.whl",
        "cffi-1.15.1-cp311-cp311-win32.whl",
        "cffi-1.15.1-cp311-cp311-win_amd64.whl",
        "cffi-1.15.1-cp39-cp39-macosx_10_9_x86_64.whl",
        "cffi-1.15.1-cp39-cp39-macosx_11_0_arm64.whl",
        "cffi-1.15.1-cp39-cp39-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
        "cffi-1.15.1-cp39-cp39-win_amd64.whl",
        "cffi-1.15.1.tar.gz",
    ];

    fn records(files: &[&str]) -> Vec<FileRecord> {
        files
            .iter()
            .zip(0u32..)
            .map(|(f, n)| FileRecord::new(*f, FileHash::parse(&format!("sha256:{n:064x}")).unwrap()))
            .collect()
    }

    fn profile_for(tag: &str, version: &str) -> PlatformProfile {
        PlatformProfile::from_platform_tag(
            tag,
            Implementation::CPython,
            version.parse().unwrap(),
            None,
        )
        .unwrap()
    }

    fn filenames(selection: &Selection) -> Vec<&str> {
        selection.candidates.iter().map(|c| c.filename.as_str()).collect()
    }

    #[test]
    fn legacy_manylinux_wheel_then_source() {
        let files = records(&["cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl", "cffi-1.15.1.tar.gz"]);
        let profile = PlatformProfile::linux(
            Implementation::CPython,
            RuntimeVersion::new(2, 7, 0),
            Libc::glibc(2, 5),
            Machine::new("i686"),
        );
        let selection = select(&files, &PackageName::new("cffi"), &profile);
        assert_eq!(
            filenames(&selection),
            ["cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl", "cffi-1.15.1.tar.gz"]
        );
        assert!(selection.candidates[0].is_wheel());
        assert!(!selection.candidates[1].is_wheel());
        assert!(!selection.requires_local_build);
    }

    #[test]
    fn stable_abi_wheel_on_newer_runtime() {
        let files = records(&["cryptography-43.0.3-cp39-abi3-manylinux_2_28_x86_64.whl"]);
        let profile = PlatformProfile::linux(
            Implementation::CPython,
            RuntimeVersion::new(3, 11, 0),
            Libc::glibc(2, 28),
            Machine::new("x86_64"),
        );
        let selection = select(&files, &PackageName::new("cryptography"), &profile);
        assert_eq!(selection.candidates.len(), 1);
        assert!(!selection.requires_local_build);
    }

    #[test]
    fn wrong_arch_wheel_only() {
        let files = records(&["cffi-1.15.1-cp311-cp311-manylinux_2_17_aarch64.manylinux2014_aarch64.whl"]);
        let profile = PlatformProfile::linux(
            Implementation::CPython,
            RuntimeVersion::new(3, 11, 0),
            Libc::glibc(2, 31),
            Machine::new("x86_64"),
        );
        let selection = select(&files, &PackageName::new("cffi"), &profile);
        assert!(selection.candidates.is_empty());
        assert!(selection.saw_incompatible_binary);
        assert!(!selection.requires_local_build);
    }

    #[test]
    fn source_alone_after_rejected_binary_requires_build() {
        let files = records(&[
            "cffi-1.15.1-cp311-cp311-manylinux_2_17_aarch64.manylinux2014_aarch64.whl",
            "cffi-1.15.1.tar.gz",
        ]);
        let selection = select(&files, &PackageName::new("cffi"), &profile_for("manylinux_2_31_x86_64", "3.11"));
        assert_eq!(filenames(&selection), ["cffi-1.15.1.tar.gz"]);
        assert!(selection.requires_local_build);
    }

    #[test]
    fn source_alone_without_binaries_is_optional_build() {
        let files = records(&["cffi-1.15.1.tar.gz"]);
        let selection = select(&files, &PackageName::new("cffi"), &profile_for("manylinux_2_31_x86_64", "3.11"));
        assert_eq!(filenames(&selection), ["cffi-1.15.1.tar.gz"]);
        assert!(!selection.saw_incompatible_binary);
        assert!(!selection.requires_local_build);
    }

    #[test]
    fn non_linux_mismatch_is_not_tracked() {
        let files = records(&["cffi-1.15.1-cp311-cp311-win32.whl", "cffi-1.15.1.tar.gz"]);
        let selection = select(&files, &PackageName::new("cffi"), &profile_for("win_amd64", "3.11"));
        assert_eq!(filenames(&selection), ["cffi-1.15.1.tar.gz"]);
        assert!(!selection.saw_incompatible_binary);
        assert!(!selection.requires_local_build);
    }

    #[test]
    fn later_wheels_rank_first_and_source_stays_last() {
        let files = records(&[
            "six-1.16.0-py2.py3-none-any.whl",
            "six-1.16.0.tar.gz",
            "six-1.16.0-1-py3-none-any.whl",
        ]);
        let selection = select(&files, &PackageName::new("six"), &profile_for("win_amd64", "3.11"));
        assert_eq!(
            filenames(&selection),
            [
                "six-1.16.0-1-py3-none-any.whl",
                "six-1.16.0-py2.py3-none-any.whl",
                "six-1.16.0.tar.gz",
            ]
        );
    }

    #[test]
    fn malformed_and_unknown_files_are_skipped() {
        let files = records(&["six-1.16.0.zip", "six.whl", "six-1.16.0-py3-none.whl", "six-1.16.0-py3-none-any.whl"]);
        let selection = select(&files, &PackageName::new("six"), &profile_for("win_amd64", "3.11"));
        assert_eq!(filenames(&selection), ["six-1.16.0-py3-none-any.whl"]);
    }

    #[test]
    fn last_source_archive_wins() {
        let files = records(&["pkg-1.0.tar.gz", "pkg-1.0.0.tar.gz"]);
        let selection = select(&files, &PackageName::new("pkg"), &profile_for("win_amd64", "3.11"));
        assert_eq!(filenames(&selection), ["pkg-1.0.0.tar.gz"]);
    }

    #[test]
    fn selection_is_deterministic() {
        let files = records(CFFI);
        let profile = profile_for("manylinux_2_17_x86_64", "3.10");
        let first = select(&files, &PackageName::new("cffi"), &profile);
        for _ in 0..10 {
            assert_eq!(select(&files, &PackageName::new("cffi"), &profile), first);
        }
    }

    #[test]
    fn target_platform_table() {
        let cases = [
            ("2.7", "win_amd64", "cffi-1.15.1-cp27-cp27m-win_amd64.whl"),
            ("3.11", "win_amd64", "cffi-1.15.1-cp311-cp311-win_amd64.whl"),
            ("3.9", "macosx_11_0_arm64", "cffi-1.15.1-cp39-cp39-macosx_11_0_arm64.whl"),
            ("3.10", "macosx_10_9_x86_64", "cffi-1.15.1-cp310-cp310-macosx_10_9_x86_64.whl"),
            ("2.7", "manylinux1_i686", "cffi-1.15.1-cp27-cp27mu-manylinux1_i686.whl"),
            (
                "3.11",
                "manylinux2014_ppc64le",
                "cffi-1.15.1-cp311-cp311-manylinux_2_17_ppc64le.manylinux2014_ppc64le.whl",
            ),
            ("3.10", "musllinux_1_1_x86_64", "cffi-1.15.1-cp310-cp310-musllinux_1_1_x86_64.whl"),
        ];
        let files = records(CFFI);
        for (version, platform, expected) in cases {
            let selection = select(&files, &PackageName::new("cffi"), &profile_for(platform, version));
            assert_eq!(
                selection.candidates.first().map(|c| c.filename.as_str()),
                Some(expected),
                "python {version} on {platform}"
            );
            assert_eq!(
                selection.candidates.last().map(|c| c.filename.as_str()),
                Some("cffi-1.15.1.tar.gz")
            );
        }
    }
}
