//! The requesting runtime and platform.
//!
//! A [`PlatformProfile`] is built once per run, either from host detection or
//! from a user-supplied platform tag, and is shared read-only by every
//! resolution.

use serde::{Deserialize, Serialize};

use crate::arch::Machine;

/// Legacy manylinux platform tags and the versioned tag each one stands for.
pub const LEGACY_MANYLINUX_ALIASES: &[(&str, &str)] = &[
    ("manylinux1_x86_64", "manylinux_2_5_x86_64"),
    ("manylinux1_i686", "manylinux_2_5_i686"),
    ("manylinux2010_x86_64", "manylinux_2_12_x86_64"),
    ("manylinux2010_i686", "manylinux_2_12_i686"),
    ("manylinux2014_x86_64", "manylinux_2_17_x86_64"),
    ("manylinux2014_i686", "manylinux_2_17_i686"),
    ("manylinux2014_aarch64", "manylinux_2_17_aarch64"),
    ("manylinux2014_armv7l", "manylinux_2_17_armv7l"),
    ("manylinux2014_ppc64", "manylinux_2_17_ppc64"),
    ("manylinux2014_ppc64le", "manylinux_2_17_ppc64le"),
    ("manylinux2014_s390x", "manylinux_2_17_s390x"),
];

/// Map a legacy manylinux alias to its versioned form; other tags pass through.
///
/// ```
/// use wheelpick_schema::normalize_legacy_tag;
///
/// assert_eq!(normalize_legacy_tag("manylinux2014_aarch64"), "manylinux_2_17_aarch64");
/// assert_eq!(normalize_legacy_tag("win_amd64"), "win_amd64");
/// ```
pub fn normalize_legacy_tag(tag: &str) -> &str {
    LEGACY_MANYLINUX_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == tag)
        .map_or(tag, |(_, versioned)| versioned)
}

/// Errors produced while building a [`PlatformProfile`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// A runtime version string is not `X.Y` or `X.Y.Z`.
    #[error("Unknown python version '{0}'")]
    InvalidVersion(String),

    /// An implementation code is not one of `cp`, `pp`, `jy`, `ip`.
    #[error("Unknown python implementation '{0}'")]
    InvalidImplementation(String),

    /// A manylinux/musllinux platform tag lacks a numeric `_{major}_{minor}_` part.
    #[error("Invalid platform tag '{0}'")]
    InvalidTag(String),

    /// A plain `linux_*` platform was requested but the C library is unknown.
    #[error(
        "Cannot determine the C library for platform '{0}'; pass a manylinux_X_Y_ARCH or musllinux_X_Y_ARCH platform instead"
    )]
    UnknownLibc(String),

    /// A Linux platform tag was given to a non-Linux constructor.
    #[error("Platform '{0}' is a Linux platform and needs a C library")]
    MissingLibc(String),
}

/// Python implementation, identified by its two-letter tag code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Implementation {
    /// `cp`
    #[default]
    CPython,
    /// `pp`
    PyPy,
    /// `jy`
    Jython,
    /// `ip`
    IronPython,
}

impl Implementation {
    /// Two-letter code used in language tags.
    pub fn code(self) -> &'static str {
        match self {
            Self::CPython => "cp",
            Self::PyPy => "pp",
            Self::Jython => "jy",
            Self::IronPython => "ip",
        }
    }
}

impl std::fmt::Display for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Implementation {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cp" | "cpython" => Ok(Self::CPython),
            "pp" | "pypy" => Ok(Self::PyPy),
            "jy" | "jython" => Ok(Self::Jython),
            "ip" | "ironpython" => Ok(Self::IronPython),
            _ => Err(PlatformError::InvalidImplementation(s.to_string())),
        }
    }
}

/// Runtime version triple; ordering is lexicographic over (major, minor, micro).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuntimeVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Micro (patch) version.
    pub micro: u32,
}

impl RuntimeVersion {
    /// Create a version triple.
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    /// The triple as an array, for prefix comparisons.
    pub fn segments(self) -> [u32; 3] {
        [self.major, self.minor, self.micro]
    }
}

impl std::fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl std::str::FromStr for RuntimeVersion {
    type Err = PlatformError;

    /// Parse `X.Y` or `X.Y.Z`; a missing micro version is taken as `0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlatformError::InvalidVersion(s.to_string());
        let parts = s
            .trim()
            .split('.')
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                p.parse::<u32>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        match parts[..] {
            [major, minor] => Ok(Self::new(major, minor, 0)),
            [major, minor, micro] => Ok(Self::new(major, minor, micro)),
            _ => Err(invalid()),
        }
    }
}

/// C library family of a Linux platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibcFamily {
    /// GNU C library; manylinux wheels target it.
    Glibc,
    /// musl; musllinux wheels target it.
    Musl,
}

/// A C library family and its (major, minor) version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Libc {
    /// Library family.
    pub family: LibcFamily,
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
}

impl Libc {
    /// A glibc of the given version.
    pub const fn glibc(major: u32, minor: u32) -> Self {
        Self {
            family: LibcFamily::Glibc,
            major,
            minor,
        }
    }

    /// A musl of the given version.
    pub const fn musl(major: u32, minor: u32) -> Self {
        Self {
            family: LibcFamily::Musl,
            major,
            minor,
        }
    }

    /// `(major, minor)`, ordered lexicographically.
    pub fn version(self) -> (u32, u32) {
        (self.major, self.minor)
    }
}

/// Immutable description of the environment artifacts are resolved for.
///
/// Invariant: `libc` is present iff `os_platform_tag` denotes Linux. The
/// constructors are the only way to build a profile and they enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    implementation: Implementation,
    runtime_version: RuntimeVersion,
    libc: Option<Libc>,
    machine: Machine,
    os_platform_tag: String,
}

impl PlatformProfile {
    /// A Linux profile; the OS platform tag is `linux_{machine}`.
    pub fn linux(
        implementation: Implementation,
        runtime_version: RuntimeVersion,
        libc: Libc,
        machine: Machine,
    ) -> Self {
        Self {
            implementation,
            runtime_version,
            libc: Some(libc),
            os_platform_tag: format!("linux_{machine}"),
            machine,
        }
    }

    /// A non-Linux profile (Windows, macOS, ...) with an exact platform tag.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::MissingLibc`] if the tag denotes Linux.
    pub fn non_linux(
        implementation: Implementation,
        runtime_version: RuntimeVersion,
        os_platform_tag: &str,
        machine: Machine,
    ) -> Result<Self, PlatformError> {
        if denotes_linux(os_platform_tag) {
            return Err(PlatformError::MissingLibc(os_platform_tag.to_string()));
        }
        Ok(Self {
            implementation,
            runtime_version,
            libc: None,
            machine,
            os_platform_tag: os_platform_tag.to_string(),
        })
    }

    /// Build a profile from a target platform tag such as
    /// `manylinux_2_17_x86_64`, `manylinux2014_ppc64le`,
    /// `musllinux_1_1_x86_64`, `linux_aarch64`, `win_amd64` or
    /// `macosx_11_0_arm64`.
    ///
    /// The machine is the last `_` segment of the tag, or the last two when
    /// the final segment is `64` (`x86_64`). A `linux_*` tag takes its C
    /// library from `host_libc`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidTag`] for a manylinux/musllinux tag
    /// without numeric version parts and [`PlatformError::UnknownLibc`] for
    /// `linux_*` without a host C library.
    ///
    /// # Example
    ///
    /// ```
    /// use wheelpick_schema::{Implementation, Libc, PlatformProfile, RuntimeVersion};
    ///
    /// let profile = PlatformProfile::from_platform_tag(
    ///     "manylinux2014_ppc64le",
    ///     Implementation::CPython,
    ///     RuntimeVersion::new(3, 11, 0),
    ///     None,
    /// )
    /// .unwrap();
    /// assert_eq!(profile.os_platform_tag(), "linux_ppc64le");
    /// assert_eq!(profile.libc(), Some(Libc::glibc(2, 17)));
    /// ```
    pub fn from_platform_tag(
        tag: &str,
        implementation: Implementation,
        runtime_version: RuntimeVersion,
        host_libc: Option<Libc>,
    ) -> Result<Self, PlatformError> {
        let tag = normalize_legacy_tag(tag.trim());
        let parts: Vec<&str> = tag.split('_').collect();
        let machine = Machine::new(match parts[..] {
            [.., arch, "64"] => format!("{arch}_64"),
            [.., last] => last.to_string(),
            [] => String::new(),
        });

        let libc_version = || -> Result<(u32, u32), PlatformError> {
            match parts[..] {
                [_, major, minor, _, ..] => major
                    .parse()
                    .ok()
                    .zip(minor.parse().ok())
                    .ok_or_else(|| PlatformError::InvalidTag(tag.to_string())),
                _ => Err(PlatformError::InvalidTag(tag.to_string())),
            }
        };

        match parts.first().copied() {
            Some("manylinux") => {
                let (major, minor) = libc_version()?;
                Ok(Self::linux(
                    implementation,
                    runtime_version,
                    Libc::glibc(major, minor),
                    machine,
                ))
            }
            Some("musllinux") => {
                let (major, minor) = libc_version()?;
                Ok(Self::linux(
                    implementation,
                    runtime_version,
                    Libc::musl(major, minor),
                    machine,
                ))
            }
            _ if denotes_linux(tag) => {
                let libc = host_libc.ok_or_else(|| PlatformError::UnknownLibc(tag.to_string()))?;
                Ok(Self::linux(implementation, runtime_version, libc, machine))
            }
            _ => Self::non_linux(implementation, runtime_version, tag, machine),
        }
    }

    /// Runtime implementation.
    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    /// Runtime version triple.
    pub fn runtime_version(&self) -> RuntimeVersion {
        self.runtime_version
    }

    /// C library, present exactly on Linux.
    pub fn libc(&self) -> Option<Libc> {
        self.libc
    }

    /// Machine architecture.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Normalized OS+arch tag (`linux_x86_64`, `win_amd64`, `macosx_11_0_arm64`).
    pub fn os_platform_tag(&self) -> &str {
        &self.os_platform_tag
    }

    /// Whether this profile describes a Linux platform.
    pub fn is_linux(&self) -> bool {
        self.libc.is_some()
    }

    /// Exact language tag of this runtime, e.g. `cp311`.
    pub fn language_tag(&self) -> String {
        format!(
            "{}{}{}",
            self.implementation.code(),
            self.runtime_version.major,
            self.runtime_version.minor
        )
    }

    /// The most specific platform tag of this profile: the manylinux or
    /// musllinux tag on Linux, the OS platform tag elsewhere.
    pub fn target_tag(&self) -> String {
        match self.libc {
            Some(Libc {
                family: LibcFamily::Glibc,
                major,
                minor,
            }) => format!("manylinux_{major}_{minor}_{}", self.machine),
            Some(Libc {
                family: LibcFamily::Musl,
                major,
                minor,
            }) => format!("musllinux_{major}_{minor}_{}", self.machine),
            None => self.os_platform_tag.clone(),
        }
    }
}

fn denotes_linux(tag: &str) -> bool {
    tag.contains("linux")
}
