//! Tag compatibility checks against a [`PlatformProfile`].
//!
//! Language and platform tags are judged independently. Platform tags on
//! Linux go through manylinux (glibc floor, monotonic) or musllinux (exact
//! version) matching; every other OS only accepts an exact tag.

use std::sync::LazyLock;

use regex::Regex;
use wheelpick_schema::{LibcFamily, PlatformProfile, normalize_legacy_tag};

static MANYLINUX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^manylinux_(?P<major>\d+)_(?P<minor>\d+)_(?P<arch>.+)$")
        .expect("manylinux pattern is valid")
});

/// Whether a (possibly compound) language tag runs on the profile's runtime.
///
/// `none` always does. Otherwise one of the `.`-separated tags must either be
/// the exact `{impl}{major}{minor}` tag of the runtime or a generic
/// `py{major}` tag (`py3`, `py37`, ...).
///
/// ```
/// use wheelpick_core::compat::is_language_tag_compatible;
/// use wheelpick_schema::{Implementation, Libc, Machine, PlatformProfile, RuntimeVersion};
///
/// let profile = PlatformProfile::linux(
///     Implementation::CPython,
///     RuntimeVersion::new(3, 11, 4),
///     Libc::glibc(2, 31),
///     Machine::new("x86_64"),
/// );
/// assert!(is_language_tag_compatible("cp311", &profile));
/// assert!(is_language_tag_compatible("py2.py3", &profile));
/// assert!(!is_language_tag_compatible("cp310", &profile));
/// ```
pub fn is_language_tag_compatible(tag: &str, profile: &PlatformProfile) -> bool {
    if tag == "none" {
        return true;
    }
    let exact = profile.language_tag();
    let generic = format!("py{}", profile.runtime_version().major);
    tag.split('.')
        .any(|t| t == exact || t.starts_with(&generic))
}

/// Stable ABI (`abi3`) wheels built for `{impl}{major}{minor}` load on every
/// later minor release of the same implementation and major version.
pub fn is_stable_abi_compatible(language_tag: &str, abi_tag: &str, profile: &PlatformProfile) -> bool {
    if !abi_tag.split('.').any(|abi| abi == "abi3") {
        return false;
    }
    let version = profile.runtime_version();
    let prefix = format!("{}{}", profile.implementation().code(), version.major);
    language_tag.split('.').any(|t| {
        t.strip_prefix(&prefix)
            .and_then(|minor| minor.parse::<u32>().ok())
            .is_some_and(|minor| minor <= version.minor)
    })
}

/// Whether the interpreter half of a wheel's tags (language + ABI) fits the
/// profile: either the language tag itself is compatible or the wheel
/// targets the stable ABI of an older minor release.
pub fn is_interpreter_compatible(language_tag: &str, abi_tag: &str, profile: &PlatformProfile) -> bool {
    is_language_tag_compatible(language_tag, profile)
        || is_stable_abi_compatible(language_tag, abi_tag, profile)
}

/// Whether a (possibly compound) platform tag is installable on the profile.
///
/// `any` and an exact match with the OS platform tag always are. On Linux,
/// any `.`-separated sub-tag that is manylinux or musllinux compatible also
/// qualifies. Other operating systems get no cross-tag tolerance.
pub fn is_platform_tag_compatible(tag: &str, profile: &PlatformProfile) -> bool {
    if tag == "any" || tag == profile.os_platform_tag() {
        return true;
    }
    profile.is_linux()
        && tag
            .split('.')
            .any(|t| manylinux_compatible(t, profile) || musllinux_compatible(t, profile))
}

/// `manylinux_{MAJ}_{MIN}_{ARCH}` (or a legacy alias of one) is compatible
/// with a glibc profile whose version is at least `MAJ.MIN` on the same
/// architecture. musl profiles never satisfy a manylinux tag.
///
/// ```
/// use wheelpick_core::compat::manylinux_compatible;
/// use wheelpick_schema::{Implementation, Libc, Machine, PlatformProfile, RuntimeVersion};
///
/// let profile = PlatformProfile::linux(
///     Implementation::CPython,
///     RuntimeVersion::new(3, 11, 0),
///     Libc::glibc(2, 17),
///     Machine::new("x86_64"),
/// );
/// assert!(manylinux_compatible("manylinux2014_x86_64", &profile));
/// assert!(!manylinux_compatible("manylinux_2_28_x86_64", &profile));
/// ```
pub fn manylinux_compatible(tag: &str, profile: &PlatformProfile) -> bool {
    let Some(libc) = profile.libc() else {
        return false;
    };
    if libc.family != LibcFamily::Glibc {
        return false;
    }
    let Some(caps) = MANYLINUX.captures(normalize_legacy_tag(tag)) else {
        return false;
    };
    let (Ok(major), Ok(minor)) = (caps["major"].parse::<u32>(), caps["minor"].parse::<u32>()) else {
        return false;
    };
    libc.version() >= (major, minor) && profile.machine().matches(&caps["arch"])
}

/// `musllinux_{MAJ}_{MIN}_{ARCH}` is compatible only with a musl profile of
/// exactly that version and architecture.
pub fn musllinux_compatible(tag: &str, profile: &PlatformProfile) -> bool {
    match profile.libc() {
        Some(libc) if libc.family == LibcFamily::Musl => {
            tag == format!("musllinux_{}_{}_{}", libc.major, libc.minor, profile.machine())
        }
        _ => false,
    }
}
