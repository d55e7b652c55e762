//! Host probing: the local Python version, C library and platform tag.
//!
//! Only used to fill in defaults; everything here can be overridden from the
//! command line.

use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::types::{Libc, LibcFamily, Machine, RuntimeVersion};

static MUSL_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*version\s+(\d+)\.(\d+)").expect("musl version pattern is valid")
});

static GLIBC_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:glibc|gnu libc)[^\n]*?(\d+)\.(\d+)\s*$").expect("glibc version pattern is valid")
});

const VERSION_SCRIPT: &str = "import sys; print('%d.%d.%d' % sys.version_info[:3])";

/// Errors raised while probing the host.
#[derive(Error, Debug)]
pub enum HostError {
    /// Neither `python3` nor `python` is on `PATH`.
    #[error("No python interpreter found on PATH; pass --python-version")]
    InterpreterNotFound,

    /// A probe command could not be run.
    #[error("Failed to run {program}: {source}")]
    Command {
        /// Program that failed.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A probe command printed something unexpected.
    #[error("Unexpected output from {program}: {output}")]
    UnexpectedOutput {
        /// Program that was run.
        program: String,
        /// What it printed.
        output: String,
    },
}

/// Version of the first `python3` (or `python`) on `PATH`.
///
/// # Errors
///
/// Returns [`HostError`] if no interpreter is found, it cannot be run, or its
/// output is not a version triple.
pub fn detect_runtime_version() -> Result<RuntimeVersion, HostError> {
    let python = which::which("python3")
        .or_else(|_| which::which("python"))
        .map_err(|_| HostError::InterpreterNotFound)?;
    let program = python.display().to_string();

    let output = Command::new(&python)
        .args(["-c", VERSION_SCRIPT])
        .output()
        .map_err(|source| HostError::Command {
            program: program.clone(),
            source,
        })?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("{program} reports version {}", stdout.trim());

    parse_python_version_output(&stdout).ok_or_else(|| HostError::UnexpectedOutput {
        program,
        output: stdout.trim().to_string(),
    })
}

/// Parse the `X.Y.Z` line printed by the version probe.
pub fn parse_python_version_output(output: &str) -> Option<RuntimeVersion> {
    output.lines().find_map(|line| line.trim().parse().ok())
}

/// C library of the host, `None` off Linux or when it cannot be determined.
pub fn detect_libc() -> Option<Libc> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let libc = run_combined("getconf", &["GNU_LIBC_VERSION"])
        .as_deref()
        .and_then(parse_getconf_output)
        .or_else(|| run_combined("ldd", &["--version"]).as_deref().and_then(parse_ldd_output));
    debug!("Detected C library: {libc:?}");
    libc
}

/// Parse `getconf GNU_LIBC_VERSION` output (`glibc 2.35`).
pub fn parse_getconf_output(output: &str) -> Option<Libc> {
    let version = output.trim().strip_prefix("glibc")?.trim();
    let (major, rest) = version.split_once('.')?;
    let minor: String = rest.chars().take_while(char::is_ascii_digit).collect();
    Some(Libc::glibc(major.parse().ok()?, minor.parse().ok()?))
}

/// Parse `ldd --version` output, which names glibc on its first line and
/// musl on a `Version X.Y.Z` line (musl's `ldd` prints to stderr).
pub fn parse_ldd_output(output: &str) -> Option<Libc> {
    if output.to_ascii_lowercase().contains("musl") {
        let caps = MUSL_VERSION.captures(output)?;
        return Some(Libc::musl(caps[1].parse().ok()?, caps[2].parse().ok()?));
    }
    let first = output.lines().next()?;
    let caps = GLIBC_VERSION.captures(first)?;
    Some(Libc::glibc(caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// The most specific platform tag describing this host, in the form wheels
/// use: `manylinux_2_35_x86_64`, `musllinux_1_2_aarch64`, `win_amd64`,
/// `macosx_14_0_arm64`, ...
pub fn current_platform_tag(libc: Option<Libc>, machine: &Machine) -> String {
    let arch = machine.as_str();
    match libc {
        Some(Libc {
            family: LibcFamily::Glibc,
            major,
            minor,
        }) => format!("manylinux_{major}_{minor}_{arch}"),
        Some(Libc {
            family: LibcFamily::Musl,
            major,
            minor,
        }) => format!("musllinux_{major}_{minor}_{arch}"),
        None if cfg!(target_os = "linux") => format!("linux_{arch}"),
        None if cfg!(target_os = "macos") => {
            let (major, minor) = macos_version().unwrap_or((11, 0));
            macos_platform_tag(major, minor, arch)
        }
        None if cfg!(windows) => windows_platform_tag(arch).to_string(),
        None => format!("{}_{}", std::env::consts::OS, arch.to_ascii_lowercase()),
    }
}

fn macos_version() -> Option<(u32, u32)> {
    let output = run_combined("sw_vers", &["-productVersion"])?;
    let mut parts = output.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

/// Since macOS 11 only the major version is part of the platform tag.
fn macos_platform_tag(major: u32, minor: u32, arch: &str) -> String {
    let minor = if major >= 11 { 0 } else { minor };
    format!("macosx_{major}_{minor}_{arch}")
}

fn windows_platform_tag(arch: &str) -> &'static str {
    match arch.to_ascii_lowercase().as_str() {
        "amd64" | "x86_64" => "win_amd64",
        "arm64" | "aarch64" => "win_arm64",
        _ => "win32",
    }
}

fn run_combined(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Some(text)
}
