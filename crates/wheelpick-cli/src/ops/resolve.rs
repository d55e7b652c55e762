use crate::Cli;
use anyhow::{Context, Result};
use wheelpick_core::host;
use wheelpick_schema::{Machine, PlatformProfile, RuntimeVersion};

/// Build the target profile from the command line, probing the host for
/// whatever was not given.
pub fn build_profile(cli: &Cli) -> Result<PlatformProfile> {
    let version = match &cli.python_version {
        Some(v) => v.parse::<RuntimeVersion>()?,
        None => host::detect_runtime_version().context("Failed to detect the python version")?,
    };

    let host_libc = host::detect_libc();
    let tag = cli
        .platform
        .clone()
        .unwrap_or_else(|| host::current_platform_tag(host_libc, &Machine::current()));

    let profile =
        PlatformProfile::from_platform_tag(&tag, cli.python_implementation, version, host_libc)?;
    tracing::debug!(
        "Target: {} {} on {}",
        profile.language_tag(),
        profile.runtime_version(),
        profile.target_tag()
    );
    Ok(profile)
}
