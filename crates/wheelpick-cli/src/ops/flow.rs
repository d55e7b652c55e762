//! Run Flow - lockfile to downloaded artifacts
//!
//! Resolution is done up front for every package. Verification and download
//! then run as an order-preserving buffered stream so each report line can be
//! printed as soon as its package, and every package before it, is done.

use crate::Cli;
use crate::ops::context::{Context, RunOptions};
use crate::ops::resolve::build_profile;
use crate::ui::{ColumnWidths, render_report};
use anyhow::{Context as _, Result};
use futures::{StreamExt, stream};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wheelpick_core::io::FetchError;
use wheelpick_core::io::download::download_package;
use wheelpick_core::io::index::HttpIndexClient;
use wheelpick_core::lockfile::LockfileSource;
use wheelpick_core::verify::{Verification, verify};
use wheelpick_core::{PackageReport, RepositoryRegistry, ResolvedPackage};

/// Execute one `wheelpick` invocation.
pub async fn run(cli: &Cli) -> Result<()> {
    let profile = build_profile(cli)?;

    let source = match &cli.sourcefile {
        Some(path) => LockfileSource::open(path)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to read the current directory")?;
            LockfileSource::discover(&cwd).await?
        }
    };
    info!("Reading {} lockfile {}", source.format(), source.path().display());

    let mut registry = RepositoryRegistry::new(&cli.index_url);
    let loaded = source.load_credentials(&mut registry).await?;
    debug!("Loaded {loaded} stored credentials");
    let records = source.packages(&cli.groups, &mut registry).await?;

    let packages: Vec<ResolvedPackage> = records
        .iter()
        .map(|record| ResolvedPackage::resolve(record, &profile))
        .collect();

    if !cli.dry_run {
        tokio::fs::create_dir_all(&cli.target)
            .await
            .with_context(|| format!("Failed to create {}", cli.target.display()))?;
    }

    let client = wheelpick_core::io::http_client().context("Failed to build HTTP client")?;
    let ctx = Context::new(
        client.clone(),
        Arc::new(HttpIndexClient::new(client)),
        registry,
        cli.target.clone(),
        RunOptions::from_cli(cli),
    );

    let widths = ColumnWidths::measure(&packages);
    let color = !cli.no_color;
    let total = packages.len();

    let mut reports = stream::iter(packages)
        .map(|package| process_package(&ctx, package))
        .buffered(usize::from(cli.jobs));
    while let Some(report) = reports.next().await {
        println!("{}", render_report(&report?, widths, color));
    }

    info!("Processed {total} packages");
    Ok(())
}

/// Verify a package and, unless this is a dry run, download it.
///
/// Failures end the run unless `ignore_missing` is set, in which case they
/// are recorded on the report. A dry run that locates nothing only warns.
pub async fn process_package(ctx: &Context, package: ResolvedPackage) -> Result<PackageReport, FetchError> {
    let options = ctx.options;
    let verification = match verify(ctx.index.as_ref(), &ctx.registry, &package, options.verify).await {
        Ok(verification) => verification,
        Err(e) if options.ignore_missing => Verification::failed(&e),
        Err(e) => return Err(e),
    };
    let mut report = PackageReport::new(package, verification);
    if report.is_fatal() {
        return Ok(report);
    }

    if options.dry_run {
        if report.located().is_none() {
            let missing = FetchError::MissingUrl {
                package: report.package().name().to_string(),
            };
            warn!("{missing}");
            report.verification_mut().note(&missing);
        }
        return Ok(report);
    }
    match download_package(&ctx.client, &ctx.registry, &report, &ctx.target).await {
        Ok(path) => {
            debug!("Saved {}", path.display());
            Ok(report)
        }
        Err(e) => settle(report, e, options.ignore_missing),
    }
}

fn settle(mut report: PackageReport, error: FetchError, ignore_missing: bool) -> Result<PackageReport, FetchError> {
    if !ignore_missing {
        return Err(error);
    }
    report.verification_mut().absorb(&error);
    Ok(report)
}
