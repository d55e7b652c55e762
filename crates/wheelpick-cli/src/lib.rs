//! wheelpick - download the right Python wheels for a lockfile
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Reads a Poetry or PDM lockfile, picks for every package the artifact that
//! best fits a target interpreter and platform, checks it against the package
//! index and downloads it.
//!
//! # Flow
//!
//! ```text
//! lockfile ──▶ PackageRecord ──resolve──▶ ResolvedPackage
//!                                              │ verify (index lookup)
//!                                              ▼
//!                          PackageReport ──download──▶ {target}/{filename}
//! ```
//!
//! Resolution is pure and per package; only verification and download touch
//! the network, and they run concurrently with output kept in lockfile order.

pub mod ops;
pub mod ui;

use clap::Parser;
use std::path::PathBuf;
use wheelpick_core::repo::DEFAULT_INDEX_URL;
use wheelpick_schema::Implementation;

#[derive(Debug, Parser)]
#[command(name = "wheelpick")]
#[command(
    author,
    version,
    about = "wheelpick - download the Python wheels a lockfile needs for a target platform"
)]
pub struct Cli {
    /// Lockfile to read (default: poetry.lock or pdm.lock in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub sourcefile: Option<PathBuf>,

    /// Directory the artifacts are downloaded to
    #[arg(short, long, value_name = "DIR", default_value = "./wheels")]
    pub target: PathBuf,

    /// Additional dependency group to include (repeatable)
    #[arg(short, long = "group", value_name = "NAME")]
    pub groups: Vec<String>,

    /// Target python version, X.Y or X.Y.Z (default: the local python3)
    #[arg(short, long, value_name = "VERSION")]
    pub python_version: Option<String>,

    /// Target platform tag, e.g. manylinux_2_17_x86_64 or win_amd64 (default: this host)
    #[arg(long, value_name = "TAG")]
    pub platform: Option<String>,

    /// Target python implementation: cp, pp, ip or jy
    #[arg(long, value_name = "CODE", default_value = "cp")]
    pub python_implementation: Implementation,

    /// Record per-package failures and keep going
    #[arg(long)]
    pub ignore_missing: bool,

    /// Report hash mismatches instead of failing on them
    #[arg(long)]
    pub ignore_hash: bool,

    /// Only download source archives
    #[arg(long)]
    pub no_binary: bool,

    /// Resolve and verify without downloading anything
    #[arg(long = "dryrun", alias = "dry-run")]
    pub dry_run: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Base URL of the default package index
    #[arg(long, env = "WHEELPICK_INDEX_URL", value_name = "URL", default_value = DEFAULT_INDEX_URL)]
    pub index_url: String,

    /// Concurrent metadata lookups and downloads
    #[arg(short, long, value_name = "N", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,
}
