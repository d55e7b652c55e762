//! Core library for wheelpick.
//!
//! The resolution engine ([`compat`], [`constraint`], [`resolver`],
//! [`package`]) is synchronous and pure: every package is resolved from its
//! own lockfile record and a shared, read-only
//! [`PlatformProfile`](wheelpick_schema::PlatformProfile). The remaining
//! modules are the I/O collaborators around it: lockfile readers, the
//! repository registry, host probing, index lookup, verification and download.

pub mod compat;
pub mod constraint;
pub mod host;
pub mod io;
pub mod lockfile;
pub mod package;
pub mod paths;
pub mod repo;
pub mod resolver;
pub mod types;
pub mod verify;

pub use package::{Diagnostic, PackageRecord, ResolutionStatus, ResolvedPackage};
pub use paths::*;
pub use repo::{Repository, RepositoryRegistry};
pub use verify::{PackageReport, Verification};

/// User Agent string for index and download requests
pub const USER_AGENT: &str = concat!("wheelpick/", env!("CARGO_PKG_VERSION"));
