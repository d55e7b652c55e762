//! Shared run context.
//!
//! Groups the HTTP client, the index client, the repository registry and the
//! switches every per-package task needs.

use crate::Cli;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use wheelpick_core::RepositoryRegistry;
use wheelpick_core::io::index::IndexClient;
use wheelpick_core::verify::VerifyOptions;

/// Switches that decide how a package is processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub verify: VerifyOptions,
    pub ignore_missing: bool,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            verify: VerifyOptions {
                ignore_hash: cli.ignore_hash,
                no_binary: cli.no_binary,
            },
            ignore_missing: cli.ignore_missing,
            dry_run: cli.dry_run,
        }
    }
}

/// Groups common state used while verifying and downloading packages.
#[derive(Clone)]
pub struct Context {
    pub client: reqwest::Client,
    pub index: Arc<dyn IndexClient>,
    pub registry: Arc<RepositoryRegistry>,
    pub target: PathBuf,
    pub options: RunOptions,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("registry", &self.registry)
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(
        client: reqwest::Client,
        index: Arc<dyn IndexClient>,
        registry: RepositoryRegistry,
        target: PathBuf,
        options: RunOptions,
    ) -> Self {
        Self {
            client,
            index,
            registry: Arc::new(registry),
            target,
            options,
        }
    }
}
