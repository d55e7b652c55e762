//! Re-exports of the schema types used throughout the core.

pub use wheelpick_schema::{
    DistFilename, FileHash, Implementation, Libc, LibcFamily, Machine, PackageName,
    PlatformProfile, RuntimeVersion, SourceDistFilename, Version, WheelFilename,
};
