//! Shared types for wheelpick: distribution filename grammar, declared file
//! hashes, and the immutable description of the requesting Python runtime and
//! platform.
//!
//! Nothing in this crate performs I/O.

pub mod arch;
pub mod hash;
pub mod platform;
pub mod tags;
pub mod types;

// Re-exports
pub use arch::*;
pub use hash::*;
pub use platform::*;
pub use tags::*;
pub use types::*;
