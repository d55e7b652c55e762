//! Operations behind the command line: profile construction, the run
//! context and the resolve/verify/download flow.

pub mod context;
pub mod flow;
pub mod resolve;

pub use context::{Context, RunOptions};
pub use flow::run;
