//! Terminal output.

pub mod report;

pub use report::{ColumnWidths, render_report};
