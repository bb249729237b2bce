//! Writers for processing summaries: text report, CSV of skipped elements
//! and JSON.

pub mod csv;
pub mod json;
pub mod report;

pub use crate::error::ExportError;
pub use csv::export_csv;
pub use json::export_json;
pub use report::{export_report, render_report, timestamped_path};
