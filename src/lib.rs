//! Turns pre-aggregated security-alert summaries into PDF reports.
//!
//! The pipeline reads an [`AlertSummary`] from JSON, renders three PNG charts with the
//! [`charts`] module, describes the report as a [`model::ReportDocument`] and lays it out with
//! `genpdf`. [`ReportGenerator`] runs all of it for one summary and one output path.

pub mod builder;
pub mod charts;
pub mod config;
pub mod elements;
pub mod fonts;
pub mod model;
pub mod report;
pub mod richtext;
pub mod summary;

#[cfg(feature = "bookmarks")]
pub mod bookmarks;

pub use builder::{PdfBuildError, PdfBuilder, RenderedPdf};
pub use charts::{ChartError, ChartOutput};
pub use config::ReportConfig;
pub use report::{build_document, ReportError, ReportGenerator, ReportOutcome};
pub use summary::{load_summary, AlertSummary, SummaryError};
