//! # Quire
//!
//! A band-oriented report filler.
//!
//! A report is designed as a stack of **bands**: title, page header, column
//! header, group headers, detail, group footers, column footer, page footer,
//! summary. Quire streams data rows through that design and flows the bands
//! *into* pages and columns, one row at a time. Every decision about where a
//! band goes is made against the room left in the current column, with the
//! footers' reserved space as a hard limit.
//!
//! Things the filler takes care of:
//! - splitting stretching bands across columns and pages
//! - keeping split-prevented bands and keep-together groups whole
//! - placing group footers normally, stacked or forced to the column bottom
//! - reprinting group headers on new pages
//! - elements whose value is only known later ("Page 3 of 12")
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]   — Report definition: bands, groups, variables
//!       ↓
//!   [fill]    — Vertical flow: breaks, footers, deferred elements
//!       ↑  ↑
//!   [data] [calc]  — Rows in; variables and group changes out
//!       ↓
//!   [print]   — Filled pages of positioned elements
//!       ↓
//!   [sink]    — Where finished pages go
//! ```

pub mod calc;
pub mod data;
pub mod error;
pub mod fill;
pub mod model;
pub mod print;
pub mod scriptlet;
pub mod sink;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::QuireError;
pub use fill::{CancelToken, FillOptions, FillStats, ReportFiller, SubreportContext};
pub use model::Report;
pub use print::Page;

use data::JsonRows;

/// Fill a report with in-memory rows.
///
/// This is the primary entry point. It validates the report, fills it with
/// the built-in calculator and returns the pages.
pub fn fill(report: Report, rows: Vec<data::Row>) -> Result<Vec<Page>, QuireError> {
    ReportFiller::new(report)?.fill_rows(rows)
}

/// Fill a report described as JSON with rows given as a JSON array.
pub fn fill_json(report_json: &str, rows_json: &str) -> Result<Vec<Page>, QuireError> {
    let report: Report = serde_json::from_str(report_json)?;
    let filler = ReportFiller::new(report)?;
    let mut source = JsonRows::from_json(rows_json)?;
    let mut calculator = calc::RecordCalculator::new(filler.report());
    let mut pages = Vec::new();
    filler.fill_report(
        &mut source,
        &mut calculator,
        &mut scriptlet::NoopScriptlet,
        &mut pages,
    )?;
    Ok(pages)
}
