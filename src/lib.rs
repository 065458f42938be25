//! Reads a personal expense spreadsheet, normalizes its entries into `ExpenseRecord`s, sorts their
//! tags into macro-categories and summarizes them by month.
//!
//! The stages are usable on their own: `Normalizer` turns a `RawTable` into records, `Categorizer`
//! maps tags to a `MacroCategory`, and `Aggregator` builds the `MonthlySummary`. `Pipeline` runs
//! all three, and `Session` adds fetching, caching and decoding of the configured source.

mod aggregate;
pub mod args;
mod backup;
mod categorize;
pub mod commands;
mod config;
mod crosscheck;
mod error;
mod export;
pub mod model;
mod normalize;
mod pipeline;
mod render;
mod source;
mod utils;
mod writeback;


pub use aggregate::{
    Aggregator, MonthValues, MonthlySummary, SummaryRow, TagTotals, YtdPolicy, YtdWindow,
};
pub use backup::Backup;
pub use categorize::{Categorizer, CategoryMapError, TagMatch};
pub use config::{Config, SourceSettings, SummaryLocation};
pub use crosscheck::{cross_check, Discrepancy};
pub use error::{Error, IssueKind, PipelineError, Result, RowIssue};
pub use export::{records_csv, summary_csv, ExportKind};
pub use normalize::{AmountPolicy, Normalized, Normalizer, SheetShape};
pub use pipeline::{current_month, Pipeline, Report, Session};
pub use source::{Loader, SourceFormat, SourceLocation};
pub use writeback::{commit, reconstruct};
