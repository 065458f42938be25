//! Wires the source, the normalizer, the categorizer and the aggregator together for one run.

use crate::aggregate::{Aggregator, MonthlySummary, YtdWindow};
use crate::categorize::{CategoryMapError, Categorizer, TagMatch};
use crate::config::SummaryLocation;
use crate::error::{PipelineError, RowIssue};
use crate::model::{CategoryMap, ExpenseRecord, Layout, Month, RawTable};
use crate::normalize::{AmountPolicy, Normalized, Normalizer, SheetShape};
use crate::source::{self, SourceFormat, SourceLocation};
use crate::{Config, Result};
use anyhow::Context;
use chrono::Local;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// The configured stages of a run. Building one validates the category map.
#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: Normalizer,
    categorizer: Categorizer,
    ytd_window: YtdWindow,
}

impl Pipeline {
    pub fn new(
        layout: Layout,
        amount_policy: AmountPolicy,
        categories: &CategoryMap,
        tag_match: TagMatch,
        ytd_window: YtdWindow,
    ) -> std::result::Result<Self, CategoryMapError> {
        Ok(Self {
            normalizer: Normalizer::new(layout, amount_policy),
            categorizer: Categorizer::new(categories, tag_match)?,
            ytd_window,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.layout().clone(),
            config.amount_policy(),
            config.categories(),
            config.tag_match(),
            config.ytd_window(),
        )
        .with_context(|| format!("Invalid category map in {}", config.config_path().display()))
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalizes `table` and aggregates the surviving records. `current` is the calendar month
    /// used by the calendar year-to-date window.
    pub fn run(&self, table: &RawTable, current: Month) -> std::result::Result<Report, PipelineError> {
        let normalized = self.normalizer.normalize(table)?;
        for issue in normalized.issues() {
            warn!("{}: {issue}", table.name());
        }
        let summary = self.summarize(normalized.records(), current)?;
        Ok(Report {
            normalized,
            summary,
        })
    }

    /// Aggregates an already normalized record set, e.g. after it was edited.
    pub fn summarize(
        &self,
        records: &[ExpenseRecord],
        current: Month,
    ) -> std::result::Result<MonthlySummary, PipelineError> {
        let policy = self.ytd_window.resolve(current);
        Aggregator::new(&self.categorizer).aggregate(records, policy)
    }
}

/// The outcome of one run: the records with the rows that were dropped, and the summary.
#[derive(Debug, Clone)]
pub struct Report {
    normalized: Normalized,
    summary: MonthlySummary,
}

impl Report {
    pub fn records(&self) -> &[ExpenseRecord] {
        self.normalized.records()
    }

    pub fn issues(&self) -> &[RowIssue] {
        self.normalized.issues()
    }

    pub fn dropped(&self) -> usize {
        self.normalized.dropped()
    }

    pub fn summary(&self) -> &MonthlySummary {
        &self.summary
    }

    pub fn normalized(&self) -> &Normalized {
        &self.normalized
    }

    pub fn shape(&self) -> &SheetShape {
        self.normalized.shape()
    }
}

/// The current calendar month on the local clock.
pub fn current_month() -> Month {
    Month::of(&Local::now())
}

/// A loaded source: what was read, when it was last modified, and what the pipeline made of it.
#[derive(Debug, Clone)]
pub struct Session {
    pipeline: Pipeline,
    location: SourceLocation,
    format: SourceFormat,
    bytes: Vec<u8>,
    modified: Option<SystemTime>,
    table: RawTable,
    summary_table: Option<RawTable>,
    report: Report,
}

impl Session {
    /// Fetches the configured source (through the cache for remote sources, bypassing it when
    /// `refresh` is set), decodes it and runs the pipeline on it.
    pub async fn load(config: &Config, refresh: bool) -> Result<Self> {
        let pipeline = Pipeline::from_config(config)?;
        let loader = config.loader(refresh);
        let location = config.source();
        let format = config.format()?;

        let fetched = loader.fetch(&location).await?;
        let name = location.name();
        let table = source::decode(&fetched.bytes, format, config.transactions_sheet(), &name)?;

        let summary_table = match config.summary()? {
            None => None,
            Some(SummaryLocation::Sheet(sheet)) => Some(source::decode(
                &fetched.bytes,
                format,
                Some(&sheet),
                &name,
            )?),
            Some(SummaryLocation::File(summary)) => {
                let bytes = loader.fetch(&summary).await?.bytes;
                Some(source::decode(
                    &bytes,
                    SourceFormat::Csv,
                    None,
                    &summary.name(),
                )?)
            }
        };

        let report = pipeline.run(&table, current_month())?;
        if report.dropped() > 0 {
            info!(
                "Dropped {} row{} of '{}' that could not be read",
                report.dropped(),
                if report.dropped() == 1 { "" } else { "s" },
                table.name()
            );
        }
        debug!(
            "Loaded {} records from {location}",
            report.records().len()
        );

        Ok(Self {
            pipeline,
            location,
            format,
            bytes: fetched.bytes,
            modified: fetched.modified,
            table,
            summary_table,
            report,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// The raw bytes as they were fetched.
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The modification time at load, for local sources.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn table(&self) -> &RawTable {
        &self.table
    }

    pub fn summary_table(&self) -> Option<&RawTable> {
        self.summary_table.as_ref()
    }

    pub fn report(&self) -> &Report {
        &self.report
    }
}
