//! CSV renderings of a summary and of a record set. Amounts always have two decimals and comma
//! grouping, e.g. `1,234.50`.

use crate::aggregate::{MonthlySummary, SummaryRow};
use crate::categorize::Categorizer;
use crate::model::{grouped, ExpenseRecord, Month};
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const YTD_AVERAGE: &str = "YTD Average";

/// What the `export` command writes.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    /// One row per summary row, one column per month, then the year-to-date average.
    #[default]
    Summary,
    /// One row per record, with its macro-category.
    Records,
}

serde_plain::derive_display_from_serialize!(ExportKind);
serde_plain::derive_fromstr_from_deserialize!(ExportKind);

/// The summary as CSV. The `YTD Average` cell is blank for rows without an average and when the
/// window is empty.
pub fn summary_csv(summary: &MonthlySummary) -> Result<String> {
    let mut header = vec!["Row".to_string()];
    header.extend(Month::ALL.iter().map(|m| m.label().to_string()));
    header.push(YTD_AVERAGE.to_string());

    let mut rows = vec![header];
    for row in SummaryRow::ALL {
        let mut fields = vec![row.label().to_string()];
        fields.extend(summary.row(row).iter().map(|(_, value)| grouped(value)));
        fields.push(
            summary
                .ytd_average(row)
                .filter(|_| row.has_ytd_average())
                .map(grouped)
                .unwrap_or_default(),
        );
        rows.push(fields);
    }
    to_string(rows)
}

/// The records as CSV, in the order given.
pub fn records_csv(records: &[ExpenseRecord], categorizer: &Categorizer) -> Result<String> {
    let mut rows = vec![["Month", "Description", "Amount", "Tag", "Category"].map(String::from)];
    for record in records {
        rows.push([
            record.month().label().to_string(),
            record.description().to_string(),
            record.amount().grouped(),
            record.tag().to_string(),
            categorizer.categorize(record.tag()).to_string(),
        ]);
    }
    to_string(rows)
}

fn to_string<R>(rows: impl IntoIterator<Item = R>) -> Result<String>
where
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .write_record(row)
            .context("Unable to serialize a CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}
