//! Plain-text tables for the terminal.

use crate::aggregate::{MonthlySummary, SummaryRow};
use crate::categorize::Categorizer;
use crate::crosscheck::Discrepancy;
use crate::error::RowIssue;
use crate::model::{grouped, ExpenseRecord, Month};

/// Column alignment.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Align {
    Left,
    Right,
}

/// A table whose columns are as wide as their widest cell.
#[derive(Debug, Clone)]
struct TextTable {
    columns: Vec<(String, Align)>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn new<S: Into<String>>(columns: impl IntoIterator<Item = (S, Align)>) -> Self {
        Self {
            columns: columns.into_iter().map(|(h, a)| (h.into(), a)).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(ix, (header, _))| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(ix))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or_default()
            })
            .collect();

        let mut out = self.line(&widths, self.columns.iter().map(|(h, _)| h.as_str()));
        out.push('\n');
        out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&self.line(&widths, row.iter().map(String::as_str)));
        }
        out
    }

    fn line<'a>(&self, widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
        let padded: Vec<String> = cells
            .zip(self.columns.iter().zip(widths))
            .map(|(cell, ((_, align), &width))| match align {
                Align::Left => format!("{cell:<width$}"),
                Align::Right => format!("{cell:>width$}"),
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    }
}

/// Months as columns, summary rows as rows, followed by the year-to-date average.
pub fn summary_table(summary: &MonthlySummary) -> String {
    let mut columns = vec![("", Align::Left)];
    columns.extend(Month::ALL.iter().map(|m| (&m.label()[..3], Align::Right)));
    columns.push(("YTD Avg", Align::Right));
    let mut table = TextTable::new(columns);

    for row in SummaryRow::ALL {
        let mut cells = vec![row.label().to_string()];
        cells.extend(summary.row(row).iter().map(|(_, v)| grouped(v)));
        cells.push(
            summary
                .ytd_average(row)
                .map(grouped)
                .unwrap_or_else(|| "-".to_string()),
        );
        table.push(cells);
    }

    let mut out = table.render();
    match (summary.ytd_months().first(), summary.ytd_months().last()) {
        (Some(first), Some(last)) if first == last => {
            out.push_str(&format!("\n\nYear-to-date average over {first}"))
        }
        (Some(first), Some(last)) => out.push_str(&format!(
            "\n\nYear-to-date average over {} months, {first} to {last}",
            summary.ytd_months().len()
        )),
        _ => out.push_str("\n\nNo completed months yet for a year-to-date average"),
    }
    out
}

/// One numbered line per record. The numbers are what `delete --index` takes.
pub fn records_table(records: &[(usize, &ExpenseRecord)], categorizer: &Categorizer) -> String {
    let mut table = TextTable::new([
        ("#", Align::Right),
        ("Month", Align::Left),
        ("Description", Align::Left),
        ("Amount", Align::Right),
        ("Tag", Align::Left),
        ("Category", Align::Left),
    ]);
    for (number, record) in records {
        table.push(vec![
            number.to_string(),
            record.month().to_string(),
            record.description().to_string(),
            record.amount().grouped(),
            record.tag().to_string(),
            categorizer.categorize(record.tag()).to_string(),
        ]);
    }
    table.render()
}

pub fn issues_list(issues: &[RowIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn discrepancy_list(discrepancies: &[Discrepancy]) -> String {
    discrepancies
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}
