//! Turns a `RawTable` in one of the supported layouts into canonical `ExpenseRecord`s.
//!
//! Table-level problems (missing or malformed headers) fail the whole table with
//! `PipelineError::ShapeMismatch`. Row-level problems never fail the table: the row is dropped
//! and a `RowIssue` is recorded so that the caller can report how many rows were lost.

use crate::error::{IssueKind, PipelineError, RowIssue};
use crate::model::{
    Amount, Cell, ExpenseRecord, Layout, Mapping, Month, MonthSource, RawTable, RowCol, RowHeaders,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Accepted inner header labels of a column block, in block order.
const BLOCK_LABELS: [[&str; 2]; 3] = [
    ["Description", "Descrizione"],
    ["Amount", "Importo"],
    ["Tag", "Categoria"],
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// What to do with a row whose amount cell is not a number.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPolicy {
    /// Drop the row and report it.
    #[default]
    Drop,
    /// Keep the row with an amount of zero, and still report it.
    Zero,
}

serde_plain::derive_display_from_serialize!(AmountPolicy);
serde_plain::derive_fromstr_from_deserialize!(AmountPolicy);

/// The layout details observed while normalizing, kept so that an edited record set can be written
/// back in the same shape it was read in.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SheetShape {
    Rows {
        /// Index of the header row; rows above it are preamble.
        header_row: usize,
        columns: RowColumns,
    },
    Blocks {
        /// The inner header labels of the first block.
        labels: [String; 3],
        /// Blocks in sheet order.
        blocks: Vec<Block>,
    },
}

/// One month of a column-block sheet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Block {
    pub month: Month,
    /// The month header exactly as found, e.g. `Gennaio`.
    pub label: String,
    /// The column of the block's description cell.
    pub start: usize,
}

/// Column positions of the record fields in a row-oriented sheet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RowColumns {
    pub description: usize,
    pub amount: usize,
    pub tag: usize,
    pub month: MonthColumn,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MonthColumn {
    Column(usize),
    Fixed(Month),
}

/// The result of normalizing one table.
#[derive(Debug, Clone)]
pub struct Normalized {
    records: Vec<ExpenseRecord>,
    /// The row each record was read from, parallel to `records`.
    origins: Vec<usize>,
    issues: Vec<RowIssue>,
    shape: SheetShape,
}

impl Normalized {
    pub fn records(&self) -> &[ExpenseRecord] {
        &self.records
    }

    /// The source row index of each record, in the same order as `records()`.
    pub fn origins(&self) -> &[usize] {
        &self.origins
    }

    pub fn issues(&self) -> &[RowIssue] {
        &self.issues
    }

    pub fn shape(&self) -> &SheetShape {
        &self.shape
    }

    /// The number of rows that were dropped because of a `RowIssue`.
    pub fn dropped(&self) -> usize {
        self.issues.iter().filter(|i| i.dropped()).count()
    }
}

/// Converts raw tables into records according to a `Layout`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    layout: Layout,
    amount_policy: AmountPolicy,
}

impl Normalizer {
    pub fn new(layout: Layout, amount_policy: AmountPolicy) -> Self {
        Self {
            layout,
            amount_policy,
        }
    }

    pub fn normalize(&self, table: &RawTable) -> Result<Normalized, PipelineError> {
        let normalized = match &self.layout {
            Layout::RowOriented { headers, month } => self.normalize_rows(table, headers, month)?,
            Layout::ColumnBlock => self.normalize_blocks(table)?,
        };
        debug!(
            "Normalized {} records from '{}', {} row issues",
            normalized.records.len(),
            table.name(),
            normalized.issues.len()
        );
        Ok(normalized)
    }

    fn normalize_rows(
        &self,
        table: &RawTable,
        headers: &RowHeaders,
        month: &MonthSource,
    ) -> Result<Normalized, PipelineError> {
        let mut wanted = vec![
            headers.description.as_str(),
            headers.amount.as_str(),
            headers.tag.as_str(),
        ];
        if let MonthSource::Column(name) = month {
            wanted.push(name.as_str());
        }
        let expected = format!("headers {}", quoted(&wanted));

        let header_ix = table
            .rows()
            .iter()
            .position(|row| !row.iter().all(Cell::is_blank))
            .ok_or_else(|| PipelineError::shape(expected.clone(), "an empty sheet"))?;

        let header: Vec<String> = table.rows()[header_ix].iter().map(Cell::text).collect();
        let mapping = Mapping::new(header)
            .map_err(|e| PipelineError::shape("unique header names", e.to_string()))?;

        let missing: Vec<&str> = wanted
            .iter()
            .copied()
            .filter(|name| mapping.index_of(name).is_none())
            .collect();
        if !missing.is_empty() {
            let found: Vec<String> = mapping.headers().iter().map(|h| h.to_string()).collect();
            return Err(PipelineError::shape(
                expected,
                format!("headers {} (missing {})", quoted(&found), quoted(&missing)),
            ));
        }

        // All lookups succeeded above.
        let column = |name: &str| mapping.index_of(name).unwrap_or_default();
        let columns = RowColumns {
            description: column(&headers.description),
            amount: column(&headers.amount),
            tag: column(&headers.tag),
            month: match month {
                MonthSource::Column(name) => MonthColumn::Column(column(name)),
                MonthSource::Fixed(m) => MonthColumn::Fixed(*m),
            },
        };

        let mut out = Collector::default();
        for row_ix in header_ix + 1..table.rows().len() {
            let fields = [columns.description, columns.amount, columns.tag];
            let cells = fields.map(|col| table.cell(row_ix, col));
            let month_cell = match columns.month {
                MonthColumn::Column(col) => Some((col, table.cell(row_ix, col))),
                MonthColumn::Fixed(_) => None,
            };
            if cells.iter().all(|c| c.is_blank())
                && month_cell.map_or(true, |(_, c)| c.is_blank())
            {
                continue;
            }

            let month = match (columns.month, month_cell) {
                (MonthColumn::Fixed(m), _) => m,
                (MonthColumn::Column(col), Some((_, cell))) => match parse_month(cell) {
                    Ok(m) => m,
                    Err(text) => {
                        out.issues.push(RowIssue::new(
                            RowCol::new(row_ix, col),
                            IssueKind::InvalidMonth(text),
                            true,
                        ));
                        continue;
                    }
                },
                (MonthColumn::Column(_), None) => continue,
            };

            self.build(row_ix, fields, cells, month, &mut out);
        }

        Ok(out.finish(SheetShape::Rows {
            header_row: header_ix,
            columns,
        }))
    }

    fn normalize_blocks(&self, table: &RawTable) -> Result<Normalized, PipelineError> {
        let expected_headers = "two header rows: month names, then description/amount/tag";
        if table.rows().len() < 2 {
            return Err(PipelineError::shape(
                expected_headers,
                format!("{} row(s)", table.rows().len()),
            ));
        }

        let width = table.width();
        let mut blocks: Vec<Block> = Vec::new();
        let mut labels: Option<[String; 3]> = None;
        let mut col = 0;
        while col < width {
            let outer = table.cell(0, col);
            if outer.is_blank() && table.cell(1, col).is_blank() {
                // spacer column
                col += 1;
                continue;
            }

            let label = outer.text();
            let at = RowCol::new(0, col).a1();
            let month = Month::from_str(&label).map_err(|_| {
                PipelineError::shape(format!("a month name at {at}"), format!("'{label}'"))
            })?;

            // A merged month header leaves the other two cells blank; some exports repeat it.
            for offset in 1..3 {
                let cell = table.cell(0, col + offset);
                if !cell.is_blank() && Month::from_str(&cell.text()).ok() != Some(month) {
                    return Err(PipelineError::shape(
                        format!(
                            "blank or '{label}' at {}",
                            RowCol::new(0, col + offset).a1()
                        ),
                        format!("'{}'", cell.text()),
                    ));
                }
            }

            let inner: [String; 3] = [0, 1, 2].map(|offset| table.cell(1, col + offset).text());
            for (offset, (found, accepted)) in inner.iter().zip(BLOCK_LABELS.iter()).enumerate() {
                if !accepted.iter().any(|a| a.eq_ignore_ascii_case(found)) {
                    return Err(PipelineError::shape(
                        format!(
                            "'{}' at {}",
                            accepted[0],
                            RowCol::new(1, col + offset).a1()
                        ),
                        format!("'{found}'"),
                    ));
                }
            }

            if blocks.iter().any(|b| b.month == month) {
                return Err(PipelineError::shape(
                    "one block per month",
                    format!("a second '{label}' block at {at}"),
                ));
            }

            labels.get_or_insert(inner);
            blocks.push(Block {
                month,
                label,
                start: col,
            });
            col += 3;
        }

        let labels = labels.ok_or_else(|| {
            PipelineError::shape(expected_headers, "no month blocks in the first row")
        })?;

        let mut out = Collector::default();
        for block in &blocks {
            let fields = [block.start, block.start + 1, block.start + 2];
            for row_ix in 2..table.rows().len() {
                let cells = fields.map(|col| table.cell(row_ix, col));
                if cells.iter().all(|c| c.is_blank()) {
                    continue;
                }
                self.build(row_ix, fields, cells, block.month, &mut out);
            }
        }

        Ok(out.finish(SheetShape::Blocks { labels, blocks }))
    }

    /// Builds a record from the `[description, amount, tag]` cells of one row, or records why it
    /// could not.
    fn build(
        &self,
        row: usize,
        columns: [usize; 3],
        cells: [&Cell; 3],
        month: Month,
        out: &mut Collector,
    ) {
        let [description, amount, tag] = cells;
        if tag.is_blank() {
            out.issues.push(RowIssue::new(
                RowCol::new(row, columns[2]),
                IssueKind::MissingTag,
                true,
            ));
            return;
        }

        let amount = match parse_amount(amount) {
            Ok(amount) => amount,
            Err(text) => {
                let keep = self.amount_policy == AmountPolicy::Zero;
                out.issues.push(RowIssue::new(
                    RowCol::new(row, columns[1]),
                    IssueKind::UnparseableAmount(text),
                    !keep,
                ));
                if !keep {
                    return;
                }
                Amount::default()
            }
        };

        // The tag was checked for blankness above.
        if let Some(record) = ExpenseRecord::new(description.text(), amount, tag.text(), month) {
            out.records.push(record);
            out.origins.push(row);
        }
    }
}

#[derive(Default)]
struct Collector {
    records: Vec<ExpenseRecord>,
    origins: Vec<usize>,
    issues: Vec<RowIssue>,
}

impl Collector {
    fn finish(self, shape: SheetShape) -> Normalized {
        Normalized {
            records: self.records,
            origins: self.origins,
            issues: self.issues,
            shape,
        }
    }
}

fn parse_amount(cell: &Cell) -> Result<Amount, String> {
    match cell {
        Cell::Number(n) => Ok(Amount::new(*n)),
        Cell::Text(s) => Amount::from_str(s).map_err(|_| s.trim().to_string()),
        Cell::Empty => Err(String::new()),
    }
}

/// Reads a month from a month name or from a date.
fn parse_month(cell: &Cell) -> Result<Month, String> {
    let text = match cell {
        Cell::Text(s) => s.trim(),
        Cell::Number(_) | Cell::Empty => return Err(cell.text()),
    };
    if let Ok(month) = Month::from_str(text) {
        return Ok(month);
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
        .map(|date| Month::of(&date))
        .ok_or_else(|| text.to_string())
}

fn quoted<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn month_column() -> Normalizer {
        Normalizer::new(
            Layout::row_oriented(MonthSource::Column("Month".into())),
            AmountPolicy::Drop,
        )
    }

    fn blocks() -> Normalizer {
        Normalizer::new(Layout::ColumnBlock, AmountPolicy::Drop)
    }

    #[test]
    fn test_row_oriented_with_month_column() {
        let table = RawTable::from_fields(
            "Spese 2025",
            vec![
                vec!["Description", "Amount", "Tag", "Month"],
                vec!["Rent", "800.00", "Rent", "January"],
                vec!["Paycheck", "€2,000.00", "Salary", "Gennaio"],
                vec!["Train", "45", "Travel", "2025-02-14"],
            ],
        );
        let normalized = month_column().normalize(&table).unwrap();
        assert_eq!(normalized.dropped(), 0);
        let records = normalized.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].amount().value(), dec("2000"));
        assert_eq!(records[1].month(), Month::January);
        assert_eq!(records[2].month(), Month::February);
    }

    #[test]
    fn test_date_column_gives_the_month() {
        let layout = Layout::RowOriented {
            headers: RowHeaders {
                description: "Descrizione".into(),
                amount: "Importo".into(),
                tag: "Tag".into(),
            },
            month: MonthSource::Column("Data".into()),
        };
        let table = RawTable::from_fields(
            "Spese",
            vec![
                vec!["Data", "Descrizione", "Tag", "Importo"],
                vec!["2025-03-31", "Affitto", "Affitto", "800,00"],
                vec!["14/02/2025", "Treno", "Viaggi", "45"],
                vec!["2025-12-01 18:30:00", "Cena", "Cibo", "32.50"],
                vec!["31/31/2025", "Pizza", "Cibo", "12"],
            ],
        );
        let normalized = Normalizer::new(layout, AmountPolicy::Drop)
            .normalize(&table)
            .unwrap();
        let months: Vec<Month> = normalized.records().iter().map(|r| r.month()).collect();
        assert_eq!(months, [Month::March, Month::February, Month::December]);
        assert_eq!(normalized.records()[0].amount().value(), dec("800"));
        assert_eq!(
            normalized.issues()[0].kind(),
            &IssueKind::InvalidMonth("31/31/2025".into())
        );
    }

    #[test]
    fn test_row_oriented_fixed_month_and_custom_headers() {
        let layout = Layout::RowOriented {
            headers: RowHeaders {
                description: "Descrizione".into(),
                amount: "Importo".into(),
                tag: "Tag".into(),
            },
            month: MonthSource::Fixed(Month::March),
        };
        let table = RawTable::from_fields(
            "Marzo",
            vec![
                vec!["", "", ""],
                vec!["tag", "IMPORTO", "descrizione"],
                vec!["Cibo", "12.40", "Pizza"],
            ],
        );
        let normalized = Normalizer::new(layout, AmountPolicy::Drop)
            .normalize(&table)
            .unwrap();
        let records = normalized.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description(), "Pizza");
        assert_eq!(records[0].tag(), "Cibo");
        assert_eq!(records[0].month(), Month::March);
        assert_eq!(normalized.origins(), [2]);
        match normalized.shape() {
            SheetShape::Rows {
                header_row,
                columns,
            } => {
                assert_eq!(*header_row, 1);
                assert_eq!(columns.amount, 1);
                assert_eq!(columns.month, MonthColumn::Fixed(Month::March));
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_amount_is_dropped_and_counted() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Description", "Amount", "Tag", "Month"],
                vec!["Coffee", "3.50", "Dining", "May"],
                vec!["Sum", "Total", "Dining", "May"],
            ],
        );
        let normalized = month_column().normalize(&table).unwrap();
        assert_eq!(normalized.records().len(), 1);
        assert_eq!(normalized.dropped(), 1);
        assert_eq!(
            normalized.issues()[0].kind(),
            &IssueKind::UnparseableAmount("Total".into())
        );
        assert_eq!(normalized.issues()[0].location(), RowCol::new(2, 1));
    }

    #[test]
    fn test_zero_policy_keeps_row_and_reports_it() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Description", "Amount", "Tag", "Month"],
                vec!["Sum", "n/a", "Dining", "May"],
            ],
        );
        let normalizer = Normalizer::new(
            Layout::row_oriented(MonthSource::Column("Month".into())),
            AmountPolicy::Zero,
        );
        let normalized = normalizer.normalize(&table).unwrap();
        assert_eq!(normalized.records().len(), 1);
        assert!(normalized.records()[0].amount().is_zero());
        assert_eq!(normalized.issues().len(), 1);
        assert_eq!(normalized.dropped(), 0);
    }

    #[test]
    fn test_missing_tag_and_bad_month_are_dropped() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Description", "Amount", "Tag", "Month"],
                vec!["Totale", "1000", "", "May"],
                vec!["Coffee", "2", "Dining", "Maggio 2025"],
                vec!["", "", "", ""],
            ],
        );
        let normalized = month_column().normalize(&table).unwrap();
        assert!(normalized.records().is_empty());
        assert_eq!(normalized.dropped(), 2);
        assert_eq!(normalized.issues()[0].kind(), &IssueKind::MissingTag);
        assert_eq!(
            normalized.issues()[1].kind(),
            &IssueKind::InvalidMonth("Maggio 2025".into())
        );
    }

    #[test]
    fn test_missing_header_is_a_shape_mismatch() {
        let table = RawTable::from_fields(
            "t",
            vec![vec!["Description", "Amount", "Month"], vec!["a", "1", "May"]],
        );
        let err = month_column().normalize(&table).unwrap_err();
        match err {
            PipelineError::ShapeMismatch { expected, found } => {
                assert!(expected.contains("'Tag'"));
                assert!(found.contains("missing 'Tag'"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_empty_sheet_is_a_shape_mismatch() {
        let table = RawTable::from_fields("t", Vec::<Vec<&str>>::new());
        assert!(matches!(
            month_column().normalize(&table),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_header_only_is_empty_not_an_error() {
        let table = RawTable::from_fields("t", vec![vec!["Description", "Amount", "Tag", "Month"]]);
        let normalized = month_column().normalize(&table).unwrap();
        assert!(normalized.records().is_empty());
        assert_eq!(normalized.dropped(), 0);

        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["January", "", ""],
                vec!["Description", "Amount", "Tag"],
            ],
        );
        let normalized = blocks().normalize(&table).unwrap();
        assert!(normalized.records().is_empty());
    }

    #[test]
    fn test_column_blocks_are_unioned_per_month() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["January", "", "", "February", "", ""],
                vec!["Description", "Amount", "Tag", "Description", "Amount", "Tag"],
                vec!["Coffee", "3.50", "Dining", "Coffee", "4.00", "Dining"],
            ],
        );
        let normalized = blocks().normalize(&table).unwrap();
        let records = normalized.records();
        assert_eq!(records.len(), 2);
        let jan = records.iter().find(|r| r.month() == Month::January).unwrap();
        let feb = records.iter().find(|r| r.month() == Month::February).unwrap();
        assert_eq!(jan.amount().value(), dec("3.50"));
        assert_eq!(feb.amount().value(), dec("4.00"));
        assert_eq!(jan.tag(), "Dining");
    }

    #[test]
    fn test_column_blocks_skip_blank_triplets_and_spacers() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Gennaio", "Gennaio", "Gennaio", "", "Febbraio", "", ""],
                vec!["Descrizione", "Importo", "Tag", "", "Descrizione", "Importo", "Tag"],
                vec!["Affitto", "800", "Affitto", "", "", "", ""],
                vec!["", "", "", "", "Cinema", "9", "Tempo libero"],
                vec!["Pizza", "x", "Cibo", "", "", "", ""],
            ],
        );
        let normalized = blocks().normalize(&table).unwrap();
        assert_eq!(normalized.records().len(), 2);
        assert_eq!(normalized.dropped(), 1);
        assert_eq!(normalized.issues()[0].location(), RowCol::new(4, 1));
        match normalized.shape() {
            SheetShape::Blocks { labels, blocks } => {
                assert_eq!(labels[1], "Importo");
                let found: Vec<(Month, &str, usize)> = blocks
                    .iter()
                    .map(|b| (b.month, b.label.as_str(), b.start))
                    .collect();
                assert_eq!(
                    found,
                    vec![(Month::January, "Gennaio", 0), (Month::February, "Febbraio", 4)]
                );
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_column_block_rejects_unknown_month() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Totale", "", ""],
                vec!["Description", "Amount", "Tag"],
            ],
        );
        let err = blocks().normalize(&table).unwrap_err();
        assert!(err.to_string().contains("a month name at A1"));
    }

    #[test]
    fn test_column_block_rejects_wrong_triplet_order() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["January", "", ""],
                vec!["Description", "Tag", "Amount"],
            ],
        );
        let err = blocks().normalize(&table).unwrap_err();
        assert!(err.to_string().contains("'Amount' at B2"));
    }

    #[test]
    fn test_column_block_rejects_duplicate_month() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["January", "", "", "january", "", ""],
                vec!["Description", "Amount", "Tag", "Description", "Amount", "Tag"],
            ],
        );
        let err = blocks().normalize(&table).unwrap_err();
        assert!(err.to_string().contains("one block per month"));
    }

    #[test]
    fn test_column_block_needs_two_header_rows() {
        let table = RawTable::from_fields("t", vec![vec!["January", "", ""]]);
        assert!(matches!(
            blocks().normalize(&table),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_number_cells() {
        let table = RawTable::new(
            "t",
            vec![
                vec!["January".into(), Cell::Empty, Cell::Empty],
                vec!["Description".into(), "Amount".into(), "Tag".into()],
                vec!["Coffee".into(), Cell::Number(dec("3.5")), "Dining".into()],
            ],
        );
        let normalized = blocks().normalize(&table).unwrap();
        assert_eq!(normalized.records()[0].amount().value(), dec("3.5"));
    }
}
