//! Compares a pre-computed summary sheet (one row per tag, one column per month) with the totals
//! derived from the records.
//!
//! The header is the first non-blank row. Its first cell labels the tag column, any other cell
//! that names a month marks a month column, and the remaining columns (e.g. a yearly total) are
//! ignored. Values are compared after rounding to cents.

use crate::aggregate::MonthlySummary;
use crate::categorize::TagMatch;
use crate::error::PipelineError;
use crate::model::{Amount, Cell, Month, RawTable, RowCol};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::debug;

/// One disagreement between the summary sheet and the records.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Discrepancy {
    /// Both sides have the tag but disagree on a month.
    Mismatch {
        tag: String,
        month: Month,
        sheet: Decimal,
        derived: Decimal,
    },
    /// The records have non-zero totals for a tag that the sheet does not list.
    MissingFromSheet { tag: String },
    /// The sheet lists non-zero values for a tag that no record carries.
    MissingFromRecords { tag: String },
    /// A sheet cell that is not a number.
    Unreadable { location: RowCol, text: String },
}

impl Display for Discrepancy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Discrepancy::Mismatch {
                tag,
                month,
                sheet,
                derived,
            } => write!(
                f,
                "'{tag}' in {month}: the summary sheet has {sheet}, the records add up to {derived}"
            ),
            Discrepancy::MissingFromSheet { tag } => {
                write!(f, "'{tag}' has records but is not in the summary sheet")
            }
            Discrepancy::MissingFromRecords { tag } => {
                write!(f, "'{tag}' is in the summary sheet but has no records")
            }
            Discrepancy::Unreadable { location, text } => {
                write!(f, "{}: '{text}' is not an amount", location.a1())
            }
        }
    }
}

struct SheetTag {
    tag: String,
    values: HashMap<Month, Decimal>,
}

/// Checks `sheet` against the per-tag totals of `summary`. Tags are matched with `tag_match`, the
/// same policy the categorizer used.
pub fn cross_check(
    sheet: &RawTable,
    summary: &MonthlySummary,
    tag_match: TagMatch,
) -> Result<Vec<Discrepancy>, PipelineError> {
    let header_row = sheet
        .rows()
        .iter()
        .position(|row| !row.iter().all(Cell::is_blank))
        .ok_or_else(|| PipelineError::shape("a tag by month header row", "an empty sheet"))?;

    let months: Vec<(usize, Month)> = sheet.rows()[header_row]
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(col, cell)| Month::from_str(&cell.text()).ok().map(|m| (col, m)))
        .collect();
    if months.is_empty() {
        return Err(PipelineError::shape(
            "month names in the header row of the summary sheet",
            format!("no month columns in row {}", header_row + 1),
        ));
    }

    let mut discrepancies = Vec::new();
    let mut listed: Vec<(String, SheetTag)> = Vec::new();
    for row_ix in header_row + 1..sheet.rows().len() {
        let tag = sheet.cell(row_ix, 0).text();
        if tag.is_empty() {
            continue;
        }
        let mut values = HashMap::new();
        for &(col, month) in &months {
            match sheet.cell(row_ix, col) {
                Cell::Empty => {}
                Cell::Number(n) => {
                    values.insert(month, *n);
                }
                Cell::Text(text) => match Amount::from_str(text) {
                    Ok(amount) => {
                        values.insert(month, amount.value());
                    }
                    Err(_) if text.trim().is_empty() => {}
                    Err(_) => discrepancies.push(Discrepancy::Unreadable {
                        location: RowCol::new(row_ix, col),
                        text: text.trim().to_string(),
                    }),
                },
            }
        }
        listed.push((tag_match.key(&tag), SheetTag { tag, values }));
    }
    debug!(
        "The summary sheet '{}' lists {} tags over {} months",
        sheet.name(),
        listed.len(),
        months.len()
    );

    let derived: HashMap<String, _> = summary
        .tag_totals()
        .iter()
        .map(|t| (tag_match.key(&t.tag), t))
        .collect();

    for (key, listed_tag) in &listed {
        let Some(totals) = derived.get(key) else {
            if listed_tag.values.values().any(|v| !v.is_zero()) {
                discrepancies.push(Discrepancy::MissingFromRecords {
                    tag: listed_tag.tag.clone(),
                });
            }
            continue;
        };
        for &(_, month) in &months {
            let sheet_value = listed_tag
                .values
                .get(&month)
                .copied()
                .unwrap_or_default()
                .round_dp(2);
            let derived_value = totals.values[month].round_dp(2);
            if sheet_value != derived_value {
                discrepancies.push(Discrepancy::Mismatch {
                    tag: listed_tag.tag.clone(),
                    month,
                    sheet: sheet_value,
                    derived: derived_value,
                });
            }
        }
    }

    for totals in summary.tag_totals() {
        let key = tag_match.key(&totals.tag);
        let in_sheet_months = months.iter().any(|&(_, m)| !totals.values[m].is_zero());
        if in_sheet_months && !listed.iter().any(|(k, _)| *k == key) {
            discrepancies.push(Discrepancy::MissingFromSheet {
                tag: totals.tag.clone(),
            });
        }
    }

    Ok(discrepancies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, YtdPolicy};
    use crate::categorize::Categorizer;
    use crate::model::{CategoryMap, ExpenseRecord};

    fn summary() -> MonthlySummary {
        let map = CategoryMap::new(1, ["Stipendio"], ["Affitto"], ["Cibo"]);
        let categorizer = Categorizer::new(&map, TagMatch::Normalized).unwrap();
        let r = |a: &str, t: &str, m| {
            ExpenseRecord::new("", Decimal::from_str(a).unwrap(), t, m).unwrap()
        };
        let records = vec![
            r("2000", "Stipendio", Month::January),
            r("800", "Affitto", Month::January),
            r("800", "Affitto", Month::February),
            r("12.40", "Cibo", Month::January),
            r("30", "Regali", Month::February),
        ];
        Aggregator::new(&categorizer)
            .aggregate(&records, YtdPolicy::RecordedMonths)
            .unwrap()
    }

    #[test]
    fn test_sheet_values_are_compared_per_month() {
        let sheet = RawTable::from_fields(
            "Riepilogo",
            vec![
                vec!["Tag", "Gennaio", "Febbraio", "Totale"],
                vec!["stipendio", "2.000,00", "", "2000"],
                vec!["Affitto", "800", "850,00", "1600"],
                vec!["Cibo", "12,4", "0", ""],
                vec!["Regali", "", "30", ""],
                vec!["", "", "", ""],
            ],
        );
        let found = cross_check(&sheet, &summary(), TagMatch::Normalized).unwrap();
        assert_eq!(
            found,
            vec![Discrepancy::Mismatch {
                tag: "Affitto".into(),
                month: Month::February,
                sheet: Decimal::from_str("850.00").unwrap(),
                derived: Decimal::from_str("800.00").unwrap(),
            }]
        );
    }

    #[test]
    fn test_missing_tags_on_either_side() {
        let sheet = RawTable::from_fields(
            "Riepilogo",
            vec![
                vec!["", "January", "February"],
                vec!["Stipendio", "2000", ""],
                vec!["Affitto", "800", "800"],
                vec!["Cibo", "12.40", "Totale"],
                vec!["Bollette", "60", ""],
                vec!["Vuoto", "0", ""],
            ],
        );
        let found = cross_check(&sheet, &summary(), TagMatch::Normalized).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.contains(&Discrepancy::Unreadable {
            location: RowCol::new(3, 2),
            text: "Totale".into(),
        }));
        assert!(found.contains(&Discrepancy::MissingFromRecords {
            tag: "Bollette".into()
        }));
        assert!(found.contains(&Discrepancy::MissingFromSheet {
            tag: "Regali".into()
        }));
    }

    #[test]
    fn test_sheet_without_month_columns() {
        let sheet = RawTable::from_fields("Riepilogo", vec![vec!["Tag", "Totale"]]);
        let err = cross_check(&sheet, &summary(), TagMatch::Normalized).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_discrepancy_display() {
        let d = Discrepancy::Mismatch {
            tag: "Cibo".into(),
            month: Month::March,
            sheet: Decimal::from(10),
            derived: Decimal::from(12),
        };
        assert_eq!(
            d.to_string(),
            "'Cibo' in March: the summary sheet has 10, the records add up to 12"
        );
    }
}
