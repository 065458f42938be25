//! Computes the `MonthlySummary` of a categorized record set.
//!
//! All sums are `Decimal` additions, which are exact, so the result does not depend on the order of
//! the records and re-running an aggregation always gives identical values. A sum that leaves the
//! range of `Decimal` fails the aggregation with `PipelineError::Overflow`.

use crate::categorize::Categorizer;
use crate::error::PipelineError;
use crate::model::{ExpenseRecord, MacroCategory, Month};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Index, IndexMut};

/// Twelve values in calendar order, zero where nothing was recorded.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct MonthValues([Decimal; 12]);

impl MonthValues {
    pub fn iter(&self) -> impl Iterator<Item = (Month, Decimal)> + '_ {
        Month::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// The sum of all twelve months, `None` if it overflows.
    pub fn total(&self) -> Option<Decimal> {
        self.sum(&Month::ALL)
    }

    /// The sum over `months`, `None` if it overflows.
    pub fn sum(&self, months: &[Month]) -> Option<Decimal> {
        months
            .iter()
            .try_fold(Decimal::ZERO, |acc, &m| acc.checked_add(self[m]))
    }

    fn add(&mut self, month: Month, amount: Decimal) -> Option<()> {
        self[month] = self[month].checked_add(amount)?;
        Some(())
    }
}

impl Index<Month> for MonthValues {
    type Output = Decimal;

    fn index(&self, month: Month) -> &Self::Output {
        &self.0[month.index()]
    }
}

impl IndexMut<Month> for MonthValues {
    fn index_mut(&mut self, month: Month) -> &mut Self::Output {
        &mut self.0[month.index()]
    }
}

impl Serialize for MonthValues {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(12))?;
        for (month, value) in self.iter() {
            map.serialize_entry(month.label(), &value)?;
        }
        map.end()
    }
}

/// The rows of a `MonthlySummary`, in display order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryRow {
    Income,
    NecessaryExpense,
    DiscretionaryExpense,
    Other,
    SavingsThisMonth,
    CumulativeSavings,
}

serde_plain::derive_display_from_serialize!(SummaryRow);
serde_plain::derive_fromstr_from_deserialize!(SummaryRow);

impl SummaryRow {
    pub const ALL: [SummaryRow; 6] = [
        SummaryRow::Income,
        SummaryRow::NecessaryExpense,
        SummaryRow::DiscretionaryExpense,
        SummaryRow::Other,
        SummaryRow::SavingsThisMonth,
        SummaryRow::CumulativeSavings,
    ];

    /// A human-readable label for tables and exports.
    pub fn label(self) -> &'static str {
        match self {
            SummaryRow::Income => "Income",
            SummaryRow::NecessaryExpense => "Necessary Expenses",
            SummaryRow::DiscretionaryExpense => "Discretionary Expenses",
            SummaryRow::Other => "Other",
            SummaryRow::SavingsThisMonth => "Savings This Month",
            SummaryRow::CumulativeSavings => "Cumulative Savings",
        }
    }

    /// Whether a year-to-date average is computed for this row. A running total has no meaningful
    /// average, so `CumulativeSavings` is the only row without one.
    pub fn has_ytd_average(self) -> bool {
        self != SummaryRow::CumulativeSavings
    }
}

impl From<MacroCategory> for SummaryRow {
    fn from(category: MacroCategory) -> Self {
        match category {
            MacroCategory::Income => SummaryRow::Income,
            MacroCategory::NecessaryExpense => SummaryRow::NecessaryExpense,
            MacroCategory::DiscretionaryExpense => SummaryRow::DiscretionaryExpense,
            MacroCategory::Other => SummaryRow::Other,
        }
    }
}

/// How the configuration chooses the year-to-date window. Resolved into a `YtdPolicy` by the
/// caller, which is the only place that reads the clock.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YtdWindow {
    /// January up to, but excluding, the current calendar month.
    #[default]
    Calendar,
    /// Every month that has at least one record.
    RecordedMonths,
}

serde_plain::derive_display_from_serialize!(YtdWindow);
serde_plain::derive_fromstr_from_deserialize!(YtdWindow);

impl YtdWindow {
    pub fn resolve(self, current: Month) -> YtdPolicy {
        match self {
            YtdWindow::Calendar => YtdPolicy::Calendar { current },
            YtdWindow::RecordedMonths => YtdPolicy::RecordedMonths,
        }
    }
}

/// The months that a year-to-date average is taken over.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum YtdPolicy {
    Calendar { current: Month },
    RecordedMonths,
}

/// The totals of one tag, used by the summary-sheet cross-check and the records breakdown.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TagTotals {
    /// The lexicographically smallest spelling of the tag among the records, so that `Dining` and
    /// `dining` under normalized matching always show as `Dining`.
    pub tag: String,
    pub category: MacroCategory,
    pub values: MonthValues,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MonthlySummary {
    category_map_version: u32,
    record_count: usize,
    rows: BTreeMap<SummaryRow, MonthValues>,
    /// The months the averages were taken over; empty when the window was empty.
    ytd_months: Vec<Month>,
    ytd_average: BTreeMap<SummaryRow, Decimal>,
    tag_totals: Vec<TagTotals>,
}

impl MonthlySummary {
    pub fn category_map_version(&self) -> u32 {
        self.category_map_version
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn row(&self, row: SummaryRow) -> MonthValues {
        self.rows.get(&row).copied().unwrap_or_default()
    }

    pub fn get(&self, row: SummaryRow, month: Month) -> Decimal {
        self.row(row)[month]
    }

    /// `None` when the year-to-date window is empty, e.g. in January under the calendar policy.
    pub fn ytd_average(&self, row: SummaryRow) -> Option<Decimal> {
        self.ytd_average.get(&row).copied()
    }

    pub fn ytd_months(&self) -> &[Month] {
        &self.ytd_months
    }

    /// Per-tag totals ordered by category, then by tag.
    pub fn tag_totals(&self) -> &[TagTotals] {
        &self.tag_totals
    }
}

pub struct Aggregator<'a> {
    categorizer: &'a Categorizer,
}

impl<'a> Aggregator<'a> {
    pub fn new(categorizer: &'a Categorizer) -> Self {
        Self { categorizer }
    }

    pub fn aggregate(
        &self,
        records: &[ExpenseRecord],
        ytd: YtdPolicy,
    ) -> Result<MonthlySummary, PipelineError> {
        let mut rows: BTreeMap<SummaryRow, MonthValues> = SummaryRow::ALL
            .into_iter()
            .map(|row| (row, MonthValues::default()))
            .collect();
        let mut tags: HashMap<String, TagTotals> = HashMap::new();
        let mut recorded = BTreeSet::new();
        let tag_match = self.categorizer.tag_match();

        for record in records {
            let category = self.categorizer.categorize(record.tag());
            let row = SummaryRow::from(category);
            let month = record.month();
            let amount = record.amount().value();
            recorded.insert(month);

            if let Some(values) = rows.get_mut(&row) {
                values
                    .add(month, amount)
                    .ok_or_else(|| overflow(format!("the {} total for {month}", row.label())))?;
            }
            let totals = tags
                .entry(tag_match.key(record.tag()))
                .or_insert_with(|| TagTotals {
                    tag: record.tag().to_string(),
                    category,
                    values: MonthValues::default(),
                });
            if record.tag() < totals.tag.as_str() {
                totals.tag = record.tag().to_string();
            }
            totals
                .values
                .add(month, amount)
                .ok_or_else(|| overflow(format!("the '{}' total for {month}", record.tag())))?;
        }

        let row = |r: SummaryRow| rows.get(&r).copied().unwrap_or_default();
        let (income, necessary, discretionary) = (
            row(SummaryRow::Income),
            row(SummaryRow::NecessaryExpense),
            row(SummaryRow::DiscretionaryExpense),
        );
        let mut savings = MonthValues::default();
        let mut cumulative = MonthValues::default();
        let mut running = Decimal::ZERO;
        for month in Month::ALL {
            savings[month] = income[month]
                .checked_sub(necessary[month])
                .and_then(|v| v.checked_sub(discretionary[month]))
                .ok_or_else(|| overflow(format!("the savings for {month}")))?;
            running = running
                .checked_add(savings[month])
                .ok_or_else(|| overflow(format!("the cumulative savings for {month}")))?;
            cumulative[month] = running;
        }
        rows.insert(SummaryRow::SavingsThisMonth, savings);
        rows.insert(SummaryRow::CumulativeSavings, cumulative);

        let ytd_months: Vec<Month> = match ytd {
            YtdPolicy::Calendar { current } => Month::ALL[..current.index()].to_vec(),
            YtdPolicy::RecordedMonths => recorded.into_iter().collect(),
        };
        let mut ytd_average = BTreeMap::new();
        if !ytd_months.is_empty() {
            let count = Decimal::from(ytd_months.len());
            for (row, values) in rows.iter().filter(|(row, _)| row.has_ytd_average()) {
                let mean = values
                    .sum(&ytd_months)
                    .and_then(|sum| sum.checked_div(count))
                    .ok_or_else(|| {
                        overflow(format!("the year-to-date average of {}", row.label()))
                    })?;
                ytd_average.insert(*row, mean);
            }
        }

        let mut tag_totals: Vec<TagTotals> = tags.into_values().collect();
        tag_totals.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.tag.cmp(&b.tag))
        });

        Ok(MonthlySummary {
            category_map_version: self.categorizer.version(),
            record_count: records.len(),
            rows,
            ytd_months,
            ytd_average,
            tag_totals,
        })
    }
}

fn overflow(what: String) -> PipelineError {
    PipelineError::Overflow { what }
}
