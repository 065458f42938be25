use crate::model::Month;
use serde::{Deserialize, Serialize};

/// Describes which of the supported shapes a transactions sheet is in.
///
/// Example configurations:
/// ```json
/// { "shape": "row_oriented", "month": { "column": "Mese" } }
/// { "shape": "row_oriented", "month": { "fixed": "January" }, "headers": { "description": "Descrizione", "amount": "Importo", "tag": "Tag" } }
/// { "shape": "column_block" }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Layout {
    /// One header row naming the fields, then one row per entry.
    RowOriented {
        #[serde(default)]
        headers: RowHeaders,
        month: MonthSource,
    },
    /// Two header rows: the outer row names a month at the start of each three-column block, the
    /// inner row names the block's `description, amount, tag` columns.
    ColumnBlock,
}

impl Layout {
    pub fn row_oriented(month: MonthSource) -> Self {
        Layout::RowOriented {
            headers: RowHeaders::default(),
            month,
        }
    }
}

/// Where a row-oriented sheet gets each entry's month from.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthSource {
    /// A column with this header holds a month name or a date.
    Column(String),
    /// The whole sheet belongs to one month.
    Fixed(Month),
}

/// Header names of the row-oriented fields. Matching against the sheet ignores case and
/// surrounding whitespace.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RowHeaders {
    pub description: String,
    pub amount: String,
    pub tag: String,
}

impl Default for RowHeaders {
    fn default() -> Self {
        Self {
            description: "Description".to_string(),
            amount: "Amount".to_string(),
            tag: "Tag".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_serde_row_oriented_defaults_headers() {
        let json = r#"{ "shape": "row_oriented", "month": { "column": "Mese" } }"#;
        let layout: Layout = serde_json::from_str(json).unwrap();
        assert_eq!(
            layout,
            Layout::row_oriented(MonthSource::Column("Mese".to_string()))
        );
    }

    #[test]
    fn test_layout_serde_fixed_month() {
        let json = r#"{ "shape": "row_oriented", "month": { "fixed": "Gennaio" } }"#;
        let layout: Layout = serde_json::from_str(json).unwrap();
        assert_eq!(layout, Layout::row_oriented(MonthSource::Fixed(Month::January)));
    }

    #[test]
    fn test_layout_serde_column_block() {
        let layout: Layout = serde_json::from_str(r#"{ "shape": "column_block" }"#).unwrap();
        assert_eq!(layout, Layout::ColumnBlock);
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(json, r#"{"shape":"column_block"}"#);
    }
}
