use rust_decimal::Decimal;
use std::fmt;

/// A single spreadsheet cell as it arrives from the source. Cells are untyped in the source, so
/// every consumer has to say what it does with each of the three cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
}

impl Cell {
    /// Builds a cell from a CSV field. CSV carries no types, so anything non-blank is text.
    pub fn from_field(field: &str) -> Cell {
        if field.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(field.to_string())
        }
    }

    /// True for empty cells and for text cells holding only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// The trimmed text of the cell; numbers are rendered, empty cells give an empty string.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => n.normalize().to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_field(value)
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Cell::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_field() {
        assert_eq!(Cell::from_field(""), Cell::Empty);
        assert_eq!(Cell::from_field("  "), Cell::Empty);
        assert_eq!(Cell::from_field("Rent"), Cell::Text("Rent".into()));
    }

    #[test]
    fn test_blank() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::Text("\t".into()).is_blank());
        assert!(!Cell::Number(Decimal::ZERO).is_blank());
    }

    #[test]
    fn test_text() {
        assert_eq!(Cell::Text(" Rent ".into()).text(), "Rent");
        assert_eq!(
            Cell::Number(Decimal::from_str("3.50").unwrap()).text(),
            "3.5"
        );
        assert_eq!(Cell::Empty.text(), "");
    }
}
