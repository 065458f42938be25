use crate::model::Cell;

static EMPTY: Cell = Cell::Empty;

/// A sheet exactly as it was loaded: a possibly ragged grid of cells with no guarantees about its
/// shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Builds a table from text fields, as read from a CSV file.
    pub fn from_fields<S, R>(name: impl Into<String>, rows: impl IntoIterator<Item = R>) -> Self
    where
        S: AsRef<str>,
        R: IntoIterator<Item = S>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|s| Cell::from_field(s.as_ref())).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// The cell at `(row, col)`; positions outside the grid read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// The number of columns in the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}
