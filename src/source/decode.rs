use crate::error::PipelineError;
use crate::model::{Cell, RawTable};
use crate::source::SourceFormat;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::Decimal;
use std::io::Cursor;
use std::str::FromStr;
use tracing::{debug, trace};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes fetched bytes into a table. For workbooks, `sheet` selects the worksheet (the first one
/// when `None`); CSV has a single table and ignores it. `name` identifies the source in errors.
pub fn decode(
    bytes: &[u8],
    format: SourceFormat,
    sheet: Option<&str>,
    name: &str,
) -> Result<RawTable, PipelineError> {
    match format {
        SourceFormat::Csv => decode_csv(bytes, name),
        SourceFormat::Workbook => decode_workbook(bytes, sheet, name),
    }
}

/// Spreadsheet programs in many European locales export CSV with `;` because `,` is their decimal
/// separator. Whichever of the two appears more often in the first line wins.
pub(crate) fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let count = |d: u8| first_line.iter().filter(|&&b| b == d).count();
    if count(b';') > count(b',') {
        b';'
    } else {
        b','
    }
}

fn decode_csv(bytes: &[u8], name: &str) -> Result<RawTable, PipelineError> {
    let delimiter = sniff_delimiter(bytes);
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| PipelineError::unavailable(name, format!("invalid CSV: {e}")))?;
        rows.push(record.iter().map(Cell::from_field).collect());
    }
    debug!("Decoded {} CSV rows from {name}", rows.len());
    Ok(RawTable::new(name, rows))
}

fn decode_workbook(
    bytes: &[u8],
    sheet: Option<&str>,
    name: &str,
) -> Result<RawTable, PipelineError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| PipelineError::unavailable(name, format!("unreadable workbook: {e}")))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let sheet_name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|s| s.as_str() == wanted)
            .or_else(|| sheet_names.iter().find(|s| s.eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| {
                PipelineError::shape(
                    format!("a sheet named '{wanted}'"),
                    format!("sheets {}", sheet_names.join(", ")),
                )
            })?,
        None => sheet_names
            .first()
            .ok_or_else(|| PipelineError::shape("at least one sheet", "an empty workbook"))?,
    }
    .clone();

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| PipelineError::unavailable(name, format!("sheet '{sheet_name}': {e}")))?;

    // Ranges start at the first used cell; pad so that reported positions match the sheet.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or_default();
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(to_cell));
        rows.push(cells);
    }
    trace!("Decoded {} rows from sheet '{sheet_name}' of {name}", rows.len());
    Ok(RawTable::new(sheet_name, rows))
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from_field(s),
        Data::Int(i) => Cell::Number(Decimal::from(*i)),
        // Going through the shortest round-trip text keeps 0.1 as 0.1 instead of its binary
        // expansion.
        Data::Float(f) => Decimal::from_str(&f.to_string())
            .map(Cell::Number)
            .unwrap_or_else(|_| Cell::Text(f.to_string())),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => Cell::Text(dt.date().format("%Y-%m-%d").to_string()),
            None => Cell::Text(dt.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(e) => Cell::Text(format!("{e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_is_flexible() {
        let csv = "\u{feff}Description,Amount,Tag\nRent,800,Affitto\n,,\nshort\n";
        let table = decode(csv.as_bytes(), SourceFormat::Csv, None, "spese.csv").unwrap();
        assert_eq!(table.name(), "spese.csv");
        assert_eq!(table.rows().len(), 4);
        assert_eq!(table.cell(0, 0), &Cell::Text("Description".into()));
        assert_eq!(table.cell(2, 1), &Cell::Empty);
        assert_eq!(table.cell(3, 2), &Cell::Empty);
    }

    #[test]
    fn test_csv_semicolon_delimiter() {
        let csv = "Descrizione;Importo;Tag\nAffitto;800,00;Affitto\n";
        let table = decode(csv.as_bytes(), SourceFormat::Csv, Some("ignored"), "s.csv").unwrap();
        assert_eq!(table.width(), 3);
        assert_eq!(table.cell(1, 1), &Cell::Text("800,00".into()));
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"a,b;c,d\n1;2;3;4"), b',');
        assert_eq!(sniff_delimiter(b"a;b;c\n"), b';');
        assert_eq!(sniff_delimiter(b""), b',');
    }

    #[test]
    fn test_garbage_is_not_a_workbook() {
        let err = decode(b"not a zip", SourceFormat::Workbook, None, "x.xlsx").unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_workbook_cells() {
        assert_eq!(to_cell(&Data::Float(3.5)), Cell::Number(Decimal::new(35, 1)));
        assert_eq!(to_cell(&Data::Float(0.1)), Cell::Number(Decimal::new(1, 1)));
        assert_eq!(to_cell(&Data::Int(-12)), Cell::Number(Decimal::from(-12)));
        assert_eq!(to_cell(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(to_cell(&Data::String("Cibo".into())), Cell::Text("Cibo".into()));
        assert_eq!(to_cell(&Data::Bool(true)), Cell::Text("true".into()));
        assert_eq!(to_cell(&Data::Empty), Cell::Empty);
    }
}
