//! Writes an edited record set back to the spreadsheet it was loaded from, in the layout it was
//! read in.
//!
//! Rows that were not touched are written back exactly as they were read, including rows that did
//! not produce a record (preambles, totals, rows with issues). Removed records lose their row and
//! added records are appended. Only local CSV sources can be written.
//!
//! An edited record set is matched against the loaded one by value. Removing records by position
//! with [`commit_removal`] drops exactly those rows, even when another row holds the same entry.

use crate::backup::Backup;
use crate::error::PipelineError;
use crate::model::{Cell, ExpenseRecord, Month, RawTable};
use crate::normalize::{Block, MonthColumn, Normalized, SheetShape};
use crate::pipeline::Session;
use crate::source::{sniff_delimiter, SourceFormat};
use crate::{utils, Result};
use anyhow::Context;
use csv::Terminator;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Rebuilds the grid of `table` so that it holds `edited` instead of the records in `normalized`.
pub fn reconstruct(
    table: &RawTable,
    normalized: &Normalized,
    edited: &[ExpenseRecord],
) -> std::result::Result<Vec<Vec<String>>, PipelineError> {
    rebuild(table, normalized, &Diff::new(normalized, edited))
}

fn rebuild(
    table: &RawTable,
    normalized: &Normalized,
    diff: &Diff<'_>,
) -> std::result::Result<Vec<Vec<String>>, PipelineError> {
    match normalized.shape() {
        SheetShape::Rows {
            header_row,
            columns,
        } => {
            let removed: HashSet<usize> = diff.removed.iter().map(|&(row, _)| row).collect();
            let header_width = table
                .rows()
                .get(*header_row)
                .map(Vec::len)
                .unwrap_or_default();
            let month_col = match columns.month {
                MonthColumn::Column(col) => Some(col),
                MonthColumn::Fixed(_) => None,
            };
            let width = [columns.description, columns.amount, columns.tag]
                .into_iter()
                .chain(month_col)
                .map(|c| c + 1)
                .max()
                .unwrap_or_default()
                .max(header_width);

            let mut added = Vec::with_capacity(diff.added.len());
            for record in &diff.added {
                if let MonthColumn::Fixed(month) = columns.month {
                    if record.month() != month {
                        return Err(PipelineError::UnsupportedWrite(format!(
                            "'{}' only holds {month} entries, cannot add one for {}",
                            table.name(),
                            record.month()
                        )));
                    }
                }
                let mut row = vec![String::new(); width];
                row[columns.description] = record.description().to_string();
                row[columns.amount] = record.amount().to_string();
                row[columns.tag] = record.tag().to_string();
                if let Some(col) = month_col {
                    row[col] = record.month().label().to_string();
                }
                added.push(row);
            }

            let mut rows: Vec<Vec<String>> = table
                .rows()
                .iter()
                .enumerate()
                .filter(|(ix, _)| !removed.contains(ix))
                .map(|(_, row)| row.iter().map(raw).collect())
                .collect();
            let insert_at = rows
                .iter()
                .rposition(|row| row.iter().any(|c| !c.trim().is_empty()))
                .map_or(rows.len(), |ix| ix + 1);
            for (offset, row) in added.into_iter().enumerate() {
                rows.insert(insert_at + offset, row);
            }
            Ok(rows)
        }
        SheetShape::Blocks { labels, blocks } => {
            Ok(rebuild_blocks(table, labels, blocks, diff))
        }
    }
}

/// Writes `edited` over the session's source.
///
/// Nothing is written when the source is not a local CSV file, or when the file changed on disk
/// after the session loaded it. Otherwise the current file is backed up first and the new contents
/// replace it through a rename, so a failure never leaves a half-written file behind.
pub async fn commit(session: &Session, edited: &[ExpenseRecord], backup: &Backup) -> Result<PathBuf> {
    let diff = Diff::new(session.report().normalized(), edited);
    write(session, &diff, edited, backup).await
}

/// Removes the loaded records at `positions` (indexes into the session's records) and writes the
/// result over the session's source, with the same checks as [`commit`].
pub async fn commit_removal(
    session: &Session,
    positions: &BTreeSet<usize>,
    backup: &Backup,
) -> Result<PathBuf> {
    let kept: Vec<ExpenseRecord> = session
        .report()
        .records()
        .iter()
        .enumerate()
        .filter(|(ix, _)| !positions.contains(ix))
        .map(|(_, record)| record.clone())
        .collect();
    let diff = Diff::removing(session.report().normalized(), positions);
    write(session, &diff, &kept, backup).await
}

async fn write(
    session: &Session,
    diff: &Diff<'_>,
    edited: &[ExpenseRecord],
    backup: &Backup,
) -> Result<PathBuf> {
    if session.format() != SourceFormat::Csv {
        return Err(PipelineError::UnsupportedWrite(format!(
            "'{}' is a {} source and only CSV files can be written",
            session.location(),
            session.format()
        ))
        .into());
    }
    let path = session.location().path().ok_or_else(|| {
        PipelineError::UnsupportedWrite(format!("'{}' is not a local file", session.location()))
    })?;

    let current = utils::modified(path).await?;
    if let Some(loaded) = session.modified() {
        if loaded != current {
            return Err(PipelineError::StaleWriteConflict {
                path: path.to_path_buf(),
                loaded,
                current,
            }
            .into());
        }
    }

    let rows = rebuild(session.table(), session.report().normalized(), diff)?;
    verify(session, &rows, edited)?;
    let bytes = to_csv(session.bytes(), &rows)?;

    let backup_path = backup
        .copy_source(path)
        .await
        .context("Unable to back up the source before writing")?;
    debug!("Backed up {} to {}", path.display(), backup_path.display());

    replace(path, &bytes).await?;
    info!(
        "Wrote {} records to {} (backup at {})",
        edited.len(),
        path.display(),
        backup_path.display()
    );
    Ok(backup_path)
}

/// Which loaded records are gone and which edited records are new. Records are compared as a
/// multiset, so duplicate entries are matched one for one.
struct Diff<'a> {
    /// `(origin row, month)` of each removed record.
    removed: Vec<(usize, Month)>,
    added: Vec<&'a ExpenseRecord>,
}

impl<'a> Diff<'a> {
    fn new(normalized: &Normalized, edited: &'a [ExpenseRecord]) -> Self {
        let mut unmatched: HashMap<&ExpenseRecord, usize> = HashMap::new();
        for record in edited {
            *unmatched.entry(record).or_default() += 1;
        }

        let mut removed = Vec::new();
        for (record, &row) in normalized.records().iter().zip(normalized.origins()) {
            match unmatched.get_mut(record) {
                Some(n) if *n > 0 => *n -= 1,
                _ => removed.push((row, record.month())),
            }
        }

        let mut added = Vec::new();
        for record in edited {
            if let Some(n) = unmatched.get_mut(record) {
                if *n > 0 {
                    *n -= 1;
                    added.push(record);
                }
            }
        }
        Self { removed, added }
    }

    fn removing(normalized: &Normalized, positions: &BTreeSet<usize>) -> Self {
        let removed = normalized
            .records()
            .iter()
            .zip(normalized.origins())
            .enumerate()
            .filter(|(ix, _)| positions.contains(ix))
            .map(|(_, (record, &row))| (row, record.month()))
            .collect();
        Self {
            removed,
            added: Vec::new(),
        }
    }
}

fn rebuild_blocks(
    table: &RawTable,
    labels: &[String; 3],
    blocks: &[Block],
    diff: &Diff<'_>,
) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(raw).collect())
        .collect();

    // Months that are not in the sheet yet get a new block to the right of the existing ones.
    let mut blocks = blocks.to_vec();
    let mut next = blocks
        .iter()
        .map(|b| b.start + 3)
        .max()
        .unwrap_or_default()
        .max(table.width());
    for record in &diff.added {
        if blocks.iter().all(|b| b.month != record.month()) {
            blocks.push(Block {
                month: record.month(),
                label: record.month().label().to_string(),
                start: next,
            });
            next += 3;
        }
    }
    let width = next.max(table.width());
    for row in rows.iter_mut() {
        row.resize(width, String::new());
    }
    while rows.len() < 2 {
        rows.push(vec![String::new(); width]);
    }

    let removed: HashSet<(usize, Month)> = diff.removed.iter().copied().collect();
    for block in &blocks {
        let cols = block.start..block.start + 3;
        if table.cell(0, block.start).is_blank() {
            rows[0][block.start] = block.label.clone();
            for (col, label) in cols.clone().zip(labels.iter()) {
                rows[1][col] = label.clone();
            }
        }

        let mut entries: Vec<[String; 3]> = Vec::new();
        for row_ix in 2..table.rows().len() {
            let cells = [0, 1, 2].map(|offset| table.cell(row_ix, block.start + offset));
            if cells.iter().all(|c| c.is_blank()) || removed.contains(&(row_ix, block.month)) {
                continue;
            }
            entries.push(cells.map(raw));
        }
        entries.extend(
            diff.added
                .iter()
                .filter(|r| r.month() == block.month)
                .map(|r| {
                    [
                        r.description().to_string(),
                        r.amount().to_string(),
                        r.tag().to_string(),
                    ]
                }),
        );

        for row in rows.iter_mut().skip(2) {
            for col in cols.clone() {
                row[col].clear();
            }
        }
        for (offset, entry) in entries.into_iter().enumerate() {
            let row_ix = offset + 2;
            if row_ix >= rows.len() {
                rows.push(vec![String::new(); width]);
            }
            for (col, value) in cols.clone().zip(entry) {
                rows[row_ix][col] = value;
            }
        }
    }

    while rows.len() > 2
        && rows
            .last()
            .is_some_and(|row| row.iter().all(|c| c.trim().is_empty()))
    {
        rows.pop();
    }
    rows
}

/// Normalizes the rebuilt grid again and makes sure it yields exactly the edited records.
fn verify(
    session: &Session,
    rows: &[Vec<String>],
    edited: &[ExpenseRecord],
) -> std::result::Result<(), PipelineError> {
    let rebuilt = RawTable::from_fields(session.table().name(), rows);
    let normalized = session.pipeline().normalizer().normalize(&rebuilt)?;

    let mut counts: HashMap<&ExpenseRecord, isize> = HashMap::new();
    for record in edited {
        *counts.entry(record).or_default() += 1;
    }
    for record in normalized.records() {
        *counts.entry(record).or_default() -= 1;
    }
    if counts.values().any(|&n| n != 0) {
        return Err(PipelineError::UnsupportedWrite(format!(
            "the rebuilt '{}' would not read back as the edited entries",
            session.table().name()
        )));
    }
    Ok(())
}

/// Serializes `rows` with the delimiter, line ending and byte order mark of the original file.
fn to_csv(original: &[u8], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let delimiter = sniff_delimiter(original);
    let terminator = if original.windows(2).any(|w| w == b"\r\n") {
        Terminator::CRLF
    } else {
        Terminator::Any(b'\n')
    };
    let mut buf = Vec::new();
    if original.starts_with(BOM) {
        buf.extend_from_slice(BOM);
    }
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .terminator(terminator)
        .from_writer(buf);
    for row in rows {
        writer
            .write_record(row)
            .context("Unable to serialize a CSV row")?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to flush CSV output: {}", e.error()))
}

/// Writes `bytes` to a temporary sibling of `path` and renames it into place.
async fn replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("'{}' has no parent directory", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("'{}' has no file name", path.display()))?;
    let tmp = dir.join(format!(".{name}.{}.tmp", Uuid::new_v4()));
    utils::write(&tmp, bytes).await?;
    if let Err(e) = utils::rename(&tmp, path).await {
        let _ = utils::remove(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// The cell as it would have appeared in the file.
fn raw(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(s) => s.clone(),
        Cell::Number(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Layout, MonthSource};
    use crate::normalize::{AmountPolicy, Normalizer};
    use crate::test::TestEnv;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn record(description: &str, amount: &str, tag: &str, month: Month) -> ExpenseRecord {
        ExpenseRecord::new(
            description,
            crate::model::Amount::from_str(amount).unwrap(),
            tag,
            month,
        )
        .unwrap()
    }

    fn rows_normalizer() -> Normalizer {
        Normalizer::new(
            Layout::row_oriented(MonthSource::Column("Month".into())),
            AmountPolicy::Drop,
        )
    }

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_unchanged_records_round_trip() {
        let table = RawTable::from_fields(
            "spese.csv",
            vec![
                vec!["Description", "Amount", "Tag", "Month", "Note"],
                vec!["Rent", "€800.00", "Rent", "January", "bonifico"],
                vec!["", "", "", "", ""],
                vec!["Totale", "800", "", "", ""],
            ],
        );
        let normalized = rows_normalizer().normalize(&table).unwrap();
        let rows = reconstruct(&table, &normalized, normalized.records()).unwrap();
        assert_eq!(
            rows,
            strings(&[
                &["Description", "Amount", "Tag", "Month", "Note"],
                &["Rent", "€800.00", "Rent", "January", "bonifico"],
                &["", "", "", "", ""],
                &["Totale", "800", "", "", ""],
            ])
        );
    }

    #[test]
    fn test_rows_insert_and_delete() {
        let table = RawTable::from_fields(
            "spese.csv",
            vec![
                vec!["Description", "Amount", "Tag", "Month", "Note"],
                vec!["Rent", "800", "Rent", "January", ""],
                vec!["Coffee", "3.50", "Dining", "January", "bar"],
                vec!["", "", "", "", ""],
            ],
        );
        let normalized = rows_normalizer().normalize(&table).unwrap();
        let mut edited = vec![normalized.records()[1].clone()];
        edited.push(record("Paycheck", "2000", "Salary", Month::February));

        let rows = reconstruct(&table, &normalized, &edited).unwrap();
        assert_eq!(
            rows,
            strings(&[
                &["Description", "Amount", "Tag", "Month", "Note"],
                &["Coffee", "3.50", "Dining", "January", "bar"],
                &["Paycheck", "2000", "Salary", "February", ""],
                &["", "", "", "", ""],
            ])
        );

        let reread = rows_normalizer()
            .normalize(&RawTable::from_fields("spese.csv", &rows))
            .unwrap();
        assert_eq!(reread.records(), edited.as_slice());
    }

    #[test]
    fn test_duplicates_are_matched_one_for_one() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Description", "Amount", "Tag", "Month"],
                vec!["Coffee", "2", "Dining", "May"],
                vec!["Coffee", "2", "Dining", "May"],
            ],
        );
        let normalized = rows_normalizer().normalize(&table).unwrap();
        let edited = vec![normalized.records()[0].clone()];
        let rows = reconstruct(&table, &normalized, &edited).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_removal_by_position_drops_that_row() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Description", "Amount", "Tag", "Month", "Note"],
                vec!["Coffee", "2", "Dining", "May", "with Anna"],
                vec!["Coffee", "2", "Dining", "May", "refunded"],
            ],
        );
        let normalized = rows_normalizer().normalize(&table).unwrap();
        let diff = Diff::removing(&normalized, &BTreeSet::from([1]));
        let rows = rebuild(&table, &normalized, &diff).unwrap();
        assert_eq!(
            rows,
            strings(&[
                &["Description", "Amount", "Tag", "Month", "Note"],
                &["Coffee", "2", "Dining", "May", "with Anna"],
            ])
        );
    }

    #[test]
    fn test_fixed_month_sheet_rejects_other_months() {
        let layout = Layout::row_oriented(MonthSource::Fixed(Month::March));
        let table = RawTable::from_fields("Marzo", vec![vec!["Description", "Amount", "Tag"]]);
        let normalized = Normalizer::new(layout, AmountPolicy::Drop)
            .normalize(&table)
            .unwrap();
        let edited = vec![record("Pizza", "12", "Cibo", Month::April)];
        let err = reconstruct(&table, &normalized, &edited).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedWrite(_)));
    }

    #[test]
    fn test_blocks_refill_from_the_top() {
        let table = RawTable::from_fields(
            "t",
            vec![
                vec!["Gennaio", "", "", "", "Febbraio", "", ""],
                vec!["Descrizione", "Importo", "Tag", "", "Descrizione", "Importo", "Tag"],
                vec!["Affitto", "800", "Affitto", "x", "Cinema", "9", "Svago"],
                vec!["Pizza", "12", "Cibo", "", "", "", ""],
            ],
        );
        let normalizer = Normalizer::new(Layout::ColumnBlock, AmountPolicy::Drop);
        let normalized = normalizer.normalize(&table).unwrap();
        let affitto = normalized.records()[0].clone();
        let pizza = normalized.records()[1].clone();
        let cinema = normalized.records()[2].clone();
        assert_eq!(affitto.description(), "Affitto");

        let edited = vec![
            pizza,
            cinema,
            record("Treno", "45", "Viaggi", Month::February),
            record("Regalo", "30", "Svago", Month::March),
        ];
        let rows = reconstruct(&table, &normalized, &edited).unwrap();
        assert_eq!(
            rows,
            strings(&[
                &["Gennaio", "", "", "", "Febbraio", "", "", "March", "", ""],
                &[
                    "Descrizione",
                    "Importo",
                    "Tag",
                    "",
                    "Descrizione",
                    "Importo",
                    "Tag",
                    "Descrizione",
                    "Importo",
                    "Tag"
                ],
                &["Pizza", "12", "Cibo", "x", "Cinema", "9", "Svago", "Regalo", "30", "Svago"],
                &["", "", "", "", "Treno", "45", "Viaggi", "", "", ""],
            ])
        );

        let reread = normalizer
            .normalize(&RawTable::from_fields("t", &rows))
            .unwrap();
        assert_eq!(reread.records().len(), 4);
        let march = reread
            .records()
            .iter()
            .find(|r| r.month() == Month::March)
            .unwrap();
        assert_eq!(march.amount().value(), Decimal::from(30));
    }

    #[tokio::test]
    async fn test_commit_writes_and_backs_up() {
        let env = TestEnv::new().await;
        let session = Session::load(env.config(), false).await.unwrap();
        let mut edited = session.report().records().to_vec();
        edited.push(record("Cinema", "9.50", "Dining", Month::March));

        let backup = commit(&session, &edited, &env.config().backup())
            .await
            .unwrap();
        assert!(backup.is_file());
        assert_eq!(utils::read(&backup).await.unwrap(), TestEnv::SOURCE_CSV);

        let reloaded = Session::load(env.config(), false).await.unwrap();
        assert_eq!(reloaded.report().records(), edited.as_slice());
        let written = utils::read(env.source_path()).await.unwrap();
        assert!(written.ends_with("Cinema,9.50,Dining,March\n"));
    }

    #[tokio::test]
    async fn test_commit_refuses_stale_source() {
        let env = TestEnv::new().await;
        let session = Session::load(env.config(), false).await.unwrap();

        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(env.source_path())
            .unwrap();
        let later = session.modified().unwrap() + std::time::Duration::from_secs(120);
        file.set_modified(later).unwrap();
        drop(file);

        let err = commit(&session, &[], &env.config().backup())
            .await
            .unwrap_err();
        let err = err.downcast::<PipelineError>().unwrap();
        assert!(matches!(err, PipelineError::StaleWriteConflict { .. }));
        assert_eq!(
            utils::read(env.source_path()).await.unwrap(),
            TestEnv::SOURCE_CSV
        );
        assert!(utils::read_dir(env.config().backups())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_to_csv_keeps_delimiter_and_bom() {
        let original = b"\xEF\xBB\xBFDescrizione;Importo;Tag\n";
        let rows = strings(&[&["Descrizione", "Importo", "Tag"], &["Caff\u{e8}; bar", "2", "Cibo"]]);
        let bytes = to_csv(original, &rows).unwrap();
        assert!(bytes.starts_with(BOM));
        let text = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "Descrizione;Importo;Tag\n\"Caff\u{e8}; bar\";2;Cibo\n");

        let bytes = to_csv(b"a,b\r\n1,2\r\n", &strings(&[&["a", "b"]])).unwrap();
        assert_eq!(bytes, b"a,b\r\n");
    }
}
