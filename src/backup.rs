//! Backup management for the source spreadsheet before it is overwritten.

use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use std::path::{Path, PathBuf};

/// Manages backup file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
}

impl Backup {
    /// Creates a new `Backup` instance from a `Config`.
    pub fn new(config: &Config) -> Self {
        Self::in_dir(config.backups(), config.backup_copies())
    }

    pub(crate) fn in_dir(backups_dir: impl Into<PathBuf>, backup_copies: u32) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            backup_copies,
        }
    }

    /// Copies `source` to the backups directory.
    ///
    /// The filename format is `{stem}.YYYY-MM-DD-NNN.{ext}` where NNN is a sequence number, e.g.
    /// `spese.2025-03-01-002.csv`. Automatically rotates old backups, keeping only
    /// `backup_copies` files for that source.
    ///
    /// Returns the path to the created backup file.
    pub async fn copy_source(&self, source: &Path) -> Result<PathBuf> {
        let prefix = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .with_context(|| format!("'{}' has no file name", source.display()))?;
        let extension = source
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let date = today();
        let seq = self.next_sequence_number(&prefix, &date, &extension).await?;
        let filename = if extension.is_empty() {
            format!("{prefix}.{date}-{seq:03}")
        } else {
            format!("{prefix}.{date}-{seq:03}.{extension}")
        };
        let path = self.backups_dir.join(&filename);

        utils::copy(source, &path).await?;

        self.rotate(&prefix, &extension).await?;

        Ok(path)
    }

    /// Scans the backups directory for existing files with the given prefix and date,
    /// and returns the next sequence number.
    async fn next_sequence_number(&self, prefix: &str, date: &str, extension: &str) -> Result<u32> {
        let max_seq = self
            .file_names()
            .await?
            .iter()
            .filter_map(|name| parse_sequence_number(name, prefix, date, extension))
            .max()
            .unwrap_or(0);
        Ok(max_seq + 1)
    }

    /// Rotates old backup files, keeping only `backup_copies` files with the given prefix.
    async fn rotate(&self, prefix: &str, extension: &str) -> Result<()> {
        let mut files: Vec<String> = self
            .file_names()
            .await?
            .into_iter()
            .filter(|name| is_backup_file(name, prefix, extension))
            .collect();

        // Sort by filename (which sorts by date and sequence number due to format)
        files.sort();

        // Delete oldest files if we have more than backup_copies
        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for name in files.into_iter().take(to_delete) {
            utils::remove(self.backups_dir.join(name)).await?;
        }

        Ok(())
    }

    async fn file_names(&self) -> Result<Vec<String>> {
        Ok(utils::read_dir(&self.backups_dir)
            .await?
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect())
    }
}

/// Returns today's date in YYYY-MM-DD format.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parses the sequence number from a backup filename.
/// Returns None if the filename doesn't match the expected pattern.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str, extension: &str) -> Option<u32> {
    // Pattern: {prefix}.{date}-{NNN}.{ext} or {prefix}.{date}-{NNN} (no extension)
    let remainder = filename.strip_prefix(&format!("{prefix}.{date}-"))?;

    let seq_str = if extension.is_empty() {
        remainder
    } else {
        remainder.strip_suffix(&format!(".{extension}"))?
    };

    seq_str.parse().ok()
}

/// Checks if a filename is a backup of the source with the given prefix and extension.
fn is_backup_file(filename: &str, prefix: &str, extension: &str) -> bool {
    let Some(rest) = filename.strip_prefix(&format!("{prefix}.")) else {
        return false;
    };
    let stamp = if extension.is_empty() {
        rest
    } else {
        match rest.strip_suffix(&format!(".{extension}")) {
            Some(stamp) => stamp,
            None => return false,
        }
    };
    // YYYY-MM-DD-NNN, so that `spese` does not rotate away the backups of `spese.old`.
    stamp.len() >= 14
        && stamp.is_char_boundary(10)
        && chrono::NaiveDate::parse_from_str(&stamp[..10], "%Y-%m-%d").is_ok()
        && stamp[10..].starts_with('-')
        && stamp[11..].chars().all(|c| c.is_ascii_digit())
}
