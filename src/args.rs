//! These structs provide the CLI interface for the expense-sheet CLI.

use crate::export::ExportKind;
use crate::model::Month;
use crate::source::{SourceFormat, SourceLocation};
use clap::{Parser, Subcommand, ValueEnum};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// expense-sheet: monthly summaries of a personal expense spreadsheet.
///
/// The spreadsheet is a local CSV or workbook file, or one published at an http(s) URL. Each entry
/// has a description, an amount and a tag; the tags are grouped into income, necessary expenses and
/// discretionary expenses by the category map in the config file. From there the program computes
/// monthly totals, savings, cumulative savings and year-to-date averages.
///
/// Start with `expense-sheet init`, then edit the category map in
/// `$EXPENSE_SHEET_HOME/config.json` to match your tags.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and a config file that points at your spreadsheet.
    ///
    /// - Decide what directory you want to store the configuration, backups and download cache in
    ///   and pass this as --home. By default, it will be $HOME/expense-sheet.
    ///
    /// - Pass the spreadsheet as --source, either a path or an http(s) URL.
    ///
    /// - Describe how the entries are laid out with --layout. A `rows` sheet has one header row
    ///   and one row per entry, with the month in a column (--month-column) or the same for the
    ///   whole sheet (--month). A `blocks` sheet has a three-column block per month, with the month
    ///   name above the description, amount and tag headers.
    Init(InitArgs),
    /// Print the monthly summary.
    Summary(ReadArgs),
    /// List the entries with their number, macro-category and any rows that could not be read.
    Records(RecordsArgs),
    /// Write the summary or the entries to a CSV file.
    Export(ExportArgs),
    /// Compare the summary sheet in the spreadsheet with the totals computed from the entries.
    Check(ReadArgs),
    /// Add an entry to the spreadsheet. Only local CSV files can be edited.
    Insert(InsertArgs),
    /// Remove entries from the spreadsheet by the numbers that `records` shows.
    Delete(DeleteArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration, backups and cache are held. Defaults to
    /// ~/expense-sheet
    #[arg(long, env = "EXPENSE_SHEET_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// The two supported sheet layouts.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LayoutArg {
    /// One header row, one row per entry.
    Rows,
    /// One description/amount/tag block per month, side by side.
    Blocks,
}

/// Args for the `expense-sheet init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The spreadsheet: a path, or an http(s) URL of a published CSV or workbook.
    #[arg(long)]
    source: SourceLocation,

    /// How the entries are laid out in the sheet.
    #[arg(long, value_enum, default_value_t = LayoutArg::Rows)]
    layout: LayoutArg,

    /// For `rows` sheets: the header of the column holding each entry's month (a month name or a
    /// date).
    #[arg(long, default_value = "Month", conflicts_with = "month")]
    month_column: String,

    /// For `rows` sheets where every entry belongs to the same month.
    #[arg(long)]
    month: Option<Month>,

    /// `csv` or `workbook`. Inferred from the file extension or URL when not given.
    #[arg(long)]
    format: Option<SourceFormat>,

    /// The workbook sheet holding the entries. Defaults to the first sheet.
    #[arg(long)]
    transactions_sheet: Option<String>,

    /// The workbook sheet with a tag by month summary to cross-check, or for CSV sources the path
    /// to a second CSV file holding it.
    #[arg(long)]
    summary_sheet: Option<String>,
}

impl InitArgs {
    pub fn new(source: SourceLocation, layout: LayoutArg) -> Self {
        Self {
            source,
            layout,
            month_column: "Month".to_string(),
            month: None,
            format: None,
            transactions_sheet: None,
            summary_sheet: None,
        }
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    pub fn layout(&self) -> LayoutArg {
        self.layout
    }

    pub fn month_column(&self) -> &str {
        &self.month_column
    }

    pub fn month(&self) -> Option<Month> {
        self.month
    }

    pub fn format(&self) -> Option<SourceFormat> {
        self.format
    }

    pub fn transactions_sheet(&self) -> Option<&str> {
        self.transactions_sheet.as_deref()
    }

    pub fn summary_sheet(&self) -> Option<&str> {
        self.summary_sheet.as_deref()
    }

    pub fn with_month(mut self, month: Month) -> Self {
        self.month = Some(month);
        self
    }
}

/// Args for commands that only read the spreadsheet.
#[derive(Debug, Parser, Clone, Default)]
pub struct ReadArgs {
    /// Download a remote spreadsheet again even if the cached copy is still fresh.
    #[arg(long)]
    refresh: bool,
}

impl ReadArgs {
    pub fn new(refresh: bool) -> Self {
        Self { refresh }
    }

    pub fn refresh(&self) -> bool {
        self.refresh
    }
}

/// Args for the `expense-sheet records` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct RecordsArgs {
    #[clap(flatten)]
    read: ReadArgs,

    /// Only list entries of this month.
    #[arg(long)]
    month: Option<Month>,

    /// Only list entries with this tag.
    #[arg(long)]
    tag: Option<String>,
}

impl RecordsArgs {
    pub fn new(refresh: bool, month: Option<Month>, tag: Option<String>) -> Self {
        Self {
            read: ReadArgs::new(refresh),
            month,
            tag,
        }
    }

    pub fn refresh(&self) -> bool {
        self.read.refresh()
    }

    pub fn month(&self) -> Option<Month> {
        self.month
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// Args for the `expense-sheet export` command.
#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    #[clap(flatten)]
    read: ReadArgs,

    /// What to export.
    #[arg(long, value_enum, default_value_t = ExportKind::Summary)]
    what: ExportKind,

    /// The CSV file to write.
    #[arg(long, short)]
    output: PathBuf,
}

impl ExportArgs {
    pub fn new(what: ExportKind, output: impl Into<PathBuf>) -> Self {
        Self {
            read: ReadArgs::default(),
            what,
            output: output.into(),
        }
    }

    pub fn refresh(&self) -> bool {
        self.read.refresh()
    }

    pub fn what(&self) -> ExportKind {
        self.what
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

/// Args for the `expense-sheet insert` command.
#[derive(Debug, Parser, Clone)]
pub struct InsertArgs {
    /// The month the entry belongs to, in English or Italian.
    #[arg(long)]
    month: Month,

    /// The amount, e.g. 12.40 or €1,200.00.
    #[arg(long, allow_hyphen_values = true)]
    amount: String,

    /// The tag, which the category map assigns to a macro-category.
    #[arg(long)]
    tag: String,

    #[arg(long, default_value = "")]
    description: String,
}

impl InsertArgs {
    pub fn new(
        month: Month,
        amount: impl Into<String>,
        tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            month,
            amount: amount.into(),
            tag: tag.into(),
            description: description.into(),
        }
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Args for the `expense-sheet delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The number of an entry as listed by `records`. Repeat to delete several entries at once.
    #[arg(long = "index", required = true)]
    indexes: Vec<usize>,
}

impl DeleteArgs {
    pub fn new(indexes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indexes: indexes.into_iter().collect(),
        }
    }

    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expense-sheet"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or EXPENSE_SHEET_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("expense-sheet")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_init() {
        let args = Args::try_parse_from([
            "expense-sheet",
            "--home",
            "/tmp/es",
            "init",
            "--source",
            "https://example.com/pub?output=xlsx",
            "--layout",
            "blocks",
            "--summary-sheet",
            "Riepilogo",
        ])
        .unwrap();
        assert_eq!(args.common().home().path(), Path::new("/tmp/es"));
        match args.command() {
            Command::Init(init) => {
                assert_eq!(init.layout(), LayoutArg::Blocks);
                assert!(matches!(init.source(), SourceLocation::Url(_)));
                assert_eq!(init.summary_sheet(), Some("Riepilogo"));
                assert_eq!(init.month_column(), "Month");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_insert_negative_amount_and_italian_month() {
        let args = Args::try_parse_from([
            "expense-sheet",
            "insert",
            "--month",
            "marzo",
            "--amount",
            "-12.40",
            "--tag",
            "Cibo",
        ])
        .unwrap();
        match args.command() {
            Command::Insert(insert) => {
                assert_eq!(insert.month(), Month::March);
                assert_eq!(insert.amount(), "-12.40");
                assert_eq!(insert.description(), "");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete_requires_an_index() {
        assert!(Args::try_parse_from(["expense-sheet", "delete"]).is_err());
        let args =
            Args::try_parse_from(["expense-sheet", "delete", "--index", "3", "--index", "1"])
                .unwrap();
        match args.command() {
            Command::Delete(delete) => assert_eq!(delete.indexes(), [3, 1]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_log_level_parses() {
        let args =
            Args::try_parse_from(["expense-sheet", "--log-level", "debug", "summary"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
    }
}
