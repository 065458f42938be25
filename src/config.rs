//! Configuration file handling.
//!
//! The configuration file is stored at `$EXPENSE_SHEET_HOME/config.json` and contains the location
//! and layout of the expense spreadsheet, the category map, and the settings of the pipeline, the
//! download cache and the backups.

use crate::aggregate::YtdWindow;
use crate::backup::Backup;
use crate::categorize::TagMatch;
use crate::model::{CategoryMap, Layout};
use crate::normalize::AmountPolicy;
use crate::source::{Loader, SourceCache, SourceFormat, SourceLocation};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const APP_NAME: &str = "expense-sheet";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const CACHE_TTL_SECS: u64 = 600;
const FETCH_TIMEOUT_SECS: u64 = 30;
const BACKUPS: &str = ".backups";
const CACHE: &str = ".cache";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSE_SHEET_HOME` and from there it loads `$EXPENSE_SHEET_HOME/config.json`. It
/// provides paths to other items that are expected in a certain location within the home
/// directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    cache: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its subdirectories and an initial `config.json` that points at
    /// `source` and describes it with `layout`. Everything else gets default settings, which can
    /// be edited in the file afterwards.
    ///
    /// A local `source` must exist; it is stored as an absolute path.
    pub async fn create(
        dir: impl Into<PathBuf>,
        source: SourceSettings,
        layout: Layout,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the expense-sheet home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;
        let cache = root.join(CACHE);
        utils::make_dir(&cache).await?;

        let mut source = source;
        if let SourceLocation::Path(path) = &source.location {
            let absolute = utils::canonicalize(path)
                .await
                .context("The source spreadsheet does not exist")?;
            source.location = SourceLocation::Path(absolute);
        }

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::new(source, layout);
        // Fail before writing anything that would not load again.
        config_file.format()?;
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            backups,
            cache,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load the config file
    /// - validate that the backups directory exists
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expense-sheet home directory is missing, run 'init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            backups: root.join(BACKUPS),
            cache: root.join(CACHE),
            config_path,
            config_file,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    /// The transactions source. A relative path is resolved against the home directory.
    pub fn source(&self) -> SourceLocation {
        self.resolve(&self.config_file.source.location)
    }

    /// The configured format, or the one implied by the source location.
    pub fn format(&self) -> Result<SourceFormat> {
        self.config_file.format()
    }

    pub fn transactions_sheet(&self) -> Option<&str> {
        self.config_file.source.transactions_sheet.as_deref()
    }

    /// Where the pre-computed summary table lives, if one is configured. For workbooks this is a
    /// sheet of the source workbook; for CSV sources it is a second CSV file.
    pub fn summary(&self) -> Result<Option<SummaryLocation>> {
        let Some(summary) = self.config_file.source.summary_sheet.as_deref() else {
            return Ok(None);
        };
        Ok(Some(match self.format()? {
            SourceFormat::Workbook => SummaryLocation::Sheet(summary.to_string()),
            SourceFormat::Csv => {
                let location: SourceLocation = summary.parse()?;
                SummaryLocation::File(self.resolve(&location))
            }
        }))
    }

    pub fn layout(&self) -> &Layout {
        &self.config_file.layout
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.config_file.categories
    }

    pub fn tag_match(&self) -> TagMatch {
        self.config_file.tag_match
    }

    pub fn amount_policy(&self) -> AmountPolicy {
        self.config_file.amount_policy
    }

    pub fn ytd_window(&self) -> YtdWindow {
        self.config_file.ytd_window
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config_file.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.fetch_timeout_secs)
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// Creates a `Loader` that caches remote downloads in the cache directory.
    pub fn loader(&self, refresh: bool) -> Loader {
        let cache = SourceCache::new(&self.cache, self.cache_ttl());
        Loader::new(cache, self.fetch_timeout()).refresh(refresh)
    }

    fn resolve(&self, location: &SourceLocation) -> SourceLocation {
        match location {
            SourceLocation::Path(p) if p.is_relative() => SourceLocation::Path(self.root.join(p)),
            other => other.clone(),
        }
    }
}

/// Where a configured summary table is read from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SummaryLocation {
    Sheet(String),
    File(SourceLocation),
}

/// The part of the configuration that says where the spreadsheet is.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SourceSettings {
    /// A path or an http(s) URL.
    #[serde(rename = "source")]
    pub location: SourceLocation,

    /// Inferred from the location when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<SourceFormat>,

    /// The workbook sheet holding the entries. The first sheet when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions_sheet: Option<String>,

    /// The workbook sheet, or for CSV sources the path, of a pre-computed tag by month table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_sheet: Option<String>,
}

impl SourceSettings {
    pub fn new(location: SourceLocation) -> Self {
        Self {
            location,
            format: None,
            transactions_sheet: None,
            summary_sheet: None,
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expense-sheet",
///   "config_version": 1,
///   "source": "/home/me/Documents/Spese 2025.xlsx",
///   "transactions_sheet": "Spese",
///   "summary_sheet": "Riepilogo",
///   "layout": { "shape": "column_block" },
///   "categories": {
///     "version": 1,
///     "income": ["Stipendio", "Entrate", "Reddito"],
///     "necessary_expense": ["Affitto", "Bollette", "Spese fisse"],
///     "discretionary_expense": ["Cibo", "Tempo libero", "Viaggi"]
///   },
///   "tag_match": "normalized",
///   "amount_policy": "drop",
///   "ytd_window": "calendar",
///   "cache_ttl_secs": 600,
///   "fetch_timeout_secs": 30,
///   "backup_copies": 5
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expense-sheet"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    #[serde(flatten)]
    source: SourceSettings,

    layout: Layout,

    #[serde(default)]
    categories: CategoryMap,

    #[serde(default)]
    tag_match: TagMatch,

    #[serde(default)]
    amount_policy: AmountPolicy,

    #[serde(default)]
    ytd_window: YtdWindow,

    /// How long a downloaded remote source is reused
    #[serde(default = "default_cache_ttl_secs")]
    cache_ttl_secs: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    fetch_timeout_secs: u64,

    /// Number of backup copies to keep
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,
}

fn default_cache_ttl_secs() -> u64 {
    CACHE_TTL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    FETCH_TIMEOUT_SECS
}

fn default_backup_copies() -> u32 {
    BACKUP_COPIES
}

impl ConfigFile {
    fn new(source: SourceSettings, layout: Layout) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            source,
            layout,
            categories: CategoryMap::default(),
            tag_match: TagMatch::default(),
            amount_policy: AmountPolicy::default(),
            ytd_window: YtdWindow::default(),
            cache_ttl_secs: CACHE_TTL_SECS,
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
            backup_copies: BACKUP_COPIES,
        }
    }

    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn format(&self) -> Result<SourceFormat> {
        match self.source.format.or_else(|| self.source.location.infer_format()) {
            Some(format) => Ok(format),
            None => bail!(
                "Unable to tell whether '{}' is a CSV file or a workbook, set 'format' to 'csv' \
                or 'workbook'",
                self.source.location
            ),
        }
    }
}
