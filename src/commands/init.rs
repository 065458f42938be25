use crate::args::{InitArgs, LayoutArg};
use crate::commands::Out;
use crate::config::SourceSettings;
use crate::model::{Layout, MonthSource};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its subdirectories and an initial `config.json` that points at the
/// spreadsheet and describes its layout. Category map, amount policy, year-to-date window and
/// cache settings start at their defaults and can be edited in `config.json` afterwards.
///
/// # Arguments
/// - `home` - The directory that will be the root of the data directory, e.g.
///   `$HOME/expense-sheet`
/// - `args` - Where the spreadsheet is and how it is laid out.
///
/// # Errors
/// - Returns an error if a local source does not exist or any file operation fails.
pub async fn init(home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let layout = match args.layout() {
        LayoutArg::Rows => Layout::row_oriented(match args.month() {
            Some(month) => MonthSource::Fixed(month),
            None => MonthSource::Column(args.month_column().to_string()),
        }),
        LayoutArg::Blocks => Layout::ColumnBlock,
    };

    let mut source = SourceSettings::new(args.source().clone());
    source.format = args.format();
    source.transactions_sheet = args.transactions_sheet().map(String::from);
    source.summary_sheet = args.summary_sheet().map(String::from);

    let config = Config::create(home, source, layout)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(format!(
        "Created the expense-sheet directory, edit '{}' to change the category map",
        config.config_path().display()
    )
    .into())
}
