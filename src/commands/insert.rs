use crate::args::InsertArgs;
use crate::commands::Out;
use crate::model::{Amount, ExpenseRecord};
use crate::pipeline::Session;
use crate::{writeback, Config, Result};
use anyhow::Context;
use std::str::FromStr;

/// Adds one record to the spreadsheet. The source is backed up first. Rows that are not records
/// (titles, totals, notes) stay where they are and the new row goes after the last filled row.
///
/// # Errors
/// - Returns an error if the amount does not parse, the tag is blank, the source is not a local
///   CSV file, or the file changed since it was read.
pub async fn insert(config: &Config, args: &InsertArgs) -> Result<Out<ExpenseRecord>> {
    let amount = Amount::from_str(args.amount())
        .with_context(|| format!("'{}' is not an amount", args.amount()))?;
    let record = ExpenseRecord::new(args.description(), amount, args.tag(), args.month())
        .context("The tag must not be blank")?;

    let session = Session::load(config, false).await?;
    let mut edited = session.report().records().to_vec();
    edited.push(record.clone());
    writeback::commit(&session, &edited, &config.backup()).await?;

    let category = session.pipeline().categorizer().categorize(record.tag());
    Ok(Out::new(
        format!(
            "Inserted {} '{}' in {} as {}",
            record.amount().grouped(),
            record.tag(),
            record.month(),
            category
        ),
        record,
    ))
}
