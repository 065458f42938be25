use crate::args::ExportArgs;
use crate::commands::Out;
use crate::export::{records_csv, summary_csv, ExportKind};
use crate::pipeline::Session;
use crate::{utils, Config, Result};
use std::path::PathBuf;

/// Writes the monthly summary, or all records with their categories, to a CSV file. An existing
/// file at the output path is overwritten.
pub async fn export(config: &Config, args: &ExportArgs) -> Result<Out<PathBuf>> {
    let session = Session::load(config, args.refresh()).await?;
    let report = session.report();

    let (csv, count) = match args.what() {
        ExportKind::Summary => (summary_csv(report.summary())?, None),
        ExportKind::Records => (
            records_csv(report.records(), session.pipeline().categorizer())?,
            Some(report.records().len()),
        ),
    };
    utils::write(args.output(), csv).await?;

    let message = match count {
        Some(count) => format!(
            "Exported {} record{} to {}",
            count,
            if count == 1 { "" } else { "s" },
            args.output().display()
        ),
        None => format!("Exported the summary to {}", args.output().display()),
    };
    Ok(Out::new(message, args.output().to_path_buf()))
}
