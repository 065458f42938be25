use crate::aggregate::MonthlySummary;
use crate::args::ReadArgs;
use crate::commands::Out;
use crate::pipeline::Session;
use crate::render;
use crate::{Config, Result};

/// Loads the spreadsheet and prints the monthly summary: income, both expense categories, savings
/// and cumulative savings for each month, followed by the year-to-date averages.
pub async fn summary(config: &Config, args: &ReadArgs) -> Result<Out<MonthlySummary>> {
    let session = Session::load(config, args.refresh()).await?;
    let report = session.report();

    let mut message = render::summary_table(report.summary());
    if report.dropped() > 0 {
        message.push_str(&format!(
            "\n\n{} row{} could not be read, run 'records' to see which",
            report.dropped(),
            if report.dropped() == 1 { "" } else { "s" }
        ));
    }
    Ok(Out::new(message, report.summary().clone()))
}
