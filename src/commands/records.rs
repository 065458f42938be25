use crate::args::RecordsArgs;
use crate::commands::Out;
use crate::error::RowIssue;
use crate::model::{ExpenseRecord, MacroCategory};
use crate::pipeline::Session;
use crate::render;
use crate::{Config, Result};
use serde::Serialize;

/// A record along with the number `delete --index` refers to it by.
#[derive(Debug, Clone, Serialize)]
pub struct NumberedRecord {
    pub number: usize,
    pub category: MacroCategory,
    pub record: ExpenseRecord,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordsOut {
    pub records: Vec<NumberedRecord>,
    pub issues: Vec<RowIssue>,
}

/// Lists the records read from the spreadsheet, optionally only those of one month or one tag,
/// followed by the rows that could not be read.
///
/// Records are numbered from 1 in sheet order. Filtering does not renumber them.
pub async fn records(config: &Config, args: &RecordsArgs) -> Result<Out<RecordsOut>> {
    let session = Session::load(config, args.refresh()).await?;
    let report = session.report();
    let categorizer = session.pipeline().categorizer();
    let tag = args.tag().map(|t| categorizer.tag_match().key(t));

    let shown: Vec<(usize, &ExpenseRecord)> = report
        .records()
        .iter()
        .enumerate()
        .map(|(ix, record)| (ix + 1, record))
        .filter(|(_, r)| args.month().map_or(true, |m| r.month() == m))
        .filter(|(_, r)| {
            tag.as_ref()
                .map_or(true, |t| categorizer.tag_match().key(r.tag()) == *t)
        })
        .collect();

    let mut message = if shown.is_empty() {
        "No records".to_string()
    } else {
        render::records_table(&shown, categorizer)
    };
    if !report.issues().is_empty() {
        message.push_str(&format!(
            "\n\nRows with problems:\n{}",
            render::issues_list(report.issues())
        ));
    }

    let structure = RecordsOut {
        records: shown
            .iter()
            .map(|&(number, record)| NumberedRecord {
                number,
                category: categorizer.categorize(record.tag()),
                record: record.clone(),
            })
            .collect(),
        issues: report.issues().to_vec(),
    };
    Ok(Out::new(message, structure))
}
