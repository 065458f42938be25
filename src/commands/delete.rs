use crate::args::DeleteArgs;
use crate::commands::Out;
use crate::model::ExpenseRecord;
use crate::pipeline::Session;
use crate::{writeback, Config, Result};
use anyhow::ensure;
use std::collections::BTreeSet;

/// Removes records from the spreadsheet by the numbers that `records` shows. The source is backed
/// up first, and rows that are not records stay untouched.
///
/// This operation is atomic: if any number is out of range, nothing is deleted.
pub async fn delete(config: &Config, args: &DeleteArgs) -> Result<Out<Vec<ExpenseRecord>>> {
    ensure!(!args.indexes().is_empty(), "No records to delete");

    let session = Session::load(config, false).await?;
    let records = session.report().records();
    let indexes: BTreeSet<usize> = args.indexes().iter().copied().collect();
    for &index in &indexes {
        ensure!(
            (1..=records.len()).contains(&index),
            "There is no record {index}, the sheet has {} record{}",
            records.len(),
            if records.len() == 1 { "" } else { "s" }
        );
    }

    let positions: BTreeSet<usize> = indexes.iter().map(|ix| ix - 1).collect();
    let deleted: Vec<ExpenseRecord> = positions.iter().map(|&ix| records[ix].clone()).collect();

    writeback::commit_removal(&session, &positions, &config.backup()).await?;

    let count = deleted.len();
    Ok(Out::new(
        format!(
            "Deleted {} record{}",
            count,
            if count == 1 { "" } else { "s" }
        ),
        deleted,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Layout, MonthSource};
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_delete_records() {
        let env = TestEnv::new().await;
        let out = delete(env.config(), &DeleteArgs::new([3, 1, 3]))
            .await
            .unwrap();
        assert_eq!(out.message(), "Deleted 2 records");
        let deleted: Vec<&str> = out
            .structure()
            .unwrap()
            .iter()
            .map(|r| r.description())
            .collect();
        assert_eq!(deleted, vec!["Stipendio", "Pizza"]);

        assert_eq!(
            std::fs::read_to_string(env.source_path()).unwrap(),
            "Description,Amount,Tag,Month\n\
             Affitto,800.00,Affitto,January\n\
             Stipendio,\"2,000.00\",Stipendio,February\n\
             Affitto,800.00,Affitto,February\n\
             Totale,5612.40,,\n"
        );
    }

    #[tokio::test]
    async fn test_delete_keeps_the_other_copy_of_a_repeated_entry() {
        let env = TestEnv::with_source(
            "spese.csv",
            "Description,Amount,Tag,Month,Note
             Caffè,2,Cibo,May,con Anna
             Caffè,2,Cibo,May,rimborsato
",
            Layout::row_oriented(MonthSource::Column("Month".into())),
        )
        .await;
        delete(env.config(), &DeleteArgs::new([2])).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(env.source_path()).unwrap(),
            "Description,Amount,Tag,Month,Note
Caffè,2,Cibo,May,con Anna
"
        );
    }

    #[tokio::test]
    async fn test_delete_out_of_range_changes_nothing() {
        let env = TestEnv::new().await;
        let err = delete(env.config(), &DeleteArgs::new([2, 6]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "There is no record 6, the sheet has 5 records");
        assert_eq!(
            std::fs::read_to_string(env.source_path()).unwrap(),
            TestEnv::SOURCE_CSV
        );
        assert_eq!(
            std::fs::read_dir(env.config().backups()).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_refuses_index_zero() {
        let env = TestEnv::new().await;
        let err = delete(env.config(), &DeleteArgs::new([0])).await.unwrap_err();
        assert!(err.to_string().starts_with("There is no record 0"));
    }
}
