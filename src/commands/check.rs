use crate::args::ReadArgs;
use crate::commands::Out;
use crate::crosscheck::{cross_check, Discrepancy};
use crate::pipeline::Session;
use crate::render;
use crate::{Config, Result};
use anyhow::bail;

/// Compares the configured summary sheet with the per-tag monthly totals derived from the
/// records. Disagreements are reported, not treated as errors.
///
/// # Errors
/// - Returns an error if no summary sheet is configured or it does not have a tag by month shape.
pub async fn check(config: &Config, args: &ReadArgs) -> Result<Out<Vec<Discrepancy>>> {
    let session = Session::load(config, args.refresh()).await?;
    let Some(sheet) = session.summary_table() else {
        bail!(
            "No summary sheet is configured, set 'summary_sheet' in '{}'",
            config.config_path().display()
        )
    };

    let discrepancies = cross_check(sheet, session.report().summary(), config.tag_match())?;
    let message = if discrepancies.is_empty() {
        format!("The summary sheet '{}' matches the records", sheet.name())
    } else {
        format!(
            "Found {} discrepanc{} in the summary sheet '{}':\n{}",
            discrepancies.len(),
            if discrepancies.len() == 1 { "y" } else { "ies" },
            sheet.name(),
            render::discrepancy_list(&discrepancies)
        )
    };
    Ok(Out::new(message, discrepancies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Month;
    use crate::test::TestEnv;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_matching_summary_sheet() {
        let env = TestEnv::with_summary(
            "Tag,Gennaio,Febbraio,Totale\n\
             Stipendio,\"2,000.00\",\"2,000.00\",\"4,000.00\"\n\
             Affitto,800,800,1600\n\
             Cibo,12.40,,12.40\n",
        )
        .await;
        let out = check(env.config(), &ReadArgs::new(false)).await.unwrap();
        assert!(out.structure().unwrap().is_empty());
        assert!(out.message().contains("matches the records"));
    }

    #[tokio::test]
    async fn test_mismatch_is_reported() {
        let env = TestEnv::with_summary(
            "Tag,January,February\n\
             Stipendio,2000,2000\n\
             Affitto,800,850\n\
             Cibo,12.40,0\n",
        )
        .await;
        let out = check(env.config(), &ReadArgs::new(false)).await.unwrap();
        assert_eq!(
            out.structure().unwrap(),
            &vec![Discrepancy::Mismatch {
                tag: "Affitto".into(),
                month: Month::February,
                sheet: Decimal::from(850),
                derived: Decimal::from(800),
            }]
        );
        assert!(out.message().starts_with("Found 1 discrepancy"));
    }

    #[tokio::test]
    async fn test_check_without_summary_sheet() {
        let env = TestEnv::new().await;
        let err = check(env.config(), &ReadArgs::new(false)).await.unwrap_err();
        assert!(err.to_string().contains("No summary sheet is configured"));
    }
}
