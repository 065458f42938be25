use crate::model::{Amount, Month};
use serde::Serialize;

/// The canonical unit of the pipeline: one expense (or income) entry in one month.
///
/// `tag` is always trimmed and non-empty; the normalizer refuses to build a record otherwise.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct ExpenseRecord {
    description: String,
    amount: Amount,
    tag: String,
    month: Month,
}

impl ExpenseRecord {
    /// Returns `None` when `tag` is blank.
    pub fn new(
        description: impl Into<String>,
        amount: impl Into<Amount>,
        tag: impl AsRef<str>,
        month: Month,
    ) -> Option<Self> {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return None;
        }
        Some(Self {
            description: description.into().trim().to_string(),
            amount: amount.into(),
            tag: tag.to_string(),
            month,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn month(&self) -> Month {
        self.month
    }
}
