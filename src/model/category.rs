use serde::{Deserialize, Serialize};

/// The budget bucket a tag belongs to.
///
/// `Other` collects every tag that the `CategoryMap` does not list. It is reported, but it never
/// takes part in the savings arithmetic.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroCategory {
    Income,
    NecessaryExpense,
    DiscretionaryExpense,
    Other,
}

serde_plain::derive_display_from_serialize!(MacroCategory);
serde_plain::derive_fromstr_from_deserialize!(MacroCategory);

impl MacroCategory {
    /// The categories a `CategoryMap` can list tags under, in map order.
    pub const MAPPED: [MacroCategory; 3] = [
        MacroCategory::Income,
        MacroCategory::NecessaryExpense,
        MacroCategory::DiscretionaryExpense,
    ];
}

/// The static mapping from macro-category to the tags it contains. This is configuration: it is
/// loaded once per run and never modified afterwards. Bump `version` whenever the lists change so
/// that exported summaries can be traced to the map that produced them.
///
/// Example:
/// ```json
/// {
///   "version": 1,
///   "income": ["Stipendio", "Entrate", "Reddito"],
///   "necessary_expense": ["Affitto", "Bollette", "Spese fisse"],
///   "discretionary_expense": ["Cibo", "Tempo libero", "Viaggi"]
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryMap {
    version: u32,
    #[serde(default)]
    income: Vec<String>,
    #[serde(default)]
    necessary_expense: Vec<String>,
    #[serde(default)]
    discretionary_expense: Vec<String>,
}

impl CategoryMap {
    pub fn new<S: Into<String>>(
        version: u32,
        income: impl IntoIterator<Item = S>,
        necessary_expense: impl IntoIterator<Item = S>,
        discretionary_expense: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            version,
            income: income.into_iter().map(Into::into).collect(),
            necessary_expense: necessary_expense.into_iter().map(Into::into).collect(),
            discretionary_expense: discretionary_expense.into_iter().map(Into::into).collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The tags listed under `category`. `Other` has no list.
    pub fn tags(&self, category: MacroCategory) -> &[String] {
        match category {
            MacroCategory::Income => &self.income,
            MacroCategory::NecessaryExpense => &self.necessary_expense,
            MacroCategory::DiscretionaryExpense => &self.discretionary_expense,
            MacroCategory::Other => &[],
        }
    }

    /// Iterates `(category, tags)` in map order.
    pub fn iter(&self) -> impl Iterator<Item = (MacroCategory, &[String])> {
        MacroCategory::MAPPED
            .into_iter()
            .map(move |category| (category, self.tags(category)))
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self::new(
            1,
            ["Stipendio", "Entrate", "Reddito"],
            ["Affitto", "Bollette", "Spese fisse"],
            ["Cibo", "Tempo libero", "Viaggi"],
        )
    }
}
