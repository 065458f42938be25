//! Classifies tags into macro-categories.

use crate::model::{CategoryMap, MacroCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How tags are compared. The same policy is applied to the tags in the `CategoryMap` and to the
/// tags found in records.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatch {
    /// Tags must match byte for byte.
    Exact,
    /// Tags are trimmed and lowercased before comparison.
    #[default]
    Normalized,
}

serde_plain::derive_display_from_serialize!(TagMatch);
serde_plain::derive_fromstr_from_deserialize!(TagMatch);

impl TagMatch {
    /// The lookup key of `tag` under this policy.
    pub fn key(self, tag: &str) -> String {
        match self {
            TagMatch::Exact => tag.to_string(),
            TagMatch::Normalized => tag.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CategoryMapError {
    #[error("The tag '{tag}' is listed under both {first} and {second}")]
    DuplicateTag {
        tag: String,
        first: MacroCategory,
        second: MacroCategory,
    },
    #[error("The category map lists an empty tag under {0}")]
    EmptyTag(MacroCategory),
}

/// The inverted form of a `CategoryMap`: one lookup per tag.
#[derive(Debug, Clone)]
pub struct Categorizer {
    version: u32,
    tag_match: TagMatch,
    index: HashMap<String, MacroCategory>,
}

impl Categorizer {
    pub fn new(map: &CategoryMap, tag_match: TagMatch) -> Result<Self, CategoryMapError> {
        let mut index = HashMap::new();
        for (category, tags) in map.iter() {
            for tag in tags {
                let key = tag_match.key(tag);
                if key.trim().is_empty() {
                    return Err(CategoryMapError::EmptyTag(category));
                }
                if let Some(first) = index.insert(key, category) {
                    // Listing a tag twice under the same category is harmless.
                    if first != category {
                        return Err(CategoryMapError::DuplicateTag {
                            tag: tag.clone(),
                            first,
                            second: category,
                        });
                    }
                }
            }
        }
        Ok(Self {
            version: map.version(),
            tag_match,
            index,
        })
    }

    /// The version of the `CategoryMap` this was built from.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn tag_match(&self) -> TagMatch {
        self.tag_match
    }

    pub fn categorize(&self, tag: &str) -> MacroCategory {
        self.index
            .get(&self.tag_match.key(tag))
            .copied()
            .unwrap_or(MacroCategory::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> CategoryMap {
        CategoryMap::new(4, ["Salary"], ["Rent", "Utilities"], ["Dining"])
    }

    #[test]
    fn test_every_listed_tag_has_one_category() {
        let map = map();
        let categorizer = Categorizer::new(&map, TagMatch::Exact).unwrap();
        for (category, tags) in map.iter() {
            for tag in tags {
                assert_eq!(categorizer.categorize(tag), category);
            }
        }
        assert_eq!(categorizer.version(), 4);
    }

    #[test]
    fn test_unknown_tags_are_other() {
        let categorizer = Categorizer::new(&map(), TagMatch::Normalized).unwrap();
        assert_eq!(categorizer.categorize("Gifts"), MacroCategory::Other);
        assert_eq!(categorizer.categorize(""), MacroCategory::Other);
    }

    #[test]
    fn test_normalized_matching() {
        let categorizer = Categorizer::new(&map(), TagMatch::Normalized).unwrap();
        assert_eq!(categorizer.categorize(" rent "), MacroCategory::NecessaryExpense);
        assert_eq!(categorizer.categorize("SALARY"), MacroCategory::Income);

        let exact = Categorizer::new(&map(), TagMatch::Exact).unwrap();
        assert_eq!(exact.categorize("rent"), MacroCategory::Other);
        assert_eq!(exact.categorize("Rent"), MacroCategory::NecessaryExpense);
    }

    #[test]
    fn test_default_map_matches_lowercase_tags() {
        let categorizer = Categorizer::new(&CategoryMap::default(), TagMatch::default()).unwrap();
        assert_eq!(categorizer.categorize("stipendio"), MacroCategory::Income);
        assert_eq!(
            categorizer.categorize("tempo libero"),
            MacroCategory::DiscretionaryExpense
        );
    }

    #[test]
    fn test_duplicate_tag_across_categories() {
        let map = CategoryMap::new(1, ["Refund"], Vec::<&str>::new(), ["refund"]);
        let err = Categorizer::new(&map, TagMatch::Normalized).unwrap_err();
        assert_eq!(
            err,
            CategoryMapError::DuplicateTag {
                tag: "refund".into(),
                first: MacroCategory::Income,
                second: MacroCategory::DiscretionaryExpense,
            }
        );
        // Distinct under exact matching.
        assert!(Categorizer::new(&map, TagMatch::Exact).is_ok());
    }

    #[test]
    fn test_empty_tag() {
        let map = CategoryMap::new(1, ["  "], Vec::<&str>::new(), Vec::<&str>::new());
        assert_eq!(
            Categorizer::new(&map, TagMatch::Normalized).unwrap_err(),
            CategoryMapError::EmptyTag(MacroCategory::Income)
        );
    }
}
