//! Case-insensitive text search over selected areas of a record.

use std::collections::BTreeSet;

use super::named_enum;

named_enum! {
    /// Groups of record fields a search key is tested against.
    pub enum SearchArea: "search area" {
        Name => "Name",
        Currency => "Currency",
        Notes => "Notes",
        Attachment => "Attachment",
        Other => "Other",
    }
    default Name
}

/// Case-insensitive substring search over selected areas of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub key: String,
    pub areas: BTreeSet<SearchArea>,
}

impl Default for Search {
    fn default() -> Self {
        Self {
            key: String::new(),
            areas: BTreeSet::from([SearchArea::Name]),
        }
    }
}

impl Search {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_areas(mut self, areas: impl IntoIterator<Item = SearchArea>) -> Self {
        self.areas = areas.into_iter().collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.key.trim().is_empty()
    }

    /// Tests the key against the texts `values` yields for every selected
    /// area. An empty key matches everything.
    pub fn matches<F, I>(&self, mut values: F) -> bool
    where
        F: FnMut(SearchArea) -> I,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if self.is_empty() {
            return true;
        }
        let key = self.key.trim().to_lowercase();
        self.areas.iter().any(|&area| {
            values(area)
                .into_iter()
                .any(|text| text.as_ref().to_lowercase().contains(&key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_text(area: SearchArea) -> Vec<&'static str> {
        match area {
            SearchArea::Name => vec!["Main Checking"],
            SearchArea::Notes => vec!["salary goes here"],
            SearchArea::Other => vec!["ACME Bank", ""],
            _ => vec![],
        }
    }

    #[test]
    fn empty_key_matches_everything() {
        assert!(Search::new("  ").matches(account_text));
    }

    #[test]
    fn matches_name_case_insensitively() {
        assert!(Search::new("checking").matches(account_text));
        assert!(!Search::new("salary").matches(account_text));
    }

    #[test]
    fn only_selected_areas_are_searched() {
        let search = Search::new("acme").with_areas([SearchArea::Notes]);
        assert!(!search.matches(account_text));
        let search = search.with_areas([SearchArea::Notes, SearchArea::Other]);
        assert!(search.matches(account_text));
    }
}
