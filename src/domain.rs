use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;

use crate::error::Result;

/// Closed categorical domains of the key columns.
///
/// Levels are the sorted distinct (already trimmed) values of a column across
/// every table registered with the domain. Aggregations with
/// `observed = false` expand their groups over these levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDomains {
    levels: BTreeMap<String, BTreeSet<String>>,
}

impl CategoryDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build domains for `columns` from the given tables. Tables lacking a
    /// column simply contribute nothing to it.
    pub fn from_frames<'a>(
        frames: impl IntoIterator<Item = &'a DataFrame>,
        columns: &[&str],
    ) -> Result<Self> {
        let mut domains = Self::new();
        for df in frames {
            domains.register(df, columns)?;
        }
        Ok(domains)
    }

    /// Add the non-null values of `columns` found in `df`.
    pub fn register(&mut self, df: &DataFrame, columns: &[&str]) -> Result<()> {
        for &name in columns {
            let Ok(column) = df.column(name) else {
                continue;
            };
            let levels = self.levels.entry(name.to_string()).or_default();
            for value in column.str()?.into_iter().flatten() {
                if !levels.contains(value) {
                    levels.insert(value.to_string());
                }
            }
        }
        Ok(())
    }

    pub fn levels(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.levels.get(column)
    }

    /// Registered levels of `column` merged with whatever `df` holds for it.
    pub fn levels_with(&self, df: &DataFrame, column: &str) -> Result<BTreeSet<String>> {
        let mut levels = self.levels(column).cloned().unwrap_or_default();
        for value in df.column(column)?.str()?.into_iter().flatten() {
            if !levels.contains(value) {
                levels.insert(value.to_string());
            }
        }
        Ok(levels)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_across_frames_sorted() {
        let a = df! { "location" => ["siteB", "siteA"], "trash_type" => ["glass", "plastic"] }.unwrap();
        let b = df! { "location" => [Some("siteC"), None, Some("siteA")] }.unwrap();

        let domains = CategoryDomains::from_frames([&a, &b], &["location", "trash_type"]).unwrap();
        let locations: Vec<&str> = domains
            .levels("location")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(locations, vec!["siteA", "siteB", "siteC"]);
        assert_eq!(domains.levels("trash_type").unwrap().len(), 2);
        assert!(domains.levels("species_impacted").is_none());
    }

    #[test]
    fn levels_with_adds_unregistered_values() {
        let registered = df! { "location" => ["siteA"] }.unwrap();
        let domains = CategoryDomains::from_frames([&registered], &["location"]).unwrap();

        let other = df! { "location" => ["siteZ"] }.unwrap();
        let levels = domains.levels_with(&other, "location").unwrap();
        assert_eq!(levels.len(), 2);
        assert!(levels.contains("siteZ"));
    }
}
