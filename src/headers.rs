//! Ordered, name-deduplicated column registry

use std::collections::HashMap;

use crate::column::{Column, ColumnType};
use crate::error::{CsvError, Result};

/// Longest column name kept; longer names are cut before deduplication.
pub const MAX_COLUMN_NAME_LEN: usize = 120;

/// Prefix for names synthesized for blank headers (`Column1`, `Column2`, ...)
pub const SYNTHESIZED_NAME_PREFIX: &str = "Column";

/// Columns in registration order plus a name index.
///
/// Ordinals are dense and follow insertion order; names are unique using
/// exact, case-sensitive comparison.
#[derive(Debug, Clone, Default)]
pub struct HeaderRegistry {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
}

impl HeaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column and return its ordinal.
    ///
    /// Blank names become `Column{ordinal + 1}`. Names longer than
    /// [`MAX_COLUMN_NAME_LEN`] characters are truncated, then a `_N` suffix
    /// with the smallest free `N` resolves clashes.
    pub fn add(&mut self, name: &str, is_virtual: bool) -> usize {
        let ordinal = self.columns.len();

        let base: String = if name.trim().is_empty() {
            format!("{}{}", SYNTHESIZED_NAME_PREFIX, ordinal + 1)
        } else {
            name.chars().take(MAX_COLUMN_NAME_LEN).collect()
        };

        let mut unique = base.clone();
        let mut n = 0usize;
        while self.by_name.contains_key(&unique) {
            n += 1;
            unique = format!("{}_{}", base, n);
        }

        self.by_name.insert(unique.clone(), ordinal);
        self.columns.push(Column::new(unique, ordinal, is_virtual));
        ordinal
    }

    /// Number of registered columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column at `ordinal`
    pub fn get(&self, ordinal: usize) -> Result<&Column> {
        self.columns.get(ordinal).ok_or(CsvError::OrdinalOutOfRange {
            ordinal,
            count: self.columns.len(),
        })
    }

    /// Column registered under exactly `name`
    pub fn by_name(&self, name: &str) -> Result<&Column> {
        let ordinal = self.ordinal(name)?;
        Ok(&self.columns[ordinal])
    }

    /// Ordinal of the column registered under exactly `name`
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CsvError::UnknownColumn(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Change the declared value type of a column
    pub fn set_type(&mut self, ordinal: usize, column_type: ColumnType) -> Result<()> {
        let count = self.columns.len();
        let column = self
            .columns
            .get_mut(ordinal)
            .ok_or(CsvError::OrdinalOutOfRange { ordinal, count })?;
        column.column_type = column_type;
        Ok(())
    }

    /// Columns in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Registered names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }
}

impl<'a> IntoIterator for &'a HeaderRegistry {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let mut headers = HeaderRegistry::new();
        for _ in 0..3 {
            headers.add("Name", false);
        }

        let names: Vec<&str> = headers.names().collect();
        assert_eq!(names, vec!["Name", "Name_1", "Name_2"]);
        let ordinals: Vec<usize> = headers.iter().map(Column::ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn test_smallest_free_suffix_is_used() {
        let mut headers = HeaderRegistry::new();
        headers.add("A", false);
        headers.add("A_1", false);
        headers.add("A", false);

        assert_eq!(headers.get(2).unwrap().name(), "A_2");
    }

    #[test]
    fn test_blank_names_are_synthesized() {
        let mut headers = HeaderRegistry::new();
        headers.add("Id", false);
        headers.add("", false);
        headers.add("   ", false);

        let names: Vec<&str> = headers.names().collect();
        assert_eq!(names, vec!["Id", "Column2", "Column3"]);
    }

    #[test]
    fn test_synthesized_name_clashing_with_real_name() {
        let mut headers = HeaderRegistry::new();
        headers.add("Column2", false);
        headers.add("", false);

        assert_eq!(headers.get(1).unwrap().name(), "Column2_1");
    }

    #[test]
    fn test_long_names_are_truncated_before_dedup() {
        let long = "x".repeat(MAX_COLUMN_NAME_LEN + 30);
        let mut headers = HeaderRegistry::new();
        headers.add(&long, false);
        headers.add(&format!("{}y", long), false);

        let first = headers.get(0).unwrap().name().to_string();
        assert_eq!(first.chars().count(), MAX_COLUMN_NAME_LEN);
        assert_eq!(headers.get(1).unwrap().name(), format!("{}_1", first));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut headers = HeaderRegistry::new();
        headers.add("City", false);
        headers.add("Id", true);

        assert_eq!(headers.ordinal("City").unwrap(), 0);
        assert!(headers.by_name("city").is_err());
        assert!(headers.by_name("Id").unwrap().is_virtual());
        assert!(matches!(
            headers.get(5),
            Err(CsvError::OrdinalOutOfRange { ordinal: 5, count: 2 })
        ));
    }

    #[test]
    fn test_set_type() {
        let mut headers = HeaderRegistry::new();
        headers.add("Age", false);
        headers.set_type(0, ColumnType::Int32).unwrap();

        assert_eq!(headers.get(0).unwrap().column_type, ColumnType::Int32);
        assert!(headers.set_type(1, ColumnType::Int32).is_err());
    }
}
