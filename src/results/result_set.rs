use std::collections::HashMap;
use std::sync::Arc;

use crate::mapping::RowBounds;
use crate::types::RowValues;

use super::row::{CustomDbRow, column_index};

/// A result set from a database query
///
/// This struct represents the result of a database query,
/// containing the rows returned by the query and metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
            column_index: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Rows added before column names are set are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(index),
            });
            self.rows_affected += 1;
        }
    }

    /// Add a prebuilt row to the result set
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }

    /// Keep only the rows inside `bounds`.
    #[must_use]
    pub fn paginate(mut self, bounds: RowBounds) -> ResultSet {
        if bounds.is_default() {
            return self;
        }
        self.results = self
            .results
            .into_iter()
            .skip(bounds.offset())
            .take(bounds.limit())
            .collect();
        self.rows_affected = self.results.len();
        self
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CustomDbRow;
    type IntoIter = std::slice::Iter<'a, CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: i64) -> ResultSet {
        let mut rs = ResultSet::with_capacity(n as usize);
        rs.set_column_names(Arc::new(vec!["n".to_string()]));
        for i in 0..n {
            rs.add_row_values(vec![RowValues::Int(i)]);
        }
        rs
    }

    #[test]
    fn rows_share_column_lookup() {
        let rs = numbers(3);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.results[2].get("n"), Some(&RowValues::Int(2)));
        assert_eq!(rs.results[2].get("N"), Some(&RowValues::Int(2)));
    }

    #[test]
    fn paginate_applies_offset_and_limit() {
        let rs = numbers(10).paginate(RowBounds::new(3, 2));
        let values: Vec<_> = rs.iter().map(|r| r.get("n").cloned()).collect();
        assert_eq!(
            values,
            vec![Some(RowValues::Int(3)), Some(RowValues::Int(4))]
        );
        assert_eq!(rs.rows_affected, 2);
    }
}
