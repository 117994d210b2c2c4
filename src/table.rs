// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The flat record table every file-format reader produces.

A [Table] is an ordered set of equal-length named columns; names are
lowercased at insertion and rows keep the order they had in the source file.
 */

use indexmap::IndexMap;
use thiserror::Error;

/// A single column of primitive values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// 64-bit floats.
    Float(Vec<f64>),
    /// Signed integers (Madrigal time columns and counters).
    Int(Vec<i64>),
    /// Fixed-length strings from the source file, e.g. GNSS site codes.
    Text(Vec<String>),
}

impl Column {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    /// Is the column empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The column as f64 values, widening integers; `None` for text.
    pub fn as_floats(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float(v) => Some(v.clone()),
            Column::Int(v) => Some(v.iter().map(|&i| i as f64).collect()),
            Column::Text(_) => None,
        }
    }

    /// A new column holding the rows at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
            Column::Int(v) => Column::Int(indices.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// Raised when a column of mismatched length is inserted.
#[derive(Error, Debug)]
#[error("column {name} has {rows} rows, but the table already has {expected}")]
pub struct ColumnLengthError {
    /// Lowercased name of the offending column.
    pub name: String,
    /// Rows in the offending column.
    pub rows: usize,
    /// Rows in the table.
    pub expected: usize,
}

/// An ordered collection of equal-length named columns.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: IndexMap<String, Column>,
}

impl Table {
    /// An empty table.
    pub fn new() -> Table {
        Table::default()
    }

    /// Insert a column, lowercasing its name. Replaces any column of the
    /// same name.
    pub fn insert<S: AsRef<str>>(
        &mut self,
        name: S,
        column: Column,
    ) -> Result<(), ColumnLengthError> {
        let key = name.as_ref().to_lowercase();
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(ColumnLengthError {
                name: key,
                rows: column.len(),
                expected: self.n_rows(),
            });
        }
        self.columns.insert(key, column);
        Ok(())
    }

    /// Number of rows shared by every column (0 for an empty table).
    pub fn n_rows(&self) -> usize {
        self.columns.values().next().map_or(0, Column::len)
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Is the table column-less?
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Does a column of this (lowercase) name exist?
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Borrow a column by lowercase name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// A column as f64 values, if it exists and is numeric.
    pub fn floats(&self, name: &str) -> Option<Vec<f64>> {
        self.columns.get(name).and_then(Column::as_floats)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Iterate `(name, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercased() {
        let mut table = Table::new();
        table
            .insert("YEAR", Column::Int(vec![2019, 2019]))
            .unwrap();
        assert!(table.contains("year"));
        assert!(!table.contains("YEAR"));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let mut table = Table::new();
        table.insert("a", Column::Float(vec![1.0, 2.0])).unwrap();
        let err = table.insert("b", Column::Float(vec![1.0])).unwrap_err();
        assert_eq!(err.rows, 1);
        assert_eq!(err.expected, 2);
    }

    #[test]
    fn int_columns_widen_to_float() {
        let mut table = Table::new();
        table.insert("hour", Column::Int(vec![0, 23])).unwrap();
        assert_eq!(table.floats("hour"), Some(vec![0.0, 23.0]));
    }
}
