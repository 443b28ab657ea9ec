//! A generic map with two keys per value.

use fnv::FnvHashMap;
use std::collections::BTreeMap;
use std::hash::Hash;

/// A two-dimensional map indexed by a row key and a column key.
///
/// Rows live in a hash map while the columns of each row are kept ordered.
/// This makes single-cell access cheap and iteration over a row deterministic,
/// which the solvers rely on for reproducible results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<R: Eq + Hash, C: Ord, V> {
    rows: FnvHashMap<R, BTreeMap<C, V>>,
}

impl<R: Eq + Hash, C: Ord, V> Table<R, C, V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Table {
            rows: FnvHashMap::default(),
        }
    }

    /// Insert a value at (row, column).
    /// Returns the previous value at that cell if there was one.
    pub fn insert(&mut self, row: R, column: C, value: V) -> Option<V> {
        self.rows.entry(row).or_default().insert(column, value)
    }

    /// Get the value at (row, column).
    pub fn get(&self, row: &R, column: &C) -> Option<&V> {
        self.rows.get(row).and_then(|columns| columns.get(column))
    }

    /// Get a mutable reference to the value at (row, column).
    pub fn get_mut(&mut self, row: &R, column: &C) -> Option<&mut V> {
        self.rows
            .get_mut(row)
            .and_then(|columns| columns.get_mut(column))
    }

    /// Return `true` if the cell (row, column) holds a value.
    pub fn contains(&self, row: &R, column: &C) -> bool {
        self.get(row, column).is_some()
    }

    /// Get all columns of the given row.
    pub fn row(&self, row: &R) -> Option<&BTreeMap<C, V>> {
        self.rows.get(row)
    }

    /// Get the columns of the given row, inserting an empty row if missing.
    pub fn row_mut(&mut self, row: R) -> &mut BTreeMap<C, V> {
        self.rows.entry(row).or_default()
    }

    /// Remove the value at (row, column). Empty rows are dropped from the table.
    pub fn remove(&mut self, row: &R, column: &C) -> Option<V> {
        let columns = self.rows.get_mut(row)?;
        let value = columns.remove(column);
        if columns.is_empty() {
            self.rows.remove(row);
        }
        value
    }

    /// Iterate over all rows.
    pub fn rows(&self) -> impl Iterator<Item = (&R, &BTreeMap<C, V>)> {
        self.rows.iter()
    }

    /// Iterate over all (row, column, value) cells.
    pub fn iter(&self) -> impl Iterator<Item = (&R, &C, &V)> {
        self.rows
            .iter()
            .flat_map(|(row, columns)| columns.iter().map(move |(column, value)| (row, column, value)))
    }

    /// The number of cells in the table.
    pub fn len(&self) -> usize {
        self.rows.values().map(|columns| columns.len()).sum()
    }

    /// Return `true` if the table holds no cells.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove all cells.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

impl<R: Eq + Hash, C: Ord, V> Default for Table<R, C, V> {
    fn default() -> Self {
        Table::new()
    }
}
