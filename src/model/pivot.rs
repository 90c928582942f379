use std::fmt::Display;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::PivotSelectionError;
use crate::model::{QueryCell, TableColumn};

/// The pivot row: ground truth every synthesized query must include.
///
/// Keys keep insertion order so diagnostics list columns table by table.
#[derive(Debug, Clone, Default)]
pub struct PivotRow {
    cells: IndexMap<TableColumn, QueryCell>,
}

impl PivotRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cell. A key that is already present is rejected: with
    /// `(table, column)` keys a collision means the schema listed a table
    /// twice, and silently overwriting would change the ground truth.
    pub fn insert(&mut self, key: TableColumn, cell: QueryCell) -> Result<(), PivotSelectionError> {
        match self.cells.entry(key) {
            Entry::Occupied(entry) => Err(PivotSelectionError::DuplicateKey(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(cell);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &TableColumn) -> Option<&QueryCell> {
        self.cells.get(key)
    }

    pub fn contains(&self, key: &TableColumn) -> bool {
        self.cells.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableColumn, &QueryCell)> {
        self.cells.iter()
    }
}

impl FromIterator<(TableColumn, QueryCell)> for PivotRow {
    fn from_iter<I: IntoIterator<Item = (TableColumn, QueryCell)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Display for PivotRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, cell) in &self.cells {
            writeln!(
                f,
                "key: {key}, value: [null: {}, value: {}]",
                cell.is_null(),
                cell.string_value()
            )?;
        }
        Ok(())
    }
}
