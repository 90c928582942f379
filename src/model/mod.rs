//! Schema, value and pivot-row types shared by every component.

mod pivot;
mod table;
mod value;

pub use pivot::PivotRow;
pub use table::{Affinity, Column, Identifier, Table, TableColumn, lookup_column};
pub use value::{QueryCell, SqlValue, ValueType};
