//! Access to the database under test.
//!
//! The oracle core only talks to the engine through [`Connection`]: metadata
//! probes for the schema snapshot, row queries for pivot selection and
//! verification, plain statements for bootstrap.

use crate::error::{ExecutionError, SchemaFetchError};
use crate::model::{Column, Identifier, QueryCell};

mod sqlite;

pub use sqlite::SqliteConnection;

/// Rows returned by a query, each a list of cells in SELECT-list order.
pub type Rows = Vec<Vec<QueryCell>>;

/// Aborts whatever statement the owning connection is running.
pub trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

pub trait Connection: Send {
    fn list_tables(&self, database: &str) -> Result<Vec<Identifier>, SchemaFetchError>;

    fn list_columns(&self, database: &str, table: &Identifier)
    -> Result<Vec<Column>, SchemaFetchError>;

    fn list_indexes(
        &self,
        database: &str,
        table: &Identifier,
    ) -> Result<Vec<Identifier>, SchemaFetchError>;

    fn select(&self, sql: &str) -> Result<Rows, ExecutionError>;

    fn exec(&self, sql: &str) -> Result<(), ExecutionError>;

    fn drop_database(&mut self, database: &str) -> Result<(), ExecutionError>;

    fn create_database(&mut self, database: &str) -> Result<(), ExecutionError>;

    fn use_database(&mut self, database: &str) -> Result<(), ExecutionError>;

    fn interrupt_handle(&self) -> Box<dyn Interrupt>;

    /// Make the engine's own randomness (`RANDOM()`) follow `seed`. Engines
    /// without a hook for it keep their own source.
    fn seed_random(&self, _seed: u64) -> Result<(), ExecutionError> {
        Ok(())
    }
}
