//! Pivoted Query Synthesis (PQS) oracle for SQL engines.
//!
//! The fuzzer fills a working database with random tables and rows, then
//! repeatedly picks a random "pivot" row and synthesizes a query whose WHERE
//! clause is guaranteed to hold for it. If the engine's result does not
//! contain the pivot row, the engine has a logic bug.

pub mod bootstrap;
pub mod config;
pub mod connection;
pub mod error;
pub mod generation;
pub mod model;
pub mod oracle;
pub mod pivot;
pub mod runner;
pub mod schema;

pub use bootstrap::{BootstrapController, BootstrapReport};
pub use config::{BootstrapConfig, PqsConfig};
pub use connection::{Connection, SqliteConnection};
pub use error::{InfrastructureFault, PqsError};
pub use generation::{
    PivotQuerySynthesizer, QuerySynthesizer, RandomStatementGenerator, StatementGenerator,
};
pub use oracle::{Mismatch, OracleResult, PivotOracle};
pub use pivot::PivotSelector;
pub use runner::{CancelToken, Fuzzer, LoopState, RunStats};
pub use schema::SchemaSnapshot;
