//! Statement generation and pivoted query synthesis.
//!
//! The oracle core reaches both capabilities through the traits below; the
//! rest of the module is the default implementation used against SQLite.

use std::fmt::{Debug, Display};

use rand::Rng;

use crate::connection::Connection;
use crate::error::{GenerationError, SchemaFetchError, SynthesisError};
use crate::model::{Identifier, PivotRow, Table, TableColumn};

pub mod predicate;
pub mod select;
mod statement;
mod value;

pub use predicate::{CompareOp, Operand, Predicate};
pub use select::{PivotQuerySynthesizer, SelectAst};
pub use statement::{GeneratorOpts, RandomStatementGenerator};
pub use value::random_value;

/// Depth bound of the WHERE clause of synthesized queries.
pub const MAX_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    CreateIndex,
    Insert,
}

/// A generated SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Options for `CREATE INDEX` generation.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Only emit indexes that can be built over existing rows without
    /// rejecting any of them, i.e. no UNIQUE indexes.
    pub online_ddl: bool,
    /// Candidate tables; empty lets the generator choose.
    pub tables: Vec<Identifier>,
}

/// Random schema and data generation driven by bootstrap.
pub trait StatementGenerator: Send {
    fn create_table<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Statement, GenerationError>;

    fn create_index<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        opts: &IndexOptions,
    ) -> Result<Statement, GenerationError>;

    fn insert<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        table: &Table,
    ) -> Result<Statement, GenerationError>;

    /// Refresh the generator's view of the schema.
    fn reload_schema<C: Connection + ?Sized>(
        &mut self,
        conn: &C,
        database: &str,
    ) -> Result<(), SchemaFetchError>;

    /// Tables as of the last reload.
    fn tables(&self) -> &[Table];
}

/// A rendered query together with the key of every SELECT-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub sql: String,
    pub columns: Vec<TableColumn>,
}

/// Builds SELECT statements whose WHERE clause holds for the pivot row.
pub trait QuerySynthesizer: Send {
    type Ast: Debug;

    fn build_ast<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_depth: usize,
        tables: &[Table],
    ) -> Result<Self::Ast, SynthesisError>;

    /// Render `ast`, injecting pivot values so the WHERE clause evaluates
    /// to true for `pivot`.
    fn render(
        &self,
        ast: &Self::Ast,
        tables: &[Table],
        pivot: &PivotRow,
    ) -> Result<RenderedQuery, SynthesisError>;
}

pub(crate) fn pick<'a, T, R: Rng + ?Sized>(choices: &'a [T], rng: &mut R) -> &'a T {
    &choices[rng.random_range(0..choices.len())]
}

// Word lists for generating readable identifiers
pub(crate) const ADJECTIVES: &[&str] = &[
    "red", "blue", "green", "fast", "slow", "big", "small", "old", "new", "hot", "cold", "dark",
    "light", "soft", "hard", "loud", "quiet", "sweet", "sour", "fresh", "dry", "wet", "clean",
    "dirty", "empty", "full", "happy", "sad", "angry", "calm", "brave", "shy", "smart", "wild",
];

pub(crate) const NOUNS: &[&str] = &[
    "cat", "dog", "bird", "fish", "tree", "rock", "lake", "river", "cloud", "star", "moon", "sun",
    "book", "desk", "chair", "door", "wall", "roof", "floor", "road", "path", "hill", "cave",
    "leaf", "root", "seed", "fruit", "flower", "grass", "stone", "sand", "wave", "wind", "rain",
];
