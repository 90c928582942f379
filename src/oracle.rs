//! Containment oracle for pivoted queries.
//!
//! A synthesized query's WHERE clause holds for the pivot row, so the pivot's
//! projection must be among the returned rows. Anything else is a logic bug
//! in the engine.

use std::fmt::Display;

use tracing::{error, info};

use crate::connection::{Connection, Rows};
use crate::error::{ExecutionError, InfrastructureFault, SynthesisError};
use crate::generation::RenderedQuery;
use crate::model::{PivotRow, QueryCell, TableColumn};

/// Everything needed to reproduce a failed containment check.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub sql: String,
    pub pivot: PivotRow,
    pub columns: Vec<TableColumn>,
    pub rows: Rows,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SQL: {}", self.sql)?;
        writeln!(f, "--- ORIGIN ROWS ---")?;
        write!(f, "{}", self.pivot)?;
        writeln!(f, "--- COLUMNS ---")?;
        for (i, column) in self.columns.iter().enumerate() {
            writeln!(f, "{i}: {column}")?;
        }
        writeln!(f, "--- DATA --- count: {}", self.rows.len())?;
        for (i, row) in self.rows.iter().enumerate() {
            let cells = row.iter().map(QueryCell::to_string).collect::<Vec<_>>();
            writeln!(f, "line {i}: {}", cells.join(" | "))?;
        }
        Ok(())
    }
}

/// Result of an oracle check.
#[derive(Debug, Clone)]
pub enum OracleResult {
    Pass,
    Fail(Box<Mismatch>),
}

impl OracleResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, OracleResult::Pass)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PivotOracle;

impl PivotOracle {
    pub fn run<C: Connection + ?Sized>(&self, conn: &C, sql: &str) -> Result<Rows, ExecutionError> {
        conn.select(sql)
    }

    /// True iff some row matches the pivot on every output column.
    pub fn verify(&self, pivot: &PivotRow, columns: &[TableColumn], rows: &Rows) -> bool {
        rows.iter().any(|row| Self::check_row(pivot, columns, row))
    }

    fn check_row(pivot: &PivotRow, columns: &[TableColumn], row: &[QueryCell]) -> bool {
        if row.len() < columns.len() {
            return false;
        }
        columns
            .iter()
            .zip(row)
            .all(|(key, cell)| pivot.get(key).is_some_and(|expected| expected == cell))
    }

    /// Run `query` and check that the pivot row is contained in its result.
    pub fn check<C: Connection + ?Sized>(
        &self,
        conn: &C,
        pivot: &PivotRow,
        query: &RenderedQuery,
    ) -> Result<OracleResult, InfrastructureFault> {
        if let Some(missing) = query.columns.iter().find(|key| !pivot.contains(key)) {
            return Err(SynthesisError::MissingPivotValue(missing.clone()).into());
        }
        info!("pivot row:\n{pivot}");
        info!(
            "columns: {}",
            query
                .columns
                .iter()
                .map(TableColumn::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("query: {}", query.sql);

        let rows = self.run(conn, &query.sql)?;
        if self.verify(pivot, &query.columns, &rows) {
            info!("run one statement successfully: {}", query.sql);
            return Ok(OracleResult::Pass);
        }

        let mismatch = Mismatch {
            sql: query.sql.clone(),
            pivot: pivot.clone(),
            columns: query.columns.clone(),
            rows,
        };
        error!("pivot row missing from query result\n{mismatch}");
        Ok(OracleResult::Fail(Box::new(mismatch)))
    }
}
