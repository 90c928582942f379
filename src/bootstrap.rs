//! Database reset and random population.
//!
//! Population is best effort: every generated statement runs on its own and
//! a failing one is logged and skipped. Only the reset primitives propagate
//! their errors.

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::config::BootstrapConfig;
use crate::connection::Connection;
use crate::error::{ExecutionError, GenerationError};
use crate::generation::{IndexOptions, Statement, StatementGenerator, StatementKind};

/// Executed and failed statement counts of one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub executed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub tables: KindCounts,
    pub indexes: KindCounts,
    pub inserts: KindCounts,
}

impl BootstrapReport {
    fn counts_mut(&mut self, kind: StatementKind) -> &mut KindCounts {
        match kind {
            StatementKind::CreateTable => &mut self.tables,
            StatementKind::CreateIndex => &mut self.indexes,
            StatementKind::Insert => &mut self.inserts,
        }
    }

    fn record(&mut self, kind: StatementKind, ok: bool) {
        let counts = self.counts_mut(kind);
        if ok {
            counts.executed += 1;
        } else {
            counts.failed += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapController {
    database: String,
    config: BootstrapConfig,
}

impl BootstrapController {
    pub fn new(database: impl Into<String>, config: BootstrapConfig) -> Self {
        Self {
            database: database.into(),
            config,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Drop the working database, create it empty and select it.
    pub fn reset<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<(), ExecutionError> {
        conn.drop_database(&self.database)?;
        conn.create_database(&self.database)?;
        conn.use_database(&self.database)?;
        debug!("database {} reset", self.database);
        Ok(())
    }

    /// Fill the working database with random tables, indexes and rows.
    pub fn populate<C, G, R>(&self, conn: &C, generator: &mut G, rng: &mut R) -> BootstrapReport
    where
        C: Connection + ?Sized,
        G: StatementGenerator,
        R: Rng + ?Sized,
    {
        let mut report = BootstrapReport::default();

        let table_count = rng.random_range(1..=self.config.max_tables);
        for _ in 0..table_count {
            let stmt = generator.create_table(rng);
            self.execute(conn, StatementKind::CreateTable, stmt, &mut report);
        }

        if let Err(err) = generator.reload_schema(conn, &self.database) {
            error!("failed to reload schema after creating tables: {err}");
        }

        let index_count = rng.random_range(0..=self.config.max_indexes);
        let opts = IndexOptions {
            online_ddl: true,
            tables: vec![],
        };
        for _ in 0..index_count {
            let stmt = generator.create_index(rng, &opts);
            self.execute(conn, StatementKind::CreateIndex, stmt, &mut report);
        }

        let tables = generator.tables().to_vec();
        for table in &tables {
            let stmt = generator.insert(rng, table);
            self.execute(conn, StatementKind::Insert, stmt, &mut report);
        }

        info!(
            "bootstrap done: {}/{} tables, {}/{} indexes, {}/{} inserts",
            report.tables.executed,
            table_count,
            report.indexes.executed,
            index_count,
            report.inserts.executed,
            tables.len()
        );
        report
    }

    fn execute<C: Connection + ?Sized>(
        &self,
        conn: &C,
        kind: StatementKind,
        stmt: Result<Statement, GenerationError>,
        report: &mut BootstrapReport,
    ) {
        let stmt = match stmt {
            Ok(stmt) => stmt,
            Err(err) => {
                warn!("could not generate {kind:?} statement: {err}");
                report.record(kind, false);
                return;
            }
        };
        match conn.exec(&stmt.sql) {
            Ok(()) => {
                debug!("{stmt}");
                report.record(kind, true);
            }
            Err(err) => {
                warn!("{kind:?} statement failed: {err}: {}", error_source(&err));
                report.record(kind, false);
            }
        }
    }
}

fn error_source(err: &ExecutionError) -> String {
    std::error::Error::source(err)
        .map(|source| source.to_string())
        .unwrap_or_default()
}
