use turso_pqs::connection::{Interrupt, Rows};
use turso_pqs::error::{ExecutionError, SchemaFetchError};
use turso_pqs::generation::RandomStatementGenerator;
use turso_pqs::model::{Column, Identifier};
use turso_pqs::{BootstrapConfig, CancelToken, Connection, Fuzzer, PivotQuerySynthesizer};
use turso_pqs::{PqsConfig, PqsError, SqliteConnection};

use crate::common::{bounded_config, init_tracing};

/// SQLite with a planted logic bug: filtered queries lose every row that
/// holds a NULL.
struct DropsNullRows(SqliteConnection);

impl Connection for DropsNullRows {
    fn list_tables(&self, database: &str) -> Result<Vec<Identifier>, SchemaFetchError> {
        self.0.list_tables(database)
    }

    fn list_columns(
        &self,
        database: &str,
        table: &Identifier,
    ) -> Result<Vec<Column>, SchemaFetchError> {
        self.0.list_columns(database, table)
    }

    fn list_indexes(
        &self,
        database: &str,
        table: &Identifier,
    ) -> Result<Vec<Identifier>, SchemaFetchError> {
        self.0.list_indexes(database, table)
    }

    fn select(&self, sql: &str) -> Result<Rows, ExecutionError> {
        let mut rows = self.0.select(sql)?;
        if sql.contains(" WHERE ") {
            rows.retain(|row| row.iter().all(|cell| !cell.is_null()));
        }
        Ok(rows)
    }

    fn exec(&self, sql: &str) -> Result<(), ExecutionError> {
        self.0.exec(sql)
    }

    fn drop_database(&mut self, database: &str) -> Result<(), ExecutionError> {
        self.0.drop_database(database)
    }

    fn create_database(&mut self, database: &str) -> Result<(), ExecutionError> {
        self.0.create_database(database)
    }

    fn use_database(&mut self, database: &str) -> Result<(), ExecutionError> {
        self.0.use_database(database)
    }

    fn interrupt_handle(&self) -> Box<dyn Interrupt> {
        self.0.interrupt_handle()
    }

    fn seed_random(&self, seed: u64) -> Result<(), ExecutionError> {
        self.0.seed_random(seed)
    }
}

#[test]
fn test_planted_bug_is_detected() {
    init_tracing();
    let config = PqsConfig {
        bootstrap: BootstrapConfig {
            max_tables: 3,
            null_probability: 0.5,
            ..BootstrapConfig::default()
        },
        ..bounded_config(5, 500)
    };
    let conn = DropsNullRows(SqliteConnection::open_in_memory().unwrap());
    let generator = RandomStatementGenerator::new(config.bootstrap.generator_opts());
    let mut fuzzer = Fuzzer::new(conn, generator, PivotQuerySynthesizer::default(), config).unwrap();

    fuzzer.start(&CancelToken::new()).unwrap();
    fuzzer.wait();
    match fuzzer.close() {
        Err(PqsError::OracleMismatchDetected(mismatch)) => {
            assert!(mismatch.pivot.iter().any(|(_, cell)| cell.is_null()));
            assert!(mismatch.rows.iter().flatten().all(|cell| !cell.is_null()));
        }
        other => panic!("expected a mismatch, got {other:?}"),
    }
}
