use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{ErrorCode, InterruptHandle, Statement};
use tracing::debug;

use crate::connection::{Connection, Interrupt, Rows};
use crate::error::{ExecutionError, SchemaFetchError};
use crate::model::{Column, Identifier, QueryCell, SqlValue, ValueType};

/// SQLite backend over `rusqlite`.
///
/// One connection hosts a single working database in its `main` schema, so
/// dropping the database wipes every user table and view, and the metadata
/// probes only answer for the database selected with `use_database`.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    prepared_statements: bool,
    created: Option<String>,
    current: Option<String>,
}

impl SqliteConnection {
    /// Open a file path, `:memory:` or a `file:` URI.
    pub fn open(data_source: &str, prepared_statements: bool) -> Result<Self, ExecutionError> {
        let conn =
            rusqlite::Connection::open(data_source).map_err(|e| ExecutionError::Open {
                data_source: data_source.to_string(),
                source: e.into(),
            })?;
        Ok(Self {
            conn,
            prepared_statements,
            created: None,
            current: None,
        })
    }

    pub fn open_in_memory() -> Result<Self, ExecutionError> {
        Self::open(":memory:", false)
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn check_database(&self, database: &str) -> Result<(), SchemaFetchError> {
        if self.current.as_deref() == Some(database) {
            Ok(())
        } else {
            Err(SchemaFetchError::UnknownDatabase(database.to_string()))
        }
    }

    fn failed(sql: &str, err: rusqlite::Error) -> ExecutionError {
        if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            ExecutionError::Interrupted {
                sql: sql.to_string(),
            }
        } else {
            ExecutionError::Failed {
                sql: sql.to_string(),
                source: err.into(),
            }
        }
    }

    fn fetch_error(what: String, err: rusqlite::Error) -> SchemaFetchError {
        SchemaFetchError::Query {
            what,
            source: err.into(),
        }
    }

    fn collect_rows(stmt: &mut Statement<'_>) -> rusqlite::Result<Rows> {
        let declared: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_string))
            .collect();
        let width = declared.len();

        let mut rows = Vec::new();
        let mut query_rows = stmt.query([])?;
        while let Some(row) = query_rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for (i, declared) in declared.iter().enumerate() {
                let value = Self::convert_value(row.get_ref(i)?);
                let value_type = ValueType::resolve(declared.as_deref(), &value);
                cells.push(QueryCell::new(value, value_type));
            }
            rows.push(cells);
        }
        Ok(rows)
    }

    fn convert_value(value: ValueRef<'_>) -> SqlValue {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(s) => SqlValue::Text(String::from_utf8_lossy(s).to_string()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }

    fn user_objects(&self) -> rusqlite::Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT type, name FROM sqlite_master WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
        )?;
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect()
    }
}

impl Connection for SqliteConnection {
    fn list_tables(&self, database: &str) -> Result<Vec<Identifier>, SchemaFetchError> {
        self.check_database(database)?;
        let what = || format!("table list of {database}");
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
            )
            .map_err(|e| Self::fetch_error(what(), e))?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Self::fetch_error(what(), e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Self::fetch_error(what(), e))?;

        Ok(tables.into_iter().map(Identifier::new).collect())
    }

    fn list_columns(
        &self,
        database: &str,
        table: &Identifier,
    ) -> Result<Vec<Column>, SchemaFetchError> {
        self.check_database(database)?;
        let what = || format!("columns of {database}.{table}");
        let query = format!("PRAGMA table_info({})", table.quoted());
        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| Self::fetch_error(what(), e))?;

        // PRAGMA table_info returns: cid, name, type, notnull, dflt_value, pk
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared_type: String = row.get::<_, String>(2).unwrap_or_default();
                let notnull: i64 = row.get(3)?;
                let pk: i64 = row.get(5)?;
                Ok((name, declared_type, notnull != 0, pk != 0))
            })
            .map_err(|e| Self::fetch_error(what(), e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Self::fetch_error(what(), e))?;

        Ok(columns
            .into_iter()
            .map(|(name, declared_type, notnull, pk)| {
                let column = Column::new(name, declared_type);
                if notnull || pk {
                    column.not_null()
                } else {
                    column
                }
            })
            .collect())
    }

    fn list_indexes(
        &self,
        database: &str,
        table: &Identifier,
    ) -> Result<Vec<Identifier>, SchemaFetchError> {
        self.check_database(database)?;
        let what = || format!("indexes of {database}.{table}");
        let query = format!("PRAGMA index_list({})", table.quoted());
        let mut stmt = self
            .conn
            .prepare(&query)
            .map_err(|e| Self::fetch_error(what(), e))?;

        // PRAGMA index_list returns: seq, name, unique, origin, partial
        let indexes = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| Self::fetch_error(what(), e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Self::fetch_error(what(), e))?;

        Ok(indexes.into_iter().map(Identifier::new).collect())
    }

    fn select(&self, sql: &str) -> Result<Rows, ExecutionError> {
        let result = if self.prepared_statements {
            self.conn
                .prepare_cached(sql)
                .and_then(|mut stmt| Self::collect_rows(&mut stmt))
        } else {
            self.conn
                .prepare(sql)
                .and_then(|mut stmt| Self::collect_rows(&mut stmt))
        };
        result.map_err(|e| Self::failed(sql, e))
    }

    fn exec(&self, sql: &str) -> Result<(), ExecutionError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| Self::failed(sql, e))
    }

    fn drop_database(&mut self, database: &str) -> Result<(), ExecutionError> {
        if let Some(created) = &self.created
            && created != database
        {
            return Ok(());
        }

        let objects = self
            .user_objects()
            .map_err(|e| Self::failed("SELECT type, name FROM sqlite_master", e))?;
        for (kind, name) in objects {
            let sql = format!(
                "DROP {} IF EXISTS {}",
                kind.to_uppercase(),
                Identifier::new(name).quoted()
            );
            debug!("{sql}");
            self.exec(&sql)?;
        }

        self.created = None;
        self.current = None;
        Ok(())
    }

    fn create_database(&mut self, database: &str) -> Result<(), ExecutionError> {
        if let Some(created) = &self.created {
            return Err(ExecutionError::Failed {
                sql: format!("create database {database}"),
                source: format!("database {created} already exists").into(),
            });
        }
        self.created = Some(database.to_string());
        Ok(())
    }

    fn use_database(&mut self, database: &str) -> Result<(), ExecutionError> {
        if self.created.as_deref() != Some(database) {
            return Err(ExecutionError::Failed {
                sql: format!("use {database}"),
                source: format!("unknown database {database}").into(),
            });
        }
        self.current = Some(database.to_string());
        Ok(())
    }

    fn interrupt_handle(&self) -> Box<dyn Interrupt> {
        Box::new(SqliteInterrupt(self.conn.get_interrupt_handle()))
    }

    /// Replace the built-in `random()` with one drawn from a seeded
    /// `ChaCha8Rng`, so `ORDER BY RANDOM()` picks the same rows per seed.
    /// Not flagged deterministic: SQLite must call it once per row.
    fn seed_random(&self, seed: u64) -> Result<(), ExecutionError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.conn
            .create_scalar_function("random", 0, FunctionFlags::SQLITE_UTF8, move |_| {
                Ok(rng.random::<i64>())
            })
            .map_err(|e| Self::failed("create function random()", e))
    }
}

struct SqliteInterrupt(InterruptHandle);

impl Interrupt for SqliteInterrupt {
    fn interrupt(&self) {
        self.0.interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn working_db() -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.create_database("pqs").unwrap();
        conn.use_database("pqs").unwrap();
        conn
    }

    #[test]
    fn test_select_reports_declared_types() {
        let conn = working_db();
        conn.exec("CREATE TABLE t (a INT, b VARCHAR(10)); INSERT INTO t VALUES (1, 'x'), (NULL, NULL)")
            .unwrap();

        let rows = conn.select("SELECT a, b, 1 + 1 FROM t ORDER BY a").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0][0].is_null());
        assert_eq!(rows[0][0].value_type().name(), "INT");
        assert_eq!(rows[1][1].string_value(), "x");
        assert_eq!(rows[1][1].value_type().name(), "VARCHAR(10)");
        assert_eq!(rows[1][2].value_type().name(), "INTEGER");
    }

    #[test]
    fn test_prepared_statements_give_same_rows() {
        let mut conn = SqliteConnection::open(":memory:", true).unwrap();
        conn.create_database("pqs").unwrap();
        conn.use_database("pqs").unwrap();
        conn.exec("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (3)")
            .unwrap();
        let first = conn.select("SELECT a FROM t").unwrap();
        let second = conn.select("SELECT a FROM t").unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0][0].value(), &SqlValue::Integer(3));
    }

    #[test]
    fn test_metadata_probes() {
        let conn = working_db();
        conn.exec("CREATE TABLE Items (id INTEGER PRIMARY KEY, label TEXT NOT NULL, note)")
            .unwrap();
        conn.exec("CREATE INDEX idx_label ON Items (label)").unwrap();

        let tables = conn.list_tables("pqs").unwrap();
        assert_eq!(tables, vec![Identifier::new("items")]);

        let columns = conn.list_columns("pqs", &tables[0]).unwrap();
        assert_eq!(columns.len(), 3);
        assert!(!columns[0].nullable);
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[2].declared_type, "");

        let indexes = conn.list_indexes("pqs", &tables[0]).unwrap();
        assert_eq!(indexes, vec![Identifier::new("idx_label")]);
    }

    #[test]
    fn test_metadata_rejects_other_database() {
        let conn = working_db();
        assert!(matches!(
            conn.list_tables("other"),
            Err(SchemaFetchError::UnknownDatabase(_))
        ));
    }

    #[test]
    fn test_drop_database_wipes_objects() {
        let mut conn = working_db();
        conn.exec("CREATE TABLE a (x); CREATE TABLE b (y); CREATE VIEW v AS SELECT x FROM a")
            .unwrap();
        conn.drop_database("pqs").unwrap();
        assert_eq!(conn.current_database(), None);

        conn.create_database("pqs").unwrap();
        conn.use_database("pqs").unwrap();
        assert!(conn.list_tables("pqs").unwrap().is_empty());
    }

    #[test]
    fn test_drop_database_keeps_no_lookalike_tables() {
        let mut conn = working_db();
        conn.exec("CREATE TABLE sqliteXfoo (x)").unwrap();
        assert_eq!(
            conn.list_tables("pqs").unwrap(),
            vec![Identifier::new("sqliteXfoo")]
        );
        conn.drop_database("pqs").unwrap();
        let left = conn
            .select("SELECT name FROM sqlite_master WHERE type = 'table'")
            .unwrap();
        assert!(left.is_empty());
    }

    #[test]
    fn test_seeded_random_repeats() {
        let draws = |seed| {
            let conn = working_db();
            conn.seed_random(seed).unwrap();
            conn.select(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 5) \
                 SELECT random() FROM c",
            )
            .unwrap()
        };
        assert_eq!(draws(42), draws(42));
        assert_ne!(draws(42), draws(43));
        let first = draws(42);
        assert!(first.iter().any(|row| row[0] != first[0][0]));
    }

    #[test]
    fn test_create_database_twice_fails() {
        let mut conn = working_db();
        assert!(conn.create_database("pqs").is_err());
        assert!(conn.use_database("nope").is_err());
    }

    #[test]
    fn test_execution_error_keeps_sql() {
        let conn = working_db();
        let err = conn.select("SELECT * FROM missing").unwrap_err();
        assert!(matches!(err, ExecutionError::Failed { ref sql, .. } if sql == "SELECT * FROM missing"));
    }
}
