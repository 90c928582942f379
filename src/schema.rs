//! Schema snapshot built by probing the live database.
//!
//! Every refresh rebuilds the table list from scratch and only swaps it in
//! once it is complete, so a failed probe leaves the previous snapshot intact.

use tracing::debug;

use crate::connection::Connection;
use crate::error::SchemaFetchError;
use crate::model::Table;

#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    tables: Vec<Table>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe `database` and replace the snapshot wholesale.
    pub fn refresh<C: Connection + ?Sized>(
        &mut self,
        conn: &C,
        database: &str,
    ) -> Result<&[Table], SchemaFetchError> {
        let tables = Self::fetch(conn, database)?;
        debug!(
            "schema refreshed: {} tables, {} indexes",
            tables.len(),
            tables.iter().map(|t| t.indexes.len()).sum::<usize>()
        );
        self.tables = tables;
        Ok(&self.tables)
    }

    /// Build the table list of `database` without touching any snapshot.
    pub fn fetch<C: Connection + ?Sized>(
        conn: &C,
        database: &str,
    ) -> Result<Vec<Table>, SchemaFetchError> {
        let mut tables = Vec::new();
        for name in conn.list_tables(database)? {
            let columns = conn.list_columns(database, &name)?;
            let indexes = conn.list_indexes(database, &name)?;
            tables.push(Table {
                name,
                columns,
                indexes,
            });
        }
        Ok(tables)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SqliteConnection;
    use crate::model::Identifier;

    fn working_db() -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.create_database("pqs").unwrap();
        conn.use_database("pqs").unwrap();
        conn
    }

    #[test]
    fn test_refresh_collects_columns_and_indexes() {
        let conn = working_db();
        conn.exec("CREATE TABLE t (a INTEGER, b TEXT); CREATE INDEX t_b ON t (b); CREATE TABLE u (c REAL)")
            .unwrap();

        let mut snapshot = SchemaSnapshot::new();
        let tables = snapshot.refresh(&conn, "pqs").unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, Identifier::new("t"));
        assert_eq!(tables[0].columns.len(), 2);
        assert_eq!(tables[0].indexes, vec![Identifier::new("t_b")]);
        assert_eq!(tables[1].columns[0].declared_type, "REAL");
    }

    #[test]
    fn test_refresh_is_wholesale() {
        let conn = working_db();
        conn.exec("CREATE TABLE t (a)").unwrap();
        let mut snapshot = SchemaSnapshot::new();
        snapshot.refresh(&conn, "pqs").unwrap();

        conn.exec("DROP TABLE t; CREATE TABLE u (b)").unwrap();
        snapshot.refresh(&conn, "pqs").unwrap();
        assert_eq!(snapshot.tables().len(), 1);
        assert_eq!(snapshot.tables()[0].name, Identifier::new("u"));
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let conn = working_db();
        conn.exec("CREATE TABLE t (a)").unwrap();
        let mut snapshot = SchemaSnapshot::new();
        snapshot.refresh(&conn, "pqs").unwrap();

        assert!(snapshot.refresh(&conn, "elsewhere").is_err());
        assert_eq!(snapshot.tables().len(), 1);
    }
}
