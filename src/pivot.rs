use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::connection::Connection;
use crate::error::PivotSelectionError;
use crate::model::{PivotRow, Table};

/// Picks one random row from each of a random subset of tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PivotSelector;

impl PivotSelector {
    /// Choose between one and `tables.len()` tables, shuffling `tables` in
    /// place, and fetch a random row of each. Empty tables are left out of
    /// both the pivot and the returned table list.
    pub fn choose_pivot<C, R>(
        &self,
        conn: &C,
        rng: &mut R,
        tables: &mut [Table],
    ) -> Result<(PivotRow, Vec<Table>), PivotSelectionError>
    where
        C: Connection + ?Sized,
        R: Rng + ?Sized,
    {
        if tables.is_empty() {
            return Err(PivotSelectionError::NoTables);
        }
        let count = rng.random_range(1..=tables.len());
        tables.shuffle(rng);

        let mut pivot = PivotRow::new();
        let mut used = Vec::with_capacity(count);
        for table in &tables[..count] {
            let sql = format!(
                "SELECT * FROM {} ORDER BY RANDOM() LIMIT 1",
                table.name.quoted()
            );
            let Some(row) = conn.select(&sql)?.into_iter().next() else {
                debug!("table {} is empty, leaving it out of the pivot", table.name);
                continue;
            };
            if row.len() != table.columns.len() {
                return Err(PivotSelectionError::RowShape {
                    table: table.name.to_string(),
                    expected: table.columns.len(),
                    actual: row.len(),
                });
            }
            for (key, cell) in table.table_columns().zip(row) {
                pivot.insert(key, cell)?;
            }
            used.push(table.clone());
        }
        Ok((pivot, used))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::connection::SqliteConnection;
    use crate::model::{Column, TableColumn};
    use crate::schema::SchemaSnapshot;

    fn working_db(sql: &str) -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.create_database("pqs").unwrap();
        conn.use_database("pqs").unwrap();
        conn.exec(sql).unwrap();
        conn
    }

    #[test]
    fn test_single_table_pivot() {
        let conn = working_db("CREATE TABLE t (a INT, b VARCHAR(10)); INSERT INTO t VALUES (5, 'x')");
        let mut tables = SchemaSnapshot::fetch(&conn, "pqs").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (pivot, used) = PivotSelector.choose_pivot(&conn, &mut rng, &mut tables).unwrap();

        assert_eq!(used.len(), 1);
        assert_eq!(pivot.len(), 2);
        let a = pivot.get(&TableColumn::new("t", "a")).unwrap();
        assert_eq!(a.string_value(), "5");
        assert_eq!(a.value_type().name(), "INT");
        let b = pivot.get(&TableColumn::new("t", "b")).unwrap();
        assert_eq!(b.string_value(), "x");
        assert_eq!(b.value_type().name(), "VARCHAR(10)");
    }

    #[test]
    fn test_empty_tables_are_excluded() {
        let conn = working_db(
            "CREATE TABLE filled (a INTEGER); INSERT INTO filled VALUES (1); CREATE TABLE vacant (b INTEGER)",
        );
        let tables = SchemaSnapshot::fetch(&conn, "pqs").unwrap();
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut tables = tables.clone();
            let (pivot, used) = PivotSelector.choose_pivot(&conn, &mut rng, &mut tables).unwrap();
            assert!(used.iter().all(|t| t.name.as_str() == "filled"));
            assert!(!pivot.contains(&TableColumn::new("vacant", "b")));
        }
    }

    #[test]
    fn test_same_seed_same_pivot() {
        let pivots = (0..10)
            .map(|_| {
                let conn = working_db(
                    "CREATE TABLE t (a INTEGER);
                     INSERT INTO t VALUES (1), (2), (3), (4), (5), (6), (7), (8);",
                );
                conn.seed_random(42).unwrap();
                let mut tables = SchemaSnapshot::fetch(&conn, "pqs").unwrap();
                let mut rng = ChaCha8Rng::seed_from_u64(42);
                (0..4)
                    .map(|_| {
                        let (pivot, _) =
                            PivotSelector.choose_pivot(&conn, &mut rng, &mut tables).unwrap();
                        pivot.to_string()
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        assert!(pivots.iter().all(|p| p == &pivots[0]));
    }

    #[test]
    fn test_no_tables() {
        let conn = working_db("");
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            PivotSelector.choose_pivot(&conn, &mut rng, &mut []),
            Err(PivotSelectionError::NoTables)
        ));
    }

    #[test]
    fn test_duplicate_table_is_rejected() {
        let conn = working_db("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1)");
        let table = Table::new("t", vec![Column::new("a", "INTEGER")]);
        let mut tables = vec![table.clone(), table];
        // Seed until both copies get chosen.
        let result = (0..64)
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                PivotSelector.choose_pivot(&conn, &mut rng, &mut tables)
            })
            .find(|r| r.is_err())
            .unwrap();
        assert!(matches!(result, Err(PivotSelectionError::DuplicateKey(_))));
    }

    #[test]
    fn test_stale_snapshot_row_shape() {
        let conn = working_db("CREATE TABLE t (a INTEGER, b INTEGER); INSERT INTO t VALUES (1, 2)");
        let mut tables = vec![Table::new("t", vec![Column::new("a", "INTEGER")])];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            PivotSelector.choose_pivot(&conn, &mut rng, &mut tables),
            Err(PivotSelectionError::RowShape {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    proptest! {
        #[test]
        fn used_tables_within_bounds(seed in any::<u64>(), table_count in 1usize..6) {
            let ddl = (0..table_count)
                .map(|i| format!("CREATE TABLE t{i} (a INTEGER); INSERT INTO t{i} VALUES ({i});"))
                .collect::<String>();
            let conn = working_db(&ddl);
            let mut tables = SchemaSnapshot::fetch(&conn, "pqs").unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (pivot, used) = PivotSelector.choose_pivot(&conn, &mut rng, &mut tables).unwrap();

            prop_assert!(!used.is_empty());
            prop_assert!(used.len() <= table_count);
            prop_assert_eq!(pivot.len(), used.len());
            for table in &used {
                prop_assert!(pivot.contains(&TableColumn::new(table.name.clone(), "a")));
            }
        }
    }
}
