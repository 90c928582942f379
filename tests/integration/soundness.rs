use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use turso_pqs::connection::Connection;
use turso_pqs::generation::{PivotQuerySynthesizer, QuerySynthesizer};
use turso_pqs::{CancelToken, Fuzzer, OracleResult, PivotOracle, PivotSelector, SqliteConnection};
use turso_pqs::{PqsConfig, SchemaSnapshot};

use crate::common::{bounded_config, init_tracing};

#[test]
fn test_sqlite_passes_bounded_sessions() {
    init_tracing();
    for seed in 0..5 {
        let mut fuzzer = Fuzzer::open(bounded_config(seed, 40)).unwrap();
        fuzzer.start(&CancelToken::new()).unwrap();
        fuzzer.wait();
        let stats = fuzzer
            .close()
            .unwrap_or_else(|err| panic!("seed {seed}: {err}"));
        assert_eq!(stats.iterations, 40);
        assert_eq!(stats.infrastructure_faults, 0);
    }
}

#[test]
fn test_sessions_with_every_option() {
    init_tracing();
    let config = PqsConfig {
        use_prepared_statements: true,
        use_optimizer_hints: true,
        max_depth: 3,
        ..bounded_config(99, 40)
    };
    let mut fuzzer = Fuzzer::open(config).unwrap();
    fuzzer.start(&CancelToken::new()).unwrap();
    fuzzer.wait();
    assert_eq!(fuzzer.close().unwrap().iterations, 40);
}

#[test]
fn test_handmade_schema_pivots_are_contained() {
    init_tracing();
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.create_database("pqs").unwrap();
    conn.use_database("pqs").unwrap();
    conn.exec(
        "CREATE TABLE t (a INT, b VARCHAR(10));
         CREATE INDEX t_a ON t (a DESC);
         INSERT INTO t VALUES (5, 'x'), (NULL, 'y'), (-3, NULL), (5, '');
         CREATE TABLE u (c REAL NOT NULL, d BLOB);
         INSERT INTO u VALUES (0.5, X'00FF'), (-2.25, NULL), (100.0, 'text');",
    )
    .unwrap();

    let synthesizer = PivotQuerySynthesizer::new(true);
    let mut snapshot = SchemaSnapshot::new();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for _ in 0..200 {
        let mut tables = snapshot.refresh(&conn, "pqs").unwrap().to_vec();
        let (pivot, used) = PivotSelector
            .choose_pivot(&conn, &mut rng, &mut tables)
            .unwrap();
        let ast = synthesizer.build_ast(&mut rng, 6, &used).unwrap();
        let query = synthesizer.render(&ast, &used, &pivot).unwrap();
        match PivotOracle.check(&conn, &pivot, &query).unwrap() {
            OracleResult::Pass => {}
            OracleResult::Fail(mismatch) => panic!("{mismatch}"),
        }
    }
}

#[test]
fn test_single_row_scenario() {
    use turso_pqs::generation::RenderedQuery;
    use turso_pqs::model::{PivotRow, QueryCell, SqlValue, TableColumn, ValueType};

    let pivot: PivotRow = [
        (
            TableColumn::new("t", "a"),
            QueryCell::new(SqlValue::Integer(1), ValueType::from("INT")),
        ),
        (
            TableColumn::new("t", "b"),
            QueryCell::new(SqlValue::Text("x".into()), ValueType::from("VARCHAR")),
        ),
    ]
    .into_iter()
    .collect();
    let query = RenderedQuery {
        sql: "SELECT a, b FROM t WHERE a = 1".to_string(),
        columns: vec![TableColumn::new("t", "a"), TableColumn::new("t", "b")],
    };

    for (row, expect_pass) in [("(1, 'x')", true), ("(2, 'y')", false)] {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.create_database("pqs").unwrap();
        conn.use_database("pqs").unwrap();
        conn.exec(&format!(
            "CREATE TABLE t (a INT, b VARCHAR); INSERT INTO t VALUES {row}"
        ))
        .unwrap();
        let result = PivotOracle.check(&conn, &pivot, &query).unwrap();
        assert_eq!(result.is_pass(), expect_pass, "row {row}");
    }
}
