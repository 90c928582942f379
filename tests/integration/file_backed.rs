use turso_pqs::{CancelToken, Fuzzer, PqsConfig};

use crate::common::{bounded_config, init_tracing};

#[test]
fn test_file_database_is_reset_on_close() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pqs.db");
    let config = PqsConfig {
        data_source_name: path.display().to_string(),
        ..bounded_config(7, 20)
    };

    let mut fuzzer = Fuzzer::open(config).unwrap();
    fuzzer.start(&CancelToken::new()).unwrap();

    // Another connection sees the populated schema while the worker runs.
    let observer = rusqlite::Connection::open(&path).unwrap();
    fuzzer.wait();
    let populated: i64 = observer
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(populated > 0);

    fuzzer.close().unwrap();
    let remaining: i64 = observer
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn test_profile_file_drives_session() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let profile = dir.path().join("profile.json");
    std::fs::write(
        &profile,
        r#"{"seed": 3, "max_iterations": 15, "bootstrap": {"max_tables": 2, "null_probability": 0.5}}"#,
    )
    .unwrap();

    let config = PqsConfig::load(&profile).unwrap();
    let mut fuzzer = Fuzzer::open(config).unwrap();
    assert_eq!(fuzzer.seed(), 3);
    fuzzer.start(&CancelToken::new()).unwrap();
    fuzzer.wait();
    assert_eq!(fuzzer.close().unwrap().iterations, 15);
}
