use tracing_subscriber::EnvFilter;
use turso_pqs::{BootstrapConfig, PqsConfig};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_test_writer()
        .try_init();
}

/// Small, deterministic session bounded by `iterations`.
pub fn bounded_config(seed: u64, iterations: u64) -> PqsConfig {
    PqsConfig {
        seed: Some(seed),
        max_iterations: Some(iterations),
        bootstrap: BootstrapConfig {
            max_tables: 4,
            ..BootstrapConfig::default()
        },
        ..PqsConfig::default()
    }
}
