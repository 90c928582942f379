use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generation::{GeneratorOpts, MAX_DEPTH};

/// Settings of one fuzzing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PqsConfig {
    /// Path, `:memory:` or `file:` URI of the database under test.
    pub data_source_name: String,
    /// Name of the working database that bootstrap resets.
    pub database_name: String,
    /// Route queries through the prepared statement cache.
    pub use_prepared_statements: bool,
    /// Let the synthesizer emit `NOT INDEXED` on queried tables.
    pub use_optimizer_hints: bool,
    /// Seed of the random source; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Depth bound of synthesized WHERE clauses.
    pub max_depth: usize,
    /// Stop the worker after this many iterations.
    pub max_iterations: Option<u64>,
    /// Log and count infrastructure faults instead of stopping on them.
    pub continue_on_infrastructure_fault: bool,
    pub bootstrap: BootstrapConfig,
}

impl Default for PqsConfig {
    fn default() -> Self {
        Self {
            data_source_name: ":memory:".to_string(),
            database_name: "pqs".to_string(),
            use_prepared_statements: false,
            use_optimizer_hints: false,
            seed: None,
            max_depth: MAX_DEPTH,
            max_iterations: None,
            continue_on_infrastructure_fault: false,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BootstrapConfig {
    /// Upper bound of `CREATE TABLE` statements; at least one is issued.
    pub max_tables: usize,
    /// Upper bound of `CREATE INDEX` statements; zero is possible.
    pub max_indexes: usize,
    pub max_columns: usize,
    pub max_rows_per_insert: usize,
    /// Chance that a nullable column gets NULL in a generated row.
    pub null_probability: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_tables: 10,
            max_indexes: 9,
            max_columns: 5,
            max_rows_per_insert: 3,
            null_probability: 0.1,
        }
    }
}

impl BootstrapConfig {
    pub fn generator_opts(&self) -> GeneratorOpts {
        GeneratorOpts {
            max_columns: self.max_columns,
            max_rows_per_insert: self.max_rows_per_insert,
            null_probability: self.null_probability,
            ..GeneratorOpts::default()
        }
    }
}

impl PqsConfig {
    /// Read a JSON profile. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.database_name.trim().is_empty() {
            return invalid("database_name must not be empty");
        }
        // Rectification wraps the generated tree in one more level.
        if self.max_depth < 2 {
            return invalid("max_depth must be at least 2");
        }
        if self.max_iterations == Some(0) {
            return invalid("max_iterations must be positive when set");
        }
        let bootstrap = &self.bootstrap;
        if bootstrap.max_tables == 0 {
            return invalid("bootstrap.max_tables must be positive");
        }
        if bootstrap.max_columns == 0 {
            return invalid("bootstrap.max_columns must be positive");
        }
        if bootstrap.max_rows_per_insert == 0 {
            return invalid("bootstrap.max_rows_per_insert must be positive");
        }
        if !(0.0..=1.0).contains(&bootstrap.null_probability) {
            return invalid("bootstrap.null_probability must be within [0, 1]");
        }
        Ok(())
    }
}
