use thiserror::Error;

use crate::model::TableColumn;
use crate::oracle::Mismatch;
use crate::runner::LoopState;

/// Boxed backend error kept as the `source` of our own errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SchemaFetchError {
    #[error("unknown database {0:?}")]
    UnknownDatabase(String),
    #[error("failed to fetch {what}")]
    Query {
        what: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to open data source {data_source:?}")]
    Open {
        data_source: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to execute `{sql}`")]
    Failed {
        sql: String,
        #[source]
        source: BoxError,
    },
    #[error("execution of `{sql}` was interrupted")]
    Interrupted { sql: String },
}

#[derive(Debug, Error)]
pub enum PivotSelectionError {
    #[error("no tables to choose a pivot from")]
    NoTables,
    #[error("pivot row already holds a value for {0}")]
    DuplicateKey(TableColumn),
    #[error("table {table} returned {actual} cells but the snapshot has {expected} columns")]
    RowShape {
        table: String,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("cannot synthesize a query without tables")]
    NoTables,
    #[error("the chosen tables have no columns")]
    NoColumns,
    #[error("query references unknown column {0}")]
    UnknownColumn(TableColumn),
    #[error("pivot row has no value for output column {0}")]
    MissingPivotValue(TableColumn),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no table available for {0}")]
    NoTable(&'static str),
    #[error("table {0} has no columns")]
    NoColumns(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Faults of the machinery around the oracle, as opposed to a detected bug.
#[derive(Debug, Error)]
pub enum InfrastructureFault {
    #[error(transparent)]
    Schema(#[from] SchemaFetchError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Pivot(#[from] PivotSelectionError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum PqsError {
    #[error("infrastructure fault: {0}")]
    InfrastructureFault(#[from] InfrastructureFault),
    #[error("oracle mismatch detected:\n{0}")]
    OracleMismatchDetected(Box<Mismatch>),
    #[error("cannot {action} while {state:?}")]
    Lifecycle {
        action: &'static str,
        state: LoopState,
    },
    #[error("fuzzing worker panicked")]
    WorkerPanicked,
}

impl PqsError {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, PqsError::OracleMismatchDetected(_))
    }
}

macro_rules! into_fault {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PqsError {
                fn from(err: $ty) -> Self {
                    PqsError::InfrastructureFault(err.into())
                }
            }
        )*
    };
}

into_fault!(
    SchemaFetchError,
    ExecutionError,
    PivotSelectionError,
    SynthesisError,
    ConfigError
);

pub type Result<T, E = PqsError> = std::result::Result<T, E>;
