//! Command-line entry point of the PQS fuzzer.

use std::io::{IsTerminal, stdin};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use turso_pqs::{CancelToken, Fuzzer, PqsConfig, PqsError};

/// Pivoted Query Synthesis fuzzer for SQLite.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON profile to start from; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path, `:memory:` or `file:` URI of the database under test.
    #[arg(long)]
    dsn: Option<String>,

    /// Name of the working database.
    #[arg(long)]
    database: Option<String>,

    /// Random seed for deterministic execution.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Stop after this many iterations.
    #[arg(short = 'n', long)]
    max_iterations: Option<u64>,

    /// Stop after this many seconds.
    #[arg(short, long)]
    duration: Option<u64>,

    /// Run queries through prepared statements.
    #[arg(long)]
    prepared: bool,

    /// Emit optimizer hints (NOT INDEXED) in synthesized queries.
    #[arg(long)]
    hints: bool,

    /// Log and count infrastructure faults instead of stopping.
    #[arg(short, long)]
    keep_going: bool,
}

impl Args {
    fn into_config(self) -> Result<PqsConfig> {
        let mut config = match &self.config {
            Some(path) => PqsConfig::load(path)
                .with_context(|| format!("loading profile {}", path.display()))?,
            None => PqsConfig::default(),
        };
        if let Some(dsn) = self.dsn {
            config.data_source_name = dsn;
        }
        if let Some(database) = self.database {
            config.database_name = database;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.max_iterations.is_some() {
            config.max_iterations = self.max_iterations;
        }
        config.use_prepared_statements |= self.prepared;
        config.use_optimizer_hints |= self.hints;
        config.continue_on_infrastructure_fault |= self.keep_going;
        Ok(config)
    }
}

fn main() -> Result<ExitCode> {
    let mut subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()),
    );

    if !stdin().is_terminal() {
        subscriber = subscriber.with_ansi(false)
    }
    subscriber.init();

    let args = Args::parse();
    let duration = args.duration.map(Duration::from_secs);
    let config = args.into_config()?;

    tracing::info!("Starting turso-pqs with config: {:?}", config);

    let mut fuzzer = Fuzzer::open(config).context("opening the database under test")?;
    let seed = fuzzer.seed();
    let cancel = CancelToken::new();

    if let Some(duration) = duration {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            cancel.cancel();
        });
    }

    match fuzzer.run(&cancel) {
        Ok(stats) => {
            tracing::info!("Final stats: {:?}", stats);
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ PqsError::OracleMismatchDetected(_)) => {
            tracing::error!("{err}");
            tracing::error!("reproduce with --seed {seed}");
            Ok(ExitCode::from(1))
        }
        Err(err) => {
            tracing::error!("{:#}", anyhow::Error::from(err));
            Ok(ExitCode::from(2))
        }
    }
}
