//! The fuzzing loop.
//!
//! [`Fuzzer::start`] resets and populates the working database, snapshots
//! its schema and hands the connection, generator, synthesizer and random
//! source to a single worker thread. Each worker iteration:
//! 1. Refreshes the schema snapshot
//! 2. Chooses a pivot row over a random subset of tables
//! 3. Synthesizes a query whose WHERE clause holds for the pivot
//! 4. Runs it and checks the pivot is contained in the result
//!
//! The worker hands everything back through its join handle, so the owner
//! and the worker never share state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::bootstrap::BootstrapController;
use crate::config::PqsConfig;
use crate::connection::{Connection, Interrupt, SqliteConnection};
use crate::error::{PqsError, Result};
use crate::generation::{
    PivotQuerySynthesizer, QuerySynthesizer, RandomStatementGenerator, StatementGenerator,
};
use crate::oracle::{OracleResult, PivotOracle};
use crate::pivot::PivotSelector;
use crate::schema::SchemaSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Bootstrapping,
    Snapshotting,
    Iterating,
    Draining,
    Closed,
}

/// Shared stop signal.
///
/// Cancelling also interrupts the statement running on every registered
/// connection, so a long query does not delay shutdown.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    interrupts: Mutex<Vec<Box<dyn Interrupt>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let interrupts = self
            .inner
            .interrupts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for interrupt in interrupts.iter() {
            interrupt.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, interrupt: Box<dyn Interrupt>) {
        let mut interrupts = self
            .inner
            .interrupts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        interrupts.push(interrupt);
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Statistics of a fuzzing session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Iterations started, skipped and faulted ones included.
    pub iterations: u64,
    /// Iterations where none of the chosen tables had a row.
    pub skipped: u64,
    /// Infrastructure faults tolerated by `continue_on_infrastructure_fault`.
    pub infrastructure_faults: u64,
}

enum Iteration {
    Verified,
    Skipped,
}

/// Everything the worker owns while iterating.
struct Engine<C, G, S> {
    conn: C,
    generator: G,
    synthesizer: S,
    rng: ChaCha8Rng,
    snapshot: SchemaSnapshot,
    config: PqsConfig,
    stats: RunStats,
}

impl<C, G, S> Engine<C, G, S>
where
    C: Connection,
    G: StatementGenerator,
    S: QuerySynthesizer,
{
    fn run(&mut self, cancel: &CancelToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                info!("fuzzing cancelled after {} iterations", self.stats.iterations);
                return Ok(());
            }
            if let Some(max) = self.config.max_iterations
                && self.stats.iterations >= max
            {
                info!("reached {max} iterations");
                return Ok(());
            }

            self.stats.iterations += 1;
            match self.iteration() {
                Ok(Iteration::Verified) => {}
                Ok(Iteration::Skipped) => self.stats.skipped += 1,
                Err(PqsError::InfrastructureFault(fault)) => {
                    if cancel.is_cancelled() {
                        debug!("iteration aborted by cancellation: {fault}");
                        continue;
                    }
                    if !self.config.continue_on_infrastructure_fault {
                        return Err(fault.into());
                    }
                    warn!("infrastructure fault in iteration {}: {fault}", self.stats.iterations);
                    self.stats.infrastructure_faults += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn iteration(&mut self) -> Result<Iteration> {
        let mut tables = self
            .snapshot
            .refresh(&self.conn, &self.config.database_name)?
            .to_vec();
        let (pivot, used) = PivotSelector.choose_pivot(&self.conn, &mut self.rng, &mut tables)?;
        if used.is_empty() {
            debug!("no chosen table has rows, skipping iteration");
            return Ok(Iteration::Skipped);
        }

        let ast = self
            .synthesizer
            .build_ast(&mut self.rng, self.config.max_depth, &used)?;
        let query = self.synthesizer.render(&ast, &used, &pivot)?;

        match PivotOracle.check(&self.conn, &pivot, &query)? {
            OracleResult::Pass => Ok(Iteration::Verified),
            OracleResult::Fail(mismatch) => Err(PqsError::OracleMismatchDetected(mismatch)),
        }
    }
}

type Worker<C, G, S> = JoinHandle<(Engine<C, G, S>, Result<()>)>;

/// Owner of a fuzzing session.
pub struct Fuzzer<C, G, S> {
    state: LoopState,
    seed: u64,
    bootstrap: BootstrapController,
    engine: Option<Engine<C, G, S>>,
    worker: Option<Worker<C, G, S>>,
    cancel: Option<CancelToken>,
    outcome: Option<Result<()>>,
}

impl Fuzzer<SqliteConnection, RandomStatementGenerator, PivotQuerySynthesizer> {
    /// Fuzz the SQLite database named by `config.data_source_name`.
    pub fn open(config: PqsConfig) -> Result<Self> {
        let conn =
            SqliteConnection::open(&config.data_source_name, config.use_prepared_statements)?;
        let generator = RandomStatementGenerator::new(config.bootstrap.generator_opts());
        let synthesizer = PivotQuerySynthesizer::new(config.use_optimizer_hints);
        Self::new(conn, generator, synthesizer, config)
    }
}

impl<C, G, S> Fuzzer<C, G, S>
where
    C: Connection + 'static,
    G: StatementGenerator + 'static,
    S: QuerySynthesizer + 'static,
{
    pub fn new(conn: C, generator: G, synthesizer: S, config: PqsConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        info!("fuzzing {} with seed {seed}", config.data_source_name);
        conn.seed_random(seed)?;
        Ok(Self {
            state: LoopState::Idle,
            seed,
            bootstrap: BootstrapController::new(
                config.database_name.clone(),
                config.bootstrap.clone(),
            ),
            engine: Some(Engine {
                conn,
                generator,
                synthesizer,
                rng: ChaCha8Rng::seed_from_u64(seed),
                snapshot: SchemaSnapshot::new(),
                config,
                stats: RunStats::default(),
            }),
            worker: None,
            cancel: None,
            outcome: None,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Bootstrap the working database and spawn the worker.
    ///
    /// On failure the session stays in the state that failed; only
    /// [`Fuzzer::close`] is accepted afterwards.
    pub fn start(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.state != LoopState::Idle {
            return Err(self.lifecycle("start"));
        }
        let Some(mut engine) = self.engine.take() else {
            return Err(self.lifecycle("start"));
        };

        if let Err(err) = self.prepare(&mut engine) {
            self.engine = Some(engine);
            return Err(err);
        }

        cancel.register(engine.conn.interrupt_handle());
        self.cancel = Some(cancel.clone());
        self.state = LoopState::Iterating;

        let cancel = cancel.clone();
        self.worker = Some(std::thread::spawn(move || {
            let result = engine.run(&cancel);
            (engine, result)
        }));
        Ok(())
    }

    fn prepare(&mut self, engine: &mut Engine<C, G, S>) -> Result<()> {
        self.state = LoopState::Bootstrapping;
        self.bootstrap.reset(&mut engine.conn)?;
        self.bootstrap
            .populate(&engine.conn, &mut engine.generator, &mut engine.rng);

        self.state = LoopState::Snapshotting;
        let tables = engine
            .snapshot
            .refresh(&engine.conn, self.bootstrap.database())?;
        info!("schema snapshot holds {} tables", tables.len());
        Ok(())
    }

    /// Block until the worker stops on its own: cancellation, the iteration
    /// bound, or an error.
    pub fn wait(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.state = LoopState::Draining;
        match worker.join() {
            Ok((engine, result)) => {
                self.engine = Some(engine);
                self.outcome = Some(result);
            }
            Err(_) => self.outcome = Some(Err(PqsError::WorkerPanicked)),
        }
    }

    /// Stop the worker, reset the working database and release the
    /// connection. The worker's error, if any, takes precedence over the
    /// statistics.
    pub fn close(&mut self) -> Result<RunStats> {
        if self.state == LoopState::Closed {
            return Err(self.lifecycle("close"));
        }
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        self.wait();
        self.state = LoopState::Draining;

        let reset = match self.engine.as_mut() {
            Some(engine) => self.bootstrap.reset(&mut engine.conn),
            None => Ok(()),
        };
        let stats = self.engine.take().map(|e| e.stats).unwrap_or_default();
        self.state = LoopState::Closed;
        info!("fuzzing closed: {stats:?}");

        self.outcome.take().unwrap_or(Ok(()))?;
        reset?;
        Ok(stats)
    }

    /// Start, wait for the worker and close. A failed start still closes the
    /// session, and the start error is the one returned.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<RunStats> {
        if let Err(err) = self.start(cancel) {
            if let Err(close_err) = self.close() {
                warn!("closing after a failed start: {close_err}");
            }
            return Err(err);
        }
        self.wait();
        self.close()
    }

    fn lifecycle(&self, action: &'static str) -> PqsError {
        PqsError::Lifecycle {
            action,
            state: self.state,
        }
    }
}
