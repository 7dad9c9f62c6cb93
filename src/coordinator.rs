//! The parallel compute engine.
//!
//! A [`ComputeCoordinator`] hands out indices from a shared atomic cursor to a fixed
//! pool of workers. Each worker owns a private clone of the generator, loads the
//! record for its index, computes it, and pushes every declared output into that
//! output's [`OrderedAssembler`]. The assemblers restore index order before anything
//! reaches a sink.
//!
//! Cancellation is cooperative: the first failure raises a shared abort flag, no
//! worker claims new work afterwards, and items already in flight run to
//! completion. Sinks are sealed whatever the outcome, so partial output stays
//! readable up to the last contiguous index. After a sink error the streams may
//! differ in length by one; only the prefix as long as the shortest stream is
//! consistent across outputs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::assembler::OrderedAssembler;
use crate::error::{FeatError, Result};
use crate::generator::{Generator, OutputSpec, check_unique_outputs};
use crate::source::DataSource;
use crate::writer::{ContainerWriter, RecordSink};

/// Lifecycle of a coordinator. A run executes at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, not started.
    Idle,
    /// Workers are running.
    Running,
    /// Every item was computed and flushed.
    Finished,
    /// An item failed or an output was left with gaps.
    Aborted,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Finished,
            _ => Self::Aborted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Finished => 2,
            Self::Aborted => 3,
        }
    }
}

/// Snapshot of run progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Items computed and handed to the assemblers.
    pub completed: usize,
    /// Items in the data source.
    pub total: usize,
}

impl Progress {
    /// Items not yet completed.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

/// Outcome of [`ComputeCoordinator::start`].
#[derive(Debug, Clone)]
pub struct RunReport {
    /// `Finished` or `Aborted`.
    pub state: RunState,
    /// Items in the data source.
    pub total: usize,
    /// Items computed successfully.
    pub completed: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// First error encountered, if any.
    pub first_error: Option<FeatError>,
}

impl RunReport {
    /// True if the run finished without error.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Finished
    }
}

/// One declared output and its reordering buffer.
#[derive(Debug)]
struct Output<S> {
    spec: OutputSpec,
    assembler: OrderedAssembler<S>,
}

/// Drives a generator over a data source with a pool of worker threads.
pub struct ComputeCoordinator<S = ContainerWriter> {
    generator: Box<dyn Generator>,
    source: Box<dyn DataSource>,
    outputs: Vec<Output<S>>,
    total: usize,
    cursor: AtomicUsize,
    completed: AtomicUsize,
    abort_flag: AtomicBool,
    error_capture: Mutex<Option<FeatError>>,
    state: AtomicU8,
    started_at: Mutex<Option<Instant>>,
    elapsed: Mutex<Option<Duration>>,
}

impl<S: RecordSink> ComputeCoordinator<S> {
    /// Wires one sink per declared output of `generator`.
    ///
    /// # Errors
    /// [`FeatError::InvalidConfiguration`] if the generator declares an output twice,
    /// an output has no sink, a sink name is given twice, or a sink matches no output.
    pub fn new(
        generator: Box<dyn Generator>,
        source: Box<dyn DataSource>,
        sinks: Vec<(String, S)>,
    ) -> Result<Self> {
        check_unique_outputs(generator.outputs())?;

        let mut by_name: HashMap<String, S> = HashMap::with_capacity(sinks.len());
        for (name, sink) in sinks {
            if by_name.insert(name.clone(), sink).is_some() {
                return Err(FeatError::config(format!("sink <{name}> given twice")));
            }
        }

        let total = source.len();
        let mut outputs = Vec::with_capacity(generator.outputs().len());
        for spec in generator.outputs() {
            let sink = by_name.remove(&spec.name).ok_or_else(|| {
                FeatError::config(format!("no sink wired for output <{}>", spec.name))
            })?;
            outputs.push(Output {
                spec: spec.clone(),
                assembler: OrderedAssembler::new(sink, total),
            });
        }
        if let Some(name) = by_name.keys().next() {
            return Err(FeatError::config(format!(
                "sink <{name}> matches no output of generator <{}>",
                generator.name()
            )));
        }

        Ok(Self {
            generator,
            source,
            outputs,
            total,
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            abort_flag: AtomicBool::new(false),
            error_capture: Mutex::new(None),
            state: AtomicU8::new(RunState::Idle.as_u8()),
            started_at: Mutex::new(None),
            elapsed: Mutex::new(None),
        })
    }

    /// Runs the computation on `worker_count` threads and blocks until it ends.
    ///
    /// # Errors
    /// [`FeatError::InvalidConfiguration`] if `worker_count` is 0;
    /// [`FeatError::AlreadyStarted`] on a second call. Per-item failures do not
    /// produce `Err`: they end the run in [`RunState::Aborted`], reported in the
    /// returned [`RunReport`].
    pub fn start(&self, worker_count: usize) -> Result<RunReport> {
        // 1. Validate and claim the single run.
        if worker_count == 0 {
            return Err(FeatError::config("worker count must be at least 1"));
        }
        self.state
            .compare_exchange(
                RunState::Idle.as_u8(),
                RunState::Running.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| FeatError::AlreadyStarted)?;

        let started = Instant::now();
        *self.started_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(started);

        info!(
            generator = self.generator.name(),
            total = self.total,
            workers = worker_count,
            outputs = self.outputs.len(),
            "computation started"
        );

        // 2. One generator clone per worker, made before any thread starts.
        let clones: Vec<Box<dyn Generator>> =
            (0..worker_count).map(|_| self.generator.clone_box()).collect();

        // 3. Fixed pool; the scope joins every worker before returning.
        match rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("featpipe-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.scope(|s| {
                for generator in clones {
                    s.spawn(move |_| self.run_worker(generator));
                }
            }),
            Err(e) => self.signal_error(FeatError::Internal(format!(
                "cannot build worker pool: {e}"
            ))),
        }

        // 4. Every output must have flushed every index.
        if !self.should_abort() {
            for output in &self.outputs {
                let drained = output.assembler.is_drained().unwrap_or(false);
                if !drained {
                    let next = output.assembler.next_expected().unwrap_or(0);
                    self.signal_error(FeatError::Internal(format!(
                        "output <{}> stopped at index {next} of {}",
                        output.spec.name, self.total
                    )));
                }
            }
        }

        // 5. Seal regardless of outcome.
        for output in &self.outputs {
            if let Err(e) = output.assembler.seal() {
                self.signal_error(e);
            }
        }

        let elapsed = started.elapsed();
        *self.elapsed.lock().unwrap_or_else(|p| p.into_inner()) = Some(elapsed);

        let state = if self.should_abort() {
            RunState::Aborted
        } else {
            RunState::Finished
        };
        self.state.store(state.as_u8(), Ordering::SeqCst);

        let report = RunReport {
            state,
            total: self.total,
            completed: self.completed.load(Ordering::SeqCst),
            elapsed,
            first_error: self.first_error(),
        };

        match &report.first_error {
            None => info!(
                total = report.total,
                elapsed_ms = elapsed.as_millis() as u64,
                "computation finished"
            ),
            Some(e) => warn!(
                completed = report.completed,
                total = report.total,
                error = %e,
                "computation aborted"
            ),
        }
        Ok(report)
    }

    fn run_worker(&self, mut generator: Box<dyn Generator>) {
        while let Some(index) = self.claim() {
            if let Err(e) = self.process(index, generator.as_mut()) {
                match &e {
                    FeatError::ComputeFailure { item, message, .. } => error!(
                        index,
                        item = item.as_deref().unwrap_or("-"),
                        message = message.as_str(),
                        "item failed, no new work will be claimed"
                    ),
                    other => error!(
                        index,
                        error = %other,
                        "item failed, no new work will be claimed"
                    ),
                }
                self.signal_error(e);
                break;
            }
        }
    }

    /// Claims the next index, or `None` once aborted or exhausted.
    /// The flag is checked before the cursor moves, so a claimed index is always processed.
    fn claim(&self) -> Option<usize> {
        if self.should_abort() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        (index < self.total).then_some(index)
    }

    fn process(&self, index: usize, generator: &mut dyn Generator) -> Result<()> {
        let mut record = self.source.get(index)?;
        generator.compute(&mut record)?;

        // Take every output before pushing any, so a compute failure leaves no stream
        // ahead. A failing sink can still leave earlier outputs one record longer.
        let mut values = Vec::with_capacity(self.outputs.len());
        for output in &self.outputs {
            let name = &output.spec.name;
            let value = record.take(name).ok_or_else(|| {
                record.failure(format!("generator did not produce declared output <{name}>"))
            })?;
            if value.kind() != output.spec.kind {
                return Err(record.failure(format!(
                    "output <{name}> is {}, declared {}",
                    value.kind(),
                    output.spec.kind
                )));
            }
            values.push(value);
        }

        for (output, value) in self.outputs.iter().zip(values) {
            output.assembler.push(index, value)?;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Keeps the first error and raises the abort flag.
    fn signal_error(&self, err: FeatError) {
        let mut guard = self.error_capture.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some(err);
        }
        self.abort_flag.store(true, Ordering::SeqCst);
    }

    fn should_abort(&self) -> bool {
        self.abort_flag.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// True once the run has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self.state(), RunState::Finished | RunState::Aborted)
    }

    /// Completed and total item counts.
    pub fn current_progress(&self) -> Progress {
        Progress {
            completed: self.completed.load(Ordering::SeqCst).min(self.total),
            total: self.total,
        }
    }

    /// Time since start (while running) or total run time (once finished).
    pub fn elapsed(&self) -> Option<Duration> {
        if let Some(done) = *self.elapsed.lock().unwrap_or_else(|p| p.into_inner()) {
            return Some(done);
        }
        self.started_at
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map(|t| t.elapsed())
    }

    /// The first error raised during the run.
    pub fn first_error(&self) -> Option<FeatError> {
        self.error_capture
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The prototype generator (workers run clones of it).
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Declared outputs, in generator order.
    pub fn outputs(&self) -> impl Iterator<Item = &OutputSpec> {
        self.outputs.iter().map(|o| &o.spec)
    }

    /// The assembler feeding output `name`.
    pub fn assembler(&self, name: &str) -> Option<&OrderedAssembler<S>> {
        self.outputs
            .iter()
            .find(|o| o.spec.name == name)
            .map(|o| &o.assembler)
    }

    /// Consumes the coordinator and returns the sinks by output name.
    pub fn into_sinks(self) -> Vec<(String, S)> {
        self.outputs
            .into_iter()
            .map(|o| (o.spec.name, o.assembler.into_sink()))
            .collect()
    }
}

impl<S> fmt::Debug for ComputeCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeCoordinator")
            .field("generator", &self.generator.name())
            .field("total", &self.total)
            .field("outputs", &self.outputs.iter().map(|o| &o.spec.name).collect::<Vec<_>>())
            .field("state", &RunState::from_u8(self.state.load(Ordering::SeqCst)))
            .finish()
    }
}
