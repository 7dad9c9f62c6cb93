//! End-to-end entry point.
//!
//! [`Pipeline::run`] wires a generator to one container per declared output, runs
//! the coordinator, and saves the generator's normalized parameters next to the
//! containers so the run can be reproduced.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::coordinator::{ComputeCoordinator, RunReport};
use crate::error::{FeatError, Result};
use crate::generator::{Generator, check_unique_outputs};
use crate::progress::ProgressObserver;
use crate::source::DataSource;
use crate::writer::ContainerWriter;

/// Suffix of the file holding the generator parameters.
pub const PARAMETERS_FILE: &str = "parameters";

/// Metadata key recording the generator name in each container.
pub const GENERATOR_KEY: &str = "generator";

/// Metadata key recording the output name in each container.
pub const OUTPUT_KEY: &str = "output";

/// Knobs for [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Worker threads. Must be at least 1.
    pub workers: usize,
    /// Log progress at this interval; `None` disables the observer.
    pub progress_interval: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, |n| n.get()),
            progress_interval: None,
        }
    }
}

/// Path of output `name` under `prefix`: plain concatenation, so `out/gist_`
/// yields `out/gist_features`.
pub fn output_path(prefix: &Path, name: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(name);
    PathBuf::from(path)
}

/// The main entry point for computing a descriptor set.
#[derive(Debug)]
pub struct Pipeline;

impl Pipeline {
    /// Computes `generator` over `source` and persists every output.
    ///
    /// Creates `{prefix}{output}` for each declared output and `{prefix}parameters`
    /// for the configuration. Per-item failures end the run as `Aborted` in the
    /// returned report; the containers then hold every record before the gap.
    pub fn run<P: AsRef<Path>>(
        generator: Box<dyn Generator>,
        source: Box<dyn DataSource>,
        prefix: P,
        options: &RunOptions,
    ) -> Result<RunReport> {
        let prefix = prefix.as_ref();
        if options.workers == 0 {
            return Err(FeatError::config("worker count must be at least 1"));
        }
        check_unique_outputs(generator.outputs())?;
        if generator.outputs().iter().any(|o| o.name == PARAMETERS_FILE) {
            return Err(FeatError::config(format!(
                "output name <{PARAMETERS_FILE}> collides with the parameters file"
            )));
        }

        // 1. Output files.
        let parameters_path = output_path(prefix, PARAMETERS_FILE);
        if let Some(parent) = parameters_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut sinks = Vec::with_capacity(generator.outputs().len());
        for spec in generator.outputs() {
            let mut writer = ContainerWriter::create(output_path(prefix, &spec.name), spec.kind)?;
            writer.insert_metadata(GENERATOR_KEY, generator.name());
            writer.insert_metadata(OUTPUT_KEY, spec.name.as_str());
            sinks.push((spec.name.clone(), writer));
        }

        let parameters = generator.parameters().clone();
        let coordinator = ComputeCoordinator::new(generator, source, sinks)?;

        // 2. Run, optionally with an observer on a scoped thread.
        let report = match options.progress_interval {
            None => coordinator.start(options.workers)?,
            Some(interval) => {
                let done = AtomicBool::new(false);
                let observer = ProgressObserver::new(interval);
                thread::scope(|s| {
                    s.spawn(|| observer.watch(&coordinator, &done));
                    let result = coordinator.start(options.workers);
                    done.store(true, Ordering::SeqCst);
                    result
                })?
            }
        };

        // 3. Parameters, for reproducing the run.
        parameters.save(&parameters_path)?;
        Ok(report)
    }
}
