//! Concurrent processing pipeline
//!
//! Files flow through a bounded job queue into a pool of named worker
//! threads. Each worker reads the bytes, claims the content fingerprint
//! (later copies are dropped), processes the document and registers its
//! entity key. Processed records and fatal failures travel on separate
//! channels and are gathered by the calling thread.
//!
//! A completion watcher joins the workers, closes the output channels and
//! stops the progress ticker, so the final summary line is printed once
//! and only after all work is done.

use crate::dedup::ContentDeduplicator;
use crate::processor::EntityProcessor;
use crate::progress::ProgressMonitor;
use crate::registry::IdentityRegistry;
use crate::source::{FsReader, SourceReader};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use entiform_core::report::is_failing;
use entiform_core::{
    Config, ContentFingerprint, EntityFile, FatalError, FileFailure, ProcessStats,
    ProcessedEntity, ValidationError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Builder, Scope, ScopedJoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Worker count used when the caller passes 0
pub const DEFAULT_WORKERS: usize = 10;

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Worker count used when `process` is asked for 0 workers
    pub default_workers: usize,

    /// Tick of the live progress line
    pub progress_interval: Duration,

    /// Render progress on stderr
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_workers: DEFAULT_WORKERS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            show_progress: true,
        }
    }
}

impl PipelineOptions {
    pub fn with_default_workers(mut self, workers: usize) -> Self {
        self.default_workers = workers;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_workers: config.workers,
            progress_interval: config.progress_interval(),
            show_progress: config.show_progress,
        }
    }
}

/// Pipeline setup errors
///
/// Per-file problems never surface here; they are part of the output.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to spawn {0} thread: {1}")]
    Spawn(String, String),
}

/// Everything a run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    /// One record per distinct content that did not fail fatally
    pub processed: Vec<ProcessedEntity>,

    /// Fatal per-file failures
    pub fatal_errors: Vec<FileFailure>,

    /// Files dropped because their content was already claimed
    pub duplicates: usize,
}

impl PipelineOutput {
    pub fn stats(&self) -> ProcessStats {
        ProcessStats::from_processed(&self.processed)
    }

    /// Any fatal failure or any record with findings
    pub fn is_failing(&self) -> bool {
        is_failing(&self.processed, &self.fatal_errors)
    }
}

/// Clamp the worker count: 0 means `default`, never more workers than files
pub fn effective_workers(requested: usize, default: usize, files: usize) -> usize {
    let workers = if requested == 0 { default } else { requested };
    workers.min(files).max(1)
}

/// Parallel entity processor over a byte source
pub struct Pipeline<R = FsReader> {
    reader: R,
    options: PipelineOptions,
}

impl Pipeline<FsReader> {
    /// Pipeline reading from the local filesystem
    pub fn new(options: PipelineOptions) -> Self {
        Self::with_reader(FsReader, options)
    }
}

impl<R: SourceReader> Pipeline<R> {
    pub fn with_reader(reader: R, options: PipelineOptions) -> Self {
        Self { reader, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process `files` on up to `max_workers` threads (0 = default)
    ///
    /// Output order is unspecified. Byte-identical files yield a single
    /// record, whichever copy was claimed first.
    pub fn process(
        &self,
        files: Vec<EntityFile>,
        max_workers: usize,
    ) -> Result<PipelineOutput, PipelineError> {
        if files.is_empty() {
            debug!("no entity files to process");
            return Ok(PipelineOutput::default());
        }

        let total = files.len();
        let workers = effective_workers(max_workers, self.options.default_workers, total);
        info!(files = total, workers, "processing entity files");

        let state = WorkerState {
            reader: &self.reader,
            dedup: ContentDeduplicator::new(),
            registry: IdentityRegistry::new(),
            progress: ProgressMonitor::new(total, self.options.show_progress),
            duplicates: AtomicUsize::new(0),
        };
        let state = &state;
        let interval = self.options.progress_interval;

        let (processed, fatal_errors) = thread::scope(|s| -> Result<_, PipelineError> {
            let (job_tx, job_rx) = bounded::<EntityFile>(total);
            let (result_tx, result_rx) = bounded::<ProcessedEntity>(total);
            let (fatal_tx, fatal_rx) = bounded::<FileFailure>(total);
            let (stop_tx, stop_rx) = bounded::<()>(1);

            // A dropped stop sender also ends the ticker
            let ticker = spawn_named(s, "entiform-progress".to_string(), move || {
                let ticks = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticks) -> _ => state.progress.render(),
                    }
                }
            })?;

            let mut worker_handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let fatals = fatal_tx.clone();
                worker_handles.push(spawn_named(s, format!("entiform-worker-{}", id), move || {
                    state.run_worker(jobs, results, fatals)
                })?);
            }
            drop(job_rx);

            spawn_named(s, "entiform-feeder".to_string(), move || {
                for file in files {
                    if job_tx.send(file).is_err() {
                        break;
                    }
                }
            })?;

            let watcher = spawn_named(s, "entiform-watcher".to_string(), move || {
                for handle in worker_handles {
                    if handle.join().is_err() {
                        error!("worker thread panicked");
                    }
                }
                drop(result_tx);
                drop(fatal_tx);

                let _ = stop_tx.send(());
                if ticker.join().is_err() {
                    error!("progress thread panicked");
                }
                state.progress.finish();
            })?;

            let collected = collect_outputs(&result_rx, &fatal_rx);

            if watcher.join().is_err() {
                error!("completion watcher panicked");
            }
            Ok(collected)
        })?;

        let output = PipelineOutput {
            processed,
            fatal_errors,
            duplicates: state.duplicates.load(Ordering::Relaxed),
        };

        info!(
            processed = output.processed.len(),
            fatal = output.fatal_errors.len(),
            duplicates = output.duplicates,
            with_errors = output.stats().with_errors,
            "processing finished"
        );

        Ok(output)
    }
}

/// Shared by every worker for the duration of one run
struct WorkerState<'a, R> {
    reader: &'a R,
    dedup: ContentDeduplicator,
    registry: IdentityRegistry,
    progress: ProgressMonitor,
    duplicates: AtomicUsize,
}

enum JobOutcome {
    Processed(ProcessedEntity),
    Fatal(FileFailure),
    Duplicate,
}

impl<R: SourceReader> WorkerState<'_, R> {
    fn run_worker(
        &self,
        jobs: Receiver<EntityFile>,
        results: Sender<ProcessedEntity>,
        fatals: Sender<FileFailure>,
    ) {
        for file in jobs.iter() {
            self.progress.start_job();

            let delivered = match self.process_job(file) {
                JobOutcome::Processed(entity) => results.send(entity).is_ok(),
                JobOutcome::Fatal(failure) => fatals.send(failure).is_ok(),
                JobOutcome::Duplicate => true,
            };

            self.progress.complete_job();

            if !delivered {
                warn!("output channel closed, stopping worker");
                break;
            }
        }
    }

    fn process_job(&self, file: EntityFile) -> JobOutcome {
        let path = file.display_path();

        let content = match self.reader.read(&file.path) {
            Ok(content) => content,
            Err(e) => {
                let failure = FileFailure::new(path, FatalError::Io(e.to_string()));
                warn!(%failure, "cannot read entity file");
                return JobOutcome::Fatal(failure);
            }
        };

        let fingerprint = ContentFingerprint::of(&content);
        if !self.dedup.try_claim(fingerprint) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(path = %path, %fingerprint, "skipping duplicate content");
            return JobOutcome::Duplicate;
        }

        let mut entity = EntityProcessor::process_with_fingerprint(file, &content, fingerprint);

        if let Some(fatal) = entity.fatal.take() {
            let failure = FileFailure::new(path, fatal);
            warn!(%failure, "entity file failed");
            return JobOutcome::Fatal(failure);
        }

        if let Some(key) = entity.entity_key() {
            if let Some(holder) = self.registry.register(key.clone(), path.clone()) {
                debug!(%key, path = %path, holder = %holder, "entity key conflict");
                entity.push_error(ValidationError::conflict(&key, &holder));
            }
        }

        JobOutcome::Processed(entity)
    }
}

/// Drain both output channels until each is disconnected
fn collect_outputs(
    results: &Receiver<ProcessedEntity>,
    fatals: &Receiver<FileFailure>,
) -> (Vec<ProcessedEntity>, Vec<FileFailure>) {
    let mut processed = Vec::new();
    let mut fatal_errors = Vec::new();

    loop {
        select! {
            recv(results) -> msg => match msg {
                Ok(entity) => processed.push(entity),
                Err(_) => {
                    fatal_errors.extend(fatals.iter());
                    break;
                }
            },
            recv(fatals) -> msg => match msg {
                Ok(failure) => fatal_errors.push(failure),
                Err(_) => {
                    processed.extend(results.iter());
                    break;
                }
            },
        }
    }

    (processed, fatal_errors)
}

fn spawn_named<'scope, 'env, F, T>(
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>, PipelineError>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, f)
        .map_err(|e| PipelineError::Spawn(name, e.to_string()))
}
