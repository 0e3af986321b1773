//! Deduplicate-and-materialize pipeline
//!
//! A run moves through `Idle → Hashing → Barrier → Materializing → Done`:
//!
//! - **Hashing**: every eligible file in the source folders becomes a
//!   [`HashJob`] on the worker pool. Each job digests its file and races to
//!   insert it into the [`DeduplicationIndex`]; the first path per digest
//!   survives, the rest are counted as duplicates.
//! - **Barrier**: the coordinator waits until every hashing job has returned,
//!   then freezes the index.
//! - **Materializing**: each survivor becomes a [`MaterializeJob`] that picks
//!   a destination name (optionally timestamp-prefixed) and links or copies
//!   the file there, deleting the source in move mode.
//!
//! All run state lives in a [`RunContext`] built per run and shared with the
//! jobs through an `Arc`. Per-file failures are logged and counted, never
//! propagated.

use crate::core::error::{DedupeError, Result};
use crate::core::pool::{default_worker_count, WorkerPool};
use crate::duplicate::{hash_file, DeduplicationIndex, InsertOutcome};
use crate::media::materialize::{materialize, remove_source, MaterializeOutcome};
use crate::media::scanner::{scan_sources, ExtensionFilter, MediaFile};
use crate::media::timestamp::{prefixed_name, TimestampResolver};
use crossbeam_utils::sync::WaitGroup;
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// What to process and how
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Folders scanned (non-recursively) for media files
    pub sources: Vec<PathBuf>,
    /// Folder receiving the unique files
    pub destination: PathBuf,
    /// Prefix destination names with the resolved timestamp
    pub rename: bool,
    /// Delete each source after it was materialized
    pub move_files: bool,
    /// Compute and report the mapping only
    pub simulate: bool,
    /// Worker thread count
    pub workers: usize,
    /// Job queue capacity
    pub queue_capacity: usize,
    /// Extension allow-list
    pub extensions: ExtensionFilter,
}

impl RunOptions {
    /// Copy mode, no renaming, default pool sizing and extensions
    pub fn new(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        let workers = default_worker_count();
        Self {
            sources,
            destination,
            rename: false,
            move_files: false,
            simulate: false,
            workers,
            queue_capacity: workers,
            extensions: ExtensionFilter::default(),
        }
    }

    pub fn with_rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    pub fn with_move(mut self, move_files: bool) -> Self {
        self.move_files = move_files;
        self
    }

    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Set worker count and queue capacity
    pub fn with_pool_size(mut self, workers: usize, queue_capacity: usize) -> Self {
        self.workers = workers;
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_extensions(mut self, extensions: ExtensionFilter) -> Self {
        self.extensions = extensions;
        self
    }

    /// Check the run preconditions and normalize the paths
    ///
    /// Sources that are not existing directories are dropped; at least one
    /// must remain. The destination must be an existing directory.
    pub fn validated(mut self) -> Result<Self> {
        let sources: Vec<PathBuf> = self
            .sources
            .iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| fs::canonicalize(path).ok())
            .collect();
        if sources.is_empty() {
            return Err(DedupeError::NoSources);
        }

        if !self.destination.is_dir() {
            return Err(DedupeError::InvalidDestination(self.destination.clone()));
        }
        let destination = fs::canonicalize(&self.destination)
            .map_err(|_| DedupeError::InvalidDestination(self.destination.clone()))?;

        self.sources = sources;
        self.destination = destination;
        Ok(self)
    }
}

/// Run-scoped counters updated concurrently by jobs
#[derive(Debug, Default)]
pub struct RunCounters {
    hashed: AtomicUsize,
    collisions: AtomicUsize,
    read_errors: AtomicUsize,
    copy_errors: AtomicUsize,
    remove_errors: AtomicUsize,
}

impl RunCounters {
    fn bump(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_hashed(&self) -> usize {
        Self::bump(&self.hashed)
    }

    pub fn record_collision(&self) -> usize {
        Self::bump(&self.collisions)
    }

    pub fn record_read_error(&self) -> usize {
        Self::bump(&self.read_errors)
    }

    pub fn record_copy_error(&self) -> usize {
        Self::bump(&self.copy_errors)
    }

    pub fn record_remove_error(&self) -> usize {
        Self::bump(&self.remove_errors)
    }

    pub fn hashed(&self) -> usize {
        self.hashed.load(Ordering::Relaxed)
    }

    pub fn collisions(&self) -> usize {
        self.collisions.load(Ordering::Relaxed)
    }

    pub fn read_errors(&self) -> usize {
        self.read_errors.load(Ordering::Relaxed)
    }

    pub fn copy_errors(&self) -> usize {
        self.copy_errors.load(Ordering::Relaxed)
    }

    pub fn remove_errors(&self) -> usize {
        self.remove_errors.load(Ordering::Relaxed)
    }
}

/// Pipeline phase that runs on the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Hashing,
    Materializing,
}

/// Progress of the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub completed: usize,
    pub total: usize,
}

/// Receives progress updates from worker threads
pub type ProgressCallback = Arc<dyn Fn(PhaseProgress) + Send + Sync>;

/// One intended source → destination placement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PlannedTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Everything a job needs, created fresh for each run
pub struct RunContext {
    pub options: RunOptions,
    pub index: DeduplicationIndex,
    pub counters: RunCounters,
    pub resolver: Arc<TimestampResolver>,
    planned: Mutex<Vec<PlannedTransfer>>,
    progress: Option<ProgressCallback>,
    /// Deletes a source after a move
    remover: fn(&Path) -> Result<()>,
}

impl RunContext {
    pub fn new(options: RunOptions, resolver: Arc<TimestampResolver>) -> Self {
        Self {
            options,
            index: DeduplicationIndex::new(),
            counters: RunCounters::default(),
            resolver,
            planned: Mutex::new(Vec::new()),
            progress: None,
            remover: remove_source,
        }
    }

    fn record_planned(&self, source: &Path, destination: &Path) {
        if let Ok(mut planned) = self.planned.lock() {
            planned.push(PlannedTransfer {
                source: source.to_path_buf(),
                destination: destination.to_path_buf(),
            });
        }
    }

    /// Planned transfers recorded so far, sorted by source path
    pub fn planned(&self) -> Vec<PlannedTransfer> {
        let mut planned = self
            .planned
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        planned.sort();
        planned
    }

    fn report_progress(&self, phase: Phase, completed: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(PhaseProgress {
                phase,
                completed,
                total,
            });
        }
    }
}

/// A self-contained unit of pipeline work
pub trait PipelineJob: Send + 'static {
    /// Run the job, recording any failure in the context's counters
    fn execute(&self, ctx: &RunContext);
}

/// Digest one file and offer it to the index
#[derive(Debug, Clone)]
pub struct HashJob {
    pub file: MediaFile,
}

impl PipelineJob for HashJob {
    fn execute(&self, ctx: &RunContext) {
        let path = &self.file.path;

        let digest = match hash_file(path) {
            Ok(digest) => digest,
            Err(e) => {
                ctx.counters.record_read_error();
                warn!("Error: {}", e);
                return;
            }
        };
        ctx.counters.record_hashed();

        match ctx.index.try_insert(digest, path.clone()) {
            Ok(InsertOutcome::Inserted) => trace!("Indexed {} as {:?}", path.display(), digest),
            Ok(InsertOutcome::AlreadyPresent(existing)) => {
                let n = ctx.counters.record_collision();
                info!(
                    "({}) File '{}' duplicate with: '{}'. Ignoring it.",
                    n,
                    path.display(),
                    existing.display()
                );
            }
            Err(e) => error!("{}: {}", path.display(), e),
        }
    }
}

/// Place one surviving file in the destination folder
#[derive(Debug, Clone)]
pub struct MaterializeJob {
    pub source: PathBuf,
    pub destination_dir: PathBuf,
}

impl MaterializeJob {
    /// File name the source gets in the destination folder
    pub fn destination_name(&self, ctx: &RunContext) -> String {
        let base = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !ctx.options.rename {
            return base;
        }

        let resolved = ctx.resolver.resolve_or_now(&self.source);
        if resolved.already_named() {
            base
        } else {
            prefixed_name(&resolved.time, &base)
        }
    }
}

impl PipelineJob for MaterializeJob {
    fn execute(&self, ctx: &RunContext) {
        let source = &self.source;
        let destination = self.destination_dir.join(self.destination_name(ctx));

        if *source == destination {
            info!(
                "Skipped: source '{}' is the same as '{}'",
                source.display(),
                destination.display()
            );
            return;
        }

        ctx.record_planned(source, &destination);

        if ctx.options.simulate {
            debug!("{} -> {}", source.display(), destination.display());
            return;
        }

        let verb = if ctx.options.move_files { "Moving" } else { "Copying" };
        info!(
            "{} '{}' to '{}'",
            verb,
            source.display(),
            destination.display()
        );

        match materialize(source, &destination) {
            Err(e) => {
                ctx.counters.record_copy_error();
                warn!("Error: {}", e);
            }
            Ok(MaterializeOutcome::SameFile) => {
                // Removing the source would remove the destination too
                info!(
                    "'{}' is already in place as '{}'",
                    source.display(),
                    destination.display()
                );
            }
            Ok(outcome) => {
                trace!("{:?} '{}'", outcome, destination.display());
                if ctx.options.move_files {
                    if let Err(e) = (ctx.remover)(source) {
                        ctx.counters.record_remove_error();
                        warn!("Error: {}", e);
                    }
                }
            }
        }
    }
}

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Hashing,
    Barrier,
    Materializing,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Hashing => "hashing",
            PipelineState::Barrier => "barrier",
            PipelineState::Materializing => "materializing",
            PipelineState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Final counts of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Eligible files found in the sources
    pub files_found: usize,
    /// Files successfully hashed
    pub files_hashed: usize,
    /// Survivors, one per distinct content
    pub unique_files: usize,
    /// Files dropped as duplicates
    pub duplicates: usize,
    pub read_errors: usize,
    pub copy_errors: usize,
    pub remove_errors: usize,
    /// Jobs that panicked instead of recording their failure
    pub panicked_jobs: usize,
    pub moved: bool,
    pub simulated: bool,
    /// Every intended placement, sorted by source
    pub planned: Vec<PlannedTransfer>,
    pub elapsed_ms: u128,
}

/// Runs the two pool phases over the source folders
pub struct Pipeline {
    options: RunOptions,
    resolver: Arc<TimestampResolver>,
    progress: Option<ProgressCallback>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            resolver: Arc::new(TimestampResolver::new()),
            progress: None,
            state: PipelineState::Idle,
        }
    }

    /// Use a custom timestamp resolver instead of the EXIF-backed default
    pub fn with_resolver(mut self, resolver: TimestampResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Receive per-job progress updates
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(PhaseProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Current coordinator state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn enter(&mut self, next: PipelineState) {
        debug!("Pipeline: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Execute the whole run
    ///
    /// Errors only on unmet preconditions or when the pool can't be started
    /// or fed; per-file problems end up in the report counters.
    pub fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        let options = self.options.clone().validated()?;
        let pool = WorkerPool::new(options.workers, options.queue_capacity)?;

        let mut ctx = RunContext::new(options, Arc::clone(&self.resolver));
        ctx.progress = self.progress.clone();
        let ctx = Arc::new(ctx);

        self.enter(PipelineState::Hashing);
        let files = scan_sources(&ctx.options.sources, &ctx.options.extensions);
        let files_found = files.len();
        info!("Calculating hashes for {} files...", files_found);
        let hash_jobs: Vec<HashJob> = files.into_iter().map(|file| HashJob { file }).collect();
        run_phase(&pool, &ctx, Phase::Hashing, hash_jobs)?;

        self.enter(PipelineState::Barrier);
        ctx.index.freeze();
        let survivors = ctx.index.snapshot();
        info!(
            "Total number of images: {}, duplicates: {}",
            survivors.len(),
            ctx.counters.collisions()
        );

        self.enter(PipelineState::Materializing);
        let unique_files = survivors.len();
        let materialize_jobs: Vec<MaterializeJob> = survivors
            .into_iter()
            .map(|entry| MaterializeJob {
                source: entry.path,
                destination_dir: ctx.options.destination.clone(),
            })
            .collect();
        run_phase(&pool, &ctx, Phase::Materializing, materialize_jobs)?;

        let panicked_jobs = pool.panicked_jobs();
        pool.close();
        self.enter(PipelineState::Done);

        Ok(RunReport {
            files_found,
            files_hashed: ctx.counters.hashed(),
            unique_files,
            duplicates: ctx.counters.collisions(),
            read_errors: ctx.counters.read_errors(),
            copy_errors: ctx.counters.copy_errors(),
            remove_errors: ctx.counters.remove_errors(),
            panicked_jobs,
            moved: ctx.options.move_files,
            simulated: ctx.options.simulate,
            planned: ctx.planned(),
            elapsed_ms: start.elapsed().as_millis(),
        })
    }
}

/// Submit every job and block until all of them have returned
fn run_phase<J: PipelineJob>(
    pool: &WorkerPool,
    ctx: &Arc<RunContext>,
    phase: Phase,
    jobs: Vec<J>,
) -> Result<()> {
    let total = jobs.len();
    let completed = Arc::new(AtomicUsize::new(0));
    let barrier = WaitGroup::new();

    for job in jobs {
        let ctx = Arc::clone(ctx);
        let completed = Arc::clone(&completed);
        // Dropped on return or unwind, so a panicking job still counts down
        let token = barrier.clone();
        pool.submit(move || {
            let _token = token;
            job.execute(&ctx);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            ctx.report_progress(phase, done, total);
        })?;
    }

    barrier.wait();
    debug!("{:?} phase complete: {} jobs", phase, total);
    Ok(())
}
