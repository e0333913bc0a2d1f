//! Batch orchestration: a bounded worker pool fanning out over the
//! selected folders, with weighted progress, per-second elapsed ticks,
//! and cooperative cancellation.
//!
//! Each folder is one job with at most two phases (PDF aggregation,
//! spreadsheet export). Progress is tracked in units, two per folder;
//! units are added and the resulting fraction published under one lock,
//! so the fraction is monotonically non-decreasing and never exceeds
//! 1.0 even with workers finishing concurrently.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use posconvert_core::{
    BatchStats, BatchSummary, Config, ConversionMode, ConvertError, JobOutcome, JobPhase,
    PdfBackend, ProgressEvent, Severity, artifact_path_for,
};

use crate::aggregate::aggregate_folder;

/// Units a job earns for completing `phase` under `mode`.
///
/// Both mode splits a folder's share evenly between the two phases; a
/// single-phase mode gives its one phase the folder's full share.
fn phase_units(mode: ConversionMode, phase: JobPhase) -> usize {
    match (mode, phase) {
        (ConversionMode::Both, JobPhase::PdfPhase) => 1,
        (ConversionMode::Both, JobPhase::ExportPhase) => 1,
        (ConversionMode::PdfOnly, JobPhase::PdfPhase) => 2,
        (ConversionMode::ExcelOnly, JobPhase::ExportPhase) => 2,
        _ => 0,
    }
}

const UNITS_PER_FOLDER: usize = 2;

/// Shared state for one batch run.
struct BatchContext {
    mode: ConversionMode,
    backend: Arc<dyn PdfBackend>,
    cancel: CancellationToken,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    /// Completed progress units across all jobs.
    completed_units: Mutex<usize>,
    total_units: usize,
    /// Jobs that have reached a terminal state.
    folders_finished: AtomicUsize,
    total_folders: usize,
}

impl BatchContext {
    fn emit(&self, event: ProgressEvent) {
        (self.progress)(event);
    }

    fn status(&self, severity: Severity, line: String) {
        self.emit(ProgressEvent::Status { line, severity });
    }

    /// Record `units` of completed work and publish the new fraction.
    ///
    /// The lock is held across the emit so concurrent workers cannot
    /// publish fractions out of order.
    fn award_units(&self, units: usize) {
        if units == 0 || self.total_units == 0 {
            return;
        }
        // A panicking observer poisons the lock; recover so the other
        // workers keep reporting.
        let mut done = self
            .completed_units
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *done += units;
        let fraction = (*done as f64 / self.total_units as f64).min(1.0);
        let finished = self.folders_finished.load(Ordering::Acquire);
        self.emit(ProgressEvent::Progress {
            fraction,
            label: format!("{finished}/{} folders", self.total_folders),
        });
    }
}

/// A folder conversion job submitted to the pool.
struct FolderJob {
    folder: PathBuf,
    index: usize,
    result_tx: oneshot::Sender<JobOutcome>,
}

/// A pool of worker tasks processing folder jobs.
///
/// Submit jobs via `submit`; each job reports its terminal outcome on
/// its oneshot channel. `shutdown` closes the queue and waits for every
/// worker to drain and exit.
struct ConversionPool {
    job_tx: async_channel::Sender<FolderJob>,
    pool_handle: JoinHandle<()>,
}

impl ConversionPool {
    fn new(ctx: Arc<BatchContext>, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<FolderJob>();

        let pool_handle = tokio::spawn(async move {
            let mut worker_handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                worker_handles.push(tokio::spawn(worker_loop(job_rx.clone(), ctx.clone())));
            }
            drop(job_rx);

            for handle in worker_handles {
                let _ = handle.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    async fn submit(&self, job: FolderJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the queue and wait for all workers to finish.
    async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

/// Worker loop: drain jobs until the queue closes. Cancellation is
/// observed per job, so a cancelled run still drains its queue quickly,
/// marking unstarted jobs Cancelled.
async fn worker_loop(job_rx: async_channel::Receiver<FolderJob>, ctx: Arc<BatchContext>) {
    while let Ok(job) = job_rx.recv().await {
        run_job(&ctx, job).await;
    }
}

async fn run_job(ctx: &BatchContext, job: FolderJob) {
    let FolderJob {
        folder,
        index,
        result_tx,
    } = job;

    let mut status_lines: Vec<String> = Vec::new();
    let mut awarded = 0usize;

    // Jobs not yet started transition directly to Cancelled and
    // contribute nothing to progress.
    if ctx.cancel.is_cancelled() {
        finish_job(
            ctx,
            index,
            folder,
            JobPhase::Cancelled,
            status_lines,
            result_tx,
        );
        return;
    }

    ctx.emit(ProgressEvent::FolderStarted {
        index,
        total: ctx.total_folders,
        folder: folder.clone(),
    });

    // Every mode rejects a missing or non-directory entry up front; a
    // rejected entry still counts toward completion.
    if let Err(e) = check_folder(&folder) {
        let line = format!("{}: {e}", folder.display());
        ctx.status(Severity::Error, line.clone());
        status_lines.push(line);
        ctx.award_units(UNITS_PER_FOLDER);
        finish_job(ctx, index, folder, JobPhase::Failed, status_lines, result_tx);
        return;
    }

    // --- PDF phase ---
    let artifact_path: Option<PathBuf> = if ctx.mode.includes_pdf() {
        let folder_for_task = folder.clone();
        let backend = ctx.backend.clone();
        let result = tokio::task::spawn_blocking(move || {
            aggregate_folder(&folder_for_task, backend.as_ref())
        })
        .await
        .expect("aggregation task panicked");

        match result {
            Ok(outcome) => {
                for (severity, line) in outcome.status {
                    ctx.status(severity, line.clone());
                    status_lines.push(line);
                }
                let units = phase_units(ctx.mode, JobPhase::PdfPhase);
                awarded += units;
                ctx.award_units(units);
                outcome.artifact_path
            }
            Err(e) => {
                let line = format!("{}: {e}", folder.display());
                ctx.status(Severity::Error, line.clone());
                status_lines.push(line);
                // Failed jobs still count as completed so they never
                // block the run from reaching its terminal state.
                ctx.award_units(UNITS_PER_FOLDER - awarded);
                finish_job(ctx, index, folder, JobPhase::Failed, status_lines, result_tx);
                return;
            }
        }
    } else {
        Some(artifact_path_for(&folder))
    };

    // --- Export phase ---
    if ctx.mode.includes_excel() {
        // Cancellation is re-checked at the phase boundary; the phase
        // above was allowed to finish. A single-phase job that already
        // did all its work still finishes Done.
        if ctx.cancel.is_cancelled() {
            finish_job(
                ctx,
                index,
                folder,
                JobPhase::Cancelled,
                status_lines,
                result_tx,
            );
            return;
        }

        match artifact_path {
            Some(path) => {
                let result =
                    tokio::task::spawn_blocking(move || posconvert_report::export_to_xlsx(&path))
                        .await
                        .expect("export task panicked");

                match result {
                    Ok(out_path) => {
                        let line = format!("wrote {}", out_path.display());
                        ctx.status(Severity::Info, line.clone());
                        status_lines.push(line);
                        let units = phase_units(ctx.mode, JobPhase::ExportPhase);
                        awarded += units;
                        ctx.award_units(units);
                    }
                    Err(e) => {
                        let line = format!("{}: {e}", folder.display());
                        ctx.status(Severity::Error, line.clone());
                        status_lines.push(line);
                        ctx.award_units(UNITS_PER_FOLDER - awarded);
                        finish_job(ctx, index, folder, JobPhase::Failed, status_lines, result_tx);
                        return;
                    }
                }
            }
            // No PDFs were found, so there is nothing to export; the
            // folder still completes with its full progress share.
            None => {}
        }
    }

    ctx.award_units(UNITS_PER_FOLDER - awarded);
    finish_job(ctx, index, folder, JobPhase::Done, status_lines, result_tx);
}

fn check_folder(folder: &Path) -> Result<(), ConvertError> {
    if !folder.exists() {
        return Err(ConvertError::FolderMissing(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(ConvertError::NotADirectory(folder.to_path_buf()));
    }
    Ok(())
}

fn finish_job(
    ctx: &BatchContext,
    index: usize,
    folder: PathBuf,
    phase: JobPhase,
    status_lines: Vec<String>,
    result_tx: oneshot::Sender<JobOutcome>,
) {
    debug_assert!(phase.is_terminal());
    ctx.folders_finished.fetch_add(1, Ordering::AcqRel);
    tracing::info!(folder = %folder.display(), ?phase, "folder finished");
    ctx.emit(ProgressEvent::FolderFinished {
        index,
        total: ctx.total_folders,
        folder: folder.clone(),
        phase,
    });
    let _ = result_tx.send(JobOutcome {
        folder,
        phase,
        status_lines,
    });
}

/// Handle to a running batch.
///
/// Dropping the handle detaches the run; use [`wait`](BatchHandle::wait)
/// to collect the summary or [`cancel_and_wait`](BatchHandle::cancel_and_wait)
/// for an orderly shutdown with a bounded grace period.
pub struct BatchHandle {
    cancel: CancellationToken,
    shutdown_grace: Duration,
    handle: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    /// Request cooperative cancellation. In-flight work finishes its
    /// current file; unstarted jobs go straight to Cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token shared with the run, for wiring external cancellation
    /// sources (e.g. Ctrl-C).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to reach its terminal state.
    pub async fn wait(self) -> BatchSummary {
        self.handle.await.expect("batch control task panicked")
    }

    /// Cancel, then wait up to the configured grace period for the
    /// rendezvous; past that the control task is aborted and `None` is
    /// returned.
    pub async fn cancel_and_wait(self) -> Option<BatchSummary> {
        self.cancel.cancel();
        let abort = self.handle.abort_handle();
        match tokio::time::timeout(self.shutdown_grace, self.handle).await {
            Ok(Ok(summary)) => Some(summary),
            Ok(Err(_)) => None,
            Err(_) => {
                abort.abort();
                None
            }
        }
    }
}

/// Start a batch run over `folders`.
///
/// Returns immediately; all work happens on the runtime. Progress,
/// status, tick, and completion events are pushed into `progress`.
/// `Completed` fires exactly once, after every job has reached a
/// terminal state.
pub fn start_batch(
    folders: Vec<PathBuf>,
    mode: ConversionMode,
    config: Config,
    backend: Arc<dyn PdfBackend>,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> BatchHandle {
    let shutdown_grace = config.shutdown_grace;
    let handle_token = cancel.clone();
    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);

    let handle = tokio::spawn(control_task(folders, mode, config, backend, progress, cancel));

    BatchHandle {
        cancel: handle_token,
        shutdown_grace,
        handle,
    }
}

/// The control task: dispatch one job per folder, rendezvous on every
/// outcome, then report completion. Runs separately from any rendering
/// thread, so long PDF parsing never blocks progress reporting.
async fn control_task(
    folders: Vec<PathBuf>,
    mode: ConversionMode,
    config: Config,
    backend: Arc<dyn PdfBackend>,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    cancel: CancellationToken,
) -> BatchSummary {
    let start = Instant::now();
    let total = folders.len();

    let ctx = Arc::new(BatchContext {
        mode,
        backend,
        cancel,
        progress: progress.clone(),
        completed_units: Mutex::new(0),
        total_units: total * UNITS_PER_FOLDER,
        folders_finished: AtomicUsize::new(0),
        total_folders: total,
    });

    // Elapsed-time heartbeat; the presentation layer decides whether to
    // render it.
    let tick_token = CancellationToken::new();
    let ticker = tokio::spawn(tick_loop(
        progress.clone(),
        config.tick_interval,
        start,
        tick_token.clone(),
    ));

    let pool = ConversionPool::new(ctx.clone(), config.num_workers);

    let mut receivers = Vec::with_capacity(total);
    for (index, folder) in folders.into_iter().enumerate() {
        let (result_tx, result_rx) = oneshot::channel();
        pool.submit(FolderJob {
            folder: folder.clone(),
            index,
            result_tx,
        })
        .await;
        receivers.push((folder, result_rx));
    }

    let mut outcomes = Vec::with_capacity(total);
    for (folder, rx) in receivers {
        match rx.await {
            Ok(outcome) => outcomes.push(outcome),
            // A dropped sender means the worker never finished the job;
            // only reachable through forced shutdown.
            Err(_) => outcomes.push(JobOutcome {
                folder,
                phase: JobPhase::Cancelled,
                status_lines: Vec::new(),
            }),
        }
    }

    pool.shutdown().await;
    tick_token.cancel();
    let _ = ticker.await;

    let stats = tally(&outcomes);
    let elapsed = start.elapsed();
    tracing::info!(
        total = stats.total,
        done = stats.done,
        failed = stats.failed,
        cancelled = stats.cancelled,
        ?elapsed,
        "batch complete"
    );
    (progress)(ProgressEvent::Completed {
        elapsed,
        stats: stats.clone(),
    });

    BatchSummary {
        outcomes,
        stats,
        elapsed,
    }
}

async fn tick_loop(
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    interval: Duration,
    start: Instant,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first interval tick fires immediately; swallow it.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                (progress)(ProgressEvent::Tick { elapsed: start.elapsed() });
            }
        }
    }
}

fn tally(outcomes: &[JobOutcome]) -> BatchStats {
    let mut stats = BatchStats {
        total: outcomes.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome.phase {
            JobPhase::Done => stats.done += 1,
            JobPhase::Failed => stats.failed += 1,
            JobPhase::Cancelled => stats.cancelled += 1,
            _ => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_mode_splits_units_between_phases() {
        assert_eq!(phase_units(ConversionMode::Both, JobPhase::PdfPhase), 1);
        assert_eq!(phase_units(ConversionMode::Both, JobPhase::ExportPhase), 1);
    }

    #[test]
    fn single_phase_modes_take_the_full_share() {
        assert_eq!(phase_units(ConversionMode::PdfOnly, JobPhase::PdfPhase), 2);
        assert_eq!(
            phase_units(ConversionMode::ExcelOnly, JobPhase::ExportPhase),
            2
        );
        assert_eq!(phase_units(ConversionMode::PdfOnly, JobPhase::ExportPhase), 0);
        assert_eq!(phase_units(ConversionMode::ExcelOnly, JobPhase::PdfPhase), 0);
    }

    #[test]
    fn tally_counts_terminal_phases() {
        let outcomes = vec![
            JobOutcome {
                folder: PathBuf::from("a"),
                phase: JobPhase::Done,
                status_lines: vec![],
            },
            JobOutcome {
                folder: PathBuf::from("b"),
                phase: JobPhase::Failed,
                status_lines: vec![],
            },
            JobOutcome {
                folder: PathBuf::from("c"),
                phase: JobPhase::Cancelled,
                status_lines: vec![],
            },
        ];
        let stats = tally(&outcomes);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.cancelled, 1);
    }
}
