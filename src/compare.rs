//! Comparison entry points and the page-job coordinator.
//!
//! The coordinator owns the whole run:
//!
//! ```text
//! start renderer ─▶ validate offsets ─▶ enqueue jobs ─▶ drain outcomes
//!        ─▶ join workers ─▶ stop renderer ─▶ assemble PDFs ─▶ clean
//! ```
//!
//! The phases never overlap. Workers only ever talk to the renderer thread
//! and to the results channel; the progress counter lives here.

use crate::config::{DiffConfig, Orientation};
use crate::error::PdfDiffError;
use crate::output::{ComparisonOutput, ComparisonStats, PageOutcome};
use crate::pipeline::artifacts::{self, ArtifactLayout};
use crate::pipeline::assemble::{
    assemble_merged, assemble_side_by_side, AssemblyReport, DocumentWriter, PdfiumWriter,
};
use crate::pipeline::render::{serve_pdf_files, PageCounts, RenderHandle, RenderService, Serve, Side};
use crate::pipeline::worker::{run_worker, JobContext};
use crate::pipeline::{align, input};
use crate::progress::ProgressTracker;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Source of pages and sink of output documents.
///
/// [`PdfiumBackend`] is the production implementation. Tests substitute
/// in-memory pages and a recording writer.
pub trait Backend: Send + Sync + 'static {
    /// Open both documents and serve them. Runs on the renderer thread and
    /// must end with [`Serve::run`] or [`Serve::fail`].
    fn serve_pages(&self, serve: Serve);

    /// A fresh writer for one output document with pages of `page_size` points.
    fn create_writer(&self, page_size: (f32, f32)) -> Box<dyn DocumentWriter + Send>;
}

/// Renders both PDF files and writes the outputs with pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    first: PathBuf,
    second: PathBuf,
    password: Option<String>,
    dpi: u32,
    library: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new(first: impl Into<PathBuf>, second: impl Into<PathBuf>, config: &DiffConfig) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            password: config.password.clone(),
            dpi: config.dpi,
            library: config.pdfium_library.clone(),
        }
    }
}

impl Backend for PdfiumBackend {
    fn serve_pages(&self, serve: Serve) {
        serve_pdf_files(
            serve,
            self.library.as_deref(),
            &self.first,
            &self.second,
            self.password.as_deref(),
            self.dpi,
        )
    }

    fn create_writer(&self, page_size: (f32, f32)) -> Box<dyn DocumentWriter + Send> {
        Box::new(PdfiumWriter::new(self.library.clone(), page_size))
    }
}

/// Compare two PDF files page by page.
///
/// Writes `differences_{k}.png` per aligned page into `config.work_dir`,
/// then the merged and side-by-side documents when requested.
///
/// # Returns
/// `Ok(ComparisonOutput)` even if some page jobs failed; check
/// `output.stats.failed` or call [`ComparisonOutput::into_result`].
///
/// # Errors
/// Only fatal errors:
/// - an input is missing, unreadable, not a PDF or cannot be opened
/// - `offset` or `start_offset` is out of range
/// - every page job failed
/// - an output document could not be written
pub async fn compare(
    first: impl AsRef<Path>,
    second: impl AsRef<Path>,
    config: &DiffConfig,
) -> Result<ComparisonOutput, PdfDiffError> {
    let first = input::validate_pdf(first)?;
    let second = input::validate_pdf(second)?;
    info!("Comparing {} with {}", first.display(), second.display());

    let backend = PdfiumBackend::new(first, second, config);
    compare_with(Arc::new(backend), config).await
}

/// Synchronous wrapper around [`compare`].
///
/// Creates a temporary tokio runtime internally.
pub fn compare_sync(
    first: impl AsRef<Path>,
    second: impl AsRef<Path>,
    config: &DiffConfig,
) -> Result<ComparisonOutput, PdfDiffError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfDiffError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(compare(first, second, config))
}

/// Open both PDF files and return their page counts without comparing.
pub async fn page_counts(
    first: impl AsRef<Path>,
    second: impl AsRef<Path>,
    config: &DiffConfig,
) -> Result<PageCounts, PdfDiffError> {
    let first = input::validate_pdf(first)?;
    let second = input::validate_pdf(second)?;
    let backend = Arc::new(PdfiumBackend::new(first, second, config));

    let service = RenderService::start(move |serve| backend.serve_pages(serve)).await?;
    let counts = service.counts();
    service.shutdown().await?;
    Ok(counts)
}

/// Run a comparison against any [`Backend`].
pub async fn compare_with(
    backend: Arc<dyn Backend>,
    config: &DiffConfig,
) -> Result<ComparisonOutput, PdfDiffError> {
    let total_start = Instant::now();

    // ── Step 1: Work directory ───────────────────────────────────────────
    std::fs::create_dir_all(&config.work_dir).map_err(|e| PdfDiffError::OutputWriteFailed {
        path: config.work_dir.clone(),
        source: e,
    })?;
    let layout = ArtifactLayout::new(&config.work_dir);

    // ── Step 2: Open documents ───────────────────────────────────────────
    let serving = Arc::clone(&backend);
    let service = RenderService::start(move |serve| serving.serve_pages(serve)).await?;
    let counts = service.counts();

    if let Err(e) = check_counts(counts, config) {
        // The documents are useless now; the configuration error is what matters.
        let _ = service.shutdown().await;
        return Err(e);
    }

    let jobs = align::job_count(counts.first, counts.second);
    let aligned_len = align::aligned_len(counts.first, counts.second, config.offset);
    let mut tracker = ProgressTracker::new(jobs, config.merge, config.clean);
    info!(
        "Scheduling {} page jobs ({} aligned pages) on {} workers",
        jobs, aligned_len, config.workers
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_comparison_start(tracker.total());
    }

    // ── Step 3: Orientation ──────────────────────────────────────────────
    let handle = service.handle();
    let orientation = match config.orientation {
        Some(o) => o,
        None if config.merge => detect_orientation(&handle).await,
        None => Orientation::Portrait,
    };

    // ── Step 4: Run page jobs ────────────────────────────────────────────
    let pages = run_jobs(handle, config, jobs, &mut tracker).await?;
    service.shutdown().await?;

    let succeeded = pages.iter().filter(|p| p.is_success()).count();
    let failed = jobs - succeeded;
    if succeeded == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(PdfDiffError::AllPagesFailed {
            total: jobs,
            first_error,
        });
    }

    // ── Step 5: Merged document ──────────────────────────────────────────
    let page_size = config.print_size.points(orientation);
    let merged = if config.merge {
        info!(
            "Merging {} difference images into {} ({:?} {:?})",
            aligned_len,
            config.output.display(),
            config.print_size,
            orientation
        );
        let written: HashSet<PathBuf> = pages
            .iter()
            .flat_map(|p| p.written_diffs())
            .cloned()
            .collect();
        let writer = backend.create_writer(page_size);
        let (layout, output, dpi) = (layout.clone(), config.output.clone(), config.dpi);
        let report = assemble(
            move |w| assemble_merged(w, &layout, aligned_len, &written, dpi, &output),
            writer,
        )
        .await?;
        let percent = tracker.record();
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage_complete("merge", percent);
        }
        Some(report)
    } else {
        None
    };

    // ── Step 6: Side-by-side document ────────────────────────────────────
    let side_by_side = if config.side_by_side {
        let done: Vec<usize> = pages
            .iter()
            .filter(|p| p.composite_path.is_some())
            .map(|p| p.index)
            .collect();
        let output = config.side_by_side_output();
        info!(
            "Combining {} side-by-side images into {}",
            done.len(),
            output.display()
        );
        let writer = backend.create_writer(page_size);
        let (layout, dpi) = (layout.clone(), config.dpi);
        let report = assemble(
            move |w| assemble_side_by_side(w, &layout, &done, dpi, &output),
            writer,
        )
        .await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage_complete("side-by-side", tracker.percent());
        }
        Some(report)
    } else {
        None
    };

    // ── Step 7: Clean ────────────────────────────────────────────────────
    let cleaned_artifacts = if config.clean {
        let removed = artifacts::clean(&layout);
        info!("Removed {} page images", removed);
        let percent = tracker.record();
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage_complete("clean", percent);
        }
        removed
    } else {
        0
    };

    // ── Step 8: Stats ────────────────────────────────────────────────────
    let missing_artifacts: usize = [&merged, &side_by_side]
        .into_iter()
        .flatten()
        .map(|r| r.missing.len())
        .sum();
    let stats = ComparisonStats {
        pages_first: counts.first,
        pages_second: counts.second,
        jobs,
        succeeded,
        failed,
        aligned_pages: aligned_len,
        changed_pages: pages
            .iter()
            .filter_map(|p| p.summary)
            .filter(|s| !s.is_identical())
            .count(),
        merged_pages: merged.as_ref().map_or(0, |r| r.pages),
        missing_artifacts,
        cleaned_artifacts,
        total_ops: tracker.total(),
        completed_ops: tracker.completed(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Comparison complete: {}/{} page jobs, {} pages differ, {}ms total",
        succeeded, jobs, stats.changed_pages, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_comparison_complete(succeeded, failed);
    }

    Ok(ComparisonOutput {
        pages,
        merged,
        side_by_side,
        stats,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn check_counts(counts: PageCounts, config: &DiffConfig) -> Result<(), PdfDiffError> {
    if counts.first == 0 {
        return Err(PdfDiffError::EmptyDocument { side: Side::First });
    }
    if counts.second == 0 {
        return Err(PdfDiffError::EmptyDocument { side: Side::Second });
    }
    align::validate(counts.first, counts.second, config.offset, config.start_offset)
}

/// Orientation of the first page of the first document.
async fn detect_orientation(handle: &RenderHandle) -> Orientation {
    match handle.render(Side::First, 0).await {
        Ok(page) => {
            let orientation = Orientation::from_dimensions(page.width(), page.height());
            debug!(
                "Detected {:?} orientation from {}x{} first page",
                orientation,
                page.width(),
                page.height()
            );
            orientation
        }
        Err(e) => {
            warn!("Cannot detect orientation ({}), using portrait", e);
            Orientation::Portrait
        }
    }
}

/// Schedule every job, run the workers and collect one outcome per job.
///
/// Returns the outcomes in job order.
async fn run_jobs(
    renderer: RenderHandle,
    config: &DiffConfig,
    jobs: usize,
    tracker: &mut ProgressTracker,
) -> Result<Vec<PageOutcome>, PdfDiffError> {
    let ctx = Arc::new(JobContext::from_config(config));

    // The queue holds every job, so submission never waits on the workers.
    let (job_tx, job_rx) = mpsc::channel(jobs.max(1));
    for index in 0..jobs {
        job_tx
            .send(index)
            .await
            .map_err(|_| PdfDiffError::Internal("job queue closed".to_string()))?;
    }
    drop(job_tx);

    let queue = Arc::new(Mutex::new(job_rx));
    let (results_tx, mut results) = mpsc::unbounded_channel();
    let workers = config.workers.clamp(1, jobs.max(1));
    let handles: Vec<_> = (0..workers)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                Arc::clone(&queue),
                renderer.clone(),
                Arc::clone(&ctx),
                results_tx.clone(),
            ))
        })
        .collect();
    drop(results_tx);
    drop(renderer);

    let mut outcomes: Vec<Option<PageOutcome>> = vec![None; jobs];
    let mut received = 0;
    // Ends early if every worker exited without reporting all jobs.
    while received < jobs {
        let Some(outcome) = results.recv().await else {
            break;
        };
        received += 1;
        let percent = tracker.record();
        report(config, &outcome, percent);
        let index = outcome.index;
        outcomes[index] = Some(outcome);
    }

    for joined in futures::future::join_all(handles).await {
        if let Err(e) = joined {
            warn!("Worker task failed: {}", e);
        }
    }

    Ok(outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| {
            outcome.unwrap_or_else(|| {
                let aligned = align::target_index(index, config.offset, config.start_offset);
                let lost = PageOutcome::lost(index, aligned, "no result reported");
                warn!("Page job {} produced no result", index);
                report(config, &lost, tracker.record());
                lost
            })
        })
        .collect())
}

fn report(config: &DiffConfig, outcome: &PageOutcome, percent: f64) {
    let Some(ref cb) = config.progress_callback else {
        return;
    };
    match outcome.error {
        None => cb.on_page_complete(outcome.index, outcome.aligned_index, percent),
        Some(ref e) => cb.on_page_error(outcome.index, &e.to_string(), percent),
    }
}

/// Run an assembler with `writer` on a blocking thread.
async fn assemble<F>(
    f: F,
    mut writer: Box<dyn DocumentWriter + Send>,
) -> Result<AssemblyReport, PdfDiffError>
where
    F: FnOnce(&mut dyn DocumentWriter) -> Result<AssemblyReport, PdfDiffError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(writer.as_mut()))
        .await
        .map_err(|e| PdfDiffError::Internal(format!("Assembly task failed: {e}")))?
}
