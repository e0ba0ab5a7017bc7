//! Page jobs and the worker loop.
//!
//! A worker pulls job indices from the shared queue until it is empty. For
//! each index it resolves the aligned page, fetches both pages from the
//! renderer thread, then diffs, composes and encodes on a blocking thread.
//! Whatever happens, exactly one [`PageOutcome`] is sent back per job.

use crate::config::{DiffConfig, StackDirection};
use crate::error::PageError;
use crate::output::PageOutcome;
use crate::pipeline::align;
use crate::pipeline::artifacts::{save_png, ArtifactLayout};
use crate::pipeline::compose::compose;
use crate::pipeline::diff::{diff_pages, DiffSummary};
use crate::pipeline::render::{RenderHandle, Side};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// The parts of [`DiffConfig`] a page job needs.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub offset: usize,
    pub start_offset: usize,
    pub blank_size: (u32, u32),
    pub layout: ArtifactLayout,
    pub side_by_side: bool,
    pub direction: StackDirection,
}

impl JobContext {
    pub fn from_config(config: &DiffConfig) -> Self {
        Self {
            offset: config.offset,
            start_offset: config.start_offset,
            blank_size: config.blank_page_size(),
            layout: ArtifactLayout::new(&config.work_dir),
            side_by_side: config.side_by_side,
            direction: config.direction,
        }
    }
}

/// Run job `index` to completion.
///
/// Never fails: errors are carried in [`PageOutcome::error`].
pub async fn process_job(index: usize, renderer: &RenderHandle, ctx: &JobContext) -> PageOutcome {
    let start = Instant::now();
    let aligned = align::target_index(index, ctx.offset, ctx.start_offset);
    let mut outcome = PageOutcome::new(index, aligned);

    if let Err(e) = run_job(renderer, ctx, &mut outcome).await {
        warn!("Page job {} failed: {}", index, e);
        outcome.error = Some(e);
    }

    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

async fn run_job(
    renderer: &RenderHandle,
    ctx: &JobContext,
    outcome: &mut PageOutcome,
) -> Result<(), PageError> {
    let (index, aligned) = (outcome.index, outcome.aligned_index);

    if index == ctx.start_offset && ctx.offset > 0 {
        for k in align::passthrough_window(ctx.offset, ctx.start_offset) {
            match copy_page(renderer, ctx, index, k).await {
                Ok(path) => {
                    debug!("Copied page {} of B into {}", k + 1, path.display());
                    outcome.passthrough_paths.push(path);
                }
                Err(e) => {
                    warn!("Job {}: cannot copy page {} of B: {}", index, k + 1, e);
                    outcome.passthrough_errors.push(e);
                }
            }
        }
    }

    let first = renderer
        .page_or_blank(Side::First, index, ctx.blank_size)
        .await?;
    let second = renderer
        .page_or_blank(Side::Second, aligned, ctx.blank_size)
        .await?;

    let diff_path = ctx.layout.diff_path(aligned);
    let composite_path = ctx.side_by_side.then(|| ctx.layout.composite_path(index));
    let summary = diff_and_save(
        index,
        first,
        second,
        diff_path.clone(),
        composite_path.clone(),
        ctx.direction,
    )
    .await?;

    debug!(
        "Job {}: A{} vs B{}, {} pixels changed",
        index,
        index + 1,
        aligned + 1,
        summary.changed
    );
    outcome.diff_path = Some(diff_path);
    outcome.composite_path = composite_path;
    outcome.summary = Some(summary);
    Ok(())
}

/// Copy page `k` of the second document verbatim into diff slot `k`.
async fn copy_page(
    renderer: &RenderHandle,
    ctx: &JobContext,
    index: usize,
    k: usize,
) -> Result<PathBuf, PageError> {
    let page = renderer.page_or_blank(Side::Second, k, ctx.blank_size).await?;
    let path = ctx.layout.diff_path(k);
    encode(index, page, path.clone()).await?;
    Ok(path)
}

fn join_failed(index: usize, e: tokio::task::JoinError) -> PageError {
    PageError::WorkerFailed {
        index,
        detail: format!("blocking task failed: {e}"),
    }
}

/// Save `image` as PNG off the async runtime.
async fn encode(index: usize, image: RgbaImage, path: PathBuf) -> Result<(), PageError> {
    tokio::task::spawn_blocking(move || save_png(&image, &path))
        .await
        .map_err(|e| join_failed(index, e))?
}

/// Diff, optionally compose, and save off the async runtime.
async fn diff_and_save(
    index: usize,
    first: RgbaImage,
    second: RgbaImage,
    diff_path: PathBuf,
    composite_path: Option<PathBuf>,
    direction: StackDirection,
) -> Result<DiffSummary, PageError> {
    tokio::task::spawn_blocking(move || -> Result<DiffSummary, PageError> {
        let (diff, summary) = diff_pages(&first, &second);
        save_png(&diff, &diff_path)?;
        if let Some(path) = composite_path {
            save_png(&compose(&first, &second, direction), &path)?;
        }
        Ok(summary)
    })
    .await
    .map_err(|e| join_failed(index, e))?
}

/// Pull jobs from `queue` until it is closed and empty.
///
/// Stops early if the coordinator stopped listening.
pub async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<usize>>>,
    renderer: RenderHandle,
    ctx: Arc<JobContext>,
    results: mpsc::UnboundedSender<PageOutcome>,
) {
    loop {
        // The lock is released before the job runs.
        let next = queue.lock().await.recv().await;
        let Some(index) = next else {
            break;
        };
        let outcome = process_job(index, &renderer, &ctx).await;
        if results.send(outcome).is_err() {
            warn!("Worker {}: results channel closed", id);
            break;
        }
    }
    debug!("Worker {} finished", id);
}
