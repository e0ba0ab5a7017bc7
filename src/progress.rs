//! Progress accounting and the progress-callback trait.
//!
//! [`ProgressTracker`] is the pipeline's counter: it is owned by the
//! coordinating task, which is the only place that receives page outcomes,
//! so it needs no synchronisation. Workers never touch it.
//!
//! Inject an [`Arc<dyn ComparisonProgressCallback>`] via
//! [`crate::config::DiffConfigBuilder::progress_callback`] to receive the
//! same events the tracker logs.
//!
//! # Example
//!
//! ```rust
//! use pdfdiff::{ComparisonProgressCallback, DiffConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ComparisonProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, index: usize, aligned_index: usize, percent: f64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("job {index} → differences_{aligned_index}.png ({percent:.2}%)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = DiffConfig::builder()
//!     .progress_callback(counter as Arc<dyn ComparisonProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use tracing::info;

/// Called by the coordinator as page jobs and output stages complete.
///
/// All methods are invoked from the coordinating task, one at a time, but
/// the trait is `Send + Sync` so implementations can be shared with other
/// threads. Every method has a no-op default.
pub trait ComparisonProgressCallback: Send + Sync {
    /// Called once before any page job is scheduled.
    ///
    /// * `total_ops`: page jobs plus one unit each for merge and clean
    fn on_comparison_start(&self, total_ops: usize) {
        let _ = total_ops;
    }

    /// Called when a page job finished successfully.
    fn on_page_complete(&self, index: usize, aligned_index: usize, percent: f64) {
        let _ = (index, aligned_index, percent);
    }

    /// Called when a page job failed.
    fn on_page_error(&self, index: usize, error: &str, percent: f64) {
        let _ = (index, error, percent);
    }

    /// Called after the merge or clean stage.
    fn on_stage_complete(&self, stage: &str, percent: f64) {
        let _ = (stage, percent);
    }

    /// Called once after every stage ran.
    fn on_comparison_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ComparisonProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DiffConfig`].
pub type ProgressCallback = Arc<dyn ComparisonProgressCallback>;

/// Counts completed operations against a precomputed total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
}

impl ProgressTracker {
    /// `jobs` page jobs, plus one unit for merge and one for clean when requested.
    pub fn new(jobs: usize, merge: bool, clean: bool) -> Self {
        Self {
            total: jobs + usize::from(merge) + usize::from(clean),
            completed: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Count one finished operation and return the new percentage.
    ///
    /// Saturates at `total`.
    pub fn record(&mut self) -> f64 {
        self.completed = (self.completed + 1).min(self.total);
        let percent = self.percent();
        info!("{:.2}% completed", percent);
        percent
    }

    /// `completed / total` as a percentage; 100 for an empty pipeline.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}
