//! Result types of a comparison.

use crate::error::{PageError, PdfDiffError};
use crate::pipeline::assemble::AssemblyReport;
use crate::pipeline::diff::DiffSummary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The result of one page job.
///
/// Every scheduled job produces exactly one `PageOutcome`, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// Job index: 0-based page of the first document.
    pub index: usize,
    /// Page of the second document it was compared to, and the slot of its
    /// diff image in the merged output.
    pub aligned_index: usize,
    /// Written diff image.
    pub diff_path: Option<PathBuf>,
    /// Written side-by-side image, when requested.
    pub composite_path: Option<PathBuf>,
    /// Pages of the second document copied verbatim by this job.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough_paths: Vec<PathBuf>,
    /// Pages of the second document this job failed to copy. They do not
    /// fail the job; their slots are reported missing by the assembler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough_errors: Vec<PageError>,
    /// Pixel counts of the diff.
    pub summary: Option<DiffSummary>,
    /// Set when the job failed; the paths above are then partial at best.
    pub error: Option<PageError>,
    /// Wall-clock time of the job.
    pub duration_ms: u64,
}

impl PageOutcome {
    pub fn new(index: usize, aligned_index: usize) -> Self {
        Self {
            index,
            aligned_index,
            diff_path: None,
            composite_path: None,
            passthrough_paths: Vec::new(),
            passthrough_errors: Vec::new(),
            summary: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Outcome of a job that no worker reported on.
    pub fn lost(index: usize, aligned_index: usize, detail: impl Into<String>) -> Self {
        Self {
            error: Some(PageError::WorkerFailed {
                index,
                detail: detail.into(),
            }),
            ..Self::new(index, aligned_index)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Artifacts this job actually wrote into the diff sequence.
    pub fn written_diffs(&self) -> impl Iterator<Item = &PathBuf> {
        self.diff_path.iter().chain(&self.passthrough_paths)
    }
}

/// Aggregate numbers of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonStats {
    /// Pages of the first document.
    pub pages_first: usize,
    /// Pages of the second document.
    pub pages_second: usize,
    /// Scheduled page jobs.
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Length of the aligned diff sequence.
    pub aligned_pages: usize,
    /// Jobs whose pages differ in at least one pixel.
    pub changed_pages: usize,
    /// Pages written to the merged document.
    pub merged_pages: usize,
    /// Artifacts the assemblers had to skip.
    pub missing_artifacts: usize,
    /// Artifacts removed by the clean step.
    pub cleaned_artifacts: usize,
    /// Progress units: jobs, plus merge and clean when requested.
    pub total_ops: usize,
    pub completed_ops: usize,
    pub total_duration_ms: u64,
}

/// Everything a comparison produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutput {
    /// One outcome per job, in job order.
    pub pages: Vec<PageOutcome>,
    /// The merged diff document, when requested.
    pub merged: Option<AssemblyReport>,
    /// The side-by-side document, when requested.
    pub side_by_side: Option<AssemblyReport>,
    pub stats: ComparisonStats,
}

impl ComparisonOutput {
    /// Outcomes of failed jobs.
    pub fn failures(&self) -> impl Iterator<Item = &PageOutcome> {
        self.pages.iter().filter(|p| !p.is_success())
    }

    /// Treat any failed page job as an error.
    pub fn into_result(self) -> Result<Self, PdfDiffError> {
        if self.stats.failed > 0 {
            return Err(PdfDiffError::PartialFailure {
                success: self.stats.succeeded,
                failed: self.stats.failed,
                total: self.stats.jobs,
            });
        }
        Ok(self)
    }
}
