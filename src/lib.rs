//! # pdfdiff
//!
//! Visual page-by-page comparison of two PDF documents.
//!
//! Both documents are rasterised with pdfium and compared pixel by pixel.
//! Unchanged pixels are kept, so the page stays readable; a changed pixel is
//! painted red where the first document is brighter and blue otherwise. The
//! per-page diff images can then be merged into a single PDF, and the two
//! source pages can be placed next to each other in a side-by-side PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! A.pdf, B.pdf
//!  │
//!  ├─ 1. Input     check both files are readable PDFs
//!  ├─ 2. Render    one renderer thread owns both documents (pdfium)
//!  ├─ 3. Align     page i of A ↔ page i (+ offset) of B
//!  ├─ 4. Diff      W concurrent workers, CPU work on spawn_blocking
//!  ├─ 5. Compose   optional side-by-side image per page
//!  ├─ 6. Assemble  differences_{k}.png in order → merged PDF
//!  └─ 7. Clean     optional removal of the per-page images
//! ```
//!
//! ## Inserted pages
//!
//! When the second document has `offset` extra pages starting at page
//! `start_offset`, page `i ≥ start_offset` of the first document is compared
//! with page `i + offset` of the second, and the inserted pages are copied
//! unchanged into the diff sequence.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfdiff::{compare, DiffConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DiffConfig::builder()
//!         .merge(true)
//!         .offset(1)
//!         .start_offset(2)
//!         .build()?;
//!     let output = compare("v1.pdf", "v2.pdf", &config).await?;
//!     eprintln!(
//!         "{} of {} pages differ",
//!         output.stats.changed_pages, output.stats.jobs
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfdiff` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfdiff = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compare;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compare::{compare, compare_sync, compare_with, page_counts, Backend, PdfiumBackend};
pub use config::{DiffConfig, DiffConfigBuilder, Orientation, PrintSize, StackDirection};
pub use error::{PageError, PdfDiffError};
pub use output::{ComparisonOutput, ComparisonStats, PageOutcome};
pub use pipeline::assemble::{AssemblyReport, DocumentWriter, Placement};
pub use pipeline::diff::DiffSummary;
pub use pipeline::render::{PageCounts, PageRenderer, Serve, Side};
pub use progress::{
    ComparisonProgressCallback, NoopProgressCallback, ProgressCallback, ProgressTracker,
};
