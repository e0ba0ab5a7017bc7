//! Error types for the pdfdiff library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfDiffError`] is **fatal**: the comparison cannot proceed at all
//!   (missing input, out-of-range offset, pdfium unavailable, output not
//!   writable). Returned as `Err(PdfDiffError)` from [`crate::compare()`].
//!
//! * [`PageError`] is **non-fatal**: a single page job failed (render glitch,
//!   artifact not writable) while every other page is fine. Carried inside
//!   [`crate::output::PageOutcome`] so the coordinator always receives one
//!   result per job and can report a partial failure instead of waiting
//!   forever on a job that will never finish.

use crate::pipeline::render::Side;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfdiff library.
#[derive(Debug, Error)]
pub enum PdfDiffError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Alignment errors ──────────────────────────────────────────────────
    /// `offset` must address an existing page of the second document.
    #[error("The offset is invalid: got {offset}, it should be between 0 and {max}.")]
    OffsetOutOfRange { offset: usize, max: usize },

    /// `start_offset` must address an existing page of the first document.
    #[error("The start offset is invalid: got {start_offset}, it should be between 0 and {max}.")]
    StartOffsetOutOfRange { start_offset: usize, max: usize },

    /// One of the documents has no pages at all.
    #[error("Document {side} has no pages")]
    EmptyDocument { side: Side },

    // ── Job errors ────────────────────────────────────────────────────────
    /// Every page job failed; there is nothing to assemble.
    #[error("All {total} page jobs failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some page jobs succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ComparisonOutput::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} page jobs failed during comparison")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The document writer could not build the output document.
    #[error("Failed to assemble '{path}': {detail}")]
    AssemblyFailed { path: PathBuf, detail: String },

    /// Could not create or write an output file or directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or flag validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Install pdfium system-wide so it can be found by the dynamic loader.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Pass --pdfium-lib /path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page job.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The renderer could not rasterise a page.
    #[error("Document {side}, page {page}: rasterisation failed: {detail}")]
    RenderFailed {
        side: Side,
        page: usize,
        detail: String,
    },

    /// A diff, composite or pass-through image could not be written.
    #[error("Failed to save '{path}': {detail}")]
    SaveFailed { path: PathBuf, detail: String },

    /// The worker handling the job stopped before reporting a result.
    #[error("Job {index}: worker failed: {detail}")]
    WorkerFailed { index: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = PdfDiffError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn offset_out_of_range_names_bound() {
        let e = PdfDiffError::OffsetOutOfRange { offset: 7, max: 2 };
        let msg = e.to_string();
        assert!(msg.contains("got 7"));
        assert!(msg.contains("between 0 and 2"));
    }

    #[test]
    fn render_failed_display() {
        let e = PageError::RenderFailed {
            side: Side::Second,
            page: 4,
            detail: "bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Document B"), "got: {msg}");
        assert!(msg.contains("page 4"));
        assert!(msg.contains("bad xref"));
    }

    #[test]
    fn page_error_round_trips_through_json() {
        let e = PageError::WorkerFailed {
            index: 3,
            detail: "panicked".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: PageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
