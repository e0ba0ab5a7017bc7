//! Pipeline stages for a page-by-page PDF comparison.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ align ──▶ diff ──▶ compose ──▶ artifacts ──▶ assemble
//! (%PDF)    (pdfium)   (offset)  (pixels) (optional)  (PNG files)   (PDF)
//! ```
//!
//! 1. [`input`]: check both paths point at readable PDF files
//! 2. [`render`]: rasterise pages on a dedicated renderer thread, since
//!    pdfium documents cannot be shared between workers
//! 3. [`align`]: map a page of the first document to its counterpart in
//!    the second under an offset
//! 4. [`diff`]: mark changed pixels red or blue
//! 5. [`compose`]: place both source pages on one canvas
//! 6. [`artifacts`]: name, write and remove per-page PNG files
//! 7. [`assemble`]: collect the PNG files in index order into PDF documents
//!
//! [`worker`] runs steps 2–6 for one page job.

pub mod align;
pub mod artifacts;
pub mod assemble;
pub mod compose;
pub mod diff;
pub mod input;
pub mod render;
pub mod worker;
