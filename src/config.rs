//! Configuration types for a PDF comparison.
//!
//! All comparison behaviour is controlled through [`DiffConfig`], built via
//! its [`DiffConfigBuilder`]. Every knob lives in one `Clone` struct so the
//! same config can be handed to the coordinator, the workers and the output
//! assembler without threading individual flags through each call.
//!
//! Paper geometry is expressed in PDF points (1/72 inch). Paper sizes are
//! defined in millimetres and converted with [`mm_to_points`].

use crate::error::PdfDiffError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── Units ────────────────────────────────────────────────────────────────

/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Millimetres per inch.
pub const MM_PER_INCH: f32 = 25.4;

/// Width of the blank substitute page, in points (A4).
pub const BLANK_PAGE_WIDTH_PT: u32 = 595;

/// Height of the blank substitute page, in points (A4).
pub const BLANK_PAGE_HEIGHT_PT: u32 = 842;

/// Default output document name.
pub const DEFAULT_OUTPUT: &str = "differences.pdf";

/// Convert millimetres to points.
pub fn mm_to_points(mm: f32) -> f32 {
    mm / MM_PER_INCH * POINTS_PER_INCH
}

/// Convert a pixel length rendered at `dpi` back to points.
pub fn pixels_to_points(px: u32, dpi: u32) -> f32 {
    px as f32 * POINTS_PER_INCH / dpi as f32
}

/// Configuration for a PDF comparison.
///
/// Built via [`DiffConfig::builder()`] or using [`DiffConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfdiff::{DiffConfig, PrintSize};
///
/// let config = DiffConfig::builder()
///     .merge(true)
///     .offset(1)
///     .start_offset(3)
///     .print_size(PrintSize::A4)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct DiffConfig {
    /// Assemble the diff images into a single PDF. Default: false.
    pub merge: bool,

    /// Remove the per-page images once the outputs are written. Default: false.
    pub clean: bool,

    /// Number of pages inserted in the second document. Default: 0.
    ///
    /// From `start_offset` on, page `i` of the first document is compared to
    /// page `i + offset` of the second.
    pub offset: usize,

    /// First page (0-based) of the first document the offset applies to. Default: 0.
    pub start_offset: usize,

    /// Page orientation of the merged PDF. `None` detects it from the
    /// aspect ratio of the first page of the first document.
    pub orientation: Option<Orientation>,

    /// Paper size of the merged PDF. Default: A3.
    pub print_size: PrintSize,

    /// Path of the merged PDF. Default: `differences.pdf`.
    ///
    /// The side-by-side document is written next to it as `combined_<name>`.
    pub output: PathBuf,

    /// Number of concurrent page workers. Default: host parallelism.
    pub workers: usize,

    /// Also produce the side-by-side comparison document. Default: false.
    pub side_by_side: bool,

    /// How the two pages are stacked in a side-by-side image. Default: horizontal.
    pub direction: StackDirection,

    /// Rendering resolution in dots per inch. Range: 72–400. Default: 150.
    ///
    /// The blank substitute page and the artifact extents in the output
    /// documents both scale with this value, so a page keeps its physical
    /// size whatever the resolution.
    pub dpi: u32,

    /// Directory receiving the per-page artifacts. Default: current directory.
    pub work_dir: PathBuf,

    /// PDF user password, tried on both documents.
    pub password: Option<String>,

    /// Explicit path to the pdfium shared library.
    /// If None, `PDFIUM_LIB_PATH` is checked, then the system library.
    pub pdfium_library: Option<PathBuf>,

    /// Receives per-page and per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

/// Host parallelism, falling back to a single worker.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            merge: false,
            clean: false,
            offset: 0,
            start_offset: 0,
            orientation: None,
            print_size: PrintSize::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            workers: default_workers(),
            side_by_side: false,
            direction: StackDirection::default(),
            dpi: 150,
            work_dir: PathBuf::from("."),
            password: None,
            pdfium_library: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DiffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffConfig")
            .field("merge", &self.merge)
            .field("clean", &self.clean)
            .field("offset", &self.offset)
            .field("start_offset", &self.start_offset)
            .field("orientation", &self.orientation)
            .field("print_size", &self.print_size)
            .field("output", &self.output)
            .field("workers", &self.workers)
            .field("side_by_side", &self.side_by_side)
            .field("direction", &self.direction)
            .field("dpi", &self.dpi)
            .field("work_dir", &self.work_dir)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library", &self.pdfium_library)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ComparisonProgressCallback>"),
            )
            .finish()
    }
}

impl DiffConfig {
    /// Create a new builder for `DiffConfig`.
    pub fn builder() -> DiffConfigBuilder {
        DiffConfigBuilder {
            config: Self::default(),
        }
    }

    /// Path of the side-by-side document: `combined_<output name>` in the
    /// output's directory.
    pub fn side_by_side_output(&self) -> PathBuf {
        let name = self
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
        self.output.with_file_name(format!("combined_{name}"))
    }

    /// Size of the blank substitute page at the configured resolution.
    pub fn blank_page_size(&self) -> (u32, u32) {
        let scale = |pt: u32| (pt as u64 * self.dpi as u64 / POINTS_PER_INCH as u64) as u32;
        (scale(BLANK_PAGE_WIDTH_PT), scale(BLANK_PAGE_HEIGHT_PT))
    }
}

/// Builder for [`DiffConfig`].
#[derive(Debug)]
pub struct DiffConfigBuilder {
    config: DiffConfig,
}

impl DiffConfigBuilder {
    pub fn merge(mut self, v: bool) -> Self {
        self.config.merge = v;
        self
    }

    pub fn clean(mut self, v: bool) -> Self {
        self.config.clean = v;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.config.offset = offset;
        self
    }

    pub fn start_offset(mut self, start_offset: usize) -> Self {
        self.config.start_offset = start_offset;
        self
    }

    pub fn orientation(mut self, orientation: Option<Orientation>) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn print_size(mut self, size: PrintSize) -> Self {
        self.config.print_size = size;
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = path.into();
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn side_by_side(mut self, v: bool) -> Self {
        self.config.side_by_side = v;
        self
    }

    pub fn direction(mut self, direction: StackDirection) -> Self {
        self.config.direction = direction;
        self
    }

    /// Shorthand for `direction(StackDirection::Vertical)` when `v` is true.
    pub fn vertical_align(self, v: bool) -> Self {
        let direction = if v {
            StackDirection::Vertical
        } else {
            StackDirection::Horizontal
        };
        self.direction(direction)
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Offsets can only be checked against page counts once the documents
    /// are open; see [`crate::compare()`].
    pub fn build(self) -> Result<DiffConfig, PdfDiffError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(PdfDiffError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.workers == 0 {
            return Err(PdfDiffError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.output.file_name().is_none() {
            return Err(PdfDiffError::InvalidConfig(format!(
                "Output path '{}' has no file name",
                c.output.display()
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Page orientation of the merged document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Taller than wide (`P`).
    Portrait,
    /// Wider than tall (`L`).
    Landscape,
}

impl Orientation {
    /// Orientation matching an image of the given size; square counts as portrait.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

impl FromStr for Orientation {
    type Err = PdfDiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "P" | "p" => Ok(Orientation::Portrait),
            "L" | "l" => Ok(Orientation::Landscape),
            other => Err(PdfDiffError::InvalidConfig(format!(
                "The orientation '{other}' is invalid. It should be either 'P' or 'L'."
            ))),
        }
    }
}

/// ISO 216 paper size of the merged document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintSize {
    A4,
    #[default]
    A3,
    A2,
    A1,
    A0,
}

impl PrintSize {
    /// Portrait width and height in millimetres.
    pub fn millimetres(self) -> (f32, f32) {
        match self {
            PrintSize::A4 => (210.0, 297.0),
            PrintSize::A3 => (297.0, 420.0),
            PrintSize::A2 => (420.0, 594.0),
            PrintSize::A1 => (594.0, 841.0),
            PrintSize::A0 => (841.0, 1189.0),
        }
    }

    /// Width and height in points for the given orientation.
    pub fn points(self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = self.millimetres();
        let (w, h) = (mm_to_points(w), mm_to_points(h));
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

impl FromStr for PrintSize {
    type Err = PdfDiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A4" => Ok(PrintSize::A4),
            "A3" => Ok(PrintSize::A3),
            "A2" => Ok(PrintSize::A2),
            "A1" => Ok(PrintSize::A1),
            "A0" => Ok(PrintSize::A0),
            _ => Err(PdfDiffError::InvalidConfig(format!(
                "Invalid print size '{s}'. It should be one of 'A4', 'A3', 'A2', 'A1', or 'A0'."
            ))),
        }
    }
}

/// How the two source pages are stacked in a side-by-side image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackDirection {
    /// First page on the left, second on the right. (default)
    #[default]
    Horizontal,
    /// First page on top, second below.
    Vertical,
}
