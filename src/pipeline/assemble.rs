//! Output assembly: per-page artifacts → merged and side-by-side PDFs.
//!
//! Runs once every page job has reported and the renderer thread is gone.
//! Artifacts are looked up by index rather than by completion order, so the
//! output page order is fixed no matter how the workers interleaved. A
//! missing artifact (its job failed) is skipped with a warning and listed
//! in the [`AssemblyReport`]. Only artifacts written by the current run
//! count: a leftover file from an earlier run in the same work directory is
//! treated as missing.
//!
//! The PDF itself is produced through the [`DocumentWriter`] trait. The
//! pdfium implementation, [`PdfiumWriter`], records the page plan and only
//! binds pdfium when [`DocumentWriter::output`] is called, so it can be
//! created and filled on any thread.

use crate::config::pixels_to_points;
use crate::error::PdfDiffError;
use crate::pipeline::artifacts::ArtifactLayout;
use crate::pipeline::render::bind_pdfium;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rectangle of an image on a page, in points from the page's lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scale `image` to fit `page` while keeping its aspect ratio, and center it.
///
/// Images are scaled up as well as down.
pub fn fit_centered(page: (f32, f32), image: (f32, f32)) -> Placement {
    let ((pw, ph), (iw, ih)) = (page, image);
    let scale = (pw / iw).min(ph / ih);
    let (width, height) = (iw * scale, ih * scale);
    Placement {
        x: (pw - width) / 2.0,
        y: (ph - height) / 2.0,
        width,
        height,
    }
}

/// Builds one output document page by page.
pub trait DocumentWriter {
    /// Default page size of the document, in points.
    fn page_size(&self) -> (f32, f32);

    /// Append an empty page; subsequent images go onto it.
    fn add_page(&mut self, width: f32, height: f32) -> Result<(), PdfDiffError>;

    /// Draw the PNG at `image` onto the last added page.
    fn place_image(&mut self, image: &Path, placement: Placement) -> Result<(), PdfDiffError>;

    /// Write the document to `path`.
    fn output(&mut self, path: &Path) -> Result<(), PdfDiffError>;
}

/// What an assembler wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// The written document.
    pub path: PathBuf,
    /// Number of pages in it.
    pub pages: usize,
    /// Indices whose artifact was missing and skipped.
    pub missing: Vec<usize>,
}

/// Size of the PNG at `path` in points at `dpi`, or `None` if it cannot be read.
fn artifact_extent(path: &Path, dpi: u32) -> Option<(f32, f32)> {
    if !path.exists() {
        warn!("Image {} does not exist, skipping", path.display());
        return None;
    }
    match image::image_dimensions(path) {
        Ok((w, h)) if w > 0 && h > 0 => Some((pixels_to_points(w, dpi), pixels_to_points(h, dpi))),
        Ok(_) => {
            warn!("Image {} is empty, skipping", path.display());
            None
        }
        Err(e) => {
            warn!("Cannot read image {}: {}, skipping", path.display(), e);
            None
        }
    }
}

/// Build the merged document: one page of the writer's size per aligned
/// index, holding `differences_{k}.png` scaled to fit and centered.
///
/// `written` holds the diff artifacts produced by this run; any other slot
/// is skipped even if a file exists at its path.
pub fn assemble_merged(
    writer: &mut dyn DocumentWriter,
    layout: &ArtifactLayout,
    aligned_len: usize,
    written: &HashSet<PathBuf>,
    dpi: u32,
    output: &Path,
) -> Result<AssemblyReport, PdfDiffError> {
    let (page_w, page_h) = writer.page_size();
    let mut report = AssemblyReport {
        path: output.to_path_buf(),
        pages: 0,
        missing: Vec::new(),
    };

    for k in 0..aligned_len {
        let path = layout.diff_path(k);
        if !written.contains(&path) {
            warn!("Slot {} was not written by this run, skipping", k);
            report.missing.push(k);
            continue;
        }
        let Some(extent) = artifact_extent(&path, dpi) else {
            report.missing.push(k);
            continue;
        };
        writer.add_page(page_w, page_h)?;
        writer.place_image(&path, fit_centered((page_w, page_h), extent))?;
        report.pages += 1;
        debug!("Merged {} as page {}", path.display(), report.pages);
    }

    finish(writer, report)
}

/// Build the side-by-side document: one page per composite of `jobs`, in
/// the given order, each page sized exactly to its image.
pub fn assemble_side_by_side(
    writer: &mut dyn DocumentWriter,
    layout: &ArtifactLayout,
    jobs: &[usize],
    dpi: u32,
    output: &Path,
) -> Result<AssemblyReport, PdfDiffError> {
    let mut report = AssemblyReport {
        path: output.to_path_buf(),
        pages: 0,
        missing: Vec::new(),
    };

    for &j in jobs {
        let path = layout.composite_path(j);
        let Some((width, height)) = artifact_extent(&path, dpi) else {
            report.missing.push(j);
            continue;
        };
        writer.add_page(width, height)?;
        writer.place_image(
            &path,
            Placement {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
        )?;
        report.pages += 1;
    }

    finish(writer, report)
}

fn finish(
    writer: &mut dyn DocumentWriter,
    report: AssemblyReport,
) -> Result<AssemblyReport, PdfDiffError> {
    if report.pages == 0 {
        return Err(PdfDiffError::AssemblyFailed {
            path: report.path,
            detail: "no page image available".to_string(),
        });
    }
    if !report.missing.is_empty() {
        warn!(
            "{}: {} page image(s) missing: {:?}",
            report.path.display(),
            report.missing.len(),
            report.missing
        );
    }
    writer.output(&report.path)?;
    info!("Wrote {} ({} pages)", report.path.display(), report.pages);
    Ok(report)
}

// ── pdfium ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PlannedPage {
    width: f32,
    height: f32,
    images: Vec<(PathBuf, Placement)>,
}

/// [`DocumentWriter`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumWriter {
    library: Option<PathBuf>,
    page_size: (f32, f32),
    pages: Vec<PlannedPage>,
}

impl PdfiumWriter {
    pub fn new(library: Option<PathBuf>, page_size: (f32, f32)) -> Self {
        Self {
            library,
            page_size,
            pages: Vec::new(),
        }
    }
}

impl DocumentWriter for PdfiumWriter {
    fn page_size(&self) -> (f32, f32) {
        self.page_size
    }

    fn add_page(&mut self, width: f32, height: f32) -> Result<(), PdfDiffError> {
        self.pages.push(PlannedPage {
            width,
            height,
            images: Vec::new(),
        });
        Ok(())
    }

    fn place_image(&mut self, image: &Path, placement: Placement) -> Result<(), PdfDiffError> {
        let page = self
            .pages
            .last_mut()
            .ok_or_else(|| PdfDiffError::Internal("image placed before any page".to_string()))?;
        page.images.push((image.to_path_buf(), placement));
        Ok(())
    }

    fn output(&mut self, path: &Path) -> Result<(), PdfDiffError> {
        let failed = |detail: String| PdfDiffError::AssemblyFailed {
            path: path.to_path_buf(),
            detail,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PdfDiffError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let pdfium = bind_pdfium(self.library.as_deref())?;
        let mut document = pdfium
            .create_new_pdf()
            .map_err(|e| failed(format!("{e:?}")))?;

        for planned in &self.pages {
            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::new_custom(
                    PdfPoints::new(planned.width),
                    PdfPoints::new(planned.height),
                ))
                .map_err(|e| failed(format!("{e:?}")))?;

            for (image_path, p) in &planned.images {
                let img = image::open(image_path)
                    .map_err(|e| failed(format!("{}: {e}", image_path.display())))?;
                page.objects_mut()
                    .create_image_object(
                        PdfPoints::new(p.x),
                        PdfPoints::new(p.y),
                        &img,
                        Some(PdfPoints::new(p.width)),
                        Some(PdfPoints::new(p.height)),
                    )
                    .map_err(|e| failed(format!("{}: {e:?}", image_path.display())))?;
            }
        }

        document
            .save_to_file(path)
            .map_err(|e| failed(format!("{e:?}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::artifacts::save_png;
    use image::{Rgba, RgbaImage};

    #[derive(Default)]
    struct Recorder {
        size: (f32, f32),
        pages: Vec<(f32, f32, Vec<(PathBuf, Placement)>)>,
        written: Option<PathBuf>,
    }

    impl DocumentWriter for Recorder {
        fn page_size(&self) -> (f32, f32) {
            self.size
        }

        fn add_page(&mut self, width: f32, height: f32) -> Result<(), PdfDiffError> {
            self.pages.push((width, height, Vec::new()));
            Ok(())
        }

        fn place_image(&mut self, image: &Path, placement: Placement) -> Result<(), PdfDiffError> {
            self.pages
                .last_mut()
                .unwrap()
                .2
                .push((image.to_path_buf(), placement));
            Ok(())
        }

        fn output(&mut self, path: &Path) -> Result<(), PdfDiffError> {
            self.written = Some(path.to_path_buf());
            Ok(())
        }
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        save_png(&RgbaImage::from_pixel(w, h, Rgba([9, 9, 9, 255])), path).unwrap();
    }

    fn slots(layout: &ArtifactLayout, ks: &[usize]) -> HashSet<PathBuf> {
        ks.iter().map(|&k| layout.diff_path(k)).collect()
    }

    #[test]
    fn fit_centered_limits_by_width() {
        let p = fit_centered((100.0, 200.0), (50.0, 50.0));
        assert_eq!(p.width, 100.0);
        assert_eq!(p.height, 100.0);
        assert_eq!((p.x, p.y), (0.0, 50.0));
    }

    #[test]
    fn fit_centered_limits_by_height() {
        let p = fit_centered((200.0, 100.0), (400.0, 400.0));
        assert_eq!((p.width, p.height), (100.0, 100.0));
        assert_eq!((p.x, p.y), (50.0, 0.0));
    }

    #[test]
    fn fit_centered_keeps_aspect_ratio() {
        let p = fit_centered((842.0, 1191.0), (595.0, 842.0));
        assert!((p.width / p.height - 595.0 / 842.0).abs() < 1e-4);
        assert!(p.width <= 842.0 + 1e-3 && p.height <= 1191.0 + 1e-3);
    }

    #[test]
    fn merged_pages_follow_aligned_order_and_skip_missing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        write_png(&layout.diff_path(2), 144, 72);
        write_png(&layout.diff_path(0), 72, 144);

        let mut writer = Recorder {
            size: (300.0, 300.0),
            ..Default::default()
        };
        let out = dir.path().join("out.pdf");
        let written = slots(&layout, &[0, 1, 2]);
        let report = assemble_merged(&mut writer, &layout, 3, &written, 72, &out).unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.missing, vec![1]);
        assert_eq!(writer.written.as_deref(), Some(out.as_path()));

        let first = &writer.pages[0];
        assert_eq!((first.0, first.1), (300.0, 300.0));
        assert_eq!(first.2[0].0, layout.diff_path(0));
        assert_eq!(first.2[0].1, fit_centered((300.0, 300.0), (72.0, 144.0)));
        assert_eq!(writer.pages[1].2[0].0, layout.diff_path(2));
    }

    #[test]
    fn merged_extent_is_converted_with_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        write_png(&layout.diff_path(0), 300, 150);

        let mut writer = Recorder {
            size: (1000.0, 1000.0),
            ..Default::default()
        };
        let written = slots(&layout, &[0]);
        assemble_merged(&mut writer, &layout, 1, &written, 150, &dir.path().join("o.pdf"))
            .unwrap();
        // 300x150 px at 150 dpi is 144x72 pt, scaled up to the page width.
        let placement = writer.pages[0].2[0].1;
        assert_eq!(placement, fit_centered((1000.0, 1000.0), (144.0, 72.0)));
    }

    #[test]
    fn leftover_artifact_is_not_merged() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        write_png(&layout.diff_path(0), 72, 72);
        write_png(&layout.diff_path(1), 72, 72);

        let mut writer = Recorder {
            size: (100.0, 100.0),
            ..Default::default()
        };
        let written = slots(&layout, &[0]);
        let report =
            assemble_merged(&mut writer, &layout, 2, &written, 72, &dir.path().join("o.pdf"))
                .unwrap();

        assert_eq!(report.pages, 1);
        assert_eq!(report.missing, vec![1]);
        assert_eq!(writer.pages.len(), 1);
        assert_eq!(writer.pages[0].2[0].0, layout.diff_path(0));
    }

    #[test]
    fn nothing_to_merge_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let mut writer = Recorder::default();
        let written = slots(&layout, &[0, 1]);
        let out = dir.path().join("o.pdf");
        let err = assemble_merged(&mut writer, &layout, 2, &written, 72, &out).unwrap_err();
        assert!(matches!(err, PdfDiffError::AssemblyFailed { .. }));
        assert!(writer.written.is_none());
    }

    #[test]
    fn side_by_side_pages_are_sized_to_images() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        write_png(&layout.composite_path(0), 144, 72);
        write_png(&layout.composite_path(3), 72, 72);

        let mut writer = Recorder::default();
        let report =
            assemble_side_by_side(&mut writer, &layout, &[0, 3], 72, &dir.path().join("c.pdf"))
                .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!((writer.pages[0].0, writer.pages[0].1), (144.0, 72.0));
        assert_eq!(
            writer.pages[0].2[0].1,
            Placement {
                x: 0.0,
                y: 0.0,
                width: 144.0,
                height: 72.0
            }
        );
        assert_eq!(writer.pages[1].2[0].0, layout.composite_path(3));
    }

    #[test]
    fn pdfium_writer_rejects_image_without_page() {
        let mut writer = PdfiumWriter::new(None, (10.0, 10.0));
        let placement = fit_centered((10.0, 10.0), (1.0, 1.0));
        assert!(writer.place_image(Path::new("x.png"), placement).is_err());
        writer.add_page(10.0, 10.0).unwrap();
        assert!(writer.place_image(Path::new("x.png"), placement).is_ok());
        assert_eq!(writer.page_size(), (10.0, 10.0));
    }
}
