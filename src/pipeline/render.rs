//! Page rasterisation behind a single renderer thread.
//!
//! ## Why a dedicated thread?
//!
//! pdfium documents are not safe to render from several threads at once, and
//! a `PdfDocument` borrows the `Pdfium` instance that opened it, so neither
//! can be shared with the workers. The [`RenderService`] spawns one OS thread
//! that opens both documents and owns them for its whole life. Workers reach
//! it through a [`RenderHandle`]: each call sends a request over an `mpsc`
//! channel and awaits the image on a `oneshot` reply. Requests are served one
//! at a time, so rendering is serialised while diffing, compositing and PNG
//! encoding stay parallel in the workers.
//!
//! The thread exits when the last handle is dropped; [`RenderService::shutdown`]
//! joins it so the documents are closed before the output documents are
//! built.

use crate::error::{PageError, PdfDiffError};
use crate::pipeline::input::load_error;
use image::RgbaImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Which of the two compared documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The first (reference) document, "A".
    First,
    /// The second (candidate) document, "B".
    Second,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::First => f.write_str("A"),
            Side::Second => f.write_str("B"),
        }
    }
}

/// Page counts of both documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCounts {
    pub first: usize,
    pub second: usize,
}

impl PageCounts {
    pub fn get(&self, side: Side) -> usize {
        match side {
            Side::First => self.first,
            Side::Second => self.second,
        }
    }
}

/// Rasterises pages of the two open documents.
///
/// Implementations live on the renderer thread only and need not be `Send`.
pub trait PageRenderer {
    fn page_count(&self, side: Side) -> usize;

    /// Render a 0-based page. Callers only ask for indices below `page_count`.
    fn render_page(&self, side: Side, index: usize) -> Result<RgbaImage, PageError>;
}

/// Zero-filled substitute for a page missing from the shorter document.
pub fn blank_page((width, height): (u32, u32)) -> RgbaImage {
    RgbaImage::new(width, height)
}

// ── Renderer service ─────────────────────────────────────────────────────

struct RenderRequest {
    side: Side,
    index: usize,
    reply: oneshot::Sender<Result<RgbaImage, PageError>>,
}

/// The renderer thread's end of the service.
///
/// A [`crate::Backend`] receives it on the renderer thread, opens its
/// documents and then calls [`Serve::run`], or [`Serve::fail`] if they
/// cannot be opened.
pub struct Serve {
    requests: mpsc::UnboundedReceiver<RenderRequest>,
    ready: oneshot::Sender<Result<PageCounts, PdfDiffError>>,
}

impl Serve {
    /// Announce the page counts, then answer requests until every
    /// [`RenderHandle`] is dropped.
    pub fn run(self, renderer: &dyn PageRenderer) {
        let Serve {
            mut requests,
            ready,
        } = self;
        let counts = PageCounts {
            first: renderer.page_count(Side::First),
            second: renderer.page_count(Side::Second),
        };
        if ready.send(Ok(counts)).is_err() {
            return;
        }

        while let Some(req) = requests.blocking_recv() {
            let result = if req.index < counts.get(req.side) {
                renderer.render_page(req.side, req.index)
            } else {
                Err(PageError::RenderFailed {
                    side: req.side,
                    page: req.index + 1,
                    detail: format!("out of range (document has {} pages)", counts.get(req.side)),
                })
            };
            // The requesting worker may have gone away; nothing to do then.
            let _ = req.reply.send(result);
        }
        debug!("Renderer thread: all handles dropped, closing documents");
    }

    /// Report that the documents could not be opened.
    pub fn fail(self, err: PdfDiffError) {
        let _ = self.ready.send(Err(err));
    }
}

/// Cloneable client of the renderer thread.
#[derive(Clone)]
pub struct RenderHandle {
    requests: mpsc::UnboundedSender<RenderRequest>,
    counts: PageCounts,
}

impl RenderHandle {
    pub fn counts(&self) -> PageCounts {
        self.counts
    }

    /// Render one page on the renderer thread.
    pub async fn render(&self, side: Side, index: usize) -> Result<RgbaImage, PageError> {
        let (reply, rx) = oneshot::channel();
        let stopped = || PageError::RenderFailed {
            side,
            page: index + 1,
            detail: "renderer thread stopped".to_string(),
        };
        self.requests
            .send(RenderRequest { side, index, reply })
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    /// Render page `index` of `side`, or a blank page of `blank_size` when
    /// the document has no such page.
    pub async fn page_or_blank(
        &self,
        side: Side,
        index: usize,
        blank_size: (u32, u32),
    ) -> Result<RgbaImage, PageError> {
        if index < self.counts.get(side) {
            self.render(side, index).await
        } else {
            debug!("Document {} has no page {}; using blank page", side, index + 1);
            Ok(blank_page(blank_size))
        }
    }
}

/// Owner of the renderer thread.
pub struct RenderService {
    handle: RenderHandle,
    thread: JoinHandle<()>,
}

impl RenderService {
    /// Spawn the renderer thread and wait until `open` has opened both
    /// documents.
    ///
    /// `open` runs on the new thread; it must end by calling
    /// [`Serve::run`] or [`Serve::fail`].
    pub async fn start<F>(open: F) -> Result<Self, PdfDiffError>
    where
        F: FnOnce(Serve) + Send + 'static,
    {
        let (tx, requests) = mpsc::unbounded_channel();
        let (ready, ready_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("pdfdiff-renderer".to_string())
            .spawn(move || open(Serve { requests, ready }))
            .map_err(|e| PdfDiffError::Internal(format!("Failed to spawn renderer thread: {e}")))?;

        let counts = match ready_rx.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(PdfDiffError::Internal(
                    "Renderer thread exited before opening the documents".to_string(),
                ))
            }
        };
        info!(
            "Documents opened: A has {} pages, B has {} pages",
            counts.first, counts.second
        );

        Ok(Self {
            handle: RenderHandle {
                requests: tx,
                counts,
            },
            thread,
        })
    }

    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    pub fn counts(&self) -> PageCounts {
        self.handle.counts
    }

    /// Drop this handle and wait for the renderer thread to exit.
    ///
    /// Returns once every other handle is gone too.
    pub async fn shutdown(self) -> Result<(), PdfDiffError> {
        let RenderService { handle, thread } = self;
        drop(handle);
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|e| PdfDiffError::Internal(format!("Renderer join task failed: {e}")))?
            .map_err(|_| PdfDiffError::Internal("Renderer thread panicked".to_string()))
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Bind to pdfium: an explicit library path first, then `PDFIUM_LIB_PATH`,
/// then the system library.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, PdfDiffError> {
    let explicit = library
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
                .map_err(|e| PdfDiffError::PdfiumBindingFailed(format!("{}: {e}", path.display())))?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| PdfDiffError::PdfiumBindingFailed(e.to_string()))?,
    };

    Ok(Pdfium::new(bindings))
}

/// Both documents opened by pdfium on the renderer thread.
pub struct PdfiumPages<'a> {
    first: PdfDocument<'a>,
    second: PdfDocument<'a>,
    render_config: PdfRenderConfig,
}

impl<'a> PdfiumPages<'a> {
    /// Open both documents with `pdfium`, rendering at `dpi`.
    pub fn open(
        pdfium: &'a Pdfium,
        first: &Path,
        second: &Path,
        password: Option<&'a str>,
        dpi: u32,
    ) -> Result<Self, PdfDiffError> {
        let load = |path: &Path| {
            pdfium
                .load_pdf_from_file(path, password)
                .map_err(|e| load_error(path, password, format!("{e:?}")))
        };

        Ok(Self {
            first: load(first)?,
            second: load(second)?,
            render_config: PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0),
        })
    }

    fn document(&self, side: Side) -> &PdfDocument<'a> {
        match side {
            Side::First => &self.first,
            Side::Second => &self.second,
        }
    }
}

impl PageRenderer for PdfiumPages<'_> {
    fn page_count(&self, side: Side) -> usize {
        self.document(side).pages().len() as usize
    }

    fn render_page(&self, side: Side, index: usize) -> Result<RgbaImage, PageError> {
        let failed = |detail: String| PageError::RenderFailed {
            side,
            page: index + 1,
            detail,
        };

        let page = self
            .document(side)
            .pages()
            .get(index as u16)
            .map_err(|e| failed(format!("{e:?}")))?;

        let bitmap = page
            .render_with_config(&self.render_config)
            .map_err(|e| failed(format!("{e:?}")))?;

        let image = bitmap.as_image().to_rgba8();
        debug!(
            "Rendered {} page {} → {}x{} px",
            side,
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// Renderer-thread body for two PDF files.
pub fn serve_pdf_files(
    serve: Serve,
    library: Option<&Path>,
    first: &Path,
    second: &Path,
    password: Option<&str>,
    dpi: u32,
) {
    let pdfium = match bind_pdfium(library) {
        Ok(p) => p,
        Err(e) => return serve.fail(e),
    };
    match PdfiumPages::open(&pdfium, first, second, password, dpi) {
        Ok(pages) => serve.run(&pages),
        Err(e) => {
            warn!("Failed to open documents: {}", e);
            serve.fail(e)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Solid {
        first: usize,
        second: usize,
        calls: Arc<AtomicUsize>,
    }

    impl PageRenderer for Solid {
        fn page_count(&self, side: Side) -> usize {
            match side {
                Side::First => self.first,
                Side::Second => self.second,
            }
        }

        fn render_page(&self, side: Side, index: usize) -> Result<RgbaImage, PageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let shade = if side == Side::First { 10 } else { 200 };
            Ok(RgbaImage::from_pixel(2, 2, Rgba([shade, index as u8, 0, 255])))
        }
    }

    #[test]
    fn side_display() {
        assert_eq!(Side::First.to_string(), "A");
        assert_eq!(Side::Second.to_string(), "B");
    }

    #[test]
    fn blank_page_is_transparent() {
        let page = blank_page((595, 842));
        assert_eq!(page.dimensions(), (595, 842));
        assert!(page.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn service_renders_through_handle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = RenderService::start(move |serve| {
            serve.run(&Solid {
                first: 2,
                second: 3,
                calls: counter,
            })
        })
        .await
        .unwrap();

        assert_eq!(service.counts(), PageCounts { first: 2, second: 3 });

        let handle = service.handle();
        let page = handle.render(Side::Second, 2).await.unwrap();
        assert_eq!(page.get_pixel(0, 0).0, [200, 2, 0, 255]);

        let blank = handle.page_or_blank(Side::First, 5, (3, 4)).await.unwrap();
        assert_eq!(blank.dimensions(), (3, 4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(handle);
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn out_of_range_request_is_a_page_error() {
        let service = RenderService::start(|serve| {
            serve.run(&Solid {
                first: 1,
                second: 1,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        })
        .await
        .unwrap();

        let err = service.handle().render(Side::First, 4).await.unwrap_err();
        assert!(matches!(err, PageError::RenderFailed { page: 5, .. }));
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_open_is_reported() {
        let result = RenderService::start(|serve| {
            serve.fail(PdfDiffError::FileNotFound {
                path: PathBuf::from("missing.pdf"),
            })
        })
        .await;
        assert!(matches!(result, Err(PdfDiffError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn renderer_exiting_early_is_internal_error() {
        let result = RenderService::start(|serve| drop(serve)).await;
        assert!(matches!(result, Err(PdfDiffError::Internal(_))));
    }

    #[tokio::test]
    async fn pdf_service_borrows_an_owned_password() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("libpdfium-missing.so");
        let pdf = dir.path().join("a.pdf");
        let password = String::from("secret");

        let result = RenderService::start(move |serve| {
            serve_pdf_files(serve, Some(&library), &pdf, &pdf, Some(password.as_str()), 72)
        })
        .await;
        assert!(matches!(result, Err(PdfDiffError::PdfiumBindingFailed(_))));
    }
}
