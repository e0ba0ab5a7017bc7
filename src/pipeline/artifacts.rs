//! Per-page image artifacts: naming, encoding and cleanup.
//!
//! Artifact paths are a pure function of an index, which is what lets the
//! output assembler find every page in order no matter which worker wrote
//! it or when. Diff images are keyed by the aligned index, composites by the
//! raw job index; the two prefixes never collide.

use crate::error::PageError;
use image::RgbaImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name prefix of diff images.
pub const DIFF_PREFIX: &str = "differences_";
/// File name prefix of side-by-side images.
pub const COMPOSITE_PREFIX: &str = "combined_";

static ARTIFACT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(differences|combined)_\d+\.png$").unwrap());

/// Where a run's artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Diff image (or pass-through copy) for aligned index `aligned`.
    pub fn diff_path(&self, aligned: usize) -> PathBuf {
        self.dir.join(format!("{DIFF_PREFIX}{aligned}.png"))
    }

    /// Side-by-side image for job `index`.
    pub fn composite_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{COMPOSITE_PREFIX}{index}.png"))
    }
}

/// Whether `file_name` follows the artifact naming scheme.
pub fn is_artifact_name(file_name: &str) -> bool {
    ARTIFACT_NAME.is_match(file_name)
}

/// Encode `image` as PNG at `path`.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), PageError> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| PageError::SaveFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    debug!("Saved {}", path.display());
    Ok(())
}

/// Remove every artifact in the layout's directory.
///
/// Removal failures are logged and skipped. Returns the number of files
/// removed.
pub fn clean(layout: &ArtifactLayout) -> usize {
    let entries = match std::fs::read_dir(layout.dir()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", layout.dir().display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_artifact_name) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Error removing image {}: {}", entry.path().display(), e),
        }
    }
    debug!("Removed {} artifacts from {}", removed, layout.dir().display());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashSet;

    #[test]
    fn paths_are_keyed_by_index() {
        let layout = ArtifactLayout::new("/tmp/run");
        assert_eq!(layout.diff_path(3), PathBuf::from("/tmp/run/differences_3.png"));
        assert_eq!(layout.composite_path(3), PathBuf::from("/tmp/run/combined_3.png"));
    }

    #[test]
    fn diff_and_composite_paths_never_overlap() {
        let layout = ArtifactLayout::new(".");
        let diffs: HashSet<_> = (0..50).map(|k| layout.diff_path(k)).collect();
        let composites: HashSet<_> = (0..50).map(|k| layout.composite_path(k)).collect();
        assert_eq!(diffs.len(), 50);
        assert!(diffs.is_disjoint(&composites));
    }

    #[test]
    fn artifact_name_pattern() {
        assert!(is_artifact_name("differences_0.png"));
        assert!(is_artifact_name("combined_12.png"));
        assert!(!is_artifact_name("differences_.png"));
        assert!(!is_artifact_name("differences_1.pdf"));
        assert!(!is_artifact_name("combined_differences.pdf"));
        assert!(!is_artifact_name("my_differences_1.png"));
    }

    #[test]
    fn save_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));

        save_png(&img, &layout.diff_path(0)).unwrap();
        save_png(&img, &layout.composite_path(0)).unwrap();
        std::fs::write(dir.path().join("keep.png"), b"not an artifact").unwrap();

        let decoded = image::open(layout.diff_path(0)).unwrap().to_rgba8();
        assert_eq!(decoded, img);

        assert_eq!(clean(&layout), 2);
        assert!(!layout.diff_path(0).exists());
        assert!(dir.path().join("keep.png").exists());
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let layout = ArtifactLayout::new("/definitely/not/a/dir");
        let err = save_png(&RgbaImage::new(1, 1), &layout.diff_path(0)).unwrap_err();
        assert!(matches!(err, PageError::SaveFailed { .. }));
    }
}
