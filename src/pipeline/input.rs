//! Input validation: both documents must be readable PDF files.
//!
//! The checks run before the renderer thread starts so that a typo in a
//! path is reported as a configuration error with a clear message rather
//! than as a pdfium load failure. The `%PDF` magic bytes are verified
//! here too.

use crate::error::PdfDiffError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_pdf(path: impl AsRef<Path>) -> Result<PathBuf, PdfDiffError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(PdfDiffError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PdfDiffError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfDiffError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfDiffError::FileNotFound { path });
        }
    }

    debug!("Validated PDF input: {}", path.display());
    Ok(path)
}

/// Classify a pdfium load failure.
pub fn load_error(path: &Path, password: Option<&str>, detail: String) -> PdfDiffError {
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            PdfDiffError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            PdfDiffError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        PdfDiffError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}
