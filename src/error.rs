//! Error types for PIE.
//!
//! `Error` covers failures that stop an operation. Problems that only affect a
//! single document or image are reported as [`ExtractionFailure`] values so a
//! batch can keep going.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for PIE operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during PIE operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", display_path(.path))]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
    },
    /// File or directory not found.
    #[error("Not found: '{}'", .path.display())]
    NotFound { path: PathBuf },
    /// Permission denied.
    #[error("Permission denied: '{}'", .path.display())]
    PermissionDenied { path: PathBuf },
    /// A document could not be opened or parsed.
    #[error("Cannot open document '{}': {reason}", .path.display())]
    Document { path: PathBuf, reason: String },
    /// An embedded image stream could not be read.
    #[error("Cannot read image: {reason}")]
    ImageStream { reason: String },
    /// The metadata index could not be written. Fatal to a run.
    #[error("Failed to persist '{}': {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
    /// Metadata could not be serialized.
    #[error("Metadata serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Invalid CLI or configuration value.
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" for '{}'", p.display()),
        None => String::new(),
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io {
            source: err,
            path: None,
        }
    }
}

impl Error {
    /// Create an I/O error with path context.
    pub fn io_with_path(err: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound { path },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path },
            _ => Error::Io {
                source: err,
                path: Some(path),
            },
        }
    }

    /// Create a document open error.
    pub fn document(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Error::Document {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an image stream error.
    pub fn image_stream(reason: impl fmt::Display) -> Self {
        Error::ImageStream {
            reason: reason.to_string(),
        }
    }

    /// Wrap an error as a fatal persistence failure for `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// What went wrong for a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The document could not be opened or parsed; it was skipped.
    DocumentOpen,
    /// One embedded image could not be read; it was skipped.
    ImageDecode,
    /// One extracted image could not be written; it was skipped.
    ImageWrite,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::DocumentOpen => "document open",
            FailureKind::ImageDecode => "image decode",
            FailureKind::ImageWrite => "image write",
        }
    }
}

/// A document- or image-level failure that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub document: PathBuf,
    /// Page number (1-based) for image-level failures.
    pub page: Option<u32>,
    /// Image index within the page (1-based) for image-level failures.
    pub image_index: Option<u32>,
    pub message: String,
}

impl ExtractionFailure {
    /// A failure affecting a whole document.
    pub fn document(document: &Path, error: &Error) -> Self {
        Self {
            kind: FailureKind::DocumentOpen,
            document: document.to_path_buf(),
            page: None,
            image_index: None,
            message: error.to_string(),
        }
    }

    /// A failure affecting every image on one page.
    pub fn page(kind: FailureKind, document: &Path, page: u32, error: &Error) -> Self {
        Self {
            kind,
            document: document.to_path_buf(),
            page: Some(page),
            image_index: None,
            message: error.to_string(),
        }
    }

    /// A failure affecting one image.
    pub fn image(
        kind: FailureKind,
        document: &Path,
        page: u32,
        image_index: u32,
        error: &Error,
    ) -> Self {
        Self {
            kind,
            document: document.to_path_buf(),
            page: Some(page),
            image_index: Some(image_index),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for '{}'", self.kind.name(), self.document.display())?;
        match (self.page, self.image_index) {
            (Some(page), Some(index)) => write!(f, " (page {}, image {})", page, index)?,
            (Some(page), None) => write!(f, " (page {})", page)?,
            _ => {}
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = Error::Io {
            source: io::Error::new(io::ErrorKind::Other, "test error"),
            path: None,
        };
        assert_eq!(err.to_string(), "I/O error: test error");
    }

    #[test]
    fn test_io_error_with_path_display() {
        let err = Error::Io {
            source: io::Error::new(io::ErrorKind::Other, "test error"),
            path: Some(PathBuf::from("/test/out.png")),
        };
        assert!(err.to_string().contains("/test/out.png"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_io_with_path_not_found() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = Error::io_with_path(io_err, "/test/path");
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_io_with_path_permission_denied() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io_with_path(io_err, "/test/path");
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }

    #[test]
    fn test_persistence_keeps_source() {
        let inner = Error::io_with_path(
            io::Error::new(io::ErrorKind::Other, "disk full"),
            "/meta.json.tmp",
        );
        let err = Error::persistence("/meta.json", inner);
        assert!(err.to_string().contains("/meta.json"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_failure_display_with_location() {
        let failure = ExtractionFailure::image(
            FailureKind::ImageWrite,
            Path::new("/docs/paper.pdf"),
            2,
            3,
            &Error::image_stream("boom"),
        );
        let text = failure.to_string();
        assert!(text.starts_with("image write failed"));
        assert!(text.contains("page 2, image 3"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_document_failure_has_no_location() {
        let failure =
            ExtractionFailure::document(Path::new("a.pdf"), &Error::document("a.pdf", "bad xref"));
        assert_eq!(failure.kind, FailureKind::DocumentOpen);
        assert_eq!(failure.page, None);
        assert!(failure.message.contains("bad xref"));
    }
}
