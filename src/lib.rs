//! PIE - PDF Image Extractor
//!
//! Walks a directory tree for PDF documents, pulls out their embedded images
//! and records where each one came from in a JSON index.
//!
//! # Output
//!
//! - `<output_dir>/<uuid>.png` and `<output_dir>/<uuid>.jpeg`, one file per
//!   image, stored as found in the PDF without recompression
//! - `images_metadata.json`, mapping each uuid to its source document, page,
//!   position on the page, type, size and extraction time
//!
//! Repeated runs add to the index; they never rewrite earlier records.
//!
//! # Features
//!
//! - Documents are processed in parallel on a thread pool
//! - Progress can be observed from any thread while a run is in flight
//! - A broken document or image is reported and skipped, never fatal
//!
//! # Example
//!
//! ```no_run
//! use pie::coordinator::{Coordinator, RunConfig};
//!
//! let config = RunConfig::new("papers/")
//!     .with_output_dir("images/")
//!     .with_min_size(10_000)
//!     .with_max_pages(20);
//! let report = Coordinator::new(config).run().unwrap();
//! println!("Extracted {} images", report.new_images);
//! ```

pub mod cli;
pub mod coordinator;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod metadata;
pub mod parallel;
pub mod persist;
pub mod progress;
pub mod scanner;
pub mod terminal;

pub use coordinator::{Coordinator, RunConfig, RunReport, extract_images_from_directory};
pub use error::{Error, ExtractionFailure, FailureKind, Result};
pub use extractor::{DocumentExtractor, DocumentOutcome, DocumentStatus, ExtractOptions};
pub use formats::{ImageFormat, detect_format};
pub use metadata::{ImageRecord, MetadataIndex};
pub use progress::{ExtractionProgress, ProgressHandle, ProgressSnapshot};
pub use scanner::scan_documents;
