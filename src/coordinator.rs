//! Run coordination.
//!
//! A run scans the source directory, fans the documents out across a worker
//! pool, and folds every document's records into the persisted index once all
//! workers are done.

use crate::error::{Error, ExtractionFailure, Result};
use crate::extractor::{DocumentExtractor, DocumentOutcome, DocumentStatus, ExtractOptions};
use crate::metadata::{self, DEFAULT_METADATA_FILE, MetadataIndex};
use crate::parallel::{self, ThreadPool};
use crate::progress::{ExtractionProgress, ProgressHandle, ProgressSnapshot};
use crate::scanner;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default directory extracted images are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "extracted_images";

/// Default minimum image size: 1000 KiB.
pub const DEFAULT_MIN_SIZE_BYTES: u64 = 1000 * 1024;

/// Default maximum page count.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub metadata_path: PathBuf,
    pub min_size_bytes: u64,
    pub max_pages: u32,
    /// Worker count; `None` uses [`parallel::default_jobs`].
    pub jobs: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            metadata_path: PathBuf::from(DEFAULT_METADATA_FILE),
            min_size_bytes: DEFAULT_MIN_SIZE_BYTES,
            max_pages: DEFAULT_MAX_PAGES,
            jobs: None,
        }
    }
}

impl RunConfig {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = path.into();
        self
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size_bytes = bytes;
        self
    }

    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Worker count this run will use.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(parallel::default_jobs).max(1)
    }

    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            output_dir: self.output_dir.clone(),
            min_size_bytes: self.min_size_bytes,
            max_pages: self.max_pages,
        }
    }
}

/// A document skipped for exceeding the page limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub pages: usize,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Progress as of the end of the run.
    pub progress: ProgressSnapshot,
    /// Images written by this run.
    pub new_images: usize,
    /// Total records in the index after saving.
    pub total_records: usize,
    pub skipped_documents: Vec<SkippedDocument>,
    /// Documents that could not be opened.
    pub failed_documents: Vec<PathBuf>,
    /// Every non-fatal failure, in no particular order.
    pub failures: Vec<ExtractionFailure>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Documents that were scanned for images.
    pub fn extracted_documents(&self) -> usize {
        self.progress
            .processed_files
            .saturating_sub(self.skipped_documents.len() + self.failed_documents.len())
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs an extraction over a directory of documents.
pub struct Coordinator {
    config: RunConfig,
    progress: ProgressHandle,
}

impl Coordinator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            progress: ExtractionProgress::handle(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Handle for observing this coordinator's progress from other threads.
    pub fn progress(&self) -> ProgressHandle {
        Arc::clone(&self.progress)
    }

    /// Run the extraction.
    ///
    /// Only a failure to create the output directory or to save the index is
    /// an error. Everything else is reported in the [`RunReport`].
    pub fn run(&self) -> Result<RunReport> {
        let start_time = Instant::now();
        let config = &self.config;

        fs::create_dir_all(&config.output_dir).map_err(|e| {
            Error::persistence(&config.output_dir, Error::io_with_path(e, &config.output_dir))
        })?;

        let documents = scanner::scan_documents(&config.source_dir)?;
        if documents.is_empty() {
            info!("No documents found in {}", config.source_dir.display());
            self.progress.reset(0);
            return Ok(RunReport {
                progress: self.progress.snapshot(),
                elapsed: start_time.elapsed(),
                ..RunReport::default()
            });
        }

        metadata::ensure_parent_dir(&config.metadata_path)
            .map_err(|e| Error::persistence(&config.metadata_path, e))?;
        let mut index = MetadataIndex::load(&config.metadata_path);

        let jobs = config.effective_jobs();
        info!(
            "Extracting from {} document(s) with {} worker(s)",
            documents.len(),
            jobs
        );
        self.progress.reset(documents.len());

        let outcomes = self.run_parallel(documents, jobs);

        let mut report = RunReport::default();
        let mut run_records = MetadataIndex::new();
        for outcome in outcomes {
            match outcome.status {
                DocumentStatus::Extracted => {}
                DocumentStatus::SkippedPageLimit { pages } => {
                    report.skipped_documents.push(SkippedDocument {
                        path: outcome.document.clone(),
                        pages,
                    });
                }
                DocumentStatus::Failed => report.failed_documents.push(outcome.document.clone()),
            }
            report.failures.extend(outcome.failures);
            run_records.merge(outcome.records);
        }

        report.new_images = run_records.len();
        index.merge(run_records);
        index
            .save(&config.metadata_path)
            .map_err(|e| Error::persistence(&config.metadata_path, e))?;

        report.total_records = index.len();
        report.progress = self.progress.snapshot();
        report.elapsed = start_time.elapsed();

        info!(
            "Extracted {} image(s) from {} document(s) in {:.2?}",
            report.new_images, report.progress.processed_files, report.elapsed
        );
        Ok(report)
    }

    /// Process every document on a pool of `num_threads` workers and collect
    /// the outcomes in completion order.
    fn run_parallel(&self, documents: Vec<PathBuf>, num_threads: usize) -> Vec<DocumentOutcome> {
        let document_count = documents.len();
        let (result_tx, result_rx) = mpsc::channel::<DocumentOutcome>();
        let extractor = Arc::new(DocumentExtractor::new(self.config.extract_options()));
        let pool = ThreadPool::new(num_threads.min(document_count));

        for path in documents {
            let result_tx = result_tx.clone();
            let extractor = Arc::clone(&extractor);
            let progress = Arc::clone(&self.progress);

            pool.execute(move || {
                let outcome = process_document(&extractor, &progress, &path);
                let _ = result_tx.send(outcome);
            });
        }

        // The channel closes once every job has dropped its sender.
        drop(result_tx);

        let outcomes: Vec<DocumentOutcome> = result_rx.iter().collect();
        pool.join();
        debug!("Collected {} of {} outcome(s)", outcomes.len(), document_count);
        outcomes
    }
}

fn process_document(
    extractor: &DocumentExtractor,
    progress: &ExtractionProgress,
    path: &Path,
) -> DocumentOutcome {
    progress.begin_document(path);
    let outcome = extractor.extract(path);
    progress.finish_document(path, outcome.image_count());
    outcome
}

/// Extract images from every document under `source` into `output`, using
/// the default metadata file and worker count. Returns the number of images
/// written.
pub fn extract_images_from_directory(
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    size_limit: u64,
    page_limit: u32,
) -> Result<usize> {
    let config = RunConfig::new(source.as_ref())
        .with_output_dir(output.as_ref())
        .with_min_size(size_limit)
        .with_max_pages(page_limit);
    Coordinator::new(config).run().map(|report| report.new_images)
}
