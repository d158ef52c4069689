//! Shared progress counters for a run.
//!
//! Workers update [`ExtractionProgress`] under a single lock, one update per
//! document. Observers read consistent copies through
//! [`ExtractionProgress::snapshot`] and may poll them on an interval with
//! [`ExtractionProgress::watch`].

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A point-in-time copy of the progress counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub processed_files: usize,
    pub total_files: usize,
    pub current_file: Option<PathBuf>,
    pub extracted_images: usize,
}

impl ProgressSnapshot {
    /// Completed fraction as a percentage.
    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.processed_files as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_files >= self.total_files
    }
}

/// Progress counters shared between the coordinator, its workers and any
/// observers.
#[derive(Debug, Default)]
pub struct ExtractionProgress {
    state: Mutex<ProgressSnapshot>,
}

/// Shared handle to a run's progress.
pub type ProgressHandle = Arc<ExtractionProgress>;

impl ExtractionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle() -> ProgressHandle {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        // Counters stay meaningful even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new run over `total` documents, clearing all counters.
    pub fn reset(&self, total: usize) {
        *self.lock() = ProgressSnapshot {
            total_files: total,
            ..ProgressSnapshot::default()
        };
    }

    /// Publish the document a worker has started on.
    pub fn begin_document(&self, path: &Path) {
        self.lock().current_file = Some(path.to_path_buf());
    }

    /// Record a finished document and the number of images it produced.
    pub fn finish_document(&self, path: &Path, images: usize) {
        let mut state = self.lock();
        state.processed_files += 1;
        state.extracted_images += images;
        state.current_file = Some(path.to_path_buf());
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    /// Call `callback` with a fresh snapshot every `interval` from a
    /// background thread until the returned watcher is stopped or dropped.
    /// A final snapshot is delivered on stop.
    pub fn watch<F>(self: &Arc<Self>, interval: Duration, mut callback: F) -> ProgressWatcher
    where
        F: FnMut(&ProgressSnapshot) + Send + 'static,
    {
        let progress = Arc::clone(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::spawn(move || {
            loop {
                callback(&progress.snapshot());
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            callback(&progress.snapshot());
        });

        ProgressWatcher {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }
}

/// Background observer created by [`ExtractionProgress::watch`].
pub struct ProgressWatcher {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ProgressWatcher {
    /// Stop polling and wait for the final callback to run.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ProgressWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_snapshot_default() {
        let progress = ExtractionProgress::new();
        assert_eq!(progress.snapshot(), ProgressSnapshot::default());
        assert_eq!(progress.snapshot().percentage(), 0.0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let progress = ExtractionProgress::new();
        progress.reset(3);
        progress.finish_document(Path::new("a.pdf"), 4);

        progress.reset(5);
        let snap = progress.snapshot();
        assert_eq!(snap.total_files, 5);
        assert_eq!(snap.processed_files, 0);
        assert_eq!(snap.extracted_images, 0);
        assert_eq!(snap.current_file, None);
    }

    #[test]
    fn test_document_updates() {
        let progress = ExtractionProgress::new();
        progress.reset(2);
        progress.begin_document(Path::new("a.pdf"));
        assert_eq!(progress.snapshot().current_file, Some(PathBuf::from("a.pdf")));

        progress.finish_document(Path::new("a.pdf"), 2);
        progress.finish_document(Path::new("b.pdf"), 0);

        let snap = progress.snapshot();
        assert_eq!(snap.processed_files, 2);
        assert_eq!(snap.extracted_images, 2);
        assert_eq!(snap.current_file, Some(PathBuf::from("b.pdf")));
        assert!(snap.is_complete());
        assert_eq!(snap.percentage(), 100.0);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let progress = ExtractionProgress::handle();
        progress.reset(800);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let progress = Arc::clone(&progress);
                thread::spawn(move || {
                    for _ in 0..100 {
                        progress.finish_document(Path::new("x.pdf"), 3);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let snap = progress.snapshot();
        assert_eq!(snap.processed_files, 800);
        assert_eq!(snap.extracted_images, 2400);
    }

    #[test]
    fn test_watch_delivers_final_snapshot() {
        let progress = ExtractionProgress::handle();
        progress.reset(1);

        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(ProgressSnapshot::default()));
        let watcher = {
            let calls = Arc::clone(&calls);
            let last = Arc::clone(&last);
            progress.watch(Duration::from_millis(5), move |snap| {
                calls.fetch_add(1, Ordering::SeqCst);
                *last.lock().unwrap() = snap.clone();
            })
        };

        progress.finish_document(Path::new("only.pdf"), 7);
        watcher.stop();

        assert!(calls.load(Ordering::SeqCst) >= 2);
        let last = last.lock().unwrap();
        assert_eq!(last.processed_files, 1);
        assert_eq!(last.extracted_images, 7);
    }
}
