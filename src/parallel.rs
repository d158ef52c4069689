//! Worker thread pool.
//!
//! Documents are independent, so a fixed pool of threads pulling jobs off a
//! shared channel is all the scheduling a run needs.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::error;

/// Upper bound on default workers; each one holds a whole document in memory.
pub const MAX_DEFAULT_JOBS: usize = 4;

/// A job to be executed by the thread pool.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// A simple thread pool for parallel task execution.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl ThreadPool {
    /// Create a new thread pool with the specified number of threads.
    ///
    /// # Panics
    /// Panics if `num_threads` is 0.
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "Thread pool must have at least 1 thread");

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..num_threads)
            .map(|id| Worker::new(id, Arc::clone(&receiver)))
            .collect();

        ThreadPool {
            workers,
            sender: Some(sender),
        }
    }

    /// Execute a job on the thread pool.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(ref sender) = self.sender {
            if sender.send(Box::new(f)).is_err() {
                error!("Thread pool has no live workers; job dropped");
            }
        }
    }

    /// Get the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every queued job to finish and shut the workers down.
    pub fn join(self) {
        drop(self);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel lets idle workers exit.
        drop(self.sender.take());

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

/// A worker thread in the pool.
struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) -> Self {
        let thread = thread::Builder::new()
            .name(format!("pie-worker-{}", id))
            .spawn(move || {
                loop {
                    let job = {
                        let lock = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                        lock.recv()
                    };

                    match job {
                        Ok(job) => job(),
                        Err(_) => break, // Channel closed.
                    }
                }
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn worker {}: {}", id, e);
                None
            }
        };

        Worker { thread }
    }
}

/// Get the number of available CPU cores.
pub fn available_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Default worker count: the available parallelism, capped at
/// [`MAX_DEFAULT_JOBS`].
pub fn default_jobs() -> usize {
    available_parallelism().clamp(1, MAX_DEFAULT_JOBS)
}
