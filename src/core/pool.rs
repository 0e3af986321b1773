//! Fixed-size worker pool fed by a bounded FIFO queue
//!
//! Each worker thread pulls one boxed closure at a time and runs it to
//! completion before pulling the next. [`WorkerPool::submit`] blocks while the
//! queue is full, which is the only backpressure in a run. Closing the pool
//! drops the sending side; workers drain what is left and exit.
//!
//! Jobs are expected to record their own failures. A job that panics anyway
//! is caught, logged, and counted; its worker keeps serving the queue.

use crate::core::error::{DedupeError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A unit of work for the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Default executor count: twice the available parallelism
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Bounded-queue thread pool
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    panicked: Arc<AtomicUsize>,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Spawn `num_workers` threads sharing a queue of `queue_capacity` slots
    ///
    /// Both values are clamped to at least one. Failing to spawn any thread is
    /// fatal for the run and reported as [`DedupeError::PoolStart`].
    pub fn new(num_workers: usize, queue_capacity: usize) -> Result<Self> {
        let num_workers = num_workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = bounded::<Job>(queue_capacity);
        let panicked = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 1..=num_workers {
            let receiver = receiver.clone();
            let panicked = Arc::clone(&panicked);
            let handle = thread::Builder::new()
                .name(format!("dedupe-worker-{}", worker_id))
                .spawn(move || run_worker_loop(worker_id, receiver, panicked));

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Let already-started workers exit before bailing out
                    drop(sender);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(DedupeError::PoolStart(e));
                }
            }
        }

        debug!(
            "Worker pool started: {} workers, queue capacity {}",
            num_workers, queue_capacity
        );

        Ok(Self {
            sender: Some(sender),
            workers,
            panicked,
            queue_capacity,
        })
    }

    /// Number of worker threads
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Capacity of the job queue
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Number of jobs that panicked so far
    pub fn panicked_jobs(&self) -> usize {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Enqueue a job, blocking while the queue is full
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(DedupeError::PoolClosed)?;
        sender
            .send(Box::new(job))
            .map_err(|_| DedupeError::PoolClosed)
    }

    /// Close the queue and wait for every worker to drain it and exit
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker thread terminated abnormally");
            }
        }
        debug!("Worker pool closed");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker_loop(worker_id: usize, receiver: Receiver<Job>, panicked: Arc<AtomicUsize>) {
    // recv fails only once the queue is closed and empty
    while let Ok(job) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            panicked.fetch_add(1, Ordering::Relaxed);
            error!("Worker {}: job panicked; continuing with next job", worker_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_utils::sync::WaitGroup;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_default_worker_count_is_even_and_positive() {
        let n = default_worker_count();
        assert!(n >= 2);
        assert_eq!(n % 2, 0);
    }

    #[test]
    fn test_pool_runs_every_job_once() {
        let pool = WorkerPool::new(4, 4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.close();

        assert_eq!(counter.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn test_single_worker_is_fifo() {
        let pool = WorkerPool::new(1, 2).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = Arc::clone(&seen);
            pool.submit(move || seen.lock().unwrap().push(i)).unwrap();
        }
        pool.close();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_job_does_not_stop_pool() {
        let pool = WorkerPool::new(2, 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("boom")).unwrap();
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        let wg = WaitGroup::new();
        let token = wg.clone();
        pool.submit(move || drop(token)).unwrap();
        wg.wait();

        assert_eq!(pool.panicked_jobs(), 1);
        pool.close();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_submit_blocks_when_queue_full() {
        let pool = Arc::new(WorkerPool::new(1, 1).unwrap());
        let (release_tx, release_rx) = bounded::<()>(0);
        let submitted = Arc::new(AtomicUsize::new(0));

        // Occupies the only worker
        pool.submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        // Fills the only queue slot
        pool.submit(|| {}).unwrap();

        let submitter = {
            let pool = Arc::clone(&pool);
            let submitted = Arc::clone(&submitted);
            thread::spawn(move || {
                pool.submit(|| {}).unwrap();
                submitted.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert_eq!(submitted.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        submitter.join().unwrap();
        assert_eq!(submitted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sizes_clamped_to_one() {
        let pool = WorkerPool::new(0, 0).unwrap();
        assert_eq!(pool.num_workers(), 1);
        assert_eq!(pool.queue_capacity(), 1);
    }
}
