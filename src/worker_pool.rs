// Worker pool for running matches.
//
// Each match runs on a dedicated OS thread that owns its `Game` for the match's lifetime.
// The pool has a fixed capacity; callers check `has_capacity()` before dispatching.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::SetupError;
use crate::metrics;

/// Manages a fixed-size pool of OS threads, one per running match.
pub struct WorkerPool {
    worker_count: usize,
    active_workers: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            active_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether the pool has capacity to accept another match.
    pub fn has_capacity(&self) -> bool {
        self.active_workers.load(Ordering::Relaxed) < self.worker_count
    }

    /// Current number of active workers.
    pub fn active_count(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.worker_count
    }

    /// Run `job` on a new named OS thread.
    ///
    /// `on_complete` receives the job's result. It runs on the tokio runtime when the
    /// caller has one, otherwise on the worker thread itself.
    pub fn spawn<T, F, C>(&self, name: String, job: F, on_complete: C) -> Result<(), SetupError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        if !self.has_capacity() {
            return Err(SetupError::AtCapacity);
        }

        let active = self.active_workers.clone();
        active.fetch_add(1, Ordering::Relaxed);
        metrics::MATCH_WORKERS_ACTIVE.set(active.load(Ordering::Relaxed) as i64);

        let rt_handle = tokio::runtime::Handle::try_current().ok();
        let worker_active = active.clone();

        let spawned = std::thread::Builder::new().name(name).spawn(move || {
            let result = job();

            worker_active.fetch_sub(1, Ordering::Relaxed);
            metrics::MATCH_WORKERS_ACTIVE.set(worker_active.load(Ordering::Relaxed) as i64);

            match rt_handle {
                Some(handle) => {
                    handle.spawn(async move {
                        on_complete(result);
                    });
                }
                None => on_complete(result),
            }
        });

        if let Err(e) = spawned {
            active.fetch_sub(1, Ordering::Relaxed);
            metrics::MATCH_WORKERS_ACTIVE.set(active.load(Ordering::Relaxed) as i64);
            return Err(SetupError::Io(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_worker_pool_capacity() {
        let pool = WorkerPool::new(4);
        assert!(pool.has_capacity());
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_worker_pool_zero_capacity() {
        let pool = WorkerPool::new(0);
        assert!(!pool.has_capacity());
        let err = pool.spawn("never".into(), || 1, |_| {});
        assert!(matches!(err, Err(SetupError::AtCapacity)));
    }

    #[test]
    fn test_job_result_reaches_callback() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();
        pool.spawn("job".into(), || 21 * 2, move |v| tx.send(v).unwrap())
            .unwrap();
        assert_eq!(rx.recv().unwrap(), 42);
    }
}
