// src/streaming/build_pool.rs
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::warn;

static SHARED_POOL: Lazy<Arc<ThreadPool>> = Lazy::new(|| {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(4);
    Arc::new(
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("height-build-{}", i))
            .build()
            .expect("failed to build shared height build pool"),
    )
});

/// Worker threads that run height generation sub-tasks.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
}

impl WorkerPool {
    /// `threads == 0` shares one process-wide pool between controllers.
    pub fn new(threads: usize) -> Self {
        if threads == 0 {
            return Self::shared();
        }
        match ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("height-build-{}", i))
            .build()
        {
            Ok(pool) => Self { pool: Arc::new(pool) },
            Err(err) => {
                warn!(%err, threads, "dedicated build pool failed; using shared pool");
                Self::shared()
            }
        }
    }

    pub fn shared() -> Self {
        Self { pool: SHARED_POOL.clone() }
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Fire-and-forget; completion is reported through the task itself.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(task);
    }

    /// Runs `task` on the pool and returns a handle that can be waited on.
    pub fn submit<F>(&self, task: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = bounded::<()>(1);
        self.pool.spawn(move || {
            task();
            let _ = tx.send(());
        });
        TaskHandle { done: rx }
    }
}

/// Completion handle of a submitted task.
///
/// Never wait on a handle from inside a pool task: with every worker
/// blocked the awaited task may never get a thread.
#[derive(Debug)]
pub struct TaskHandle {
    done: Receiver<()>,
}

impl TaskHandle {
    /// Blocks until the task returns (or unwound).
    pub fn wait(&self) {
        let _ = self.done.recv();
    }

    /// Returns false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.done.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn submitted_tasks_can_be_awaited() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.threads(), 2);

        let hits = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hits = hits.clone();
                pool.submit(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in &handles {
            assert!(h.wait_timeout(Duration::from_secs(10)));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn zero_threads_uses_shared_pool() {
        let a = WorkerPool::new(0);
        let b = WorkerPool::shared();
        assert!(Arc::ptr_eq(&a.pool, &b.pool));
    }
}
