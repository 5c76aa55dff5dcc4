use rayon::{ThreadPool, ThreadPoolBuilder};

use super::error::{PipelineErrorContext, PipelineResult};

/// Worker count leaving one core for the main thread
pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Background threads for chunk computation
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    /// `threads` overrides the default count; zero is treated as one
    pub fn new(threads: Option<usize>) -> PipelineResult<Self> {
        let threads = threads.unwrap_or_else(default_worker_count).max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("terrain-worker-{}", idx))
            .start_handler(|idx| {
                lower_priority();
                log::trace!("terrain-worker-{} started", idx);
            })
            .build()
            .pipeline_context("worker pool")?;

        log::info!("Started terrain worker pool with {} threads", threads);
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(f);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

/// Drop the calling thread to the lowest scheduling priority
fn lower_priority() {
    #[cfg(unix)]
    unsafe {
        // Only affects the calling thread on Linux
        libc::nice(19);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_workers_are_named_and_run_jobs() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        assert_eq!(pool.threads(), 2);

        let (tx, rx) = unbounded();
        pool.spawn(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });

        let name = rx.recv().unwrap().unwrap();
        assert!(name.starts_with("terrain-worker-"));
    }

    #[test]
    fn test_default_count_is_positive() {
        assert!(default_worker_count() >= 1);
        assert_eq!(WorkerPool::new(Some(0)).unwrap().threads(), 1);
    }
}
