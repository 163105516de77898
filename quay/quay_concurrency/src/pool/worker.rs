//! Fixed-size worker thread pool.
//!
//! Workers pull jobs from a bounded channel and capture panics so a
//! failing job never takes a worker down. Shutdown comes in two flavors:
//! graceful (`shutdown`, drains queued jobs and then lets workers exit)
//! and immediate (`shutdown_now`, discards queued jobs). Neither blocks
//! the caller; draining is observed through [`WorkerPool::is_drained`],
//! [`WorkerPool::is_terminated`], and [`WorkerPool::await_termination`].

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, trace};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use quay_core::error::SubmissionError;

/// How long an idle worker waits for a job before re-checking the
/// shutdown flags.
const IDLE_RECV_TIMEOUT: Duration = Duration::from_millis(50);

/// Poll interval for [`WorkerPool::await_termination`].
const TERMINATION_POLL: Duration = Duration::from_millis(10);

/// Statistics about a worker pool.
#[derive(Debug, Default, Clone)]
pub struct WorkerPoolStats {
    /// Number of jobs accepted into the queue
    pub tasks_queued: usize,

    /// Number of jobs completed
    pub tasks_completed: usize,

    /// Number of jobs that panicked
    pub tasks_panicked: usize,

    /// Total job execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Total time jobs spent queued (microseconds)
    pub total_queue_time_us: u64,

    /// Maximum job execution time (microseconds)
    pub max_execution_time_us: u64,
}

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum size of the job queue
    pub queue_size: usize,

    /// Number of worker threads
    pub threads: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,

    /// Whether to collect performance statistics
    pub collect_stats: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            threads: num_cpus::get(),
            thread_name_prefix: "quay-worker".to_string(),
            collect_stats: true,
        }
    }
}

/// Job with metadata for tracking.
struct Job {
    func: Box<dyn FnOnce() + Send + 'static>,
    enqueued_at: Instant,
}

impl Job {
    fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            func: Box::new(f),
            enqueued_at: Instant::now(),
        }
    }
}

/// Shared state read by the worker loop.
struct WorkerContext {
    receiver: Receiver<Job>,
    shutting_down: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    collect_stats: bool,
    tasks_completed: Arc<AtomicUsize>,
    tasks_panicked: Arc<AtomicUsize>,
    total_execution_time_us: Arc<AtomicUsize>,
    total_queue_time_us: Arc<AtomicUsize>,
    max_execution_time_us: Arc<AtomicUsize>,
}

/// A fixed-size pool of worker threads executing queued jobs.
pub struct WorkerPool {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    shutting_down: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    config: WorkerPoolConfig,
    tasks_queued: Arc<AtomicUsize>,
    tasks_completed: Arc<AtomicUsize>,
    tasks_panicked: Arc<AtomicUsize>,
    total_execution_time_us: Arc<AtomicUsize>,
    total_queue_time_us: Arc<AtomicUsize>,
    max_execution_time_us: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Create a pool with `threads` workers and default configuration.
    pub fn new(threads: usize) -> Self {
        Self::with_config(WorkerPoolConfig {
            threads,
            ..Default::default()
        })
    }

    /// Create a pool with the given configuration.
    pub fn with_config(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_size);
        let shutting_down = Arc::new(AtomicBool::new(false));
        let halt = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(config.threads));

        let tasks_queued = Arc::new(AtomicUsize::new(0));
        let tasks_completed = Arc::new(AtomicUsize::new(0));
        let tasks_panicked = Arc::new(AtomicUsize::new(0));
        let total_execution_time_us = Arc::new(AtomicUsize::new(0));
        let total_queue_time_us = Arc::new(AtomicUsize::new(0));
        let max_execution_time_us = Arc::new(AtomicUsize::new(0));

        debug!(
            "creating worker pool with {} workers and queue size {}",
            config.threads, config.queue_size
        );

        for id in 0..config.threads {
            let thread_name = format!("{}-{}", config.thread_name_prefix, id);
            let ctx = WorkerContext {
                receiver: receiver.clone(),
                shutting_down: Arc::clone(&shutting_down),
                halt: Arc::clone(&halt),
                active: Arc::clone(&active),
                live: Arc::clone(&live),
                collect_stats: config.collect_stats,
                tasks_completed: Arc::clone(&tasks_completed),
                tasks_panicked: Arc::clone(&tasks_panicked),
                total_execution_time_us: Arc::clone(&total_execution_time_us),
                total_queue_time_us: Arc::clone(&total_queue_time_us),
                max_execution_time_us: Arc::clone(&max_execution_time_us),
            };

            thread::Builder::new()
                .name(thread_name)
                .spawn(move || Self::worker_loop(id, ctx))
                .expect("failed to spawn worker thread");
        }

        Self {
            sender,
            receiver,
            shutting_down,
            halt,
            active,
            live,
            config,
            tasks_queued,
            tasks_completed,
            tasks_panicked,
            total_execution_time_us,
            total_queue_time_us,
            max_execution_time_us,
        }
    }

    /// Worker thread main loop.
    fn worker_loop(id: usize, ctx: WorkerContext) {
        debug!("worker {}: starting", id);

        loop {
            if ctx.halt.load(Ordering::Relaxed) {
                break;
            }

            match ctx.receiver.recv_timeout(IDLE_RECV_TIMEOUT) {
                Ok(job) => {
                    ctx.active.fetch_add(1, Ordering::SeqCst);

                    let queue_time = job.enqueued_at.elapsed();
                    if ctx.collect_stats {
                        ctx.total_queue_time_us
                            .fetch_add(queue_time.as_micros() as usize, Ordering::Relaxed);
                    }

                    trace!(
                        "worker {}: executing job (queue time {:.2}ms)",
                        id,
                        queue_time.as_micros() as f64 / 1000.0
                    );

                    let exec_start = Instant::now();
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        (job.func)();
                    }));
                    let exec_time = exec_start.elapsed();

                    if ctx.collect_stats {
                        let exec_us = exec_time.as_micros() as usize;
                        ctx.total_execution_time_us
                            .fetch_add(exec_us, Ordering::Relaxed);
                        ctx.max_execution_time_us.fetch_max(exec_us, Ordering::SeqCst);
                    }

                    match result {
                        Ok(()) => {
                            if ctx.collect_stats {
                                ctx.tasks_completed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(payload) => {
                            error!(
                                "worker {}: job panicked: {:?}",
                                id,
                                payload.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
                            );
                            if ctx.collect_stats {
                                ctx.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }

                    ctx.active.fetch_sub(1, Ordering::SeqCst);
                }
                Err(_) => {
                    // Idle; a graceful shutdown only takes effect once the
                    // queue has drained.
                    if ctx.shutting_down.load(Ordering::Relaxed) && ctx.receiver.is_empty() {
                        break;
                    }
                }
            }
        }

        ctx.live.fetch_sub(1, Ordering::SeqCst);
        debug!("worker {}: exiting", id);
    }

    /// Submit a job for execution.
    pub fn submit<F>(&self, f: F) -> Result<(), SubmissionError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutting_down.load(Ordering::Relaxed) {
            return Err(SubmissionError::ShuttingDown);
        }

        match self.sender.try_send(Job::new(f)) {
            Ok(()) => {
                if self.config.collect_stats {
                    self.tasks_queued.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SubmissionError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(SubmissionError::ShuttingDown),
        }
    }

    /// Get current statistics for the pool.
    pub fn stats(&self) -> WorkerPoolStats {
        if self.config.collect_stats {
            WorkerPoolStats {
                tasks_queued: self.tasks_queued.load(Ordering::Relaxed),
                tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
                tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
                total_execution_time_us: self.total_execution_time_us.load(Ordering::Relaxed)
                    as u64,
                total_queue_time_us: self.total_queue_time_us.load(Ordering::Relaxed) as u64,
                max_execution_time_us: self.max_execution_time_us.load(Ordering::Relaxed) as u64,
            }
        } else {
            WorkerPoolStats::default()
        }
    }

    /// Begin a graceful shutdown: no new jobs are accepted, queued jobs
    /// drain, workers exit once the queue is empty. Does not block.
    pub fn shutdown(&self) {
        debug!("shutting down worker pool");
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Shut down immediately, discarding queued jobs.
    ///
    /// Returns the number of jobs discarded.
    pub fn shutdown_now(&self) -> usize {
        debug!("halting worker pool");
        self.shutting_down.store(true, Ordering::SeqCst);
        self.halt.store(true, Ordering::SeqCst);
        self.receiver.try_iter().count()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Check if shutdown was requested and all accepted jobs have run.
    pub fn is_drained(&self) -> bool {
        self.is_shutdown() && self.receiver.is_empty() && self.active.load(Ordering::SeqCst) == 0
    }

    /// Check if all worker threads have exited.
    pub fn is_terminated(&self) -> bool {
        self.live.load(Ordering::SeqCst) == 0
    }

    /// Block up to `timeout` for all workers to exit.
    ///
    /// Returns `true` if the pool terminated within the timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_terminated() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(TERMINATION_POLL);
        }
        true
    }

    /// Get the number of worker threads the pool was created with.
    pub fn worker_count(&self) -> usize {
        self.config.threads
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutting_down.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}
