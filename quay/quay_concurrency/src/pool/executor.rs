//! Named executor pools.
//!
//! An [`ExecutorPool`] is the unit a component registers in its pool
//! table: a URI, a fixed number of worker threads, and optionally a timer
//! making the pool schedulable. Submissions return handles; scheduling
//! requires a schedulable pool and supports one-shot delays as well as
//! fixed-rate and fixed-delay repetition.
//!
//! Repeats of one periodic task are serialized: the next occurrence is
//! armed only after the previous run completes, so a slow run delays but
//! never overlaps the next. An uncaught failure inside a periodic task
//! halts further repeats of that task; the kernel does not retry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error};

use quay_core::error::{ContractError, Error, Result, SubmissionError};
use quay_core::uri::PoolUri;

use crate::pool::worker::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
use crate::scheduler::timer::{Scheduler, TimerCore};
use crate::task::{panic_message, RequestHandle, TaskHandle};

/// Repetition mode of a periodic task.
#[derive(Clone, Copy, Debug)]
enum Repeat {
    /// Next start = first start + k · period, regardless of run duration.
    FixedRate,

    /// Next start = previous run's end + period.
    FixedDelay,
}

/// A handle to a periodic schedule.
///
/// Stopping is permanent: a cancelled or failed periodic task is never
/// re-armed.
#[derive(Clone)]
pub struct PeriodicHandle {
    stop: Arc<AtomicBool>,
}

impl PeriodicHandle {
    /// Stop future repeats. The current run, if any, completes normally.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Check if repeats have stopped, whether by cancellation or by a
    /// failure inside the task.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

struct PeriodicShared {
    workers: Arc<WorkerPool>,
    timer: Arc<TimerCore>,
    task: Box<dyn Fn() + Send + Sync + 'static>,
    stop: Arc<AtomicBool>,
    mode: Repeat,
    origin: Instant,
    period: Duration,
    runs: AtomicU64,
}

fn arm_periodic(shared: Arc<PeriodicShared>, at: Instant) {
    if shared.stop.load(Ordering::SeqCst) {
        return;
    }
    let dispatch = Arc::clone(&shared);
    if shared
        .timer
        .schedule_at(at, Box::new(move || dispatch_periodic(dispatch)))
        .is_err()
    {
        debug!("periodic task dropped: timer shut down");
        shared.stop.store(true, Ordering::SeqCst);
    }
}

fn dispatch_periodic(shared: Arc<PeriodicShared>) {
    if shared.stop.load(Ordering::SeqCst) {
        return;
    }
    let run = Arc::clone(&shared);
    if let Err(e) = shared.workers.submit(move || run_periodic(run)) {
        debug!("periodic task halted: {}", e);
        shared.stop.store(true, Ordering::SeqCst);
    }
}

fn run_periodic(shared: Arc<PeriodicShared>) {
    if shared.stop.load(Ordering::SeqCst) {
        return;
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (shared.task)()));

    match outcome {
        Ok(()) => {
            let next = match shared.mode {
                Repeat::FixedRate => {
                    let k = shared.runs.fetch_add(1, Ordering::SeqCst) + 1;
                    shared.origin + shared.period * (k as u32)
                }
                Repeat::FixedDelay => Instant::now() + shared.period,
            };
            arm_periodic(shared, next);
        }
        Err(payload) => {
            error!(
                "periodic task panicked: {}; repeats halted",
                panic_message(&payload)
            );
            shared.stop.store(true, Ordering::SeqCst);
        }
    }
}

/// A named pool of worker threads, plain or schedulable, owned by one
/// component.
pub struct ExecutorPool {
    uri: PoolUri,
    workers: Arc<WorkerPool>,
    timer: Option<Scheduler>,
}

impl std::fmt::Debug for ExecutorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorPool")
            .field("uri", &self.uri)
            .field("schedulable", &self.timer.is_some())
            .finish()
    }
}

impl ExecutorPool {
    /// Create a pool with `threads` workers under the given URI.
    ///
    /// A schedulable pool additionally owns a timer thread named after
    /// the pool.
    pub fn new(uri: PoolUri, threads: usize, schedulable: bool) -> Self {
        Self::with_config(
            uri.clone(),
            schedulable,
            WorkerPoolConfig {
                threads,
                thread_name_prefix: format!("{}-worker", uri),
                ..Default::default()
            },
        )
    }

    /// Create a pool with the given worker configuration.
    pub fn with_config(uri: PoolUri, schedulable: bool, config: WorkerPoolConfig) -> Self {
        let timer = schedulable.then(|| Scheduler::new(format!("{}-timer", uri)));
        Self {
            uri,
            workers: Arc::new(WorkerPool::with_config(config)),
            timer,
        }
    }

    /// The pool's URI.
    pub fn uri(&self) -> &PoolUri {
        &self.uri
    }

    /// The number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.workers.worker_count()
    }

    /// Check if the pool supports delayed and periodic scheduling.
    pub fn is_schedulable(&self) -> bool {
        self.timer.is_some()
    }

    fn require_timer(&self) -> Result<&Scheduler> {
        self.timer
            .as_ref()
            .ok_or_else(|| ContractError::NotSchedulable(self.uri.clone()).into())
    }

    /// Submit a fire-and-forget task.
    pub fn submit_task<F>(&self, f: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TaskHandle::new();
        let runner = handle.clone();
        self.workers
            .submit(move || runner.run(f))
            .map_err(Error::from)?;
        Ok(handle)
    }

    /// Submit a typed request.
    pub fn submit_request<T, F>(&self, f: F) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = RequestHandle::pending();
        let shared = handle.shared();
        self.workers
            .submit(move || shared.run(f))
            .map_err(Error::from)?;
        Ok(handle)
    }

    /// Submit a fire-and-forget task to run once after `delay`.
    ///
    /// Fails with a contract violation if the pool is not schedulable. If
    /// the pool shuts down before the delay elapses, the handle reports
    /// failure.
    pub fn schedule_task<F>(&self, delay: Duration, f: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let timer = self.require_timer()?;
        let handle = TaskHandle::new();

        let fired = handle.clone();
        let workers = Arc::clone(&self.workers);
        timer
            .schedule(
                delay,
                Box::new(move || {
                    let runner = fired.clone();
                    if let Err(e) = workers.submit(move || runner.run(f)) {
                        fired.reject(&format!("submission rejected: {}", e));
                    }
                }),
            )
            .map_err(Error::from)?;
        Ok(handle)
    }

    /// Submit a typed request to run once after `delay`.
    pub fn schedule_request<T, F>(&self, delay: Duration, f: F) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let timer = self.require_timer()?;
        let handle = RequestHandle::pending();

        let shared = handle.shared();
        let workers = Arc::clone(&self.workers);
        timer
            .schedule(
                delay,
                Box::new(move || {
                    let runner = shared.clone();
                    if workers.submit(move || runner.run(f)).is_err() {
                        shared.complete(Err(SubmissionError::ShuttingDown.into()));
                    }
                }),
            )
            .map_err(Error::from)?;
        Ok(handle)
    }

    /// Run `task` repeatedly, first after `initial_delay`, then so that
    /// run `k` starts at `initial_delay + k · period`.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_periodic(initial_delay, period, Repeat::FixedRate, task)
    }

    /// Run `task` repeatedly, each run starting `delay` after the previous
    /// run's end.
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_periodic(initial_delay, delay, Repeat::FixedDelay, task)
    }

    fn schedule_periodic<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        mode: Repeat,
        task: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let timer = self.require_timer()?;
        if period.is_zero() {
            return Err(ContractError::ZeroPeriod.into());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let origin = Instant::now() + initial_delay;
        let shared = Arc::new(PeriodicShared {
            workers: Arc::clone(&self.workers),
            timer: timer.core(),
            task: Box::new(task),
            stop: Arc::clone(&stop),
            mode,
            origin,
            period,
            runs: AtomicU64::new(0),
        });

        arm_periodic(shared, origin);
        Ok(PeriodicHandle { stop })
    }

    /// Get current statistics for the pool's workers.
    pub fn stats(&self) -> WorkerPoolStats {
        self.workers.stats()
    }

    /// Begin a graceful shutdown: queued work drains, delayed work not
    /// yet due is discarded. Does not block.
    pub fn shutdown(&self) {
        if let Some(timer) = &self.timer {
            timer.shutdown();
        }
        self.workers.shutdown();
    }

    /// Shut down immediately, discarding queued work.
    ///
    /// Returns the number of queued jobs discarded.
    pub fn shutdown_now(&self) -> usize {
        if let Some(timer) = &self.timer {
            timer.shutdown();
        }
        self.workers.shutdown_now()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.workers.is_shutdown()
    }

    /// Check if all accepted work has run after a shutdown request.
    pub fn is_drained(&self) -> bool {
        self.workers.is_drained()
    }

    /// Check if all pool threads (workers and timer) have exited.
    pub fn is_terminated(&self) -> bool {
        self.workers.is_terminated()
            && self.timer.as_ref().map_or(true, Scheduler::is_terminated)
    }

    /// Block up to `timeout` for all pool threads to exit.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if !self.workers.await_termination(timeout) {
            return false;
        }
        if let Some(timer) = &self.timer {
            let remaining = deadline.saturating_duration_since(Instant::now());
            return timer.await_termination(remaining);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use crate::task::TaskStatus;

    fn plain_pool(threads: usize) -> ExecutorPool {
        ExecutorPool::new(PoolUri::new("quay:pool:test"), threads, false)
    }

    fn schedulable_pool(threads: usize) -> ExecutorPool {
        ExecutorPool::new(PoolUri::new("quay:pool:test-sched"), threads, true)
    }

    #[test]
    fn test_submit_task_completes() {
        let pool = plain_pool(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        let handle = pool
            .submit_task(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(handle.wait(), TaskStatus::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_submit_request_returns_value() {
        let pool = plain_pool(2);
        let handle = pool.submit_request(|| Ok(6 * 7)).unwrap();
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_schedule_on_plain_pool_is_contract_violation() {
        let pool = plain_pool(1);
        let result = pool.schedule_task(Duration::from_millis(1), || {});
        match result {
            Err(e) => assert!(e.is_contract_violation()),
            Ok(_) => panic!("plain pool accepted a schedule"),
        }
    }

    #[test]
    fn test_schedule_task_observes_delay() {
        let pool = schedulable_pool(1);
        let start = Instant::now();

        let handle = pool.schedule_task(Duration::from_millis(50), || {}).unwrap();
        assert_eq!(handle.wait(), TaskStatus::Completed);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_schedule_request_sync_value() {
        let pool = schedulable_pool(1);
        let handle = pool
            .schedule_request(Duration::from_millis(20), || Ok("deferred"))
            .unwrap();
        assert_eq!(handle.get().unwrap(), "deferred");
    }

    #[test]
    fn test_fixed_rate_runs_repeatedly() {
        let pool = schedulable_pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        let handle = pool
            .schedule_at_fixed_rate(Duration::from_millis(10), Duration::from_millis(20), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        thread::sleep(Duration::from_millis(150));
        handle.cancel();

        // Let any in-flight run settle before sampling.
        thread::sleep(Duration::from_millis(30));
        let seen = counter.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected several repeats, saw {}", seen);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(counter.load(Ordering::SeqCst), seen, "cancelled task kept running");
    }

    #[test]
    fn test_fixed_rate_never_overlaps() {
        let pool = schedulable_pool(4);
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let active_clone = active.clone();
        let overlapped_clone = overlapped.clone();
        let handle = pool
            .schedule_at_fixed_rate(Duration::from_millis(5), Duration::from_millis(10), move || {
                if active_clone.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlapped_clone.store(true, Ordering::SeqCst);
                }
                // Sleep longer than the period.
                thread::sleep(Duration::from_millis(30));
                active_clone.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();

        thread::sleep(Duration::from_millis(200));
        handle.cancel();
        assert!(!overlapped.load(Ordering::SeqCst), "periodic runs overlapped");
    }

    #[test]
    fn test_periodic_panic_halts_repeats() {
        let pool = schedulable_pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = counter.clone();
        let handle = pool
            .schedule_at_fixed_rate(Duration::from_millis(5), Duration::from_millis(10), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                panic!("periodic failure");
            })
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(counter.load(Ordering::SeqCst), 1, "failed task was retried");
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_fixed_delay_spacing() {
        let pool = schedulable_pool(1);
        let stamps = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let stamps_clone = stamps.clone();
        let handle = pool
            .schedule_with_fixed_delay(
                Duration::from_millis(5),
                Duration::from_millis(30),
                move || {
                    stamps_clone.lock().push(Instant::now());
                    thread::sleep(Duration::from_millis(20));
                },
            )
            .unwrap();

        thread::sleep(Duration::from_millis(200));
        handle.cancel();

        let stamps = stamps.lock();
        assert!(stamps.len() >= 2, "expected at least two runs");
        for pair in stamps.windows(2) {
            // Run duration (20ms) + delay (30ms) separate consecutive starts.
            assert!(pair[1] - pair[0] >= Duration::from_millis(45));
        }
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let pool = plain_pool(1);
        pool.shutdown();
        let result = pool.submit_task(|| {});
        assert!(matches!(result, Err(Error::Submission(_))));
        assert!(pool.await_termination(Duration::from_secs(2)));
        assert!(pool.is_terminated());
    }
}
