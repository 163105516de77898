//! Timer thread for deferred dispatch.
//!
//! A [`Scheduler`] owns one timer thread holding a min-heap of armed
//! entries. At each entry's due time the timer runs the entry's dispatch
//! closure on the timer thread itself; dispatch closures must be cheap —
//! in practice they hand the real work to a worker pool.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex};
use quay_core::error::SubmissionError;

/// Poll interval for [`Scheduler::await_termination`].
const TERMINATION_POLL: Duration = Duration::from_millis(10);

struct TimerEntry {
    at: Instant,
    seq: u64,
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, the earliest entry must win.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub(crate) struct TimerCore {
    queue: Mutex<BinaryHeap<TimerEntry>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    live: AtomicBool,
    seq: AtomicU64,
}

impl TimerCore {
    /// Arm a dispatch closure to run at `at`.
    ///
    /// Entries armed for a past instant run at the next timer wakeup.
    pub(crate) fn schedule_at(
        &self,
        at: Instant,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), SubmissionError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SubmissionError::ShuttingDown);
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().push(TimerEntry { at, seq, job });
        self.wakeup.notify_all();
        Ok(())
    }

    fn run(&self) {
        let mut queue = self.queue.lock();
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            let mut due = Vec::new();
            loop {
                match queue.peek() {
                    Some(entry) if entry.at <= now => {
                        if let Some(entry) = queue.pop() {
                            due.push(entry);
                        }
                    }
                    _ => break,
                }
            }

            if !due.is_empty() {
                drop(queue);
                for entry in due {
                    (entry.job)();
                }
                queue = self.queue.lock();
                continue;
            }

            match queue.peek().map(|entry| entry.at) {
                Some(at) => {
                    let _ = self.wakeup.wait_until(&mut queue, at);
                }
                None => self.wakeup.wait(&mut queue),
            }
        }
        drop(queue);
        self.live.store(false, Ordering::SeqCst);
        debug!("timer thread exiting");
    }
}

/// A timer driving delayed and periodic dispatch for one schedulable
/// executor pool.
pub struct Scheduler {
    core: Arc<TimerCore>,
}

impl Scheduler {
    /// Create a scheduler and spawn its timer thread with the given name.
    pub fn new(thread_name: impl Into<String>) -> Self {
        let core = Arc::new(TimerCore {
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            live: AtomicBool::new(true),
            seq: AtomicU64::new(0),
        });

        let thread_core = Arc::clone(&core);
        thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || thread_core.run())
            .expect("failed to spawn timer thread");

        Self { core }
    }

    /// Arm a dispatch closure to run after `delay`.
    pub fn schedule(
        &self,
        delay: Duration,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), SubmissionError> {
        self.core.schedule_at(Instant::now() + delay, job)
    }

    /// Shared core handle, used to re-arm periodic entries.
    pub(crate) fn core(&self) -> Arc<TimerCore> {
        Arc::clone(&self.core)
    }

    /// Stop the timer thread. Entries not yet due are discarded.
    pub fn shutdown(&self) {
        self.core.shutdown.store(true, Ordering::SeqCst);
        self.core.wakeup.notify_all();
    }

    /// Check if the timer thread has exited.
    pub fn is_terminated(&self) -> bool {
        !self.core.live.load(Ordering::SeqCst)
    }

    /// Block up to `timeout` for the timer thread to exit.
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
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
