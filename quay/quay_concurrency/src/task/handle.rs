//! Fire-and-forget task handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::panic_message;

/// Status of a submitted task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Task is waiting to be executed
    Pending,

    /// Task is currently running
    Running,

    /// Task completed successfully
    Completed,

    /// Task failed
    Failed(String),

    /// Task was cancelled before it ran
    Cancelled,
}

impl TaskStatus {
    /// Check if the task has reached a final status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

#[derive(Debug)]
struct TaskInner {
    status: Mutex<TaskStatus>,
    done: Condvar,
    cancel: AtomicBool,
}

/// A handle to a submitted fire-and-forget task.
///
/// Cancellation is best-effort: a task that has not started yet is
/// prevented from running; a task already running completes normally. The
/// handle returned for work executed synchronously on the caller's thread
/// is already complete and cannot be cancelled.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

impl TaskHandle {
    /// Create a pending handle.
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(TaskInner {
                status: Mutex::new(TaskStatus::Pending),
                done: Condvar::new(),
                cancel: AtomicBool::new(false),
            }),
        }
    }

    /// Create an already-complete handle.
    ///
    /// Used for work executed synchronously on the caller's thread.
    pub fn completed() -> Self {
        Self {
            inner: Arc::new(TaskInner {
                status: Mutex::new(TaskStatus::Completed),
                done: Condvar::new(),
                cancel: AtomicBool::new(false),
            }),
        }
    }

    /// Get the current status of the task.
    pub fn status(&self) -> TaskStatus {
        self.inner.status.lock().clone()
    }

    /// Check if the task has reached a final status.
    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// Request cancellation.
    ///
    /// Returns `true` if the task was still pending and will not run,
    /// `false` if it already started or finished.
    pub fn cancel(&self) -> bool {
        self.inner.cancel.store(true, Ordering::SeqCst);
        let mut status = self.inner.status.lock();
        if *status == TaskStatus::Pending {
            *status = TaskStatus::Cancelled;
            self.inner.done.notify_all();
            true
        } else {
            false
        }
    }

    /// Block until the task reaches a final status and return it.
    pub fn wait(&self) -> TaskStatus {
        let mut status = self.inner.status.lock();
        while !status.is_terminal() {
            self.inner.done.wait(&mut status);
        }
        status.clone()
    }

    /// Block up to `timeout` for the task to finish.
    ///
    /// Returns the status observed when the wait ended, terminal or not.
    pub fn wait_timeout(&self, timeout: Duration) -> TaskStatus {
        let deadline = Instant::now() + timeout;
        let mut status = self.inner.status.lock();
        while !status.is_terminal() {
            if self.inner.done.wait_until(&mut status, deadline).timed_out() {
                break;
            }
        }
        status.clone()
    }

    /// Execute `f` on behalf of this handle, tracking status and capturing
    /// panics.
    pub(crate) fn run<F>(&self, f: F)
    where
        F: FnOnce(),
    {
        {
            let mut status = self.inner.status.lock();
            if self.inner.cancel.load(Ordering::SeqCst) {
                if !status.is_terminal() {
                    *status = TaskStatus::Cancelled;
                    self.inner.done.notify_all();
                }
                return;
            }
            *status = TaskStatus::Running;
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        let mut status = self.inner.status.lock();
        *status = match result {
            Ok(()) => TaskStatus::Completed,
            Err(payload) => TaskStatus::Failed(panic_message(&payload)),
        };
        self.inner.done.notify_all();
    }

    /// Mark the task as failed without running it.
    ///
    /// Used when a deferred submission is rejected by its pool.
    pub(crate) fn reject(&self, reason: &str) {
        let mut status = self.inner.status.lock();
        if !status.is_terminal() {
            *status = TaskStatus::Failed(reason.to_string());
            self.inner.done.notify_all();
        }
    }
}
