//! Typed request handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use quay_core::error::{Error, ExecutionError, Result};

use super::{panic_message, TaskStatus};

enum RequestCell<T> {
    Pending,
    Running,
    Done(Option<Result<T>>),
}

pub(crate) struct RequestShared<T> {
    cell: Mutex<RequestCell<T>>,
    done: Condvar,
    cancel: AtomicBool,
}

impl<T> RequestShared<T> {
    /// Store the outcome and wake waiters. The first write wins.
    pub(crate) fn complete(&self, result: Result<T>) {
        let mut cell = self.cell.lock();
        if matches!(*cell, RequestCell::Done(_)) {
            return;
        }
        *cell = RequestCell::Done(Some(result));
        self.done.notify_all();
    }

    /// Execute `f` on behalf of this request, capturing its result or
    /// panic.
    pub(crate) fn run<F>(&self, f: F)
    where
        F: FnOnce() -> Result<T>,
    {
        {
            let mut cell = self.cell.lock();
            if self.cancel.load(Ordering::SeqCst) {
                if !matches!(*cell, RequestCell::Done(_)) {
                    *cell = RequestCell::Done(Some(Err(ExecutionError::Cancelled.into())));
                    self.done.notify_all();
                }
                return;
            }
            *cell = RequestCell::Running;
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(ExecutionError::Panicked(panic_message(&payload)).into()),
        };
        self.complete(result);
    }
}

/// A handle to a submitted request: a typed computation whose result (or
/// failure) becomes available through the handle.
///
/// Waiting re-raises whatever error the request produced — a failure
/// inside the submitted closure, a captured panic, or cancellation.
pub struct RequestHandle<T> {
    shared: Arc<RequestShared<T>>,
}

impl<T> RequestHandle<T> {
    /// Create a pending handle.
    pub(crate) fn pending() -> Self {
        Self {
            shared: Arc::new(RequestShared {
                cell: Mutex::new(RequestCell::Pending),
                done: Condvar::new(),
                cancel: AtomicBool::new(false),
            }),
        }
    }

    /// Create an already-complete handle carrying `result`.
    ///
    /// Used for requests executed synchronously on the caller's thread.
    pub fn completed(result: Result<T>) -> Self {
        Self {
            shared: Arc::new(RequestShared {
                cell: Mutex::new(RequestCell::Done(Some(result))),
                done: Condvar::new(),
                cancel: AtomicBool::new(false),
            }),
        }
    }

    /// The producer side shared with the executing pool.
    pub(crate) fn shared(&self) -> Arc<RequestShared<T>> {
        self.shared.clone()
    }

    /// Get the current status of the request.
    pub fn status(&self) -> TaskStatus {
        let cell = self.shared.cell.lock();
        match &*cell {
            RequestCell::Pending => TaskStatus::Pending,
            RequestCell::Running => TaskStatus::Running,
            RequestCell::Done(result) => match result {
                Some(Ok(_)) | None => TaskStatus::Completed,
                Some(Err(Error::Execution(ExecutionError::Cancelled))) => TaskStatus::Cancelled,
                Some(Err(e)) => TaskStatus::Failed(e.to_string()),
            },
        }
    }

    /// Check if the result or failure is available.
    pub fn is_done(&self) -> bool {
        matches!(*self.shared.cell.lock(), RequestCell::Done(_))
    }

    /// Request cancellation.
    ///
    /// Returns `true` if the request was still pending; it then completes
    /// with a cancellation error.
    pub fn cancel(&self) -> bool {
        self.shared.cancel.store(true, Ordering::SeqCst);
        let mut cell = self.shared.cell.lock();
        if matches!(*cell, RequestCell::Pending) {
            *cell = RequestCell::Done(Some(Err(ExecutionError::Cancelled.into())));
            self.shared.done.notify_all();
            true
        } else {
            false
        }
    }

    /// Block until the result is available and return it, re-raising any
    /// captured failure.
    pub fn get(self) -> Result<T> {
        let mut cell = self.shared.cell.lock();
        loop {
            if let RequestCell::Done(slot) = &mut *cell {
                return take_result(slot);
            }
            self.shared.done.wait(&mut cell);
        }
    }

    /// Block up to `timeout` for the result.
    ///
    /// Fails with [`ExecutionError::WaitTimeout`] if the result does not
    /// become available in time.
    pub fn get_timeout(self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut cell = self.shared.cell.lock();
        loop {
            if let RequestCell::Done(slot) = &mut *cell {
                return take_result(slot);
            }
            if self.shared.done.wait_until(&mut cell, deadline).timed_out() {
                if let RequestCell::Done(slot) = &mut *cell {
                    return take_result(slot);
                }
                return Err(ExecutionError::WaitTimeout(timeout).into());
            }
        }
    }
}

fn take_result<T>(slot: &mut Option<Result<T>>) -> Result<T> {
    slot.take()
        .unwrap_or_else(|| Err(Error::Runtime("request result already taken".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_completed_handle() {
        let handle = RequestHandle::completed(Ok(42));
        assert_eq!(handle.status(), TaskStatus::Completed);
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_run_produces_result() {
        let handle = RequestHandle::pending();
        let shared = handle.shared();

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            shared.run(|| Ok("done"));
        });

        assert_eq!(handle.get().unwrap(), "done");
        worker.join().unwrap();
    }

    #[test]
    fn test_run_captures_panic() {
        let handle: RequestHandle<()> = RequestHandle::pending();
        let shared = handle.shared();
        shared.run(|| panic!("kaboom"));

        match handle.get() {
            Err(Error::Execution(ExecutionError::Panicked(msg))) => {
                assert!(msg.contains("kaboom"));
            }
            other => panic!("expected panic capture, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_pending() {
        let handle: RequestHandle<u32> = RequestHandle::pending();
        assert!(handle.cancel());
        assert_eq!(handle.status(), TaskStatus::Cancelled);
        assert!(matches!(
            handle.get(),
            Err(Error::Execution(ExecutionError::Cancelled))
        ));
    }

    #[test]
    fn test_get_timeout_elapses() {
        let handle: RequestHandle<u32> = RequestHandle::pending();
        let result = handle.get_timeout(Duration::from_millis(20));
        assert!(matches!(
            result,
            Err(Error::Execution(ExecutionError::WaitTimeout(_)))
        ));
    }
}
