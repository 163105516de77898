//! Task and request handles.
//!
//! Every submission to an executor pool returns a handle: a [`TaskHandle`]
//! for fire-and-forget tasks, a [`RequestHandle`] for typed computations.
//! Handles track status, support best-effort cancellation, and — for
//! requests — block the caller until the result or failure is available.

mod handle;
mod request;

pub use handle::{TaskHandle, TaskStatus};
pub use request::RequestHandle;

use std::any::Any;

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    }
}
