#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Quay Concurrency
//!
//! Concurrency primitives and execution models for the Quay component
//! runtime.
//!
//! This crate provides the execution infrastructure components build on:
//!
//! - Named executor pools, plain or schedulable, each owning a fixed set
//!   of worker threads
//! - Delayed, fixed-rate, and fixed-delay scheduling with serialized
//!   repeats
//! - Fire-and-forget task handles and typed, blocking request handles
//!
//! ## Integration with Other Quay Crates
//!
//! - **quay_core**: error hierarchy and pool URIs
//! - **quay_runtime**: owns pools per component and routes tasks and
//!   requests through them

/// Worker pools and the named executor pool built on them
pub mod pool;

/// Monotonic timer driving delayed and periodic dispatch
pub mod scheduler;

/// Task and request handles with status tracking and blocking waits
pub mod task;

// Re-export key types for easier access
pub use pool::executor::{ExecutorPool, PeriodicHandle};
pub use pool::worker::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
pub use scheduler::timer::Scheduler;
pub use task::{RequestHandle, TaskHandle, TaskStatus};
