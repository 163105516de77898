//! Worker pools and the named executor pool built on them.
//!
//! [`worker::WorkerPool`] is the raw fixed-size thread pool;
//! [`executor::ExecutorPool`] layers the component-facing surface on top:
//! a URI, a schedulable flag with its timer, task/request submission
//! returning handles, and periodic dispatch.

pub mod executor;
pub mod worker;

pub use executor::{ExecutorPool, PeriodicHandle};
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
