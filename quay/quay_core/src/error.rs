//! Error types for the Quay component runtime.
//!
//! This module defines the error hierarchy used throughout the system.
//! Errors are organized by failure class, with each class having its own
//! error type, and the root `Error` type wrapping any of them for uniform
//! handling at the top level.
//!
//! The classes follow the runtime's error taxonomy:
//!
//! - [`ContractError`]: precondition violations — programming errors that
//!   fail fast and are never caught inside the kernel.
//! - [`SubmissionError`]: a pool refused new work (shutting down, queue
//!   full); always surfaced to the caller, never dropped.
//! - [`ExecutionError`]: a failure inside submitted work, captured in the
//!   returned handle and re-raised to whoever waits on it.
//! - [`DirectoryError`]: port directory publication and lookup failures.
//!
//! Nothing in the kernel retries automatically; retry policy belongs to
//! the caller.

use std::time::Duration;

use thiserror::Error;

use crate::state::ComponentState;
use crate::uri::{PluginUri, PoolUri, PortUri};

/// Root error type for the Quay runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition violation (fail-fast, never recovered internally)
    #[error("contract violation: {0}")]
    Contract(#[from] ContractError),

    /// A pool refused to accept submitted work
    #[error("submission rejected: {0}")]
    Submission(#[from] SubmissionError),

    /// A failure raised inside submitted work
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// A port directory operation failed
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// General runtime errors
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Check whether this error is a contract violation.
    ///
    /// Contract violations report misuse of the kernel API (wrong
    /// lifecycle state, unknown pool, duplicate URI, …) and should abort
    /// the calling operation rather than be handled.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}

/// Precondition violations.
///
/// Each variant names the contract that was broken. These are programming
/// errors: the kernel surfaces them to the caller and never catches them
/// itself.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The component is not in the state the operation requires
    #[error("component is {actual}, expected {expected}")]
    InvalidState {
        /// State the operation requires
        expected: ComponentState,
        /// State the component is actually in
        actual: ComponentState,
    },

    /// The component has already passed the wiring phase
    #[error("component is {0} and can no longer be reconfigured")]
    NotWirable(ComponentState),

    /// A URI argument was empty
    #[error("URI must not be empty")]
    EmptyUri,

    /// No pool is registered under the given URI
    #[error("no executor pool registered under {0}")]
    UnknownPool(PoolUri),

    /// No pool is registered at the given index
    #[error("no executor pool registered at index {0}")]
    UnknownPoolIndex(usize),

    /// A pool with the given URI already exists
    #[error("executor pool {0} already exists")]
    DuplicatePool(PoolUri),

    /// A pool was requested with no worker threads
    #[error("executor pool {0} requires a positive thread count")]
    ZeroThreadCount(PoolUri),

    /// A scheduling operation targeted a non-schedulable pool
    #[error("executor pool {0} is not schedulable")]
    NotSchedulable(PoolUri),

    /// A scheduling operation found no schedulable pool to target
    #[error("component owns no schedulable pool")]
    NoSchedulablePool,

    /// A submission named no pool and neither standard pool exists
    #[error("component owns no standard pool to default to")]
    NoDefaultPool,

    /// A periodic schedule was requested with a zero period
    #[error("periodic schedule requires a positive period")]
    ZeroPeriod,

    /// A port with the given URI is already registered on the owner
    #[error("port {0} is already registered")]
    DuplicatePort(PortUri),

    /// No port is registered under the given URI
    #[error("no port registered under {0}")]
    UnknownPort(PortUri),

    /// The port's interface is not declared by the owning component
    #[error("interface {0} is not declared by the owning component")]
    UndeclaredInterface(String),

    /// The port has been destroyed and accepts no further operations
    #[error("port {0} is destroyed")]
    PortDestroyed(PortUri),

    /// The port is already published
    #[error("port {0} is already published")]
    AlreadyPublished(PortUri),

    /// The port is not published
    #[error("port {0} is not published")]
    NotPublished(PortUri),

    /// The port is connected and the operation requires it not to be
    #[error("port {0} is connected")]
    PortConnected(PortUri),

    /// The port is not connected
    #[error("port {0} is not connected")]
    PortNotConnected(PortUri),

    /// A plugin with the given URI is already installed on the owner
    #[error("plugin {0} is already installed")]
    DuplicatePlugin(PluginUri),

    /// No plugin is installed under the given URI
    #[error("no plugin installed under {0}")]
    UnknownPlugin(PluginUri),

    /// The plugin is already initialized
    #[error("plugin {0} is already initialized")]
    PluginAlreadyInitialized(PluginUri),

    /// The plugin is not initialized
    #[error("plugin {0} is not initialized")]
    PluginNotInitialized(PluginUri),

    /// The plugin must be finalized before it can be uninstalled
    #[error("plugin {0} is still initialized and cannot be uninstalled")]
    PluginStillInitialized(PluginUri),

    /// The plugin is already bound to an owner
    #[error("plugin {0} is already bound to an owner")]
    OwnerAlreadyBound(PluginUri),

    /// The plugin has no owner yet
    #[error("plugin {0} is not installed on any component")]
    OwnerNotBound(PluginUri),

    /// The plugin's preferred pool was already set
    #[error("preferred pool of plugin {0} was already set")]
    PreferredPoolAlreadySet(PluginUri),

    /// The plugin's preferred pool can only be set before installation
    #[error("preferred pool of plugin {0} cannot be set after installation")]
    PreferredPoolAfterInstall(PluginUri),
}

/// Submission rejections raised by executor pools.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The pool is shutting down and accepts no new work
    #[error("executor pool is shutting down")]
    ShuttingDown,

    /// The pool's task queue is full
    #[error("executor pool queue is full")]
    QueueFull,
}

/// Failures raised inside submitted work.
///
/// These are captured in the handle returned at submission time and
/// re-raised to whoever waits on it. For periodic tasks, a failure halts
/// further repeats of that task.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The submitted work panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The work was cancelled before it ran
    #[error("task cancelled")]
    Cancelled,

    /// A bounded wait for the result elapsed
    #[error("result not available within {0:?}")]
    WaitTimeout(Duration),
}

/// Port directory failures.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A port is already published under the given URI
    #[error("port {0} is already published in the directory")]
    AlreadyPublished(PortUri),

    /// No port is published under the given URI
    #[error("no port published under {0}")]
    NotFound(PortUri),

    /// The distributed directory backend reported a failure
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Result type used throughout the Quay runtime.
pub type Result<T> = std::result::Result<T, Error>;
