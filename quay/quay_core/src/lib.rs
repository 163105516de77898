#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Quay Core
//!
//! `quay_core` provides the fundamental building blocks for the Quay
//! component runtime. This includes the error hierarchy, typed URIs,
//! interface identifiers, and the component lifecycle state machine.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Quay subsystems
//! - **uri**: Strongly-typed URI types for ports, pools, and plugins
//! - **interface**: Statically-typed service interface identifiers
//! - **state**: The component lifecycle state machine
//!
//! Higher layers build on these contracts: `quay_concurrency` supplies the
//! executor pools and task/request handles, and `quay_runtime` assembles
//! them into the component kernel.

pub mod error;
pub mod interface;
pub mod state;
pub mod uri;

// Re-export key types for easier access
pub use error::{ContractError, DirectoryError, Error, ExecutionError, Result, SubmissionError};
pub use interface::InterfaceId;
pub use state::ComponentState;
pub use uri::{PluginUri, PoolUri, PortUri, Uri};
