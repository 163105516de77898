#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Quay Runtime
//!
//! The component kernel of the Quay runtime: components owning named
//! executor pools, exposing services through published ports, extended at
//! runtime by attachable plugins.
//!
//! A component is created through [`ComponentBuilder`] against a
//! [`RuntimeContext`], wired to its peers through ports and connectors,
//! then driven through its lifecycle: `start → execute → finalize →
//! shutdown`. Work reaches a component through its task/request engine,
//! which routes submissions onto the component's own pools — or, for a
//! passive component with no threads, runs them synchronously on the
//! caller's thread.
//!
//! ```
//! use quay_runtime::{ComponentBuilder, RuntimeContext};
//!
//! let ctx = RuntimeContext::new();
//! let component = ComponentBuilder::new(&ctx)
//!     .plain_threads(2)
//!     .schedulable_threads(1)
//!     .build()
//!     .unwrap();
//!
//! component.start().unwrap();
//! let doubled = component.request_sync(|_c| Ok(21 * 2)).unwrap();
//! assert_eq!(doubled, 42);
//!
//! component.finalize().unwrap();
//! component.shutdown().unwrap();
//! assert!(component.await_termination(std::time::Duration::from_secs(5)));
//! ```

pub mod component;
pub mod config;
pub mod connector;
pub mod context;
pub mod directory;
pub mod plugin;
pub mod port;

// Re-export key types for easier access
pub use component::{
    Component, ComponentBuilder, ComponentDescriptor, PoolRef, Reflection, Service,
    STANDARD_REQUEST_POOL_URI, STANDARD_SCHEDULABLE_POOL_URI,
};
pub use config::RuntimeConfig;
pub use connector::{Connector, LocalConnector};
pub use context::RuntimeContext;
pub use directory::{LocalPortDirectory, PortDirectory, RemoteDirectoryClient};
pub use plugin::{Plugin, PluginCore};
pub use port::Port;
