//! Port directories.
//!
//! A directory makes published ports reachable by URI. The in-process
//! [`LocalPortDirectory`] is the directory every runtime context owns; a
//! distributed deployment additionally wires a [`RemoteDirectoryClient`]
//! so port URIs can be exchanged across processes. The remote backend is
//! an external collaborator — only its contract lives here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use quay_core::error::{DirectoryError, Result};
use quay_core::uri::PortUri;

use crate::port::Port;

/// Directory of published ports.
pub trait PortDirectory: Send + Sync {
    /// Publish a port under its URI.
    ///
    /// Fails if the URI is already taken: port URIs are unique across the
    /// whole directory, not just within one component.
    fn publish(&self, uri: &PortUri, port: Arc<Port>) -> Result<()>;

    /// Look up a published port.
    fn lookup(&self, uri: &PortUri) -> Option<Arc<Port>>;

    /// Remove a published port.
    fn unpublish(&self, uri: &PortUri) -> Result<()>;
}

/// In-process port directory backed by a locked table.
pub struct LocalPortDirectory {
    table: RwLock<HashMap<PortUri, Arc<Port>>>,
}

impl LocalPortDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Number of published ports.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Check if no port is published.
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

impl Default for LocalPortDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PortDirectory for LocalPortDirectory {
    fn publish(&self, uri: &PortUri, port: Arc<Port>) -> Result<()> {
        let mut table = self.table.write();
        if table.contains_key(uri) {
            return Err(DirectoryError::AlreadyPublished(uri.clone()).into());
        }
        table.insert(uri.clone(), port);
        debug!("published port {}", uri);
        Ok(())
    }

    fn lookup(&self, uri: &PortUri) -> Option<Arc<Port>> {
        self.table.read().get(uri).cloned()
    }

    fn unpublish(&self, uri: &PortUri) -> Result<()> {
        let mut table = self.table.write();
        if table.remove(uri).is_none() {
            return Err(DirectoryError::NotFound(uri.clone()).into());
        }
        debug!("unpublished port {}", uri);
        Ok(())
    }
}

/// Client of the distributed address-exchange directory.
///
/// The backing service is out of scope for the kernel: it is consumed
/// only as a way to exchange port URIs between processes. Lookups return
/// an opaque address string whose interpretation belongs to the connector
/// implementation that dials it.
pub trait RemoteDirectoryClient: Send + Sync {
    /// Announce a port URI to the distributed directory.
    fn publish(&self, uri: &PortUri) -> Result<()>;

    /// Withdraw a port URI from the distributed directory.
    fn unpublish(&self, uri: &PortUri) -> Result<()>;

    /// Resolve a port URI to a transport address, if published.
    fn lookup(&self, uri: &PortUri) -> Result<Option<String>>;
}
