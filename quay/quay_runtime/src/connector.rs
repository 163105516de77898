//! Connectors: the transport between two connected ports.
//!
//! A connector is the pluggable object a connection handshake delegates
//! to. The kernel only fixes the contract; what moves a call from one
//! port to the other — an in-process reference, a socket, anything — is
//! the connector's business. [`LocalConnector`] covers the in-process
//! case and is what wiring code and tests reach for.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use quay_core::error::{DirectoryError, Result};
use quay_core::uri::PortUri;

use crate::context::RuntimeContext;
use crate::port::Port;

/// Transport contract between two connected ports.
///
/// `connect` is invoked by the initiating component after the local port
/// has bound to the connector; a connector for a transport whose peer is
/// not reachable through the local directory is also responsible for
/// notifying that peer so it can complete its own binding (see
/// [`Port::accept_connection`]).
pub trait Connector: Send + Sync {
    /// Bind the transport between `local` and the port published under
    /// `peer`.
    fn connect(&self, local: &Arc<Port>, peer: &PortUri) -> Result<()>;

    /// Release the transport.
    fn disconnect(&self) -> Result<()>;
}

/// In-process connector resolving the peer port through the local
/// directory.
pub struct LocalConnector {
    ctx: Arc<RuntimeContext>,
    peer: RwLock<Option<Arc<Port>>>,
}

impl LocalConnector {
    /// Create a connector resolving peers against `ctx`'s directory.
    pub fn new(ctx: &Arc<RuntimeContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::clone(ctx),
            peer: RwLock::new(None),
        })
    }

    /// The connected peer port, if the connector is currently connected.
    pub fn peer_port(&self) -> Option<Arc<Port>> {
        self.peer.read().clone()
    }

    /// Downcast the connected peer port's service handler.
    ///
    /// This is how an in-process caller reaches the service behind the
    /// remote side of the connection.
    pub fn handler<H: Send + Sync + 'static>(&self) -> Option<Arc<H>> {
        self.peer_port().and_then(|port| port.handler::<H>())
    }
}

impl Connector for LocalConnector {
    fn connect(&self, local: &Arc<Port>, peer: &PortUri) -> Result<()> {
        let port = self
            .ctx
            .lookup_port(peer)
            .ok_or_else(|| DirectoryError::NotFound(peer.clone()))?;
        *self.peer.write() = Some(port);
        debug!("connected {} -> {}", local.uri(), peer);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        *self.peer.write() = None;
        Ok(())
    }
}
