//! Ports: named, typed connection points.
//!
//! A port belongs to exactly one component, fixed at construction, and
//! implements exactly one declared interface. Its lifecycle is
//! `register → publish → connect → disconnect → unpublish → destroy`;
//! `destroy` is terminal. Publication makes the port reachable through
//! the directory; a connection binds it to exactly one peer port through
//! a connector object.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use quay_core::error::{ContractError, Error, Result};
use quay_core::interface::InterfaceId;
use quay_core::uri::PortUri;

use crate::component::Component;
use crate::connector::Connector;

/// The connection cell of a bound port.
#[derive(Clone)]
pub(crate) struct Connection {
    pub(crate) peer: PortUri,
    pub(crate) connector: Arc<dyn Connector>,
}

#[derive(Default)]
struct PortState {
    published: bool,
    distributed: bool,
    destroyed: bool,
    connection: Option<Connection>,
}

/// A named, typed connection point owned by one component.
pub struct Port {
    uri: PortUri,
    interface: InterfaceId,
    owner: Weak<Component>,
    handler: Option<Arc<dyn Any + Send + Sync>>,
    state: RwLock<PortState>,
}

impl Port {
    /// Create a port for `interface`, owned by `owner`.
    ///
    /// The port still has to be registered with
    /// [`Component::add_port`](crate::component::Component::add_port)
    /// before it can be published.
    pub fn new(uri: PortUri, interface: InterfaceId, owner: &Arc<Component>) -> Arc<Self> {
        Arc::new(Self {
            uri,
            interface,
            owner: Arc::downgrade(owner),
            handler: None,
            state: RwLock::new(PortState::default()),
        })
    }

    /// Create a port carrying an in-process service handler.
    ///
    /// Local connectors reach the service by downcasting the handler via
    /// [`Port::handler`]; the handler must therefore be the concrete
    /// service type, not a trait object.
    pub fn with_handler(
        uri: PortUri,
        interface: InterfaceId,
        owner: &Arc<Component>,
        handler: Arc<dyn Any + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            uri,
            interface,
            owner: Arc::downgrade(owner),
            handler: Some(handler),
            state: RwLock::new(PortState::default()),
        })
    }

    /// The port's URI.
    pub fn uri(&self) -> &PortUri {
        &self.uri
    }

    /// The interface this port implements.
    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    /// The owning component.
    ///
    /// Fails only if the owner has been dropped, which means the port
    /// outlived its component.
    pub fn owner(&self) -> Result<Arc<Component>> {
        self.owner
            .upgrade()
            .ok_or_else(|| Error::Runtime(format!("owner of port {} is gone", self.uri)))
    }

    /// Downcast the in-process service handler, if one was attached.
    pub fn handler<H: Send + Sync + 'static>(&self) -> Option<Arc<H>> {
        self.handler.clone().and_then(|h| h.downcast::<H>().ok())
    }

    /// Check if the port is published in the directory.
    pub fn is_published(&self) -> bool {
        self.state.read().published
    }

    /// Check if the port is also announced in the distributed directory.
    ///
    /// Implies [`Port::is_published`].
    pub fn is_distributed_published(&self) -> bool {
        self.state.read().distributed
    }

    /// Check if the port has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.state.read().destroyed
    }

    /// Check if the port is connected to a peer.
    pub fn is_connected(&self) -> bool {
        self.state.read().connection.is_some()
    }

    /// The URI of the connected peer port, if any.
    pub fn peer(&self) -> Option<PortUri> {
        self.state.read().connection.as_ref().map(|c| c.peer.clone())
    }

    /// Publish the port in the local directory.
    pub fn publish_local(self: &Arc<Self>) -> Result<()> {
        let owner = self.owner()?;
        let mut state = self.state.write();
        self.ensure_alive(&state)?;
        if state.published {
            return Err(ContractError::AlreadyPublished(self.uri.clone()).into());
        }
        owner.context().directory().publish(&self.uri, Arc::clone(self))?;
        state.published = true;
        debug!("port {} published", self.uri);
        Ok(())
    }

    /// Publish the port in the local directory and announce it in the
    /// distributed directory, when the runtime context has one.
    pub fn publish(self: &Arc<Self>) -> Result<()> {
        let owner = self.owner()?;
        let ctx = owner.context();
        let mut state = self.state.write();
        self.ensure_alive(&state)?;
        if state.published {
            return Err(ContractError::AlreadyPublished(self.uri.clone()).into());
        }
        ctx.directory().publish(&self.uri, Arc::clone(self))?;
        if let Some(remote) = ctx.remote_directory() {
            if let Err(e) = remote.publish(&self.uri) {
                // Keep the directory consistent when the backend refuses.
                let _ = ctx.directory().unpublish(&self.uri);
                return Err(e);
            }
        }
        state.published = true;
        state.distributed = true;
        debug!("port {} published (distributed)", self.uri);
        Ok(())
    }

    /// Withdraw the port from the directory.
    ///
    /// The port must be published and must not be connected.
    pub fn unpublish(self: &Arc<Self>) -> Result<()> {
        let owner = self.owner()?;
        let ctx = owner.context();
        let mut state = self.state.write();
        self.ensure_alive(&state)?;
        if !state.published {
            return Err(ContractError::NotPublished(self.uri.clone()).into());
        }
        if state.connection.is_some() {
            return Err(ContractError::PortConnected(self.uri.clone()).into());
        }
        ctx.directory().unpublish(&self.uri)?;
        if state.distributed {
            if let Some(remote) = ctx.remote_directory() {
                remote.unpublish(&self.uri)?;
            }
        }
        state.published = false;
        state.distributed = false;
        debug!("port {} unpublished", self.uri);
        Ok(())
    }

    /// Destroy the port: deregister it from its owner and mark it
    /// terminally dead.
    ///
    /// The port must not be published.
    pub fn destroy(self: &Arc<Self>) -> Result<()> {
        let owner = self.owner()?;
        let mut state = self.state.write();
        self.ensure_alive(&state)?;
        if state.published {
            return Err(ContractError::AlreadyPublished(self.uri.clone()).into());
        }
        owner.unregister_port(&self.uri)?;
        state.destroyed = true;
        state.connection = None;
        debug!("port {} destroyed", self.uri);
        Ok(())
    }

    /// Complete this port's side of a connection handshake.
    ///
    /// Called on the initiating port by its owner, and on the peer port by
    /// the initiator's notification (directly for in-process peers,
    /// through the connector for remote ones). Fails if the port is
    /// destroyed or already connected.
    pub fn accept_connection(
        &self,
        peer: PortUri,
        connector: Arc<dyn Connector>,
    ) -> Result<()> {
        let mut state = self.state.write();
        self.ensure_alive(&state)?;
        if state.connection.is_some() {
            return Err(ContractError::PortConnected(self.uri.clone()).into());
        }
        state.connection = Some(Connection { peer, connector });
        Ok(())
    }

    /// Clear this port's side of a connection, if any.
    ///
    /// The inverse of [`Port::accept_connection`]; safe to call on an
    /// unconnected port.
    pub fn clear_connection(&self) {
        self.state.write().connection = None;
    }

    /// Snapshot the connection cell.
    pub(crate) fn connection(&self) -> Option<Connection> {
        self.state.read().connection.clone()
    }

    /// Take the connection cell, clearing it.
    pub(crate) fn take_connection(&self) -> Option<Connection> {
        self.state.write().connection.take()
    }

    fn ensure_alive(&self, state: &PortState) -> Result<()> {
        if state.destroyed {
            return Err(ContractError::PortDestroyed(self.uri.clone()).into());
        }
        Ok(())
    }
}
