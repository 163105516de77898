//! The per-component port registry and the connection protocol.
//!
//! Ports are tracked in two tables kept mutually consistent: a URI table
//! and an interface multimap. Every port reachable through one is
//! reachable through the other and refers back to the same interface.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use quay_core::error::{ContractError, Result};
use quay_core::interface::InterfaceId;
use quay_core::uri::PortUri;

use super::Component;
use crate::connector::Connector;
use crate::port::Port;

pub(crate) struct PortTable {
    by_uri: HashMap<PortUri, Arc<Port>>,
    by_interface: HashMap<InterfaceId, HashSet<PortUri>>,
}

impl PortTable {
    pub(crate) fn new() -> Self {
        Self {
            by_uri: HashMap::new(),
            by_interface: HashMap::new(),
        }
    }

    fn insert(&mut self, port: Arc<Port>) {
        self.by_interface
            .entry(port.interface())
            .or_default()
            .insert(port.uri().clone());
        self.by_uri.insert(port.uri().clone(), port);
    }

    fn remove(&mut self, uri: &PortUri) -> Option<Arc<Port>> {
        let port = self.by_uri.remove(uri)?;
        let interface = port.interface();
        let now_empty = match self.by_interface.get_mut(&interface) {
            Some(uris) => {
                uris.remove(uri);
                uris.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_interface.remove(&interface);
        }
        Some(port)
    }

    /// Interface-name → sorted port URIs view, for the descriptor.
    pub(crate) fn by_interface_names(&self) -> BTreeMap<String, Vec<PortUri>> {
        let mut out = BTreeMap::new();
        for (interface, uris) in &self.by_interface {
            let mut uris: Vec<PortUri> = uris.iter().cloned().collect();
            uris.sort();
            out.insert(interface.name().to_string(), uris);
        }
        out
    }
}

impl Component {
    /// Declare an offered interface after construction.
    pub fn declare_offered<I: ?Sized + 'static>(&self) -> Result<()> {
        self.ensure_wirable()?;
        self.offered.write().insert(InterfaceId::of::<I>());
        Ok(())
    }

    /// Declare a required interface after construction.
    pub fn declare_required<I: ?Sized + 'static>(&self) -> Result<()> {
        self.ensure_wirable()?;
        self.required.write().insert(InterfaceId::of::<I>());
        Ok(())
    }

    /// Check if the component declares `interface`, offered or required.
    pub fn declares_interface(&self, interface: InterfaceId) -> bool {
        self.offered.read().contains(&interface) || self.required.read().contains(&interface)
    }

    /// The declared offered interfaces.
    pub fn offered_interfaces(&self) -> Vec<InterfaceId> {
        self.offered.read().iter().copied().collect()
    }

    /// The declared required interfaces.
    pub fn required_interfaces(&self) -> Vec<InterfaceId> {
        self.required.read().iter().copied().collect()
    }

    /// Register a port in both the URI table and the interface multimap.
    ///
    /// Preconditions: the port's interface is declared by this component,
    /// the URI is free, and the port is not destroyed.
    pub fn add_port(&self, port: Arc<Port>) -> Result<()> {
        self.ensure_wirable()?;
        if port.uri().is_empty() {
            return Err(ContractError::EmptyUri.into());
        }
        if port.is_destroyed() {
            return Err(ContractError::PortDestroyed(port.uri().clone()).into());
        }
        if !self.declares_interface(port.interface()) {
            return Err(
                ContractError::UndeclaredInterface(port.interface().name().to_string()).into(),
            );
        }

        let mut table = self.ports.write();
        if table.by_uri.contains_key(port.uri()) {
            return Err(ContractError::DuplicatePort(port.uri().clone()).into());
        }
        debug!("component {}: port {} registered", self.uri(), port.uri());
        table.insert(port);
        Ok(())
    }

    /// Deregister a port from both tables and return it.
    pub fn remove_port(&self, uri: &PortUri) -> Result<Arc<Port>> {
        let port = self.unregister_port(uri)?;
        debug!("component {}: port {} removed", self.uri(), uri);
        Ok(port)
    }

    pub(crate) fn unregister_port(&self, uri: &PortUri) -> Result<Arc<Port>> {
        self.ports
            .write()
            .remove(uri)
            .ok_or_else(|| ContractError::UnknownPort(uri.clone()).into())
    }

    /// Look up a registered port.
    pub fn port(&self, uri: &PortUri) -> Result<Arc<Port>> {
        self.ports
            .read()
            .by_uri
            .get(uri)
            .cloned()
            .ok_or_else(|| ContractError::UnknownPort(uri.clone()).into())
    }

    /// Check if a port is registered under `uri`.
    pub fn has_port(&self, uri: &PortUri) -> bool {
        self.ports.read().by_uri.contains_key(uri)
    }

    /// URIs of all registered ports.
    pub fn port_uris(&self) -> Vec<PortUri> {
        self.ports.read().by_uri.keys().cloned().collect()
    }

    /// The registered ports implementing `interface`.
    pub fn ports_of_interface(&self, interface: InterfaceId) -> Vec<Arc<Port>> {
        let table = self.ports.read();
        table
            .by_interface
            .get(&interface)
            .map(|uris| {
                uris.iter()
                    .filter_map(|uri| table.by_uri.get(uri).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connect `port_uri` to `peer_uri` through `connector`.
    ///
    /// The handshake: the initiating port binds locally to the connector;
    /// the connector is asked to connect the two port references; the
    /// peer is notified to complete its own binding — directly when it is
    /// reachable through the local directory, otherwise by the connector
    /// itself. Any step failing unwinds the steps before it.
    pub fn connect_port(
        &self,
        port_uri: &PortUri,
        peer_uri: &PortUri,
        connector: Arc<dyn Connector>,
    ) -> Result<()> {
        self.ensure_wirable()?;
        let port = self.port(port_uri)?;

        port.accept_connection(peer_uri.clone(), Arc::clone(&connector))?;

        if let Err(e) = connector.connect(&port, peer_uri) {
            port.clear_connection();
            return Err(e);
        }

        if let Some(peer) = self.context().lookup_port(peer_uri) {
            if let Err(e) = peer.accept_connection(port_uri.clone(), Arc::clone(&connector)) {
                let _ = connector.disconnect();
                port.clear_connection();
                return Err(e);
            }
        }

        debug!(
            "component {}: port {} connected to {}",
            self.uri(),
            port_uri,
            peer_uri
        );
        Ok(())
    }

    /// Disconnect `port_uri` from its peer, mirroring the connection
    /// handshake in reverse: the peer clears its binding, the connector
    /// releases the transport, the initiating port clears its binding.
    pub fn disconnect_port(&self, port_uri: &PortUri) -> Result<()> {
        let port = self.port(port_uri)?;
        let connection = port
            .connection()
            .ok_or_else(|| ContractError::PortNotConnected(port_uri.clone()))?;

        if let Some(peer) = self.context().lookup_port(&connection.peer) {
            peer.clear_connection();
        }
        connection.connector.disconnect()?;
        port.clear_connection();

        debug!(
            "component {}: port {} disconnected from {}",
            self.uri(),
            port_uri,
            connection.peer
        );
        Ok(())
    }

    pub(crate) fn unpublish_reflection_port(&self) -> Result<()> {
        if let Ok(port) = self.port(self.uri()) {
            if port.is_published() {
                port.unpublish()?;
            }
        }
        Ok(())
    }

    /// Destroy every registered port: disconnect connected ports,
    /// unpublish published ones, then destroy them. Any failure aborts
    /// the teardown.
    pub(crate) fn teardown_ports(&self) -> Result<()> {
        let ports: Vec<Arc<Port>> = self.ports.read().by_uri.values().cloned().collect();
        for port in ports {
            if port.is_connected() {
                self.disconnect_port(port.uri())?;
            }
            if port.is_published() {
                port.unpublish()?;
            }
            port.destroy()?;
        }
        Ok(())
    }
}
