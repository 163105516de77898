//! The process-wide runtime context.
//!
//! A [`RuntimeContext`] is what components are created against: it owns
//! the port directory, the optional distributed directory client, the
//! shared configuration, and the registry of live components. A process
//! normally has one context; tests create as many as they like.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use quay_core::error::{ContractError, Result};
use quay_core::uri::PortUri;

use crate::component::Component;
use crate::config::RuntimeConfig;
use crate::directory::{LocalPortDirectory, PortDirectory, RemoteDirectoryClient};
use crate::port::Port;

/// Shared services of one runtime instance.
pub struct RuntimeContext {
    config: RuntimeConfig,
    directory: LocalPortDirectory,
    remote_directory: Option<Arc<dyn RemoteDirectoryClient>>,
    components: RwLock<HashMap<PortUri, Weak<Component>>>,
}

impl RuntimeContext {
    /// Create a context with the default configuration.
    pub fn new() -> Arc<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a context with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            directory: LocalPortDirectory::new(),
            remote_directory: None,
            components: RwLock::new(HashMap::new()),
        })
    }

    /// Create a context wired to a distributed directory backend.
    pub fn with_remote_directory(
        config: RuntimeConfig,
        remote: Arc<dyn RemoteDirectoryClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            directory: LocalPortDirectory::new(),
            remote_directory: Some(remote),
            components: RwLock::new(HashMap::new()),
        })
    }

    /// The shared configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The in-process port directory.
    pub fn directory(&self) -> &dyn PortDirectory {
        &self.directory
    }

    /// The distributed directory client, when one is wired.
    pub fn remote_directory(&self) -> Option<&Arc<dyn RemoteDirectoryClient>> {
        self.remote_directory.as_ref()
    }

    /// Look up a published port in the local directory.
    pub fn lookup_port(&self, uri: &PortUri) -> Option<Arc<Port>> {
        self.directory.lookup(uri)
    }

    /// Resolve a registered component by its reflection-port URI.
    pub fn component(&self, uri: &PortUri) -> Option<Arc<Component>> {
        self.components.read().get(uri).and_then(Weak::upgrade)
    }

    /// URIs of all registered components.
    pub fn component_uris(&self) -> Vec<PortUri> {
        self.components.read().keys().cloned().collect()
    }

    pub(crate) fn register_component(&self, component: &Arc<Component>) -> Result<()> {
        let uri = component.uri().clone();
        let mut table = self.components.write();
        if table.get(&uri).and_then(Weak::upgrade).is_some() {
            return Err(ContractError::DuplicatePort(uri).into());
        }
        table.insert(uri.clone(), Arc::downgrade(component));
        debug!("registered component {}", uri);
        Ok(())
    }

    pub(crate) fn deregister_component(&self, uri: &PortUri) {
        if self.components.write().remove(uri).is_some() {
            debug!("deregistered component {}", uri);
        }
    }
}
