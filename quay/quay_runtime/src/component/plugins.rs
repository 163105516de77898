//! The plugin attachment protocol.
//!
//! Installing a plugin binds it to this component, resolves its
//! preferred pool to an index, and initializes it; finalizing ends its
//! service while keeping the owner reference; uninstalling removes it
//! from the table. Shutdown uninstalls every plugin and treats failures
//! as fatal to the teardown sequence.

use std::sync::Arc;

use tracing::debug;

use quay_core::error::{ContractError, Result};
use quay_core::uri::PluginUri;

use super::Component;
use crate::plugin::Plugin;

impl Component {
    /// Install `plugin` on this component.
    ///
    /// Preconditions: the plugin has a non-empty URI, is not already
    /// installed here, and is not yet initialized. Binds the owner,
    /// resolves the preferred pool (when one was declared) to an index,
    /// invokes the plugin's `initialize` hook, and marks it initialized.
    pub fn install_plugin(self: &Arc<Self>, plugin: Arc<dyn Plugin>) -> Result<()> {
        self.ensure_wirable()?;
        let uri = plugin.uri().clone();
        if uri.is_empty() {
            return Err(ContractError::EmptyUri.into());
        }
        if self.plugins.read().contains_key(&uri) {
            return Err(ContractError::DuplicatePlugin(uri).into());
        }
        if plugin.core().is_initialized() {
            return Err(ContractError::PluginAlreadyInitialized(uri).into());
        }

        plugin.core().bind_owner(self)?;
        if let Some(pool_uri) = plugin.core().preferred_pool() {
            let index = self.pool_index(&pool_uri)?;
            plugin.core().set_resolved_index(index);
        }

        plugin.initialize(self)?;
        plugin.core().set_initialized(true);

        self.plugins.write().insert(uri.clone(), plugin);
        debug!("component {}: plugin {} installed", self.uri(), uri);
        Ok(())
    }

    /// Look up an installed plugin.
    pub fn plugin(&self, uri: &PluginUri) -> Result<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| ContractError::UnknownPlugin(uri.clone()).into())
    }

    /// Check if a plugin is installed under `uri`.
    pub fn has_plugin(&self, uri: &PluginUri) -> bool {
        self.plugins.read().contains_key(uri)
    }

    /// URIs of all installed plugins.
    pub fn plugin_uris(&self) -> Vec<PluginUri> {
        self.plugins.read().keys().cloned().collect()
    }

    /// End the service of the plugin installed under `uri`.
    ///
    /// The plugin's owner reference is retained; only uninstalling
    /// removes it from the table.
    pub fn finalize_plugin(self: &Arc<Self>, uri: &PluginUri) -> Result<()> {
        let plugin = self.plugin(uri)?;
        if !plugin.core().is_initialized() {
            return Err(ContractError::PluginNotInitialized(uri.clone()).into());
        }
        plugin.finalize(self)?;
        plugin.core().set_initialized(false);
        debug!("component {}: plugin {} finalized", self.uri(), uri);
        Ok(())
    }

    /// Remove the plugin installed under `uri` from the table.
    ///
    /// Precondition: the plugin was finalized.
    pub fn uninstall_plugin(&self, uri: &PluginUri) -> Result<()> {
        let plugin = self.plugin(uri)?;
        if plugin.core().is_initialized() {
            return Err(ContractError::PluginStillInitialized(uri.clone()).into());
        }
        self.plugins.write().remove(uri);
        debug!("component {}: plugin {} uninstalled", self.uri(), uri);
        Ok(())
    }

    /// Finalize every still-initialized plugin, in no particular order.
    pub(crate) fn finalize_installed_plugins(self: &Arc<Self>) -> Result<()> {
        for uri in self.plugin_uris() {
            let plugin = self.plugin(&uri)?;
            if plugin.core().is_initialized() {
                self.finalize_plugin(&uri)?;
            }
        }
        Ok(())
    }

    /// Uninstall every plugin; failures abort the shutdown sequence.
    pub(crate) fn uninstall_all_plugins(&self) -> Result<()> {
        for uri in self.plugin_uris() {
            self.uninstall_plugin(&uri)?;
        }
        Ok(())
    }
}
