//! Plugins: attachable behavior modules.
//!
//! A plugin extends one component at runtime. Implementations embed a
//! [`PluginCore`], which carries the attachment state the kernel manages:
//! the owner reference (bound exactly once at install), the preferred
//! executor pool (set at most once, before install, resolved to a pool
//! index during install), and the initialized flag. A plugin's own task
//! and request submissions are forwarded through the owner's engine,
//! using the preferred pool when one was set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;

use quay_core::error::{ContractError, Result};
use quay_core::uri::{PluginUri, PoolUri};
use quay_concurrency::task::{RequestHandle, TaskHandle};

use crate::component::Component;

/// An attachable behavior module bound to exactly one component.
///
/// The lifecycle is `construct → install → initialize → finalize →
/// uninstall`; install and initialize happen together in
/// [`Component::install_plugin`](crate::component::Component::install_plugin),
/// which invokes the [`Plugin::initialize`] hook.
pub trait Plugin: Send + Sync {
    /// The attachment state embedded in the implementation.
    fn core(&self) -> &PluginCore;

    /// The plugin's URI, unique within its owner.
    fn uri(&self) -> &PluginUri {
        self.core().uri()
    }

    /// Hook invoked while the plugin is being installed on `owner`.
    fn initialize(&self, owner: &Arc<Component>) -> Result<()> {
        let _ = owner;
        Ok(())
    }

    /// Hook invoked when the plugin's service ends. The owner reference
    /// is retained until the plugin is uninstalled.
    fn finalize(&self, owner: &Arc<Component>) -> Result<()> {
        let _ = owner;
        Ok(())
    }
}

/// Attachment state shared by every plugin implementation.
pub struct PluginCore {
    uri: PluginUri,
    owner: RwLock<Weak<Component>>,
    bound: AtomicBool,
    preferred_pool: RwLock<Option<PoolUri>>,
    resolved_index: RwLock<Option<usize>>,
    initialized: AtomicBool,
}

impl PluginCore {
    /// Create the attachment state for a plugin identified by `uri`.
    pub fn new(uri: PluginUri) -> Self {
        Self {
            uri,
            owner: RwLock::new(Weak::new()),
            bound: AtomicBool::new(false),
            preferred_pool: RwLock::new(None),
            resolved_index: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// The plugin's URI.
    pub fn uri(&self) -> &PluginUri {
        &self.uri
    }

    /// Declare the executor pool this plugin prefers for its submissions.
    ///
    /// May be set at most once, and only before installation; the URI is
    /// resolved against the owner's pool table at install time.
    pub fn set_preferred_pool(&self, pool: PoolUri) -> Result<()> {
        if self.bound.load(Ordering::SeqCst) {
            return Err(ContractError::PreferredPoolAfterInstall(self.uri.clone()).into());
        }
        let mut preferred = self.preferred_pool.write();
        if preferred.is_some() {
            return Err(ContractError::PreferredPoolAlreadySet(self.uri.clone()).into());
        }
        *preferred = Some(pool);
        Ok(())
    }

    /// The preferred pool URI, if one was declared.
    pub fn preferred_pool(&self) -> Option<PoolUri> {
        self.preferred_pool.read().clone()
    }

    /// The preferred pool resolved to an index, once installed.
    pub fn resolved_pool_index(&self) -> Option<usize> {
        *self.resolved_index.read()
    }

    /// The owning component.
    pub fn owner(&self) -> Result<Arc<Component>> {
        self.owner
            .read()
            .upgrade()
            .ok_or_else(|| ContractError::OwnerNotBound(self.uri.clone()).into())
    }

    /// Check if the plugin is initialized and serving.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub(crate) fn bind_owner(&self, owner: &Arc<Component>) -> Result<()> {
        if self.bound.swap(true, Ordering::SeqCst) {
            return Err(ContractError::OwnerAlreadyBound(self.uri.clone()).into());
        }
        *self.owner.write() = Arc::downgrade(owner);
        Ok(())
    }

    pub(crate) fn set_resolved_index(&self, index: usize) {
        *self.resolved_index.write() = Some(index);
    }

    pub(crate) fn set_initialized(&self, value: bool) {
        self.initialized.store(value, Ordering::SeqCst);
    }

    fn ensure_serving(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(ContractError::PluginNotInitialized(self.uri.clone()).into());
        }
        Ok(())
    }

    /// Submit a fire-and-forget task through the owner's engine, on the
    /// preferred pool when one was resolved.
    pub fn run_task<F>(&self, f: F) -> Result<TaskHandle>
    where
        F: FnOnce(&Arc<Component>) + Send + 'static,
    {
        self.ensure_serving()?;
        let owner = self.owner()?;
        match self.resolved_pool_index() {
            Some(index) => owner.run_task_on(index, f),
            None => owner.run_task(f),
        }
    }

    /// Submit a typed request through the owner's engine, on the
    /// preferred pool when one was resolved.
    pub fn handle_request<T, F>(&self, f: F) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.ensure_serving()?;
        let owner = self.owner()?;
        match self.resolved_pool_index() {
            Some(index) => owner.handle_request_on(index, f),
            None => owner.handle_request(f),
        }
    }

    /// Schedule a one-shot task through the owner's engine.
    ///
    /// Uses the preferred pool when one was resolved; the target pool
    /// must be schedulable.
    pub fn schedule_task<F>(&self, delay: Duration, f: F) -> Result<TaskHandle>
    where
        F: FnOnce(&Arc<Component>) + Send + 'static,
    {
        self.ensure_serving()?;
        let owner = self.owner()?;
        match self.resolved_pool_index() {
            Some(index) => owner.schedule_task_on(index, delay, f),
            None => owner.schedule_task(delay, f),
        }
    }
}
