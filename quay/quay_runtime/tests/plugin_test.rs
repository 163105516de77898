//! Integration tests for the plugin attachment protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quay_core::error::Result;
use quay_core::uri::{PluginUri, PoolUri};
use quay_runtime::{Component, ComponentBuilder, Plugin, PluginCore, RuntimeContext};

struct CountingPlugin {
    core: PluginCore,
    initialized: AtomicUsize,
    finalized: AtomicUsize,
}

impl CountingPlugin {
    fn new(uri: &str) -> Arc<Self> {
        Arc::new(Self {
            core: PluginCore::new(PluginUri::new(uri)),
            initialized: AtomicUsize::new(0),
            finalized: AtomicUsize::new(0),
        })
    }
}

impl Plugin for CountingPlugin {
    fn core(&self) -> &PluginCore {
        &self.core
    }

    fn initialize(&self, _owner: &Arc<Component>) -> Result<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&self, _owner: &Arc<Component>) -> Result<()> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_install_finalize_uninstall_protocol() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    let plugin = CountingPlugin::new("quay:plugin:audit");

    component.install_plugin(plugin.clone()).unwrap();
    assert_eq!(plugin.initialized.load(Ordering::SeqCst), 1);
    assert!(plugin.core().is_initialized());
    assert!(component.has_plugin(plugin.uri()));
    assert!(component.plugin(plugin.uri()).is_ok());

    // Uninstalling before finalizing fails its precondition.
    assert!(component
        .uninstall_plugin(plugin.uri())
        .unwrap_err()
        .is_contract_violation());

    component.finalize_plugin(plugin.uri()).unwrap();
    assert_eq!(plugin.finalized.load(Ordering::SeqCst), 1);
    assert!(!plugin.core().is_initialized());
    // The owner reference is retained after finalize.
    assert!(plugin.core().owner().is_ok());

    component.uninstall_plugin(plugin.uri()).unwrap();
    assert!(!component.has_plugin(plugin.uri()));
}

#[test]
fn test_duplicate_install_is_rejected() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();

    component
        .install_plugin(CountingPlugin::new("quay:plugin:audit"))
        .unwrap();
    let result = component.install_plugin(CountingPlugin::new("quay:plugin:audit"));
    assert!(result.unwrap_err().is_contract_violation());
}

#[test]
fn test_reinstalling_a_bound_plugin_is_rejected() {
    let ctx = RuntimeContext::new();
    let a = ComponentBuilder::new(&ctx).build().unwrap();
    let b = ComponentBuilder::new(&ctx).build().unwrap();
    let plugin = CountingPlugin::new("quay:plugin:audit");

    a.install_plugin(plugin.clone()).unwrap();
    // Even after its service ends, the plugin stays bound to its owner.
    a.finalize_plugin(plugin.uri()).unwrap();
    a.uninstall_plugin(plugin.uri()).unwrap();

    assert!(b.install_plugin(plugin).unwrap_err().is_contract_violation());
}

#[test]
fn test_preferred_pool_is_set_once_before_install() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    let pool = PoolUri::new("quay:pool:plugin");
    component.create_pool(pool.clone(), 1, false).unwrap();

    let plugin = CountingPlugin::new("quay:plugin:audit");
    plugin.core().set_preferred_pool(pool.clone()).unwrap();

    // Setting it twice fails its precondition.
    assert!(plugin
        .core()
        .set_preferred_pool(pool.clone())
        .unwrap_err()
        .is_contract_violation());

    let index = component.pool_index(&pool).unwrap();
    component.install_plugin(plugin.clone()).unwrap();
    assert_eq!(plugin.core().resolved_pool_index(), Some(index));

    // Setting it after install fails its precondition.
    assert!(plugin
        .core()
        .set_preferred_pool(PoolUri::new("quay:pool:other"))
        .unwrap_err()
        .is_contract_violation());
}

#[test]
fn test_unknown_preferred_pool_fails_install() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();

    let plugin = CountingPlugin::new("quay:plugin:audit");
    plugin
        .core()
        .set_preferred_pool(PoolUri::new("quay:pool:missing"))
        .unwrap();

    let result = component.install_plugin(plugin);
    assert!(result.unwrap_err().is_contract_violation());
}

#[test]
fn test_plugin_submissions_use_preferred_pool() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(1).build().unwrap();
    let pool = PoolUri::new("quay:pool:plugin");
    component.create_pool(pool.clone(), 1, false).unwrap();

    let plugin = CountingPlugin::new("quay:plugin:audit");
    plugin.core().set_preferred_pool(pool.clone()).unwrap();
    component.install_plugin(plugin.clone()).unwrap();
    component.start().unwrap();

    let value = plugin
        .core()
        .handle_request(|_c| Ok("from plugin"))
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(value, "from plugin");

    let preferred = component.pool(&pool).unwrap();
    assert!(preferred.stats().tasks_queued >= 1);

    // Submissions before initialization (after finalize) are rejected.
    component.finalize_plugin(plugin.uri()).unwrap();
    assert!(plugin
        .core()
        .run_task(|_c| {})
        .unwrap_err()
        .is_contract_violation());
}

#[test]
fn test_plugin_on_passive_owner_runs_inline() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    let plugin = CountingPlugin::new("quay:plugin:audit");
    component.install_plugin(plugin.clone()).unwrap();
    component.start().unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();
    let handle = plugin
        .core()
        .run_task(move |_c| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(handle.is_done());
}

#[test]
fn test_shutdown_uninstalls_plugins() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    let plugin = CountingPlugin::new("quay:plugin:audit");
    component.install_plugin(plugin.clone()).unwrap();

    component.start().unwrap();
    component.finalize().unwrap();
    // finalize() finalized the plugin as part of ending service.
    assert_eq!(plugin.finalized.load(Ordering::SeqCst), 1);

    component.shutdown().unwrap();
    assert!(!component.has_plugin(plugin.uri()));
    assert!(component.await_termination(std::time::Duration::from_secs(5)));
}
