//! Components: addressable units owning pools, ports, and plugins.
//!
//! A [`Component`] is the kernel object everything else in this crate
//! hangs off: it owns a table of named executor pools, a registry of
//! ports, a table of installed plugins, and an optional set of nested
//! sub-components, and it moves through the lifecycle state machine of
//! [`ComponentState`]. Components are created through
//! [`ComponentBuilder`] against a [`RuntimeContext`]; construction also
//! creates and locally publishes the component's reflection port, whose
//! URI is the component's identity.
//!
//! The kernel/service split: the component is the kernel, user logic
//! lives in a [`Service`] implementation handed to the builder and in the
//! closures submitted through the engine (see the `engine` methods).

mod engine;
mod lifecycle;
mod pools;
mod ports;
mod plugins;

pub use pools::{PoolRef, STANDARD_REQUEST_POOL_URI, STANDARD_SCHEDULABLE_POOL_URI};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::info;

use quay_core::error::{ContractError, Error, Result};
use quay_core::interface::InterfaceId;
use quay_core::state::ComponentState;
use quay_core::uri::{PluginUri, PortUri};
use quay_concurrency::pool::executor::ExecutorPool;

use crate::config::RuntimeConfig;
use crate::context::RuntimeContext;
use crate::plugin::Plugin;
use crate::port::Port;

use pools::PoolTable;
use ports::PortTable;

/// User-supplied lifecycle hooks of a component.
///
/// All hooks default to no-ops; implement only what the component needs.
/// `run` is the autonomous-behavior hook submitted through the engine by
/// [`Component::execute`].
pub trait Service: Send + Sync {
    /// Invoked by [`Component::start`] once the component is started.
    fn on_start(&self, component: &Arc<Component>) -> Result<()> {
        let _ = component;
        Ok(())
    }

    /// The component's autonomous background behavior, submitted as a
    /// task by [`Component::execute`].
    fn run(&self, component: &Arc<Component>) -> Result<()> {
        let _ = component;
        Ok(())
    }

    /// Invoked by [`Component::finalize`] before the component leaves
    /// the `Started` state.
    fn on_finalize(&self, component: &Arc<Component>) -> Result<()> {
        let _ = component;
        Ok(())
    }
}

/// Self-description surface consumed by deployment code to wire
/// components together before they are started.
pub trait Reflection: Send + Sync {
    /// Describe the component's interfaces and ports.
    fn describe(&self) -> ComponentDescriptor;
}

/// Serializable self-description of a component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDescriptor {
    /// The component's reflection-port URI
    pub uri: PortUri,

    /// Current lifecycle state
    pub state: ComponentState,

    /// Names of the interfaces the component offers
    pub offered: Vec<String>,

    /// Names of the interfaces the component requires
    pub required: Vec<String>,

    /// Registered port URIs, keyed by interface name
    pub ports: BTreeMap<String, Vec<PortUri>>,
}

/// An addressable unit owning ports, pools, and plugins, with its own
/// lifecycle.
pub struct Component {
    uri: PortUri,
    ctx: Arc<RuntimeContext>,
    config: RuntimeConfig,
    state: RwLock<ComponentState>,
    offered: RwLock<HashSet<InterfaceId>>,
    required: RwLock<HashSet<InterfaceId>>,
    pools: RwLock<PoolTable>,
    draining: Mutex<Vec<Arc<ExecutorPool>>>,
    ports: RwLock<PortTable>,
    plugins: RwLock<HashMap<PluginUri, Arc<dyn Plugin>>>,
    parent: RwLock<Weak<Component>>,
    children: RwLock<Vec<Arc<Component>>>,
    service: Option<Arc<dyn Service>>,
}

impl Component {
    /// The component's identity: its reflection-port URI.
    pub fn uri(&self) -> &PortUri {
        &self.uri
    }

    /// The runtime context the component was created against.
    pub(crate) fn context(&self) -> &Arc<RuntimeContext> {
        &self.ctx
    }

    /// The configuration the component was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ComponentState {
        *self.state.read()
    }

    pub(crate) fn ensure_state(&self, expected: ComponentState) -> Result<()> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(ContractError::InvalidState { expected, actual }.into())
        }
    }

    pub(crate) fn ensure_wirable(&self) -> Result<()> {
        let state = self.state();
        if state.is_wirable() {
            Ok(())
        } else {
            Err(ContractError::NotWirable(state).into())
        }
    }

    /// Advance the lifecycle state if the transition is legal; return
    /// whether it happened. Competing promotions resolve to a no-op.
    pub(crate) fn promote(&self, next: ComponentState) -> bool {
        let mut state = self.state.write();
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Nest `child` inside this component.
    ///
    /// The child is started, finalized, and shut down recursively with
    /// its parent, and no longer deregisters itself from the process-wide
    /// registry on its own.
    pub fn add_subcomponent(self: &Arc<Self>, child: &Arc<Component>) -> Result<()> {
        self.ensure_wirable()?;
        {
            let mut parent = child.parent.write();
            if parent.upgrade().is_some() {
                return Err(Error::Runtime(format!(
                    "component {} is already nested",
                    child.uri()
                )));
            }
            *parent = Arc::downgrade(self);
        }
        self.children.write().push(Arc::clone(child));
        Ok(())
    }

    /// Snapshot of the owned sub-components.
    pub fn subcomponents(&self) -> Vec<Arc<Component>> {
        self.children.read().clone()
    }

    /// The enclosing composite component, if this component is nested.
    pub fn parent(&self) -> Option<Arc<Component>> {
        self.parent.read().upgrade()
    }

    /// Check if this component is nested inside a composite.
    pub fn is_nested(&self) -> bool {
        self.parent().is_some()
    }

    /// Describe the component's interfaces and ports.
    pub fn describe(&self) -> ComponentDescriptor {
        let mut offered: Vec<String> = self
            .offered
            .read()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        offered.sort();

        let mut required: Vec<String> = self
            .required
            .read()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        required.sort();

        let ports = self.ports.read().by_interface_names();

        ComponentDescriptor {
            uri: self.uri.clone(),
            state: self.state(),
            offered,
            required,
            ports,
        }
    }
}

impl Reflection for Component {
    fn describe(&self) -> ComponentDescriptor {
        Component::describe(self)
    }
}

/// Builder for [`Component`].
///
/// Both thread counts default to zero; a component built with neither is
/// passive and executes all submitted work synchronously on the caller's
/// thread.
pub struct ComponentBuilder {
    ctx: Arc<RuntimeContext>,
    uri: Option<PortUri>,
    plain_threads: usize,
    schedulable_threads: usize,
    offered: HashSet<InterfaceId>,
    required: HashSet<InterfaceId>,
    service: Option<Arc<dyn Service>>,
}

impl ComponentBuilder {
    /// Start building a component against `ctx`.
    pub fn new(ctx: &Arc<RuntimeContext>) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            uri: None,
            plain_threads: 0,
            schedulable_threads: 0,
            offered: HashSet::new(),
            required: HashSet::new(),
            service: None,
        }
    }

    /// Use an explicit reflection-port URI instead of a generated one.
    pub fn reflection_uri(mut self, uri: impl Into<PortUri>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Number of threads of the standard request pool.
    pub fn plain_threads(mut self, threads: usize) -> Self {
        self.plain_threads = threads;
        self
    }

    /// Number of threads of the standard schedulable pool.
    pub fn schedulable_threads(mut self, threads: usize) -> Self {
        self.schedulable_threads = threads;
        self
    }

    /// Declare an offered interface.
    pub fn offers<I: ?Sized + 'static>(mut self) -> Self {
        self.offered.insert(InterfaceId::of::<I>());
        self
    }

    /// Declare a required interface.
    pub fn requires<I: ?Sized + 'static>(mut self) -> Self {
        self.required.insert(InterfaceId::of::<I>());
        self
    }

    /// Attach the component's lifecycle hooks.
    pub fn service(mut self, service: Arc<dyn Service>) -> Self {
        self.service = Some(service);
        self
    }

    /// Build the component.
    ///
    /// Creates the standard pools for non-zero thread counts, creates and
    /// locally publishes the reflection port, and registers the component
    /// in the context's process-wide registry.
    pub fn build(self) -> Result<Arc<Component>> {
        let uri = self
            .uri
            .unwrap_or_else(|| PortUri::generated("quay:component"));
        if uri.is_empty() {
            return Err(ContractError::EmptyUri.into());
        }

        let mut offered = self.offered;
        offered.insert(InterfaceId::of::<dyn Reflection>());

        let component = Arc::new(Component {
            uri: uri.clone(),
            config: self.ctx.config().clone(),
            ctx: self.ctx,
            state: RwLock::new(ComponentState::Initialized),
            offered: RwLock::new(offered),
            required: RwLock::new(self.required),
            pools: RwLock::new(PoolTable::new()),
            draining: Mutex::new(Vec::new()),
            ports: RwLock::new(PortTable::new()),
            plugins: RwLock::new(HashMap::new()),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            service: self.service,
        });

        if self.plain_threads > 0 {
            component.create_pool(
                STANDARD_REQUEST_POOL_URI.into(),
                self.plain_threads,
                false,
            )?;
        }
        if self.schedulable_threads > 0 {
            component.create_pool(
                STANDARD_SCHEDULABLE_POOL_URI.into(),
                self.schedulable_threads,
                true,
            )?;
        }

        let reflection_port = Port::new(
            uri.clone(),
            InterfaceId::of::<dyn Reflection>(),
            &component,
        );
        component.add_port(Arc::clone(&reflection_port))?;
        reflection_port.publish_local()?;

        if let Err(e) = component.context().register_component(&component) {
            let _ = reflection_port.unpublish();
            return Err(e);
        }

        info!(
            "component {} created ({} plain, {} schedulable threads)",
            uri, self.plain_threads, self.schedulable_threads
        );
        Ok(component)
    }
}
