//! The component lifecycle state machine.
//!
//! Lifecycle calls propagate recursively to nested sub-components.
//! Teardown is two-phase: `finalize` ends service (plugins finalized,
//! reflection port unpublished), `shutdown` destroys the component's
//! resources. Pool shutdown happens on a detached thread so the
//! initiating call never blocks; the `ShuttingDown → Shutdown →
//! Terminated` promotions are therefore eventually consistent, observed
//! through [`Component::is_shutdown`], [`Component::is_terminated`], or
//! [`Component::await_termination`].

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use quay_core::error::{Error, Result};
use quay_core::state::ComponentState;
use quay_concurrency::pool::executor::ExecutorPool;

use super::Component;

impl Component {
    /// Start the component: recursively start sub-components, enter
    /// `Started`, and invoke the service's `on_start` hook.
    ///
    /// Precondition: `Initialized`.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.ensure_state(ComponentState::Initialized)?;
        for child in self.subcomponents() {
            child.start()?;
        }
        self.promote(ComponentState::Started);
        info!("component {} started", self.uri());
        if let Some(service) = self.service.clone() {
            service.on_start(self)?;
        }
        Ok(())
    }

    /// Trigger autonomous behavior: for every sub-component owning
    /// threads, submit a task invoking that sub-component's `execute`;
    /// then submit this component's own service `run` hook through the
    /// engine. No state change.
    ///
    /// Precondition: `Started`.
    pub fn execute(self: &Arc<Self>) -> Result<()> {
        self.ensure_state(ComponentState::Started)?;
        for child in self.subcomponents() {
            if child.has_own_threads() {
                child.run_task(|c| {
                    if let Err(e) = c.execute() {
                        error!("component {}: execute failed: {}", c.uri(), e);
                    }
                })?;
            }
        }
        if let Some(service) = self.service.clone() {
            self.run_task(move |c| {
                if let Err(e) = service.run(c) {
                    error!("component {}: service run failed: {}", c.uri(), e);
                }
            })?;
        }
        Ok(())
    }

    /// End service: recursively finalize sub-components, finalize
    /// installed plugins, invoke the service's `on_finalize` hook,
    /// unpublish the reflection port, and enter `Finalized`.
    ///
    /// Precondition: `Started`.
    pub fn finalize(self: &Arc<Self>) -> Result<()> {
        self.ensure_state(ComponentState::Started)?;
        for child in self.subcomponents() {
            child.finalize()?;
        }
        self.finalize_installed_plugins()?;
        if let Some(service) = self.service.clone() {
            service.on_finalize(self)?;
        }
        self.unpublish_reflection_port()?;
        self.promote(ComponentState::Finalized);
        info!("component {} finalized", self.uri());
        Ok(())
    }

    /// Tear the component down: recursively shut down sub-components,
    /// uninstall plugins, destroy all ports, and shut every executor pool
    /// down on a detached thread.
    ///
    /// Failures while uninstalling plugins or destroying ports abort the
    /// sequence. A component not nested inside a composite deregisters
    /// itself from the process-wide registry.
    ///
    /// Precondition: `Finalized`.
    pub fn shutdown(self: &Arc<Self>) -> Result<()> {
        self.ensure_state(ComponentState::Finalized)?;
        for child in self.subcomponents() {
            child.shutdown()?;
        }
        self.teardown(false)
    }

    /// Immediate variant of [`Component::shutdown`] that discards queued
    /// work instead of draining it.
    ///
    /// Precondition: `Finalized`.
    pub fn shutdown_now(self: &Arc<Self>) -> Result<()> {
        self.ensure_state(ComponentState::Finalized)?;
        for child in self.subcomponents() {
            child.shutdown_now()?;
        }
        self.teardown(true)
    }

    fn teardown(self: &Arc<Self>, discard_queued: bool) -> Result<()> {
        self.uninstall_all_plugins()?;
        self.teardown_ports()?;
        self.promote(ComponentState::ShuttingDown);

        if !self.is_nested() {
            self.context().deregister_component(self.uri());
        }

        let pools = self.drain_pools();
        *self.draining.lock() = pools.clone();
        if discard_queued {
            for pool in &pools {
                let dropped = pool.shutdown_now();
                if dropped > 0 {
                    warn!(
                        "component {}: pool {} discarded {} queued jobs",
                        self.uri(),
                        pool.uri(),
                        dropped
                    );
                }
            }
        }

        // The initiating call never blocks for the drain; a detached
        // worker waits the pools out and promotes the state.
        let weak = Arc::downgrade(self);
        let timeout = self.config().shutdown_timeout();
        let uri = self.uri().clone();
        thread::Builder::new()
            .name(format!("{}-shutdown", uri))
            .spawn(move || {
                for pool in &pools {
                    pool.shutdown();
                }
                for pool in &pools {
                    if !pool.await_termination(timeout) {
                        warn!(
                            "component {}: pool {} did not terminate within {:?}",
                            uri,
                            pool.uri(),
                            timeout
                        );
                    }
                }
                if let Some(component) = weak.upgrade() {
                    component.promote(ComponentState::Shutdown);
                }
            })
            .map_err(|e| Error::Runtime(format!("failed to spawn shutdown worker: {}", e)))?;

        info!("component {} shutting down", self.uri());
        Ok(())
    }

    fn draining_pools(&self) -> Vec<Arc<ExecutorPool>> {
        self.draining.lock().clone()
    }

    /// Check if teardown has completed draining: promotes the state to
    /// `Shutdown` as soon as every pool reports drained.
    pub fn is_shutdown(&self) -> bool {
        match self.state() {
            ComponentState::Shutdown | ComponentState::Terminated => true,
            ComponentState::ShuttingDown => {
                let drained = self
                    .draining_pools()
                    .iter()
                    .all(|p| p.is_drained() || p.is_terminated());
                if drained {
                    self.promote(ComponentState::Shutdown);
                }
                drained
            }
            _ => false,
        }
    }

    /// Check if every pool thread has exited: promotes the state to
    /// `Terminated` once all pools confirm.
    pub fn is_terminated(&self) -> bool {
        match self.state() {
            ComponentState::Terminated => true,
            ComponentState::ShuttingDown | ComponentState::Shutdown => {
                let terminated = self.draining_pools().iter().all(|p| p.is_terminated());
                if terminated {
                    self.promote(ComponentState::Shutdown);
                    self.promote(ComponentState::Terminated);
                }
                terminated
            }
            _ => false,
        }
    }

    /// Block up to `timeout` for the component to terminate.
    ///
    /// Returns `true` if it terminated within the timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_terminated() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.config().shutdown_poll_interval());
        }
        true
    }
}
