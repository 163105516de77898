//! The per-component executor pool registry.
//!
//! Pools live in a sparse slot vector plus a URI→index map kept
//! bijective: every mapped URI holds a live pool and every live pool's
//! index is mapped. Shutting a pool down vacates its slot for reuse by
//! the next creation; when no slot is free the vector grows by doubling.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use quay_core::error::{ContractError, Result};
use quay_core::uri::PoolUri;
use quay_concurrency::pool::executor::ExecutorPool;
use quay_concurrency::pool::worker::WorkerPoolConfig;

use super::Component;

/// URI of the standard plain request pool, created automatically when a
/// component is built with a non-zero plain thread count.
pub const STANDARD_REQUEST_POOL_URI: &str = "quay:pool:requests";

/// URI of the standard schedulable pool, created automatically when a
/// component is built with a non-zero schedulable thread count.
pub const STANDARD_SCHEDULABLE_POOL_URI: &str = "quay:pool:schedule";

/// Reference to a pool by index or by URI.
#[derive(Clone, Debug)]
pub enum PoolRef {
    /// By registry index
    Index(usize),

    /// By pool URI
    Uri(PoolUri),
}

impl From<usize> for PoolRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<PoolUri> for PoolRef {
    fn from(uri: PoolUri) -> Self {
        Self::Uri(uri)
    }
}

impl From<&PoolUri> for PoolRef {
    fn from(uri: &PoolUri) -> Self {
        Self::Uri(uri.clone())
    }
}

pub(crate) struct PoolTable {
    slots: Vec<Option<Arc<ExecutorPool>>>,
    index_of: HashMap<PoolUri, usize>,
}

impl PoolTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            index_of: HashMap::new(),
        }
    }

    fn insert(&mut self, uri: PoolUri, pool: Arc<ExecutorPool>) -> usize {
        let index = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let next = self.slots.len();
                let doubled = (self.slots.len() * 2).max(2);
                self.slots.resize_with(doubled, || None);
                next
            }
        };
        self.slots[index] = Some(pool);
        self.index_of.insert(uri, index);
        index
    }

    fn remove(&mut self, uri: &PoolUri) -> Option<Arc<ExecutorPool>> {
        let index = self.index_of.remove(uri)?;
        self.slots.get_mut(index).and_then(Option::take)
    }

    fn by_index(&self, index: usize) -> Option<Arc<ExecutorPool>> {
        self.slots.get(index).and_then(Clone::clone)
    }

    fn live_pools(&self) -> impl Iterator<Item = &Arc<ExecutorPool>> {
        self.slots.iter().flatten()
    }
}

impl Component {
    /// Create a named executor pool and return its registry index.
    ///
    /// Fails if `uri` already denotes a pool or `threads` is zero. The
    /// new pool takes the first vacant slot, reusing holes left by prior
    /// shutdowns.
    pub fn create_pool(&self, uri: PoolUri, threads: usize, schedulable: bool) -> Result<usize> {
        self.ensure_wirable()?;
        if uri.is_empty() {
            return Err(ContractError::EmptyUri.into());
        }
        if threads == 0 {
            return Err(ContractError::ZeroThreadCount(uri).into());
        }

        let mut table = self.pools.write();
        if table.index_of.contains_key(&uri) {
            return Err(ContractError::DuplicatePool(uri).into());
        }

        let pool = Arc::new(ExecutorPool::with_config(
            uri.clone(),
            schedulable,
            WorkerPoolConfig {
                queue_size: self.config().pool_queue_size,
                threads,
                thread_name_prefix: format!("{}-{}", self.config().worker_name_prefix, uri),
                collect_stats: true,
            },
        ));
        let index = table.insert(uri.clone(), pool);
        debug!(
            "component {}: pool {} created at index {} ({} threads{})",
            self.uri(),
            uri,
            index,
            threads,
            if schedulable { ", schedulable" } else { "" }
        );
        Ok(index)
    }

    /// Resolve a pool URI to its registry index.
    pub fn pool_index(&self, uri: &PoolUri) -> Result<usize> {
        self.pools
            .read()
            .index_of
            .get(uri)
            .copied()
            .ok_or_else(|| ContractError::UnknownPool(uri.clone()).into())
    }

    /// Look up a pool by index or URI.
    pub fn pool(&self, pool: impl Into<PoolRef>) -> Result<Arc<ExecutorPool>> {
        let table = self.pools.read();
        match pool.into() {
            PoolRef::Index(index) => table
                .by_index(index)
                .ok_or_else(|| ContractError::UnknownPoolIndex(index).into()),
            PoolRef::Uri(uri) => {
                let index = table
                    .index_of
                    .get(&uri)
                    .copied()
                    .ok_or(ContractError::UnknownPool(uri))?;
                table
                    .by_index(index)
                    .ok_or_else(|| ContractError::UnknownPoolIndex(index).into())
            }
        }
    }

    /// Gracefully shut down the pool registered under `uri`, vacating its
    /// slot for reuse.
    ///
    /// Does not block for drain completion: the returned handle can be
    /// observed through its `is_drained`/`await_termination` surface.
    pub fn shutdown_pool(&self, uri: &PoolUri) -> Result<Arc<ExecutorPool>> {
        let pool = {
            let mut table = self.pools.write();
            table
                .remove(uri)
                .ok_or_else(|| ContractError::UnknownPool(uri.clone()))?
        };
        pool.shutdown();
        debug!("component {}: pool {} shut down", self.uri(), uri);
        Ok(pool)
    }

    /// Shut down the pool registered under `uri` immediately, discarding
    /// queued work.
    ///
    /// Returns the pool handle and the number of queued jobs discarded.
    pub fn shutdown_pool_now(&self, uri: &PoolUri) -> Result<(Arc<ExecutorPool>, usize)> {
        let pool = {
            let mut table = self.pools.write();
            table
                .remove(uri)
                .ok_or_else(|| ContractError::UnknownPool(uri.clone()))?
        };
        let discarded = pool.shutdown_now();
        debug!(
            "component {}: pool {} halted, {} queued jobs discarded",
            self.uri(),
            uri,
            discarded
        );
        Ok((pool, discarded))
    }

    /// Total worker threads across all live pools.
    pub fn total_thread_count(&self) -> usize {
        self.pools
            .read()
            .live_pools()
            .map(|p| p.thread_count())
            .sum()
    }

    /// Check if the component owns any worker threads.
    ///
    /// A component with none is passive: all submitted work runs
    /// synchronously on the caller's thread.
    pub fn has_own_threads(&self) -> bool {
        self.total_thread_count() > 0
    }

    /// URIs of all live pools.
    pub fn pool_uris(&self) -> Vec<PoolUri> {
        self.pools.read().index_of.keys().cloned().collect()
    }

    /// The default pool for plain submissions: the standard request pool,
    /// falling back to the standard schedulable pool.
    pub(crate) fn default_pool(&self) -> Result<Arc<ExecutorPool>> {
        let table = self.pools.read();
        for uri in [STANDARD_REQUEST_POOL_URI, STANDARD_SCHEDULABLE_POOL_URI] {
            let uri = PoolUri::new(uri);
            if let Some(index) = table.index_of.get(&uri) {
                if let Some(pool) = table.by_index(*index) {
                    return Ok(pool);
                }
            }
        }
        Err(ContractError::NoDefaultPool.into())
    }

    /// The default pool for scheduling: the standard schedulable pool.
    pub(crate) fn default_schedulable_pool(&self) -> Result<Arc<ExecutorPool>> {
        let table = self.pools.read();
        let uri = PoolUri::new(STANDARD_SCHEDULABLE_POOL_URI);
        table
            .index_of
            .get(&uri)
            .and_then(|index| table.by_index(*index))
            .ok_or_else(|| ContractError::NoSchedulablePool.into())
    }

    /// Remove every pool from the registry for teardown; the lifecycle
    /// machine shuts the returned pools down off-thread.
    pub(crate) fn drain_pools(&self) -> Vec<Arc<ExecutorPool>> {
        let mut table = self.pools.write();
        table.index_of.clear();
        table.slots.drain(..).flatten().collect()
    }
}
