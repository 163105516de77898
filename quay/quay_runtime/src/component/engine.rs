//! The task/request engine.
//!
//! Work enters a component as a closure bound to the owner at submission
//! time: a task (`FnOnce(&Arc<Component>)`, fire-and-forget) or a request
//! (`FnOnce(&Arc<Component>) -> Result<T>`, typed result through a
//! handle). A passive component — one owning no threads — executes
//! everything synchronously on the caller's thread and returns
//! already-complete handles; otherwise work goes to the named pool, or to
//! the standard request pool (falling back to the standard schedulable
//! pool) when none is named.
//!
//! All engine operations require the component to be `Started`.

use std::sync::Arc;
use std::time::Duration;

use quay_core::error::Result;
use quay_core::state::ComponentState;
use quay_concurrency::pool::executor::PeriodicHandle;
use quay_concurrency::task::{RequestHandle, TaskHandle};

use super::{Component, PoolRef};

impl Component {
    fn ensure_started(&self) -> Result<()> {
        self.ensure_state(ComponentState::Started)
    }

    /// Run a fire-and-forget task on the default pool, or synchronously
    /// on the caller's thread if the component is passive.
    pub fn run_task<F>(self: &Arc<Self>, f: F) -> Result<TaskHandle>
    where
        F: FnOnce(&Arc<Component>) + Send + 'static,
    {
        self.ensure_started()?;
        if !self.has_own_threads() {
            f(self);
            return Ok(TaskHandle::completed());
        }
        let pool = self.default_pool()?;
        let owner = Arc::clone(self);
        pool.submit_task(move || f(&owner))
    }

    /// Run a fire-and-forget task on an explicitly named pool.
    pub fn run_task_on<F>(self: &Arc<Self>, pool: impl Into<PoolRef>, f: F) -> Result<TaskHandle>
    where
        F: FnOnce(&Arc<Component>) + Send + 'static,
    {
        self.ensure_started()?;
        let pool = self.pool(pool)?;
        let owner = Arc::clone(self);
        pool.submit_task(move || f(&owner))
    }

    /// Submit a typed request on the default pool, or execute it
    /// synchronously if the component is passive.
    pub fn handle_request<T, F>(self: &Arc<Self>, f: F) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.ensure_started()?;
        if !self.has_own_threads() {
            return Ok(RequestHandle::completed(f(self)));
        }
        let pool = self.default_pool()?;
        let owner = Arc::clone(self);
        pool.submit_request(move || f(&owner))
    }

    /// Submit a typed request on an explicitly named pool.
    pub fn handle_request_on<T, F>(
        self: &Arc<Self>,
        pool: impl Into<PoolRef>,
        f: F,
    ) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.ensure_started()?;
        let pool = self.pool(pool)?;
        let owner = Arc::clone(self);
        pool.submit_request(move || f(&owner))
    }

    /// Submit a typed request and block until its result or failure is
    /// available.
    pub fn request_sync<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.handle_request(f)?.get()
    }

    /// Run a task once after `delay` on the standard schedulable pool.
    pub fn schedule_task<F>(self: &Arc<Self>, delay: Duration, f: F) -> Result<TaskHandle>
    where
        F: FnOnce(&Arc<Component>) + Send + 'static,
    {
        self.ensure_started()?;
        let pool = self.default_schedulable_pool()?;
        let owner = Arc::clone(self);
        pool.schedule_task(delay, move || f(&owner))
    }

    /// Run a task once after `delay` on an explicitly named pool, which
    /// must be schedulable.
    pub fn schedule_task_on<F>(
        self: &Arc<Self>,
        pool: impl Into<PoolRef>,
        delay: Duration,
        f: F,
    ) -> Result<TaskHandle>
    where
        F: FnOnce(&Arc<Component>) + Send + 'static,
    {
        self.ensure_started()?;
        let pool = self.pool(pool)?;
        let owner = Arc::clone(self);
        pool.schedule_task(delay, move || f(&owner))
    }

    /// Submit a typed request to run once after `delay` on the standard
    /// schedulable pool.
    pub fn schedule_request<T, F>(
        self: &Arc<Self>,
        delay: Duration,
        f: F,
    ) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.ensure_started()?;
        let pool = self.default_schedulable_pool()?;
        let owner = Arc::clone(self);
        pool.schedule_request(delay, move || f(&owner))
    }

    /// Submit a typed request to run once after `delay` on an explicitly
    /// named pool, which must be schedulable.
    pub fn schedule_request_on<T, F>(
        self: &Arc<Self>,
        pool: impl Into<PoolRef>,
        delay: Duration,
        f: F,
    ) -> Result<RequestHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.ensure_started()?;
        let pool = self.pool(pool)?;
        let owner = Arc::clone(self);
        pool.schedule_request(delay, move || f(&owner))
    }

    /// Schedule a request and block until its result or failure is
    /// available.
    pub fn schedule_request_sync<T, F>(self: &Arc<Self>, delay: Duration, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Component>) -> Result<T> + Send + 'static,
    {
        self.schedule_request(delay, f)?.get()
    }

    /// Run `f` repeatedly at a fixed rate: run `k` starts at
    /// `initial_delay + k · period`. Repeats of the same task never
    /// overlap; a slow run delays the next. An uncaught failure halts
    /// further repeats.
    pub fn schedule_task_at_fixed_rate<F>(
        self: &Arc<Self>,
        initial_delay: Duration,
        period: Duration,
        f: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn(&Arc<Component>) + Send + Sync + 'static,
    {
        self.ensure_started()?;
        let pool = self.default_schedulable_pool()?;
        let owner = Arc::clone(self);
        pool.schedule_at_fixed_rate(initial_delay, period, move || f(&owner))
    }

    /// Like [`Component::schedule_task_at_fixed_rate`], on an explicitly
    /// named schedulable pool.
    pub fn schedule_task_at_fixed_rate_on<F>(
        self: &Arc<Self>,
        pool: impl Into<PoolRef>,
        initial_delay: Duration,
        period: Duration,
        f: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn(&Arc<Component>) + Send + Sync + 'static,
    {
        self.ensure_started()?;
        let pool = self.pool(pool)?;
        let owner = Arc::clone(self);
        pool.schedule_at_fixed_rate(initial_delay, period, move || f(&owner))
    }

    /// Run `f` repeatedly with a fixed delay: each run starts `delay`
    /// after the previous run's end. An uncaught failure halts further
    /// repeats.
    pub fn schedule_task_with_fixed_delay<F>(
        self: &Arc<Self>,
        initial_delay: Duration,
        delay: Duration,
        f: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn(&Arc<Component>) + Send + Sync + 'static,
    {
        self.ensure_started()?;
        let pool = self.default_schedulable_pool()?;
        let owner = Arc::clone(self);
        pool.schedule_with_fixed_delay(initial_delay, delay, move || f(&owner))
    }

    /// Like [`Component::schedule_task_with_fixed_delay`], on an
    /// explicitly named schedulable pool.
    pub fn schedule_task_with_fixed_delay_on<F>(
        self: &Arc<Self>,
        pool: impl Into<PoolRef>,
        initial_delay: Duration,
        delay: Duration,
        f: F,
    ) -> Result<PeriodicHandle>
    where
        F: Fn(&Arc<Component>) + Send + Sync + 'static,
    {
        self.ensure_started()?;
        let pool = self.pool(pool)?;
        let owner = Arc::clone(self);
        pool.schedule_with_fixed_delay(initial_delay, delay, move || f(&owner))
    }
}
