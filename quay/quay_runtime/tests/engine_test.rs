//! Integration tests for the task/request engine and the pool registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quay_core::uri::PoolUri;
use quay_runtime::{ComponentBuilder, RuntimeContext, STANDARD_REQUEST_POOL_URI};

#[test]
fn test_passive_component_runs_tasks_synchronously() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    component.start().unwrap();

    assert!(!component.has_own_threads());

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();
    let handle = component
        .run_task(move |_c| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    // The task ran fully before run_task returned.
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(handle.is_done());

    // An already-complete handle cannot be cancelled.
    assert!(!handle.cancel());
}

#[test]
fn test_passive_component_requests_return_inline() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    component.start().unwrap();

    let value = component.request_sync(|_c| Ok(7 * 6)).unwrap();
    assert_eq!(value, 42);
}

#[test]
fn test_engine_requires_started_state() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(1).build().unwrap();

    let result = component.run_task(|_c| {});
    match result {
        Err(e) => assert!(e.is_contract_violation()),
        Ok(_) => panic!("engine accepted work before start"),
    }
}

#[test]
fn test_default_pool_is_the_plain_pool() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx)
        .plain_threads(1)
        .schedulable_threads(1)
        .build()
        .unwrap();
    component.start().unwrap();

    let handle = component.run_task(|_c| {}).unwrap();
    handle.wait();

    let plain = component
        .pool(&PoolUri::new(STANDARD_REQUEST_POOL_URI))
        .unwrap();
    assert!(plain.stats().tasks_queued >= 1);
}

#[test]
fn test_request_on_worker_pool_returns_value() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(2).build().unwrap();
    component.start().unwrap();

    let value = component
        .request_sync(|c| Ok(c.uri().as_str().len()))
        .unwrap();
    assert!(value > 0);
}

#[test]
fn test_request_failure_is_reraised_to_waiter() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(1).build().unwrap();
    component.start().unwrap();

    let result: Result<u32, _> = component.request_sync(|_c| {
        Err(quay_core::error::Error::Runtime("service refused".to_string()))
    });
    match result {
        Err(e) => assert!(e.to_string().contains("service refused")),
        Ok(_) => panic!("expected the failure to be re-raised"),
    }
}

#[test]
fn test_schedule_on_passive_component_is_rejected() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();
    component.start().unwrap();

    let result = component.schedule_task(Duration::from_millis(1), |_c| {});
    match result {
        Err(e) => assert!(e.is_contract_violation()),
        Ok(_) => panic!("passive component accepted a schedule"),
    }
}

#[test]
fn test_schedule_on_plain_pool_is_rejected() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(1).build().unwrap();
    component.start().unwrap();

    let result = component.schedule_task_on(
        &PoolUri::new(STANDARD_REQUEST_POOL_URI),
        Duration::from_millis(1),
        |_c| {},
    );
    match result {
        Err(e) => assert!(e.is_contract_violation()),
        Ok(_) => panic!("plain pool accepted a schedule"),
    }
}

#[test]
fn test_schedule_request_sync_observes_delay() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx)
        .schedulable_threads(1)
        .build()
        .unwrap();
    component.start().unwrap();

    let start = std::time::Instant::now();
    let value = component
        .schedule_request_sync(Duration::from_millis(50), |_c| Ok("later"))
        .unwrap();
    assert_eq!(value, "later");
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_pool_bijection_and_slot_reuse() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).build().unwrap();

    let io = PoolUri::new("quay:pool:io");
    let index = component.create_pool(io.clone(), 1, false).unwrap();

    // indexOf(uri) is valid and pool(indexOf(uri)).uri == uri.
    assert_eq!(component.pool_index(&io).unwrap(), index);
    assert_eq!(component.pool(index).unwrap().uri(), &io);
    assert_eq!(component.pool(&io).unwrap().uri(), &io);

    // After shutdown the URI is gone and the slot is reused.
    let pool = component.shutdown_pool(&io).unwrap();
    assert!(pool.await_termination(Duration::from_secs(2)));
    assert!(component.pool_index(&io).unwrap_err().is_contract_violation());
    assert!(component.pool(index).unwrap_err().is_contract_violation());

    let replacement = PoolUri::new("quay:pool:io2");
    let new_index = component.create_pool(replacement.clone(), 1, false).unwrap();
    assert_eq!(new_index, index);
    assert_eq!(component.pool(new_index).unwrap().uri(), &replacement);
}

#[test]
fn test_duplicate_and_zero_thread_pools_are_rejected() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(1).build().unwrap();

    let dup = component.create_pool(PoolUri::new(STANDARD_REQUEST_POOL_URI), 1, false);
    assert!(dup.unwrap_err().is_contract_violation());

    let zero = component.create_pool(PoolUri::new("quay:pool:empty"), 0, false);
    assert!(zero.unwrap_err().is_contract_violation());
}

#[test]
fn test_unknown_pool_reference_is_contract_violation() {
    let ctx = RuntimeContext::new();
    let component = ComponentBuilder::new(&ctx).plain_threads(1).build().unwrap();
    component.start().unwrap();

    let result = component.run_task_on(99usize, |_c| {});
    assert!(result.unwrap_err().is_contract_violation());
}
