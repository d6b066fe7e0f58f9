//! Integration tests for usage estimates.
//!
//! Tests the complete flow: worker → coordinator → ledger → worker

mod common;

use common::{site, Harness, QUOTA};
use parking_lot::Mutex;
use smgr_runtime::context::ContextHandle;
use smgr_runtime::{
    Abandoned, AccountingError, Completion, ExecutionContext, Principal, PromptQueue,
    RequestFailure, RequestOutcome, StorageEstimate, StorageManager, UsageAccounting,
    UsageCallback, UsageRequest, UsageResult,
};
use std::sync::Arc;

/// Test basic cross-context estimate
#[tokio::test]
async fn estimate_from_worker() {
    let h = Harness::new();
    h.ledger.record_usage(&site("a.test"), 250);

    let outcome = h.estimate(site("a.test")).await.await;

    assert_eq!(
        outcome,
        Ok(Ok(StorageEstimate {
            usage: 250,
            quota: QUOTA
        }))
    );
    // The proxy unregistered its shutdown hook once it delivered.
    assert_eq!(h.worker.handle().shutdown_hook_count(), 0);
}

/// Accounting failure code 7 reaches the caller as data
#[tokio::test]
async fn failure_code_is_delivered() {
    let h = Harness::new();
    h.ledger.fail_with(&site("a.test"), 7);

    let outcome = h.estimate(site("a.test")).await.await;

    assert_eq!(outcome, Ok(Err(RequestFailure::Accounting(7))));
}

/// Initiator shuts down after the accounting call, before the callback
#[tokio::test]
async fn initiator_teardown_before_callback() {
    let h = Harness::new();
    h.ledger.hold();

    let completion = h.estimate(site("a.test")).await;
    let request = completion.request_id();
    h.drain_coordinator().await;
    assert_eq!(h.ledger.held_count(), 1);

    h.worker.shutdown();
    assert_eq!(h.ledger.release(), 1);
    h.drain_coordinator().await;

    assert_eq!(completion.await, Err(Abandoned(request)));
}

/// Initiator shuts down before the coordinator runs the work
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initiator_teardown_before_dispatch_runs() {
    let h = Harness::new();
    h.ledger.hold();
    let gate = h.park_coordinator();

    let completion = h.estimate(site("a.test")).await;
    let request = completion.request_id();
    h.worker.shutdown();
    gate.send(()).unwrap();
    h.drain_coordinator().await;

    assert_eq!(completion.await, Err(Abandoned(request)));
    // The accounting call was skipped.
    assert_eq!(h.ledger.held_count(), 0);
}

/// A closed coordinator settles the request with DispatchFailed
#[tokio::test]
async fn closed_coordinator_settles_dispatch_failure() {
    let h = Harness::new();
    h.coordinator.shutdown();

    let outcome = h.estimate(site("a.test")).await.await;

    assert_eq!(outcome, Ok(Err(RequestFailure::DispatchFailed)));
}

/// Accounting that records whether the completion was settled by the
/// time its own callback task finished.
struct SameTaskRecorder {
    coordinator: ContextHandle,
    slot: Arc<Mutex<Option<Completion<RequestOutcome>>>>,
    seen: Arc<Mutex<Option<Result<Option<RequestOutcome>, Abandoned>>>>,
}

impl UsageAccounting for SameTaskRecorder {
    fn get_usage_for_principal(
        &self,
        principal: &Principal,
        callback: Arc<dyn UsageCallback>,
    ) -> Result<UsageRequest, AccountingError> {
        let slot = Arc::clone(&self.slot);
        let seen = Arc::clone(&self.seen);
        self.coordinator
            .dispatch(move || {
                callback.on_usage_result(UsageResult::success(1, 2));
                if let Some(completion) = slot.lock().as_mut() {
                    *seen.lock() = Some(completion.try_observe());
                }
            })
            .map_err(|e| AccountingError::Unavailable(e.to_string()))?;
        Ok(UsageRequest::new(principal.clone()))
    }
}

/// Coordinator as caller: no proxy, settled inside the callback task
#[tokio::test]
async fn same_context_settles_in_callback_task() {
    let coordinator = ExecutionContext::spawn("coordinator");
    let slot = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(None));
    let recorder = SameTaskRecorder {
        coordinator: coordinator.handle(),
        slot: Arc::clone(&slot),
        seen: Arc::clone(&seen),
    };
    let manager = StorageManager::builder(
        coordinator.handle(),
        Arc::new(recorder),
        Arc::new(PromptQueue::new()),
    )
    .build();

    let handle = coordinator.handle();
    let task_slot = Arc::clone(&slot);
    coordinator
        .handle()
        .invoke(move || {
            let completion = manager.request_usage_estimate(Principal::System).unwrap();
            // No proxy means no shutdown hook on the caller's context.
            assert_eq!(handle.shutdown_hook_count(), 0);
            *task_slot.lock() = Some(completion);
        })
        .await
        .unwrap();
    coordinator.handle().invoke(|| ()).await.unwrap();

    assert_eq!(
        *seen.lock(),
        Some(Ok(Some(Ok(StorageEstimate { usage: 1, quota: 2 }))))
    );
}

/// Many requests from many contexts each settle exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_settle_once() {
    let h = Harness::new();
    let workers: Vec<_> = (0..4)
        .map(|i| ExecutionContext::spawn(format!("worker-{i}")))
        .collect();

    for i in 0..20u64 {
        h.ledger.set_usage(&site(&format!("s{i}.test")), i);
    }

    let mut pending = Vec::new();
    for i in 0..20u64 {
        let manager = h.manager.clone();
        let worker = &workers[(i % 4) as usize];
        let completion = worker
            .handle()
            .invoke(move || manager.request_usage_estimate(site(&format!("s{i}.test"))))
            .await
            .unwrap()
            .unwrap();
        pending.push((i, completion));
    }

    for (i, completion) in pending {
        assert_eq!(
            completion.await,
            Ok(Ok(StorageEstimate {
                usage: i,
                quota: QUOTA
            }))
        );
    }
}

/// Shutting initiators down while requests race to deliver never panics
/// and never settles an abandoned request
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn teardown_races_are_benign() {
    let h = Harness::new();

    for round in 0..25 {
        let worker = ExecutionContext::spawn(format!("racer-{round}"));
        let manager = h.manager.clone();
        let completion = worker
            .handle()
            .invoke(move || manager.request_usage_estimate(site("race.test")))
            .await
            .unwrap()
            .unwrap();

        if round % 2 == 0 {
            worker.shutdown();
        }

        match completion.await {
            Ok(outcome) => {
                assert!(round % 2 == 1 || outcome.is_ok(), "round {round}");
            }
            Err(Abandoned(_)) => assert_eq!(round % 2, 0, "round {round}"),
        }
    }

    h.drain_coordinator().await;
}
