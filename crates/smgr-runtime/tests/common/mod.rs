//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use smgr_runtime::components::{PromptQueue, UsageLedger};
use smgr_runtime::{
    Completion, ExecutionContext, MemoryPermissionStore, PersistOutcome, Principal,
    RequestOutcome, SmgrConfig, StorageManager,
};
use std::sync::Arc;

/// Quota used by every harness ledger.
pub const QUOTA: u64 = 1000;

/// A coordinator, one worker, the reference collaborators and a manager.
pub struct Harness {
    pub coordinator: ExecutionContext,
    pub worker: ExecutionContext,
    pub ledger: Arc<UsageLedger>,
    pub prompts: Arc<PromptQueue>,
    pub store: Arc<MemoryPermissionStore>,
    pub manager: StorageManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&SmgrConfig::default())
    }

    pub fn with_config(config: &SmgrConfig) -> Self {
        let coordinator = ExecutionContext::spawn("coordinator");
        let worker = ExecutionContext::spawn("worker");
        let ledger = Arc::new(UsageLedger::new(coordinator.handle(), QUOTA));
        let store = Arc::new(MemoryPermissionStore::new());
        let prompts = Arc::new(PromptQueue::with_store(Arc::clone(&store)));

        let manager = StorageManager::builder(
            coordinator.handle(),
            Arc::clone(&ledger) as _,
            Arc::clone(&prompts) as _,
        )
        .with_config(config)
        .with_store(Arc::clone(&store) as _)
        .build();

        Self {
            coordinator,
            worker,
            ledger,
            prompts,
            store,
            manager,
        }
    }

    /// Requests an estimate from the worker context.
    pub async fn estimate(&self, principal: Principal) -> Completion<RequestOutcome> {
        let manager = self.manager.clone();
        self.worker
            .handle()
            .invoke(move || manager.request_usage_estimate(principal))
            .await
            .expect("worker should be running")
            .expect("request should be accepted")
    }

    /// Requests persistent storage from the worker context.
    pub async fn persist(&self, principal: Principal) -> Completion<PersistOutcome> {
        let manager = self.manager.clone();
        self.worker
            .handle()
            .invoke(move || manager.request_persistent_storage(principal))
            .await
            .expect("worker should be running")
            .expect("request should be accepted")
    }

    /// Blocks the coordinator until the returned sender fires or drops.
    ///
    /// Needs a multi-thread runtime.
    pub fn park_coordinator(&self) -> std::sync::mpsc::Sender<()> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.coordinator
            .handle()
            .dispatch(move || {
                tokio::task::block_in_place(|| {
                    let _ = rx.recv();
                });
            })
            .expect("coordinator should be running");
        tx
    }

    /// Waits until every task queued on the coordinator so far has run.
    pub async fn drain_coordinator(&self) {
        self.coordinator
            .handle()
            .invoke(|| ())
            .await
            .expect("coordinator should be running");
    }
}

pub fn site(host: &str) -> Principal {
    Principal::origin(&format!("https://{host}")).expect("valid origin")
}
