//! The public storage-manager API.
//!
//! # Request Flow
//!
//! ```text
//! caller (initiating ctx)
//!   │ request_usage_estimate(principal)
//!   │   1. current context? ── none/closing ──► Err(ContextUnavailable)
//!   │   2. CompletionHandle + Completion
//!   │   3. same as coordinator? ── yes ──► EstimateResolver::direct, no proxy
//!   │   4. ContextProxy::create
//!   │   5. run_on_coordinator(EstimateResolver::proxied(..).start)
//!   │        └─ DispatchFailed ──► settle Err(RequestFailure::DispatchFailed)
//!   ▼
//! Ok(Completion) ─── await ───► RequestOutcome
//! ```
//!
//! `request_persistent_storage` follows the same steps with a
//! [`PersistRequest`] in place of the resolver.

use crate::accounting::UsageAccounting;
use crate::bridge::{BridgeError, Completion, CompletionHandle, ContextProxy, CoordinatingDispatch};
use crate::config::SmgrConfig;
use crate::context::ContextHandle;
use crate::estimate::EstimateResolver;
use crate::outcome::{PersistOutcome, RequestFailure, RequestOutcome};
use crate::permission::{PermissionPrompt, PersistRequest};
use smgr_auth::{DefaultPersistPolicy, PermissionStore, PersistPolicy};
use smgr_types::{ErrorCode, Principal, RequestId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned synchronously by [`StorageManager`] entry points.
///
/// Everything else is reported through the returned
/// [`Completion`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The manager is disabled by configuration.
    #[error("storage manager is disabled")]
    Disabled,

    /// The request could not be set up.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "STORAGE_DISABLED",
            Self::Bridge(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Disabled => false,
            Self::Bridge(e) => e.is_recoverable(),
        }
    }
}

struct Inner {
    enabled: bool,
    dispatch: CoordinatingDispatch,
    accounting: Arc<dyn UsageAccounting>,
    prompt: Arc<dyn PermissionPrompt>,
    store: Option<Arc<dyn PermissionStore>>,
    policy: Arc<dyn PersistPolicy>,
}

/// Entry point for storage requests.
///
/// Cheap to clone; clones share the coordinator and collaborators.
///
/// # Example
///
/// ```
/// use smgr_runtime::components::{PromptQueue, UsageLedger};
/// use smgr_runtime::context::ExecutionContext;
/// use smgr_runtime::{StorageEstimate, StorageManager};
/// use smgr_types::Principal;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = ExecutionContext::spawn("coordinator");
/// let worker = ExecutionContext::spawn("worker");
///
/// let ledger = Arc::new(UsageLedger::new(coordinator.handle(), 1000));
/// let site = Principal::origin("https://example.com").unwrap();
/// ledger.record_usage(&site, 10);
///
/// let manager = StorageManager::builder(
///     coordinator.handle(),
///     ledger,
///     Arc::new(PromptQueue::new()),
/// )
/// .build();
///
/// let completion = worker
///     .handle()
///     .invoke(move || manager.request_usage_estimate(site))
///     .await
///     .unwrap()
///     .unwrap();
///
/// assert_eq!(
///     completion.await.unwrap(),
///     Ok(StorageEstimate { usage: 10, quota: 1000 })
/// );
/// # }
/// ```
#[derive(Clone)]
pub struct StorageManager {
    inner: Arc<Inner>,
}

impl StorageManager {
    /// Starts building a manager coordinated on `coordinator`.
    #[must_use]
    pub fn builder(
        coordinator: ContextHandle,
        accounting: Arc<dyn UsageAccounting>,
        prompt: Arc<dyn PermissionPrompt>,
    ) -> StorageManagerBuilder {
        StorageManagerBuilder {
            coordinator,
            accounting,
            prompt,
            store: None,
            policy: None,
            config: SmgrConfig::default(),
        }
    }

    /// Returns the coordinating context.
    #[must_use]
    pub fn coordinator(&self) -> &ContextHandle {
        self.inner.dispatch.coordinator()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Asks for the usage and quota of `principal`.
    ///
    /// Must be called from an execution context; the outcome is settled
    /// on that context.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Disabled`] if the manager is disabled
    /// - [`BridgeError::ContextUnavailable`] if not called from a live context
    pub fn request_usage_estimate(
        &self,
        principal: Principal,
    ) -> Result<Completion<RequestOutcome>, StorageError> {
        let initiator = self.begin()?;
        let (handle, completion) = CompletionHandle::new(RequestId::new(), initiator.id());
        let request = handle.request_id();
        debug!(
            %request,
            principal = %principal,
            initiator = %initiator.id(),
            "usage estimate requested"
        );

        let accounting = Arc::clone(&self.inner.accounting);

        if self.inner.dispatch.is_on_coordinator() {
            EstimateResolver::direct(principal, handle).start(accounting.as_ref());
            return Ok(completion);
        }

        let proxy = ContextProxy::create(&initiator, handle)?;
        let work_proxy = Arc::clone(&proxy);
        let work = move || {
            if work_proxy.is_torn_down() {
                debug!(request = %work_proxy.request_id(), "initiator gone before accounting call");
                return;
            }
            EstimateResolver::proxied(principal, work_proxy).start(accounting.as_ref());
        };

        if let Err(e) = self.inner.dispatch.run_on_coordinator(work) {
            warn!(%request, error = %e, "could not reach coordinator");
            if let Err(e) = proxy.complete(Err(RequestFailure::DispatchFailed)) {
                debug!(%request, error = %e, "dispatch failure not delivered");
            }
        }
        Ok(completion)
    }

    /// Asks whether `principal` may keep its storage persistently.
    ///
    /// Must be called from an execution context; the outcome is settled
    /// on that context.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Disabled`] if the manager is disabled
    /// - [`BridgeError::ContextUnavailable`] if not called from a live context
    pub fn request_persistent_storage(
        &self,
        principal: Principal,
    ) -> Result<Completion<PersistOutcome>, StorageError> {
        let initiator = self.begin()?;
        let (handle, completion) = CompletionHandle::new(RequestId::new(), initiator.id());
        let request = handle.request_id();
        debug!(
            %request,
            principal = %principal,
            initiator = %initiator.id(),
            "persistent storage requested"
        );

        let store = self.inner.store.clone();
        let machine = if self.inner.dispatch.is_on_coordinator() {
            PersistRequest::local(principal, &initiator, handle, store)
        } else {
            let proxy = ContextProxy::create(&initiator, handle)?;
            PersistRequest::proxied(principal, proxy, store)
        };

        let policy = Arc::clone(&self.inner.policy);
        let prompt = Arc::clone(&self.inner.prompt);
        let work_machine = Arc::clone(&machine);
        let work = move || work_machine.run(policy.as_ref(), prompt.as_ref());

        if let Err(e) = self.inner.dispatch.run_on_coordinator(work) {
            warn!(%request, error = %e, "could not reach coordinator");
            machine.abort(RequestFailure::DispatchFailed);
        }
        Ok(completion)
    }

    fn begin(&self) -> Result<ContextHandle, StorageError> {
        if !self.inner.enabled {
            return Err(StorageError::Disabled);
        }
        ContextHandle::current()
            .filter(|c| !c.is_closing())
            .ok_or(StorageError::Bridge(BridgeError::ContextUnavailable))
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("coordinator", &self.inner.dispatch.coordinator_id())
            .field("enabled", &self.inner.enabled)
            .field("has_store", &self.inner.store.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`StorageManager`].
pub struct StorageManagerBuilder {
    coordinator: ContextHandle,
    accounting: Arc<dyn UsageAccounting>,
    prompt: Arc<dyn PermissionPrompt>,
    store: Option<Arc<dyn PermissionStore>>,
    policy: Option<Arc<dyn PersistPolicy>>,
    config: SmgrConfig,
}

impl StorageManagerBuilder {
    /// Applies `enabled` and the prompt settings from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &SmgrConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Sets the store consulted when a prompt is dismissed.
    ///
    /// Without a store, a dismissed prompt delivers
    /// [`Prompt`](smgr_auth::PersistentStoragePermission::Prompt).
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PermissionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the fast-path policy built from the config.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PersistPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn build(self) -> StorageManager {
        let policy: Arc<dyn PersistPolicy> = match self.policy {
            Some(policy) => policy,
            None => Arc::new(DefaultPersistPolicy::new(self.config.prompt)),
        };
        StorageManager {
            inner: Arc::new(Inner {
                enabled: self.config.enabled,
                dispatch: CoordinatingDispatch::new(self.coordinator),
                accounting: self.accounting,
                prompt: self.prompt,
                store: self.store,
                policy,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{PromptQueue, UsageLedger};
    use crate::context::ExecutionContext;
    use smgr_types::assert_error_code;

    fn manager(coordinator: &ExecutionContext, config: &SmgrConfig) -> StorageManager {
        let ledger = Arc::new(UsageLedger::new(coordinator.handle(), 100));
        StorageManager::builder(coordinator.handle(), ledger, Arc::new(PromptQueue::new()))
            .with_config(config)
            .build()
    }

    #[test]
    fn error_codes() {
        assert_error_code(&StorageError::Disabled, "STORAGE_");
        assert_error_code(
            &StorageError::from(BridgeError::ContextUnavailable),
            "BRIDGE_",
        );
    }

    #[tokio::test]
    async fn outside_context_is_unavailable() {
        let coordinator = ExecutionContext::spawn("coordinator");
        let manager = manager(&coordinator, &SmgrConfig::default());

        let err = manager.request_usage_estimate(Principal::System).unwrap_err();
        assert_eq!(err, StorageError::Bridge(BridgeError::ContextUnavailable));

        let err = manager
            .request_persistent_storage(Principal::System)
            .unwrap_err();
        assert_eq!(err, StorageError::Bridge(BridgeError::ContextUnavailable));
    }

    #[tokio::test]
    async fn disabled_manager_rejects() {
        let coordinator = ExecutionContext::spawn("coordinator");
        let config = SmgrConfig {
            enabled: false,
            ..SmgrConfig::default()
        };
        let manager = manager(&coordinator, &config);
        assert!(!manager.is_enabled());

        let err = coordinator
            .handle()
            .invoke(move || manager.request_usage_estimate(Principal::System))
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err, StorageError::Disabled);
    }

    #[tokio::test]
    async fn config_prompt_settings_reach_policy() {
        let coordinator = ExecutionContext::spawn("coordinator");
        let worker = ExecutionContext::spawn("worker");
        let mut config = SmgrConfig::default();
        config.prompt.testing = true;
        config.prompt.testing_allow = false;
        let manager = manager(&coordinator, &config);

        let site = Principal::origin("https://example.com").unwrap();
        let completion = worker
            .handle()
            .invoke(move || manager.request_persistent_storage(site))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            completion.await,
            Ok(Ok(smgr_auth::PersistentStoragePermission::Denied))
        );
    }
}
