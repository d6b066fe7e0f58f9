//! Usage-estimate resolution.
//!
//! [`EstimateResolver`] runs on the coordinating context. It issues the
//! accounting request, turns the raw report into a [`RequestOutcome`] and
//! hands it back to the initiating context.
//!
//! ```text
//! start() ──► UsageAccounting::get_usage_for_principal(self)
//!   │                 │
//!   │ Err(e)          │ later: on_usage_result(UsageResult)
//!   ▼                 ▼
//! failure outcome ──► store outcome ──► deliver
//!                                         ├─ Direct:  settle now
//!                                         └─ Proxied: schedule_finish ──► (initiating ctx)
//!                                                      complete(outcome)
//! ```

use crate::accounting::{UsageAccounting, UsageCallback, UsageResult};
use crate::bridge::{BridgeError, CompletionHandle, ContextProxy};
use crate::outcome::{RequestFailure, RequestOutcome, StorageEstimate};
use parking_lot::Mutex;
use smgr_types::{Principal, RequestId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

enum Delivery {
    /// Caller runs on the coordinating context.
    Direct(CompletionHandle<RequestOutcome>),
    /// Caller runs elsewhere; route through the proxy.
    Proxied(Arc<ContextProxy<RequestOutcome>>),
}

/// Resolves one usage-estimate request.
pub struct EstimateResolver {
    request: RequestId,
    principal: Principal,
    delivery: Delivery,
    outcome: Mutex<Option<RequestOutcome>>,
    reported: AtomicBool,
}

impl EstimateResolver {
    /// Creates a resolver that settles `completion` directly.
    ///
    /// Use when the caller runs on the coordinating context.
    #[must_use]
    pub fn direct(principal: Principal, completion: CompletionHandle<RequestOutcome>) -> Arc<Self> {
        Arc::new(Self {
            request: completion.request_id(),
            principal,
            delivery: Delivery::Direct(completion),
            outcome: Mutex::new(None),
            reported: AtomicBool::new(false),
        })
    }

    /// Creates a resolver that delivers through `proxy`.
    #[must_use]
    pub fn proxied(principal: Principal, proxy: Arc<ContextProxy<RequestOutcome>>) -> Arc<Self> {
        Arc::new(Self {
            request: proxy.request_id(),
            principal,
            delivery: Delivery::Proxied(proxy),
            outcome: Mutex::new(None),
            reported: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The outcome captured from the accounting report, once it arrived.
    #[must_use]
    pub fn outcome(&self) -> Option<RequestOutcome> {
        *self.outcome.lock()
    }

    /// Issues the accounting request with this resolver as the callback.
    ///
    /// If the request cannot be issued, a failure outcome is delivered
    /// through the normal path.
    pub fn start(self: &Arc<Self>, accounting: &dyn UsageAccounting) {
        let callback: Arc<dyn UsageCallback> = Arc::clone(self) as Arc<dyn UsageCallback>;
        match accounting.get_usage_for_principal(&self.principal, callback) {
            Ok(issued) => debug!(
                request = %self.request,
                accounting_request = %issued.id(),
                principal = %self.principal,
                "usage request issued"
            ),
            Err(e) => {
                warn!(
                    request = %self.request,
                    principal = %self.principal,
                    error = %e,
                    "usage request could not be issued"
                );
                Arc::clone(self).on_usage_result(UsageResult::failure(e.result_code()));
            }
        }
    }

    fn deliver(self: Arc<Self>) {
        match &self.delivery {
            Delivery::Direct(completion) => {
                let outcome = self.final_outcome();
                if let Err(e) = completion.settle(outcome) {
                    warn!(request = %self.request, error = %e, "direct settle failed");
                }
            }
            Delivery::Proxied(proxy) => {
                let resolver = Arc::clone(&self);
                match proxy.schedule_finish(move |proxy| {
                    let outcome = resolver.final_outcome();
                    if let Err(e) = proxy.complete(outcome) {
                        debug!(
                            request = %resolver.request,
                            error = %e,
                            "finishing step found nothing to settle"
                        );
                    }
                }) {
                    Ok(()) => debug!(request = %self.request, "finishing task scheduled"),
                    Err(BridgeError::TargetGone) => {
                        debug!(
                            request = %self.request,
                            "initiating context gone, dropping outcome"
                        );
                    }
                    Err(e) => warn!(request = %self.request, error = %e, "delivery failed"),
                }
            }
        }
    }

    fn final_outcome(&self) -> RequestOutcome {
        self.outcome()
            .unwrap_or(Err(RequestFailure::Incomplete("outcome")))
    }
}

impl UsageCallback for EstimateResolver {
    fn on_usage_result(self: Arc<Self>, result: UsageResult) {
        if self.reported.swap(true, Ordering::AcqRel) {
            warn!(request = %self.request, code = result.code, "duplicate usage report ignored");
            return;
        }

        let outcome = outcome_from(result);
        debug!(request = %self.request, ?outcome, "usage report received");
        *self.outcome.lock() = Some(outcome);
        self.deliver();
    }
}

/// Converts a raw report into an outcome.
///
/// A success report missing usage or quota is a failure.
fn outcome_from(result: UsageResult) -> RequestOutcome {
    if !result.is_success() {
        return Err(RequestFailure::Accounting(result.code));
    }
    let usage = result.usage.ok_or(RequestFailure::Incomplete("usage"))?;
    let quota = result.quota.ok_or(RequestFailure::Incomplete("quota"))?;
    Ok(StorageEstimate { usage, quota })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{AccountingError, UsageRequest};
    use crate::context::ExecutionContext;
    use crate::outcome::result_code;

    /// Answers inline with a fixed report, or refuses to issue.
    struct Fixed(Result<UsageResult, AccountingError>);

    impl UsageAccounting for Fixed {
        fn get_usage_for_principal(
            &self,
            principal: &Principal,
            callback: Arc<dyn UsageCallback>,
        ) -> Result<UsageRequest, AccountingError> {
            let result = self.0.clone()?;
            callback.on_usage_result(result);
            Ok(UsageRequest::new(principal.clone()))
        }
    }

    fn site() -> Principal {
        Principal::origin("https://example.com").unwrap()
    }

    fn direct() -> (
        Arc<EstimateResolver>,
        crate::bridge::Completion<RequestOutcome>,
    ) {
        let (handle, completion) =
            CompletionHandle::new(RequestId::new(), smgr_types::ContextId::named("caller"));
        (EstimateResolver::direct(site(), handle), completion)
    }

    #[test]
    fn success_settles_estimate() {
        let (resolver, mut completion) = direct();
        resolver.start(&Fixed(Ok(UsageResult::success(100, 1000))));

        let expected = Ok(StorageEstimate {
            usage: 100,
            quota: 1000,
        });
        assert_eq!(completion.try_observe(), Ok(Some(expected)));
        assert_eq!(resolver.outcome(), Some(expected));
    }

    #[test]
    fn failure_code_is_carried() {
        let (resolver, mut completion) = direct();
        resolver.start(&Fixed(Ok(UsageResult::failure(7))));
        assert_eq!(
            completion.try_observe(),
            Ok(Some(Err(RequestFailure::Accounting(7))))
        );
    }

    #[test]
    fn missing_field_is_failure() {
        let (resolver, mut completion) = direct();
        resolver.start(&Fixed(Ok(UsageResult {
            code: 0,
            usage: Some(1),
            quota: None,
        })));
        assert_eq!(
            completion.try_observe(),
            Ok(Some(Err(RequestFailure::Incomplete("quota"))))
        );
    }

    #[test]
    fn issue_failure_is_delivered_as_outcome() {
        let (resolver, mut completion) = direct();
        resolver.start(&Fixed(Err(AccountingError::Rejected {
            principal: "https://example.com".into(),
            code: 12,
        })));
        assert_eq!(
            completion.try_observe(),
            Ok(Some(Err(RequestFailure::Accounting(12))))
        );
    }

    #[test]
    fn rejection_with_code_zero_is_a_failure() {
        let (resolver, mut completion) = direct();
        resolver.start(&Fixed(Err(AccountingError::Rejected {
            principal: "https://example.com".into(),
            code: 0,
        })));
        assert_eq!(
            completion.try_observe(),
            Ok(Some(Err(RequestFailure::Accounting(result_code::UNAVAILABLE))))
        );
    }

    #[test]
    fn duplicate_report_is_ignored() {
        let (resolver, mut completion) = direct();
        resolver.start(&Fixed(Ok(UsageResult::success(1, 2))));
        Arc::clone(&resolver).on_usage_result(UsageResult::failure(9));

        assert_eq!(
            completion.try_observe(),
            Ok(Some(Ok(StorageEstimate { usage: 1, quota: 2 })))
        );
    }

    #[tokio::test]
    async fn proxied_delivery_settles_on_initiator() {
        let initiator = ExecutionContext::spawn("initiator");
        let (handle, completion) = CompletionHandle::new(RequestId::new(), initiator.id());
        let proxy = ContextProxy::create(&initiator.handle(), handle).unwrap();

        let resolver = EstimateResolver::proxied(site(), Arc::clone(&proxy));
        resolver.start(&Fixed(Ok(UsageResult::success(3, 4))));

        assert_eq!(
            completion.await,
            Ok(Ok(StorageEstimate { usage: 3, quota: 4 }))
        );
        assert!(proxy.is_torn_down());
    }

    #[tokio::test]
    async fn proxied_delivery_after_teardown_drops_outcome() {
        let initiator = ExecutionContext::spawn("initiator");
        let (handle, completion) = CompletionHandle::new(RequestId::new(), initiator.id());
        let proxy = ContextProxy::create(&initiator.handle(), handle).unwrap();
        let request = proxy.request_id();

        initiator.shutdown();
        let resolver = EstimateResolver::proxied(site(), proxy);
        resolver.start(&Fixed(Ok(UsageResult::success(3, 4))));

        assert!(resolver.outcome().is_some());
        assert_eq!(completion.await, Err(crate::bridge::Abandoned(request)));
    }
}
