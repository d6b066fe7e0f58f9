//! In-memory usage accounting.
//!
//! [`UsageLedger`] tracks bytes used per principal and answers
//! [`UsageAccounting`] requests from that table. Answers are always posted
//! as a separate task on the coordinating context.
//!
//! # Holding Reports
//!
//! [`UsageLedger::hold`] parks reports instead of posting them, until
//! [`UsageLedger::release`]. This lets a caller act between "request
//! issued" and "callback fired", e.g. to shut a context down mid-flight.

use crate::accounting::{AccountingError, UsageAccounting, UsageCallback, UsageRequest, UsageResult};
use crate::config::AccountingConfig;
use crate::context::ContextHandle;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use smgr_types::Principal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One row of the site-data listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteUsage {
    pub principal: Principal,
    pub usage: u64,
    pub quota: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Site {
    usage: u64,
    quota: Option<u64>,
}

type HeldReport = (Arc<dyn UsageCallback>, UsageResult);

/// In-memory [`UsageAccounting`].
///
/// # Example
///
/// ```
/// use smgr_runtime::components::UsageLedger;
/// use smgr_runtime::context::ExecutionContext;
/// use smgr_types::Principal;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = ExecutionContext::spawn("coordinator");
/// let ledger = UsageLedger::new(coordinator.handle(), 1024);
/// let site = Principal::origin("https://example.com").unwrap();
///
/// ledger.record_usage(&site, 100);
/// ledger.record_usage(&site, 20);
///
/// let sites = ledger.sites();
/// assert_eq!(sites[0].usage, 120);
/// assert_eq!(sites[0].quota, 1024);
/// # }
/// ```
pub struct UsageLedger {
    coordinator: ContextHandle,
    default_quota: u64,
    sites: RwLock<HashMap<Principal, Site>>,
    failures: RwLock<HashMap<Principal, u32>>,
    held: Mutex<Option<Vec<HeldReport>>>,
}

impl UsageLedger {
    /// Creates an empty ledger answering on `coordinator`.
    #[must_use]
    pub fn new(coordinator: ContextHandle, default_quota: u64) -> Self {
        Self {
            coordinator,
            default_quota,
            sites: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            held: Mutex::new(None),
        }
    }

    /// Creates a ledger from configuration.
    #[must_use]
    pub fn from_config(coordinator: ContextHandle, config: &AccountingConfig) -> Self {
        Self::new(coordinator, config.default_quota)
    }

    #[must_use]
    pub fn default_quota(&self) -> u64 {
        self.default_quota
    }

    /// Adds `bytes` to the principal's usage.
    pub fn record_usage(&self, principal: &Principal, bytes: u64) {
        let mut sites = self.sites.write();
        let site = sites.entry(principal.clone()).or_default();
        site.usage = site.usage.saturating_add(bytes);
    }

    /// Sets the principal's usage.
    pub fn set_usage(&self, principal: &Principal, bytes: u64) {
        self.sites.write().entry(principal.clone()).or_default().usage = bytes;
    }

    /// Overrides the quota for one principal.
    pub fn set_quota(&self, principal: &Principal, quota: u64) {
        self.sites.write().entry(principal.clone()).or_default().quota = Some(quota);
    }

    /// Makes every lookup for `principal` fail with `code`.
    pub fn fail_with(&self, principal: &Principal, code: u32) {
        self.failures.write().insert(principal.clone(), code);
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, principal: &Principal) {
        self.failures.write().remove(principal);
    }

    /// Deletes the principal's data. Returns the bytes freed, if any.
    pub fn clear(&self, principal: &Principal) -> Option<u64> {
        let removed = self.sites.write().remove(principal).map(|s| s.usage);
        if let Some(bytes) = removed {
            debug!(principal = %principal, bytes, "site data cleared");
        }
        removed
    }

    /// Lists principals with stored data, largest first.
    #[must_use]
    pub fn sites(&self) -> Vec<SiteUsage> {
        let mut sites: Vec<_> = self
            .sites
            .read()
            .iter()
            .map(|(principal, site)| SiteUsage {
                principal: principal.clone(),
                usage: site.usage,
                quota: site.quota.unwrap_or(self.default_quota),
            })
            .collect();
        sites.sort_by(|a, b| {
            b.usage
                .cmp(&a.usage)
                .then_with(|| a.principal.to_string().cmp(&b.principal.to_string()))
        });
        sites
    }

    /// Total bytes across all principals.
    #[must_use]
    pub fn total_usage(&self) -> u64 {
        self.sites
            .read()
            .values()
            .fold(0u64, |acc, s| acc.saturating_add(s.usage))
    }

    /// Parks reports until [`release`](Self::release).
    pub fn hold(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            *held = Some(Vec::new());
        }
    }

    /// Posts parked reports and stops holding. Returns how many were posted.
    pub fn release(&self) -> usize {
        let reports = self.held.lock().take().unwrap_or_default();
        let mut posted = 0;
        for (callback, result) in reports {
            match self.post(callback, result) {
                Ok(()) => posted += 1,
                Err(e) => warn!(error = %e, "held report dropped"),
            }
        }
        posted
    }

    /// Number of parked reports.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().as_ref().map_or(0, Vec::len)
    }

    fn report(&self, principal: &Principal) -> UsageResult {
        if let Some(code) = self.failures.read().get(principal).copied() {
            return UsageResult::failure(code);
        }
        let sites = self.sites.read();
        let site = sites.get(principal).copied().unwrap_or_default();
        UsageResult::success(site.usage, site.quota.unwrap_or(self.default_quota))
    }

    fn post(
        &self,
        callback: Arc<dyn UsageCallback>,
        result: UsageResult,
    ) -> Result<(), AccountingError> {
        self.coordinator
            .dispatch(move || callback.on_usage_result(result))
            .map_err(|e| AccountingError::Unavailable(e.to_string()))
    }
}

impl UsageAccounting for UsageLedger {
    fn get_usage_for_principal(
        &self,
        principal: &Principal,
        callback: Arc<dyn UsageCallback>,
    ) -> Result<UsageRequest, AccountingError> {
        let request = UsageRequest::new(principal.clone());
        let result = self.report(principal);

        {
            let mut held = self.held.lock();
            if let Some(queue) = held.as_mut() {
                debug!(request = %request.id(), principal = %principal, "usage report held");
                queue.push((callback, result));
                return Ok(request);
            }
        }

        self.post(callback, result)?;
        debug!(
            request = %request.id(),
            principal = %principal,
            code = result.code,
            "usage report posted"
        );
        Ok(request)
    }
}

impl std::fmt::Debug for UsageLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageLedger")
            .field("coordinator", &self.coordinator.id())
            .field("default_quota", &self.default_quota)
            .field("sites", &self.sites.read().len())
            .finish_non_exhaustive()
    }
}
