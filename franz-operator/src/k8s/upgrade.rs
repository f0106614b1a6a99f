//! Rolling upgrade coordinator.
//!
//! Sequences restarts of brokers whose applied configuration is stale without exceeding the
//! concurrency budget. Bounding concurrent restarts keeps the cluster's in-flight quorum above
//! its write-availability floor; the failure-threshold circuit breaker stops a bad configuration
//! change from rolling out cluster-wide.

use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Pod;

use crate::k8s::lifecycle;
use franz_core::crd::{BrokerState, RollingUpgradeConfig};

/// The brokers whose applied configuration differs from spec, partitioned by restart
/// eligibility.
///
/// A stale broker mid-graceful-action or with an expanding volume is held out of the restart set
/// but still counts toward the set being non-empty: upgrade bookkeeping must not reset while any
/// broker still owes a restart.
#[derive(Debug, Default)]
pub(super) struct StaleSet {
    eligible: Vec<i32>,
    held: usize,
}

impl StaleSet {
    /// Note a stale broker, holding it out of the restart set unless it is restart-eligible.
    pub(super) fn note(&mut self, id: i32, state: &BrokerState) {
        if lifecycle::eligible_for_restart(state) {
            self.eligible.push(id);
        } else {
            self.held += 1;
        }
    }

    /// Whether no broker is stale at all, held out or otherwise.
    pub(super) fn is_empty(&self) -> bool {
        self.eligible.is_empty() && self.held == 0
    }

    /// The restart-eligible stale brokers.
    pub(super) fn restartable(self) -> Vec<i32> {
        self.eligible
    }
}

/// The restart decision for one pass.
#[derive(Debug, PartialEq)]
pub(super) enum UpgradePlan {
    /// The failure threshold has been exceeded. No further restarts take place until the
    /// condition is cleared by spec change or manual remediation.
    Halted,
    /// The broker ids to mark `Reconciling` and restart this pass. May be empty when the
    /// concurrency budget is exhausted or nothing is stale.
    Restart(Vec<i32>),
}

/// Planner of broker restarts under the cluster's rolling upgrade budget.
pub(super) struct UpgradePlanner {
    max_concurrent_restarts: u32,
    failure_threshold: u32,
}

impl UpgradePlanner {
    /// Create a new instance.
    pub(super) fn new(config: &RollingUpgradeConfig) -> Self {
        Self {
            max_concurrent_restarts: config.max_concurrent_restarts,
            failure_threshold: config.failure_threshold,
        }
    }

    /// Plan this pass's restarts.
    ///
    /// `stale` holds the restart-eligible brokers whose applied configuration differs from spec;
    /// `reconciling` counts brokers currently mid-restart and not yet confirmed stable;
    /// `error_count` counts brokers which have failed readiness since the upgrade began.
    /// Selection tie-breaks by ascending broker id for determinism.
    pub(super) fn plan(&self, mut stale: Vec<i32>, reconciling: u32, error_count: u32) -> UpgradePlan {
        if error_count > self.failure_threshold {
            return UpgradePlan::Halted;
        }
        let available = self.max_concurrent_restarts.saturating_sub(reconciling) as usize;
        stale.sort_unstable();
        stale.truncate(available);
        UpgradePlan::Restart(stale)
    }
}

/// The instant since which the given pod has continuously reported ready, if it is ready.
pub(super) fn pod_ready_since(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|condition| condition.type_ == "Ready"))
        .filter(|condition| condition.status == "True")
        .and_then(|condition| condition.last_transition_time.as_ref())
        .map(|transition| transition.0)
}

/// Whether the given pod has reported ready continuously for at least the stability window.
///
/// A restarted broker leaves `Reconciling` only once this holds; only then does its applied
/// configuration version update to match spec.
pub(super) fn pod_stable_ready(pod: &Pod, stability_seconds: u64, now: DateTime<Utc>) -> bool {
    match pod_ready_since(pod) {
        Some(since) => now.signed_duration_since(since) >= Duration::seconds(stability_seconds as i64),
        None => false,
    }
}

/// Whether the given pod has terminally failed.
pub(super) fn pod_failed(pod: &Pod) -> bool {
    pod.status.as_ref().and_then(|status| status.phase.as_deref()) == Some("Failed")
}

/// Whether the given pod has been unready past the restart deadline.
///
/// Catches restarted brokers which never terminally fail yet never become ready, such as a pod
/// wedged in image pull or a broker process stuck during startup. A pod currently reporting
/// ready is never past the deadline, however recently it got there; the stability window
/// resolves it from here.
pub(super) fn pod_ready_deadline_exceeded(pod: &Pod, deadline_seconds: u64, now: DateTime<Utc>) -> bool {
    if pod_ready_since(pod).is_some() {
        return false;
    }
    match pod.metadata.creation_timestamp.as_ref() {
        Some(created) => now.signed_duration_since(created.0) >= Duration::seconds(deadline_seconds as i64),
        None => false,
    }
}
