//! Broker lifecycle state machine.
//!
//! Pure per-broker decision functions consumed by the reconciler. The reconciler owns all side
//! effects (task submission, resource creation/teardown); the functions here only decide on and
//! apply status transitions, which keeps the state machine testable without a live cluster.
//!
//! Per-broker status updates are monotonic: no transition is applied out of order, and a stale
//! poll result for a superseded task id is discarded.

use chrono::{DateTime, Utc};

use crate::cruise::{TaskKind, TaskState};
use franz_core::crd::{BrokerPhase, BrokerState, GracefulActionState, TaskPhase};

/// Advance a new broker out of `Pending` once its backing resources exist.
///
/// With rebalancing enabled the broker holds in `GracefulUpscaleRunning` until partition data
/// has moved onto it; with rebalancing disabled the holding states are skipped entirely.
pub(super) fn begin_upscale(state: &mut BrokerState, rebalancing_enabled: bool) {
    if state.phase != BrokerPhase::Pending {
        return;
    }
    state.phase = if rebalancing_enabled {
        BrokerPhase::GracefulUpscaleRunning
    } else {
        BrokerPhase::ConfigInSync
    };
}

/// Begin removal of a broker no longer present in spec.
///
/// A broker removed mid-upscale keeps polling its outstanding task; the downscale transition is
/// only accepted once that task resolves, to avoid racing in-flight data movement. A broker
/// still `Pending` never joined the cluster and holds no partition data, so it skips straight to
/// the terminal phase without a remove-broker task. Resource teardown is gated on
/// `GracefulDownscaleSucceeded` elsewhere.
pub(super) fn begin_downscale(state: &mut BrokerState, rebalancing_enabled: bool) {
    match state.phase {
        BrokerPhase::GracefulDownscaleRunning | BrokerPhase::GracefulDownscaleSucceeded => return,
        BrokerPhase::Pending => {
            state.phase = BrokerPhase::GracefulDownscaleSucceeded;
            return;
        }
        BrokerPhase::GracefulUpscaleRunning if state.graceful_action.task_id.is_some() => return,
        _ => (),
    }
    if rebalancing_enabled {
        state.phase = BrokerPhase::GracefulDownscaleRunning;
        state.graceful_action = GracefulActionState::default();
    } else {
        state.phase = BrokerPhase::GracefulDownscaleSucceeded;
    }
}

/// The task submission owed for a broker in a graceful holding state, if any.
///
/// At most one task is outstanding per broker at a time. A previously failed task is resubmitted
/// only once the configured cooldown has elapsed since the last attempt; retries are unbounded.
pub(super) fn pending_submission(state: &BrokerState, cooldown_seconds: u64, now: DateTime<Utc>) -> Option<TaskKind> {
    let kind = match state.phase {
        BrokerPhase::GracefulUpscaleRunning => TaskKind::AddBroker,
        BrokerPhase::GracefulDownscaleRunning => TaskKind::RemoveBroker,
        _ => return None,
    };
    if state.graceful_action.task_id.is_some() {
        return None;
    }
    if state.graceful_action.task_phase == TaskPhase::Failed {
        let cooled_down = match state.graceful_action.last_attempt.as_deref().and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()) {
            Some(last) => now.signed_duration_since(last.with_timezone(&Utc)) >= chrono::Duration::seconds(cooldown_seconds as i64),
            None => true,
        };
        if !cooled_down {
            return None;
        }
    }
    Some(kind)
}

/// Record a successful task submission.
pub(super) fn record_submission(state: &mut BrokerState, task_id: String, now: DateTime<Utc>) {
    state.graceful_action.task_id = Some(task_id);
    state.graceful_action.task_phase = TaskPhase::Requested;
    state.graceful_action.error_message = None;
    state.graceful_action.last_attempt = Some(now.to_rfc3339());
}

/// Apply a polled task result to a broker's state.
///
/// Results for any task other than the broker's outstanding one are discarded. Success advances
/// the broker to the corresponding `*Succeeded` phase and clears the task id; failure records
/// the reason and holds the broker in place until resubmission.
pub(super) fn apply_task_result(state: &mut BrokerState, task_id: &str, result: &TaskState) {
    if state.graceful_action.task_id.as_deref() != Some(task_id) {
        return;
    }
    match result {
        TaskState::Pending => state.graceful_action.task_phase = TaskPhase::Requested,
        TaskState::InProgress => state.graceful_action.task_phase = TaskPhase::Running,
        TaskState::Succeeded => {
            state.graceful_action.task_id = None;
            state.graceful_action.task_phase = TaskPhase::Succeeded;
            state.graceful_action.error_message = None;
            state.phase = match state.phase {
                BrokerPhase::GracefulUpscaleRunning => BrokerPhase::GracefulUpscaleSucceeded,
                BrokerPhase::GracefulDownscaleRunning => BrokerPhase::GracefulDownscaleSucceeded,
                other => other,
            };
        }
        TaskState::Failed(reason) => {
            state.graceful_action.task_id = None;
            state.graceful_action.task_phase = TaskPhase::Failed;
            state.graceful_action.error_message = Some(reason.clone());
        }
    }
}

/// Settle a broker which completed its graceful upscale into steady state.
pub(super) fn settle_upscale(state: &mut BrokerState) {
    if state.phase == BrokerPhase::GracefulUpscaleSucceeded {
        state.phase = BrokerPhase::ConfigInSync;
        state.graceful_action = GracefulActionState::default();
    }
}

/// Whether the rolling upgrade coordinator may restart this broker.
///
/// Brokers mid-graceful-action are never restarted, and a broker with an expanding volume is
/// excluded until all of its volumes report in sync.
pub(super) fn eligible_for_restart(state: &BrokerState) -> bool {
    state.phase == BrokerPhase::ConfigInSync && state.volumes_in_sync()
}
