use chrono::{Duration, Utc};

use super::lifecycle::{apply_task_result, begin_downscale, begin_upscale, eligible_for_restart, pending_submission, record_submission, settle_upscale};
use crate::cruise::{TaskKind, TaskState};
use franz_core::crd::{BrokerPhase, BrokerState, TaskPhase, VolumePhase, VolumeState};

fn broker_in(phase: BrokerPhase) -> BrokerState {
    BrokerState {
        phase,
        ..Default::default()
    }
}

#[test]
fn upscale_holds_in_graceful_running_until_the_task_succeeds() {
    let mut state = broker_in(BrokerPhase::Pending);
    begin_upscale(&mut state, true);
    assert!(state.phase == BrokerPhase::GracefulUpscaleRunning, "unexpected phase after upscale begin, got {}", state.phase);

    let now = Utc::now();
    let kind = pending_submission(&state, 60, now);
    assert!(kind == Some(TaskKind::AddBroker), "new upscale must owe an add-broker task, got {:?}", kind);
    record_submission(&mut state, "task-0".into(), now);
    assert!(pending_submission(&state, 60, now).is_none(), "at most one task may be outstanding per broker");

    apply_task_result(&mut state, "task-0", &TaskState::InProgress);
    assert!(state.phase == BrokerPhase::GracefulUpscaleRunning, "broker must hold while the task runs, got {}", state.phase);
    assert!(state.graceful_action.task_phase == TaskPhase::Running, "unexpected task phase, got {:?}", state.graceful_action.task_phase);

    apply_task_result(&mut state, "task-0", &TaskState::Succeeded);
    assert!(state.phase == BrokerPhase::GracefulUpscaleSucceeded, "success must advance the broker, got {}", state.phase);
    assert!(state.graceful_action.task_id.is_none(), "success must clear the outstanding task id");

    settle_upscale(&mut state);
    assert!(state.phase == BrokerPhase::ConfigInSync, "settled upscale must reach steady state, got {}", state.phase);
}

#[test]
fn disabled_rebalancing_skips_the_holding_states() {
    let mut state = broker_in(BrokerPhase::Pending);
    begin_upscale(&mut state, false);
    assert!(state.phase == BrokerPhase::ConfigInSync, "disabled rebalancing must skip graceful upscale, got {}", state.phase);

    let mut state = broker_in(BrokerPhase::ConfigInSync);
    begin_downscale(&mut state, false);
    assert!(
        state.phase == BrokerPhase::GracefulDownscaleSucceeded,
        "disabled rebalancing must skip graceful downscale, got {}",
        state.phase
    );
}

#[test]
fn downscale_holds_until_the_remove_task_succeeds() {
    let mut state = broker_in(BrokerPhase::ConfigInSync);
    begin_downscale(&mut state, true);
    assert!(state.phase == BrokerPhase::GracefulDownscaleRunning, "unexpected phase after downscale begin, got {}", state.phase);

    let now = Utc::now();
    let kind = pending_submission(&state, 60, now);
    assert!(kind == Some(TaskKind::RemoveBroker), "new downscale must owe a remove-broker task, got {:?}", kind);
    record_submission(&mut state, "task-1".into(), now);

    // Still mid-removal. Teardown is gated on GracefulDownscaleSucceeded.
    apply_task_result(&mut state, "task-1", &TaskState::InProgress);
    assert!(state.phase == BrokerPhase::GracefulDownscaleRunning, "broker must hold while data moves off of it, got {}", state.phase);

    apply_task_result(&mut state, "task-1", &TaskState::Succeeded);
    assert!(state.phase == BrokerPhase::GracefulDownscaleSucceeded, "success must reach the terminal phase, got {}", state.phase);
}

#[test]
fn removing_a_never_created_broker_skips_data_movement() {
    // A broker removed from spec before its pod ever existed holds no partition data, so no
    // remove-broker task is owed and teardown may proceed immediately.
    let mut state = broker_in(BrokerPhase::Pending);
    begin_downscale(&mut state, true);
    assert!(
        state.phase == BrokerPhase::GracefulDownscaleSucceeded,
        "removing a Pending broker must reach the terminal phase directly, got {}",
        state.phase
    );
    assert!(pending_submission(&state, 60, Utc::now()).is_none(), "removing a Pending broker must not owe a task");
}

#[test]
fn removal_mid_upscale_awaits_task_resolution() {
    let now = Utc::now();
    let mut state = broker_in(BrokerPhase::GracefulUpscaleRunning);
    record_submission(&mut state, "task-2".into(), now);

    // Broker removed from spec while its upscale task is in flight.
    begin_downscale(&mut state, true);
    assert!(
        state.phase == BrokerPhase::GracefulUpscaleRunning,
        "downscale must not preempt an outstanding upscale task, got {}",
        state.phase
    );

    apply_task_result(&mut state, "task-2", &TaskState::Succeeded);
    begin_downscale(&mut state, true);
    assert!(
        state.phase == BrokerPhase::GracefulDownscaleRunning,
        "downscale must proceed once the upscale task resolves, got {}",
        state.phase
    );
}

#[test]
fn failed_tasks_are_resubmitted_only_after_the_cooldown() {
    let now = Utc::now();
    let mut state = broker_in(BrokerPhase::GracefulDownscaleRunning);
    record_submission(&mut state, "task-3".into(), now);
    apply_task_result(&mut state, "task-3", &TaskState::Failed("not enough valid windows".into()));

    assert!(state.phase == BrokerPhase::GracefulDownscaleRunning, "failure must not advance the broker, got {}", state.phase);
    assert!(
        state.graceful_action.error_message.as_deref() == Some("not enough valid windows"),
        "failure reason must be surfaced, got {:?}",
        state.graceful_action.error_message
    );

    assert!(pending_submission(&state, 60, now + Duration::seconds(10)).is_none(), "resubmission must wait out the cooldown");
    let kind = pending_submission(&state, 60, now + Duration::seconds(61));
    assert!(kind == Some(TaskKind::RemoveBroker), "resubmission must be owed once cooled down, got {:?}", kind);
}

#[test]
fn stale_poll_results_are_discarded() {
    let now = Utc::now();
    let mut state = broker_in(BrokerPhase::GracefulUpscaleRunning);
    record_submission(&mut state, "task-5".into(), now);

    // A poll result for a superseded task id must not advance the state machine.
    apply_task_result(&mut state, "task-4", &TaskState::Succeeded);
    assert!(state.phase == BrokerPhase::GracefulUpscaleRunning, "stale results must be discarded, got {}", state.phase);
    assert!(state.graceful_action.task_id.as_deref() == Some("task-5"), "the outstanding task must be unaffected");
}

#[test]
fn expanding_volumes_exclude_a_broker_from_restart() {
    let mut state = broker_in(BrokerPhase::ConfigInSync);
    assert!(eligible_for_restart(&state), "a steady-state broker must be restartable");

    state.volumes.insert(
        "/kafka-logs".into(),
        VolumeState {
            provisioned: "10Gi".into(),
            requested: "20Gi".into(),
            phase: VolumePhase::StorageExpanding,
        },
    );
    assert!(!eligible_for_restart(&state), "a broker with an expanding volume must not be restarted");

    state.volumes.insert(
        "/kafka-logs".into(),
        VolumeState {
            provisioned: "20Gi".into(),
            requested: "20Gi".into(),
            phase: VolumePhase::InSync,
        },
    );
    assert!(eligible_for_restart(&state), "restart eligibility must return once volumes are in sync");

    let state = broker_in(BrokerPhase::GracefulUpscaleRunning);
    assert!(!eligible_for_restart(&state), "a broker mid-graceful-action must not be restarted");
}
