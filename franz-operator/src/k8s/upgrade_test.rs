use chrono::{Duration, Utc};
use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use super::upgrade::{pod_failed, pod_ready_deadline_exceeded, pod_ready_since, pod_stable_ready, StaleSet, UpgradePlan, UpgradePlanner};
use franz_core::crd::{BrokerPhase, BrokerState, RollingUpgradeConfig, VolumePhase, VolumeState};

fn planner(max_concurrent_restarts: u32, failure_threshold: u32) -> UpgradePlanner {
    UpgradePlanner::new(&RollingUpgradeConfig {
        max_concurrent_restarts,
        failure_threshold,
        readiness_stability_seconds: 10,
        restart_deadline_seconds: 300,
    })
}

fn ready_pod(ready_since: chrono::DateTime<Utc>) -> Pod {
    Pod {
        status: Some(PodStatus {
            phase: Some("Running".into()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".into(),
                status: "True".into(),
                last_transition_time: Some(Time(ready_since)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn budget_is_never_exceeded() {
    let planner = planner(2, 1);

    // Two slots, none taken: two restarts allowed.
    let plan = planner.plan(vec![2, 0, 1], 0, 0);
    assert!(plan == UpgradePlan::Restart(vec![0, 1]), "unexpected plan with free budget, got {:?}", plan);

    // One broker mid-restart leaves one slot.
    let plan = planner.plan(vec![2, 1], 1, 0);
    assert!(plan == UpgradePlan::Restart(vec![1]), "unexpected plan with partial budget, got {:?}", plan);

    // Budget exhausted: nothing restarts this pass.
    let plan = planner.plan(vec![2], 2, 0);
    assert!(plan == UpgradePlan::Restart(vec![]), "unexpected plan with exhausted budget, got {:?}", plan);
}

#[test]
fn three_broker_upgrade_proceeds_one_at_a_time() {
    // Cluster with brokers 0, 1, 2 and maxConcurrentRestarts=1; a config change marks all three
    // stale. The coordinator must restart one broker per readiness cycle, lowest id first.
    let planner = planner(1, 1);

    let plan = planner.plan(vec![0, 1, 2], 0, 0);
    assert!(plan == UpgradePlan::Restart(vec![0]), "first cycle must restart broker 0 only, got {:?}", plan);

    // Broker 0 is mid-restart: no additional restarts.
    let plan = planner.plan(vec![1, 2], 1, 0);
    assert!(plan == UpgradePlan::Restart(vec![]), "no broker may restart while 0 is reconciling, got {:?}", plan);

    // Broker 0 confirmed ready: broker 1 is next.
    let plan = planner.plan(vec![1, 2], 0, 0);
    assert!(plan == UpgradePlan::Restart(vec![1]), "second cycle must restart broker 1 only, got {:?}", plan);

    let plan = planner.plan(vec![2], 0, 0);
    assert!(plan == UpgradePlan::Restart(vec![2]), "third cycle must restart broker 2 only, got {:?}", plan);
}

#[test]
fn circuit_breaker_halts_restarts_over_the_failure_threshold() {
    let planner = planner(3, 1);

    // At the threshold restarts continue; over it they halt entirely.
    let plan = planner.plan(vec![0, 1], 0, 1);
    assert!(matches!(plan, UpgradePlan::Restart(_)), "restarts must continue at the threshold, got {:?}", plan);
    let plan = planner.plan(vec![0, 1], 0, 2);
    assert!(plan == UpgradePlan::Halted, "restarts must halt over the threshold, got {:?}", plan);
}

#[test]
fn pod_readiness_is_stability_window_gated() {
    let now = Utc::now();

    let pod = ready_pod(now - Duration::seconds(30));
    assert!(pod_ready_since(&pod).is_some(), "a ready pod must report its ready instant");
    assert!(pod_stable_ready(&pod, 10, now), "a pod ready past the window must be stable");

    let pod = ready_pod(now - Duration::seconds(3));
    assert!(!pod_stable_ready(&pod, 10, now), "a freshly ready pod must not yet be stable");

    let pod = Pod::default();
    assert!(pod_ready_since(&pod).is_none(), "a pod without conditions must not report ready");
    assert!(!pod_stable_ready(&pod, 10, now), "a pod without conditions must not be stable");
}

#[test]
fn held_out_stale_brokers_keep_the_upgrade_open() {
    // Brokers 1 and 2 converged, but broker 0's restart is held back by an expanding volume.
    // The stale set must stay non-empty so the upgrade bookkeeping does not reset while broker 0
    // still owes its restart.
    let mut stale = StaleSet::default();
    let mut held = BrokerState {
        phase: BrokerPhase::ConfigInSync,
        ..Default::default()
    };
    held.volumes.insert(
        "/kafka-logs".into(),
        VolumeState {
            provisioned: "10Gi".into(),
            requested: "20Gi".into(),
            phase: VolumePhase::StorageExpanding,
        },
    );
    stale.note(0, &held);
    assert!(!stale.is_empty(), "a held-out stale broker must keep the stale set non-empty");
    assert!(stale.restartable().is_empty(), "a broker with an expanding volume must not enter the restart set");

    // Eligible brokers land in the restart set; the empty set reports empty.
    let mut stale = StaleSet::default();
    stale.note(
        1,
        &BrokerState {
            phase: BrokerPhase::ConfigInSync,
            ..Default::default()
        },
    );
    assert!(!stale.is_empty(), "an eligible stale broker must keep the stale set non-empty");
    assert!(stale.restartable() == vec![1], "an eligible stale broker must enter the restart set");
    assert!(StaleSet::default().is_empty(), "an empty stale set must report empty");
}

#[test]
fn never_ready_pods_exceed_the_restart_deadline() {
    let now = Utc::now();

    // A restarted pod stuck unready past the deadline counts as a readiness failure even though
    // it never reaches a terminal phase.
    let mut pod = Pod::default();
    pod.metadata.creation_timestamp = Some(Time(now - Duration::seconds(400)));
    pod.status = Some(PodStatus {
        phase: Some("Pending".into()),
        ..Default::default()
    });
    assert!(!pod_failed(&pod), "a pod stuck pending must not register as terminally failed");
    assert!(pod_ready_deadline_exceeded(&pod, 300, now), "a pod unready past the deadline must count as a failure");

    pod.metadata.creation_timestamp = Some(Time(now - Duration::seconds(100)));
    assert!(!pod_ready_deadline_exceeded(&pod, 300, now), "a pod still within the deadline must not count as a failure");

    // A pod currently ready is resolved by the stability window, never the deadline.
    let mut pod = ready_pod(now - Duration::seconds(3));
    pod.metadata.creation_timestamp = Some(Time(now - Duration::seconds(400)));
    assert!(!pod_ready_deadline_exceeded(&pod, 300, now), "a ready pod must never count toward the deadline");
}

#[test]
fn failed_pods_are_detected() {
    let mut pod = Pod::default();
    assert!(!pod_failed(&pod), "a pod without status must not count as failed");
    pod.status = Some(PodStatus {
        phase: Some("Failed".into()),
        ..Default::default()
    });
    assert!(pod_failed(&pod), "a terminally failed pod must be detected");
}
