use anyhow::Result;
use serde_json::json;

use super::{parse_task_state, TaskClient, TaskClientError, TaskKind, TaskState};

#[test]
fn task_kinds_map_to_api_operations() {
    assert!(TaskKind::AddBroker.operation() == "add_broker", "unexpected operation for AddBroker, got {}", TaskKind::AddBroker.operation());
    assert!(
        TaskKind::RemoveBroker.operation() == "remove_broker",
        "unexpected operation for RemoveBroker, got {}",
        TaskKind::RemoveBroker.operation()
    );
    assert!(TaskKind::Rebalance.operation() == "rebalance", "unexpected operation for Rebalance, got {}", TaskKind::Rebalance.operation());
}

#[test]
fn new_strips_trailing_slashes_from_base_url() {
    let client = TaskClient::new(reqwest::Client::new(), "http://cc:8090//");
    assert!(client.base_url == "http://cc:8090", "unexpected base url, got {}, expected {}", client.base_url, "http://cc:8090");
}

#[test]
fn default_endpoint_targets_the_cluster_service() {
    let endpoint = TaskClient::default_endpoint("kafka", "prod");
    let expected = "http://kafka-cruisecontrol-svc.prod.svc.cluster.local:8090";
    assert!(endpoint == expected, "unexpected default endpoint, got {}, expected {}", endpoint, expected);
}

#[test]
fn unreachable_errors_are_retryable_and_protocol_errors_are_not() {
    assert!(TaskClientError::Unreachable("conn refused".into()).is_retryable(), "unreachable errors must be retryable");
    assert!(!TaskClientError::Protocol("bad body".into()).is_retryable(), "protocol errors must not be retryable");
}

#[test]
fn parse_task_state_maps_all_known_statuses() -> Result<()> {
    for (status, expected) in vec![
        ("Active", TaskState::Pending),
        ("InExecution", TaskState::InProgress),
        ("Completed", TaskState::Succeeded),
    ] {
        let body = json!({"userTasks": [{"UserTaskId": "task-0", "Status": status}]});
        let state = parse_task_state(&body, "task-0")?;
        assert!(state == expected, "unexpected state parsed for {}, got {:?}, expected {:?}", status, state, expected);
    }
    Ok(())
}

#[test]
fn parse_task_state_carries_the_failure_reason() -> Result<()> {
    let body = json!({"userTasks": [{
        "UserTaskId": "task-0",
        "Status": "CompletedWithError",
        "OriginalResponse": "not enough valid windows",
    }]});
    let state = parse_task_state(&body, "task-0")?;
    assert!(
        state == TaskState::Failed("not enough valid windows".into()),
        "unexpected state parsed for CompletedWithError, got {:?}",
        state
    );
    Ok(())
}

#[test]
fn parse_task_state_selects_the_requested_task() -> Result<()> {
    let body = json!({"userTasks": [
        {"UserTaskId": "task-0", "Status": "Completed"},
        {"UserTaskId": "task-1", "Status": "InExecution"},
    ]});
    let state = parse_task_state(&body, "task-1")?;
    assert!(state == TaskState::InProgress, "unexpected state parsed for task-1, got {:?}, expected InProgress", state);
    Ok(())
}

#[test]
fn parse_task_state_rejects_missing_tasks_and_unknown_statuses() {
    let body = json!({"userTasks": []});
    let res = parse_task_state(&body, "task-0");
    assert!(matches!(res, Err(TaskClientError::Protocol(_))), "expected protocol error for missing task, got {:?}", res);

    let body = json!({"userTasks": [{"UserTaskId": "task-0", "Status": "Paused"}]});
    let res = parse_task_state(&body, "task-0");
    assert!(matches!(res, Err(TaskClientError::Protocol(_))), "expected protocol error for unknown status, got {:?}", res);
}
