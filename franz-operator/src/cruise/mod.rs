//! Cruise Control task client.
//!
//! The rebalancing service exposes a REST task API. Submission is fire-and-forget: the service
//! acknowledges a task with an id and executes it asynchronously, so task status must be polled
//! out-of-band. The reconciliation loop polls on its normal cadence rather than blocking on
//! completion, and a transiently unreachable service leaves the owning graceful action at its
//! last known phase.

#[cfg(test)]
mod mod_test;

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;

/// The default timeout to use for API calls.
const API_TIMEOUT: Duration = Duration::from_secs(10);
/// The response header carrying the id of a submitted task.
const HEADER_USER_TASK_ID: &str = "User-Task-ID";
/// The port of the Cruise Control API service.
const CRUISE_CONTROL_PORT: u16 = 8090;

/// A task kind understood by the rebalancing service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskKind {
    /// Move partition data onto a newly added broker.
    AddBroker,
    /// Move partition data off a broker ahead of its removal.
    RemoveBroker,
    /// Rebalance partition data across the whole cluster.
    Rebalance,
}

impl TaskKind {
    /// The API operation backing this task kind.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::AddBroker => "add_broker",
            Self::RemoveBroker => "remove_broker",
            Self::Rebalance => "rebalance",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.operation())
    }
}

/// The observed state of a submitted task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskState {
    /// The task has been accepted but execution has not started.
    Pending,
    /// The task is executing.
    InProgress,
    /// The task completed successfully.
    Succeeded,
    /// The task completed with an error.
    Failed(String),
}

/// Task client error variants.
#[derive(Debug, Error)]
pub enum TaskClientError {
    /// The rebalancing service could not be reached or answered with a server error.
    ///
    /// Retryable: the owning task keeps its last known phase and the call is repeated on the
    /// normal reconciliation resync cadence.
    #[error("rebalancing service unreachable: {0}")]
    Unreachable(String),
    /// The rebalancing service answered with something the client does not understand.
    #[error("unexpected response from rebalancing service: {0}")]
    Protocol(String),
}

impl TaskClientError {
    /// Whether the owning task should keep its last known phase and be retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Client of the rebalancing service's task API.
#[derive(Clone)]
pub struct TaskClient {
    /// Shared HTTP client.
    http: reqwest::Client,
    /// Base URL of the Cruise Control API, without a trailing slash.
    base_url: String,
}

impl TaskClient {
    /// Create a new instance.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    /// The default in-namespace Cruise Control endpoint of the given cluster.
    pub fn default_endpoint(cluster: &str, namespace: &str) -> String {
        format!("http://{}-cruisecontrol-svc.{}.svc.cluster.local:{}", cluster, namespace, CRUISE_CONTROL_PORT)
    }

    /// Submit a task of the given kind for the given broker, returning the new task's id.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn submit(&self, kind: TaskKind, broker_id: i32) -> Result<String, TaskClientError> {
        let url = format!("{}/kafkacruisecontrol/{}", self.base_url, kind.operation());
        let request = self
            .http
            .post(&url)
            .query(&[("brokerid", broker_id.to_string()), ("dryrun", "false".into()), ("json", "true".into())]);
        let response = timeout(API_TIMEOUT, request.send())
            .await
            .map_err(|_| TaskClientError::Unreachable(format!("timeout submitting {} task", kind)))?
            .map_err(|err| TaskClientError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TaskClientError::Unreachable(format!("{} returned {}", kind, status)));
        }
        if !status.is_success() {
            return Err(TaskClientError::Protocol(format!("{} returned {}", kind, status)));
        }
        let task_id = response
            .headers()
            .get(HEADER_USER_TASK_ID)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
            .ok_or_else(|| TaskClientError::Protocol(format!("{} response is missing the {} header", kind, HEADER_USER_TASK_ID)))?;
        tracing::info!(task_id = %task_id, broker_id, "submitted {} task", kind);
        Ok(task_id)
    }

    /// Fetch the current state of the given task.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn status(&self, task_id: &str) -> Result<TaskState, TaskClientError> {
        let url = format!("{}/kafkacruisecontrol/user_tasks", self.base_url);
        let request = self.http.get(&url).query(&[("user_task_ids", task_id), ("json", "true")]);
        let response = timeout(API_TIMEOUT, request.send())
            .await
            .map_err(|_| TaskClientError::Unreachable("timeout fetching task status".into()))?
            .map_err(|err| TaskClientError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TaskClientError::Unreachable(format!("user_tasks returned {}", status)));
        }
        if !status.is_success() {
            return Err(TaskClientError::Protocol(format!("user_tasks returned {}", status)));
        }
        let body: Value = timeout(API_TIMEOUT, response.json())
            .await
            .map_err(|_| TaskClientError::Unreachable("timeout reading task status body".into()))?
            .map_err(|err| TaskClientError::Protocol(err.to_string()))?;
        parse_task_state(&body, task_id)
    }
}

/// Extract the state of the given task from a `user_tasks` response body.
pub(crate) fn parse_task_state(body: &Value, task_id: &str) -> Result<TaskState, TaskClientError> {
    let tasks = body
        .get("userTasks")
        .and_then(Value::as_array)
        .ok_or_else(|| TaskClientError::Protocol("user_tasks response is missing the userTasks list".into()))?;
    let task = tasks
        .iter()
        .find(|task| task.get("UserTaskId").and_then(Value::as_str) == Some(task_id))
        .ok_or_else(|| TaskClientError::Protocol(format!("task {} not found in user_tasks response", task_id)))?;
    let status = task
        .get("Status")
        .and_then(Value::as_str)
        .ok_or_else(|| TaskClientError::Protocol(format!("task {} has no status", task_id)))?;
    match status {
        "Active" => Ok(TaskState::Pending),
        "InExecution" => Ok(TaskState::InProgress),
        "Completed" => Ok(TaskState::Succeeded),
        "CompletedWithError" => {
            let reason = task
                .get("OriginalResponse")
                .and_then(Value::as_str)
                .unwrap_or("task completed with error")
                .to_string();
            Ok(TaskState::Failed(reason))
        }
        other => Err(TaskClientError::Protocol(format!("task {} reports unknown status {}", task_id, other))),
    }
}
