//! Kubernetes controller.
//!
//! The controller watches KafkaCluster objects along with the resources the operator creates for
//! them, and runs one reconciliation pass per triggering change. Passes for a given cluster are
//! single-flight; passes for different clusters run in parallel. A pass observes current state,
//! makes bounded progress, and returns, relying on the next triggered or timed pass to continue.

mod lifecycle;
#[cfg(test)]
mod lifecycle_test;
mod reconcile;
mod resources;
mod upgrade;
#[cfg(test)]
mod upgrade_test;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::prelude::*;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::api::{Api, ListParams};
use kube::client::Client;
use kube_runtime::controller::{Context, Controller as ClusterController};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::Config;
use crate::cruise::TaskClientError;
use franz_core::crd::KafkaCluster;
use franz_core::FRANZ_OPERATOR_LABEL_SELECTORS;

/// The app name used by the operator.
const APP_NAME: &str = "franz-operator";
/// The default timeout to use for API calls.
const API_TIMEOUT: Duration = Duration::from_secs(5);

/// Count of reconciliation passes performed.
const METRIC_RECONCILE_PASSES: &str = "reconcile_passes";
/// Count of reconciliation passes which returned an error.
const METRIC_RECONCILE_ERRORS: &str = "reconcile_errors";
/// Count of rebalancing-service tasks which completed with an error.
const METRIC_TASK_FAILURES: &str = "rebalance_task_failures";

/// Error variants which may take place while reconciling a KafkaCluster.
#[derive(Debug, Error)]
pub enum Error {
    /// The cluster spec violates an invariant.
    ///
    /// Terminal for the pass: no resources are mutated and the violation is surfaced on status.
    #[error("validation error: {0}")]
    Validation(String),
    /// An error from the rebalancing service's task API.
    #[error("rebalancing service error: {0}")]
    CruiseControl(#[from] TaskClientError),
    /// An error from the K8s API.
    #[error("K8s API error: {0}")]
    Kube(#[from] kube::Error),
    /// Any other error encountered during a pass.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Data made available to each reconciliation pass.
struct Ctx {
    /// K8s client.
    client: Client,
    /// Runtime config.
    config: Arc<Config>,
    /// Shared HTTP client used for the rebalancing service.
    http: reqwest::Client,
}

/// Kubernetes controller for KafkaCluster CRs.
pub struct Controller {
    /// K8s client.
    client: Client,
    /// Runtime config.
    config: Arc<Config>,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl Controller {
    /// Create a new instance.
    pub fn new(client: Client, config: Arc<Config>, shutdown_tx: broadcast::Sender<()>) -> Self {
        metrics::register_counter!(METRIC_RECONCILE_PASSES, metrics::Unit::Count, "count of reconciliation passes performed");
        metrics::register_counter!(METRIC_RECONCILE_ERRORS, metrics::Unit::Count, "count of reconciliation passes which returned an error");
        metrics::register_counter!(METRIC_TASK_FAILURES, metrics::Unit::Count, "count of rebalancing-service tasks which completed with an error");
        Self {
            client,
            config,
            shutdown_rx: BroadcastStream::new(shutdown_tx.subscribe()),
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        // Watch KafkaCluster objects along with everything the operator creates for them. Owned
        // objects are label-selected so unrelated resources never trigger a pass.
        let params_labels = self.list_params_cluster_selector_labels();
        let clusters: Api<KafkaCluster> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let configmaps: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let services: Api<Service> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let pvcs: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), &self.config.namespace);
        let budgets: Api<PodDisruptionBudget> = Api::namespaced(self.client.clone(), &self.config.namespace);

        let context = Context::new(Ctx {
            client: self.client.clone(),
            config: self.config.clone(),
            http: reqwest::Client::new(),
        });
        let passes = ClusterController::new(clusters, ListParams::default())
            .owns(pods, params_labels.clone())
            .owns(configmaps, params_labels.clone())
            .owns(services, params_labels.clone())
            .owns(pvcs, params_labels.clone())
            .owns(budgets, params_labels)
            .run(reconcile::reconcile_cluster, reconcile::error_policy, context);
        tokio::pin!(passes);

        tracing::info!("k8s controller initialized");
        loop {
            tokio::select! {
                Some(pass_res) = passes.next() => match pass_res {
                    Ok((cluster, _action)) => tracing::debug!(name = %cluster.name, "reconciled KafkaCluster"),
                    Err(err) => tracing::error!(error = ?err, "error from reconciliation stream"),
                },
                _ = self.shutdown_rx.next() => break,
                else => break,
            }
        }

        tracing::debug!("k8s controller shutdown");
        Ok(())
    }

    /// Create a list params object which selects only objects matching Franz labels.
    fn list_params_cluster_selector_labels(&self) -> ListParams {
        ListParams {
            label_selector: Some(FRANZ_OPERATOR_LABEL_SELECTORS.into()),
            ..Default::default()
        }
    }
}
