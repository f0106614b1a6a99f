//! Cluster reconciliation.
//!
//! One convergence pass per triggering change: validate the spec, observe the cluster's owned
//! objects, ensure per-broker and cluster-scope resources, drive removals through graceful
//! downscale, hand the stale set to the rolling upgrade planner, and persist status. Side effects
//! are strictly idempotent, so a pass repeated with no intervening external change produces no
//! additional mutations.
//!
//! Long-running operations never block a pass to completion. Each pass observes current status,
//! makes bounded progress, and returns with a requeue, relying on the next pass to continue.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::Context as AnyhowContext;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::Resource;
use kube_runtime::controller::{Context, ReconcilerAction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;

use crate::cruise::{TaskClient, TaskState};
use crate::k8s::resources::{self, ResourceBuilder};
use crate::k8s::{lifecycle, upgrade, Ctx, Error, API_TIMEOUT, APP_NAME, METRIC_RECONCILE_ERRORS, METRIC_RECONCILE_PASSES, METRIC_TASK_FAILURES};
use franz_core::crd::{Broker, BrokerPhase, BrokerState, ClusterPhase, KafkaCluster, KafkaClusterStatus, RequiredMetadata, VolumePhase, VolumeState};
use franz_core::FRANZ_OPERATOR_LABEL_SELECTORS;

/// Reconcile one KafkaCluster.
pub(super) async fn reconcile_cluster(cluster: KafkaCluster, ctx: Context<Ctx>) -> Result<ReconcilerAction, Error> {
    metrics::increment_counter!(METRIC_RECONCILE_PASSES);
    let ctx = ctx.get_ref();
    let original_status = cluster.status.clone().unwrap_or_default();
    let mut status = original_status.clone();

    // Validation violations are terminal for the pass: no resources are mutated and the
    // violation is surfaced on status until the spec changes.
    if let Err(err) = cluster.spec.validate() {
        tracing::warn!(name = %cluster.name(), error = %err, "KafkaCluster spec is invalid");
        status.phase = ClusterPhase::Invalid;
        status.message = Some(err.to_string());
        if status != original_status {
            persist_status(ctx, &cluster, &status).await?;
        }
        return Ok(ReconcilerAction { requeue_after: None });
    }

    let mut pass = Pass::new(ctx, &cluster);
    pass.run(&mut status).await?;
    let requeue_soon = pass.requeue_soon;

    // Persist status under optimistic concurrency. A losing writer abandons the write and
    // requeues immediately; the pass's resource mutations are idempotent and safe to repeat.
    let mut conflicted = false;
    if status != original_status {
        conflicted = !persist_status(ctx, &cluster, &status).await?;
    }
    let requeue_after = if conflicted {
        Some(Duration::from_secs(1))
    } else if requeue_soon {
        Some(Duration::from_secs(ctx.config.retry_seconds))
    } else {
        Some(Duration::from_secs(ctx.config.resync_seconds))
    };
    Ok(ReconcilerAction { requeue_after })
}

/// The error policy applied when a reconciliation pass fails.
pub(super) fn error_policy(error: &Error, ctx: Context<Ctx>) -> ReconcilerAction {
    metrics::increment_counter!(METRIC_RECONCILE_ERRORS);
    tracing::error!(error = ?error, "error reconciling KafkaCluster");
    ReconcilerAction {
        requeue_after: Some(Duration::from_secs(ctx.get_ref().config.retry_seconds)),
    }
}

/// Owned objects of the cluster observed at the start of a pass, keyed by broker id.
#[derive(Default)]
struct Observed {
    pods: BTreeMap<i32, Pod>,
    pvcs: BTreeMap<i32, Vec<PersistentVolumeClaim>>,
}

/// A single reconciliation pass over one cluster.
struct Pass<'a> {
    ctx: &'a Ctx,
    cluster: &'a KafkaCluster,
    builder: ResourceBuilder<'a>,
    tasks: TaskClient,
    now: DateTime<Utc>,
    /// Whether this pass left work outstanding and should be requeued on the retry cadence.
    requeue_soon: bool,
}

impl<'a> Pass<'a> {
    /// Create a new instance.
    fn new(ctx: &'a Ctx, cluster: &'a KafkaCluster) -> Self {
        let endpoint = cluster
            .spec
            .cruise_control
            .endpoint
            .clone()
            .unwrap_or_else(|| TaskClient::default_endpoint(cluster.name(), cluster.namespace()));
        Self {
            ctx,
            cluster,
            builder: ResourceBuilder::new(cluster),
            tasks: TaskClient::new(ctx.http.clone(), endpoint),
            now: Utc::now(),
            requeue_soon: false,
        }
    }

    /// Execute the pass, mutating `status` in place.
    #[tracing::instrument(level = "debug", skip(self, status), fields(name = %self.cluster.name()))]
    async fn run(&mut self, status: &mut KafkaClusterStatus) -> Result<(), Error> {
        let observed = self.observe().await?;

        // Cluster-scope resources.
        self.apply(self.builder.all_broker_service()).await?;
        self.apply(self.builder.disruption_budget()).await?;

        // Per-broker convergence for brokers present in spec. Stale brokers held out of the
        // restart set (mid-graceful-action, expanding volumes) are still tracked as stale so the
        // upgrade bookkeeping does not reset under them.
        let mut stale = upgrade::StaleSet::default();
        for broker in self.cluster.spec.brokers.iter() {
            if self.reconcile_broker(broker, &observed, status).await? {
                stale.note(broker.id, status.broker_mut(broker.id));
            }
        }

        // Brokers present in status but absent from spec are pending removals.
        self.reconcile_removals(&observed, status).await?;

        // Hand the stale set to the upgrade planner rather than restarting everything at once.
        let stale_outstanding = !stale.is_empty();
        let halted = self.drive_upgrade(stale, &observed, status).await?;

        // Compute the cluster-level phase.
        let reconciling = status.reconciling_count() > 0;
        let converged = status.brokers.values().all(|state| state.phase == BrokerPhase::ConfigInSync);
        if halted {
            status.phase = ClusterPhase::RollingUpgradeHalted;
            status.message = Some("rolling upgrade halted: readiness failure threshold exceeded".into());
        } else if stale_outstanding || reconciling {
            status.phase = ClusterPhase::RollingUpgrading;
            status.message = None;
        } else if converged && !self.requeue_soon {
            status.phase = ClusterPhase::Running;
            status.message = None;
        } else {
            status.phase = ClusterPhase::Reconciling;
            status.message = None;
        }
        Ok(())
    }

    /// Converge one broker present in spec, returning whether its applied configuration is stale.
    #[tracing::instrument(level = "debug", skip(self, broker, observed, status), fields(broker = broker.id))]
    async fn reconcile_broker(&mut self, broker: &Broker, observed: &Observed, status: &mut KafkaClusterStatus) -> Result<bool, Error> {
        let rendered = self.builder.rendered_broker_config(broker).map_err(|err| Error::Validation(err.to_string()))?;
        let desired_version = ResourceBuilder::config_version(&rendered);

        self.apply(self.builder.broker_configmap(broker, &rendered)).await?;
        self.apply(self.builder.broker_service(broker)).await?;
        let pvcs = self.ensure_pvcs(broker, observed, status).await?;

        // Create the broker's pod if missing. A pod is also recreated here after the upgrade
        // planner deleted it for a restart, picking up the new configuration version.
        let pod = observed.pods.get(&broker.id);
        if pod.is_none() {
            let desired_pod = self.builder.broker_pod(broker, &desired_version, &pvcs).map_err(|err| Error::Validation(err.to_string()))?;
            let api: Api<Pod> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
            self.create(&api, &desired_pod, "broker pod").await?;
            tracing::info!(broker = broker.id, version = %desired_version, "created broker pod");
            let state = status.broker_mut(broker.id);
            if state.phase == BrokerPhase::Pending {
                state.config_version = desired_version.clone();
            }
            self.requeue_soon = true;
        }

        // Advance the broker's lifecycle. Upscale begins only once the pod exists.
        let cc_enabled = self.cluster.spec.cruise_control.enabled;
        {
            let state = status.broker_mut(broker.id);
            if pod.is_some() {
                lifecycle::begin_upscale(state, cc_enabled);
            }
            lifecycle::settle_upscale(state);
            self.drive_graceful_action(broker.id, state).await?;
        }

        // Restart completion: a broker leaves Reconciling only once its replacement pod carries
        // the desired configuration version and has been ready for the stability window. A pod
        // which terminally fails, or which is still unready past the restart deadline (wedged in
        // image pull, broker stuck during startup), counts as a readiness failure.
        let stability = self.cluster.spec.rolling_upgrade.readiness_stability_seconds;
        let deadline = self.cluster.spec.rolling_upgrade.restart_deadline_seconds;
        let mut readiness_failed = false;
        {
            let state = status.broker_mut(broker.id);
            if state.phase == BrokerPhase::Reconciling {
                let annotated = pod.and_then(|pod| annotation(&pod.metadata, resources::ANNOTATION_CONFIG_VERSION));
                match pod {
                    Some(pod) if annotated.as_deref() == Some(desired_version.as_str()) => {
                        if upgrade::pod_stable_ready(pod, stability, self.now) {
                            state.config_version = desired_version.clone();
                            state.phase = BrokerPhase::ConfigInSync;
                            tracing::info!(broker = broker.id, version = %desired_version, "broker restart complete");
                        } else {
                            readiness_failed = upgrade::pod_failed(pod) || upgrade::pod_ready_deadline_exceeded(pod, deadline, self.now);
                            self.requeue_soon = true;
                        }
                    }
                    _ => self.requeue_soon = true,
                }
            }
        }
        if readiness_failed {
            status.rolling_upgrade.record_failure(broker.id);
            // The failed pod is removed so the next pass can retry the restart; whether that
            // retry happens is up to the circuit breaker.
            if let Some(name) = pod.and_then(|pod| pod.metadata.name.as_deref()) {
                let api: Api<Pod> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
                self.delete(&api, name).await?;
                tracing::warn!(broker = broker.id, "broker pod failed readiness after restart");
            }
        }

        let state = status.broker_mut(broker.id);
        if !matches!(state.phase, BrokerPhase::ConfigInSync) {
            self.requeue_soon = true;
        }
        Ok(state.config_version != desired_version)
    }

    /// Drive brokers present in status but absent from spec through graceful downscale.
    ///
    /// A removed broker's resources are torn down, and its status entry dropped, only once it
    /// reaches `GracefulDownscaleSucceeded`.
    #[tracing::instrument(level = "debug", skip(self, observed, status))]
    async fn reconcile_removals(&mut self, observed: &Observed, status: &mut KafkaClusterStatus) -> Result<(), Error> {
        let spec_ids: BTreeSet<i32> = self.cluster.spec.brokers.iter().map(|broker| broker.id).collect();
        let removals: Vec<i32> = status
            .brokers
            .keys()
            .filter_map(|key| key.parse::<i32>().ok())
            .filter(|id| !spec_ids.contains(id))
            .collect();
        let cc_enabled = self.cluster.spec.cruise_control.enabled;
        for id in removals {
            {
                let state = status.broker_mut(id);
                lifecycle::begin_downscale(state, cc_enabled);
                self.drive_graceful_action(id, state).await?;
            }
            let done = status
                .brokers
                .get(&id.to_string())
                .map(|state| state.phase == BrokerPhase::GracefulDownscaleSucceeded)
                .unwrap_or(false);
            if done {
                self.teardown_broker(id, observed).await?;
                status.brokers.remove(&id.to_string());
                tracing::info!(broker = id, "broker removed");
            } else {
                self.requeue_soon = true;
            }
        }
        Ok(())
    }

    /// Poll or submit the rebalancing-service task owed by a broker in a graceful holding state.
    async fn drive_graceful_action(&mut self, id: i32, state: &mut BrokerState) -> Result<(), Error> {
        // Poll the outstanding task, if any.
        if let Some(task_id) = state.graceful_action.task_id.clone() {
            match self.tasks.status(&task_id).await {
                Ok(result) => {
                    if matches!(result, TaskState::Failed(_)) {
                        metrics::increment_counter!(METRIC_TASK_FAILURES);
                        tracing::warn!(broker = id, task_id = %task_id, "rebalancing task failed");
                    }
                    if !matches!(result, TaskState::Succeeded) {
                        self.requeue_soon = true;
                    }
                    lifecycle::apply_task_result(state, &task_id, &result);
                }
                // A transiently unreachable service leaves the task at its last known phase;
                // the poll repeats on the normal cadence.
                Err(err) if err.is_retryable() => {
                    tracing::debug!(error = ?err, broker = id, "rebalancing service unreachable, will retry");
                    self.requeue_soon = true;
                }
                Err(err) => return Err(err.into()),
            }
            return Ok(());
        }

        // Submit any owed task.
        let cooldown = self.cluster.spec.cruise_control.task_cooldown_seconds;
        if let Some(kind) = lifecycle::pending_submission(state, cooldown, self.now) {
            match self.tasks.submit(kind, id).await {
                Ok(task_id) => {
                    lifecycle::record_submission(state, task_id, self.now);
                    self.requeue_soon = true;
                }
                Err(err) if err.is_retryable() => {
                    tracing::debug!(error = ?err, broker = id, "rebalancing service unreachable, will retry submission");
                    self.requeue_soon = true;
                }
                Err(err) => return Err(err.into()),
            }
        } else if matches!(state.phase, BrokerPhase::GracefulUpscaleRunning | BrokerPhase::GracefulDownscaleRunning) {
            // Holding out a cooldown.
            self.requeue_soon = true;
        }
        Ok(())
    }

    /// Ensure the broker's PVCs exist and drive storage expansion, seeding per-volume status.
    async fn ensure_pvcs(&mut self, broker: &Broker, observed: &Observed, status: &mut KafkaClusterStatus) -> Result<Vec<PersistentVolumeClaim>, Error> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
        let existing = observed.pvcs.get(&broker.id).cloned().unwrap_or_default();
        let mut pvcs = Vec::new();
        let mut volumes = BTreeMap::new();

        for desired in self.builder.broker_pvcs(broker).map_err(|err| Error::Validation(err.to_string()))? {
            let mount = annotation(&desired.metadata, resources::ANNOTATION_MOUNT_PATH).unwrap_or_default();
            let requested = storage_request(desired.spec.as_ref().map(|spec| &spec.resources)).unwrap_or_default();
            match existing.iter().find(|pvc| annotation(&pvc.metadata, resources::ANNOTATION_MOUNT_PATH).as_deref() == Some(mount.as_str())) {
                Some(pvc) => {
                    let claimed = storage_request(pvc.spec.as_ref().map(|spec| &spec.resources)).unwrap_or_default();
                    let provisioned = pvc
                        .status
                        .as_ref()
                        .and_then(|pvc_status| pvc_status.capacity.as_ref())
                        .and_then(|capacity| capacity.get("storage"))
                        .map(|quantity| quantity.0.clone())
                        .unwrap_or_else(|| claimed.clone());

                    // Grow the claim when spec requests more than what was last requested. The
                    // volume holds in StorageExpanding until the provisioned capacity catches up.
                    if quantity_lt(&claimed, &requested) {
                        if let Some(name) = pvc.metadata.name.as_deref() {
                            let patch = serde_json::json!({ "spec": { "resources": { "requests": { "storage": requested } } } });
                            timeout(API_TIMEOUT, api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)))
                                .await
                                .context("timeout expanding broker PVC")??;
                            tracing::info!(broker = broker.id, pvc = name, size = %requested, "requested PVC expansion");
                        }
                    }

                    let in_sync = !quantity_lt(&provisioned, &requested);
                    if !in_sync {
                        self.requeue_soon = true;
                    }
                    volumes.insert(
                        mount,
                        VolumeState {
                            provisioned,
                            requested: requested.clone(),
                            phase: if in_sync { VolumePhase::InSync } else { VolumePhase::StorageExpanding },
                        },
                    );
                    pvcs.push(pvc.clone());
                }
                None => {
                    let created = self.create(&api, &desired, "broker PVC").await?;
                    volumes.insert(
                        mount,
                        VolumeState {
                            provisioned: requested.clone(),
                            requested: requested.clone(),
                            phase: VolumePhase::InSync,
                        },
                    );
                    pvcs.push(created);
                }
            }
        }
        status.broker_mut(broker.id).volumes = volumes;
        Ok(pvcs)
    }

    /// Restart brokers from the stale set under the rolling upgrade budget.
    ///
    /// Returns whether the upgrade is halted by the failure-threshold circuit breaker.
    #[tracing::instrument(level = "debug", skip(self, stale, observed, status))]
    async fn drive_upgrade(&mut self, stale: upgrade::StaleSet, observed: &Observed, status: &mut KafkaClusterStatus) -> Result<bool, Error> {
        if stale.is_empty() && status.reconciling_count() == 0 {
            // The triggering change set is fully converged; upgrade bookkeeping resets. A stale
            // broker held out of the restart set blocks the reset until its restart lands.
            status.rolling_upgrade = Default::default();
            return Ok(false);
        }
        self.requeue_soon = true;

        let planner = upgrade::UpgradePlanner::new(&self.cluster.spec.rolling_upgrade);
        match planner.plan(stale.restartable(), status.reconciling_count(), status.rolling_upgrade.error_count) {
            upgrade::UpgradePlan::Halted => Ok(true),
            upgrade::UpgradePlan::Restart(ids) => {
                let api: Api<Pod> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
                for id in ids {
                    status.broker_mut(id).phase = BrokerPhase::Reconciling;
                    // Restart is delete-and-recreate: the pod is recreated on the next pass
                    // with the new configuration version.
                    if let Some(name) = observed.pods.get(&id).and_then(|pod| pod.metadata.name.as_deref()) {
                        self.delete(&api, name).await?;
                        tracing::info!(broker = id, "restarting broker for configuration change");
                    }
                }
                Ok(false)
            }
        }
    }

    /// Tear down the backing resources of a gracefully removed broker.
    #[tracing::instrument(level = "debug", skip(self, observed))]
    async fn teardown_broker(&mut self, id: i32, observed: &Observed) -> Result<(), Error> {
        let namespace = self.cluster.namespace();
        let name = self.cluster.name();

        if let Some(pod_name) = observed.pods.get(&id).and_then(|pod| pod.metadata.name.as_deref()) {
            let api: Api<Pod> = Api::namespaced(self.ctx.client.clone(), namespace);
            self.delete(&api, pod_name).await?;
        }
        let api: Api<k8s_openapi::api::core::v1::Service> = Api::namespaced(self.ctx.client.clone(), namespace);
        self.delete(&api, &format!("{}-{}", name, id)).await?;
        let api: Api<k8s_openapi::api::core::v1::ConfigMap> = Api::namespaced(self.ctx.client.clone(), namespace);
        self.delete(&api, &format!("{}-config-{}", name, id)).await?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.ctx.client.clone(), namespace);
        for pvc_name in observed.pvcs.get(&id).iter().flat_map(|pvcs| pvcs.iter()).filter_map(|pvc| pvc.metadata.name.as_deref()) {
            self.delete(&api, pvc_name).await?;
        }
        Ok(())
    }

    /// Fetch the cluster's owned objects, keyed by broker id.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn observe(&self) -> Result<Observed, Error> {
        let params = ListParams {
            label_selector: Some(format!("{},{}={}", FRANZ_OPERATOR_LABEL_SELECTORS, resources::LABEL_FRANZ_RS_CLUSTER, self.cluster.name())),
            ..Default::default()
        };
        let mut observed = Observed::default();

        let api: Api<Pod> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
        let pods = timeout(API_TIMEOUT, api.list(&params)).await.context("timeout listing broker pods")??;
        for pod in pods.items {
            if let Some(id) = broker_id_of(&pod.metadata) {
                observed.pods.insert(id, pod);
            }
        }

        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
        let pvcs = timeout(API_TIMEOUT, api.list(&params)).await.context("timeout listing broker PVCs")??;
        for pvc in pvcs.items {
            if let Some(id) = broker_id_of(&pvc.metadata) {
                observed.pvcs.entry(id).or_default().push(pvc);
            }
        }
        Ok(observed)
    }

    /// Server-side apply the given object, creating or patching as needed.
    async fn apply<K>(&self, object: K) -> Result<K, Error>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + std::fmt::Debug,
    {
        let name = object.meta().name.clone().context("object to apply must carry a name")?;
        let api: Api<K> = Api::namespaced(self.ctx.client.clone(), self.cluster.namespace());
        let mut params = PatchParams::apply(APP_NAME);
        params.force = true;
        let applied = timeout(API_TIMEOUT, api.patch(&name, &params, &Patch::Apply(&object)))
            .await
            .context("timeout applying object")??;
        Ok(applied)
    }

    /// Create the given object.
    async fn create<K>(&self, api: &Api<K>, object: &K, kind: &str) -> Result<K, Error>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + std::fmt::Debug,
    {
        let created = timeout(API_TIMEOUT, api.create(&PostParams::default(), object))
            .await
            .with_context(|| format!("timeout creating {}", kind))??;
        Ok(created)
    }

    /// Delete the named object, tolerating objects which are already gone.
    async fn delete<K>(&self, api: &Api<K>, name: &str) -> Result<(), Error>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Clone + std::fmt::Debug,
    {
        let res = timeout(API_TIMEOUT, api.delete(name, &DeleteParams::default())).await.context("timeout deleting object")?;
        match res {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == http::StatusCode::NOT_FOUND => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Persist the given status under optimistic concurrency.
///
/// Returns `false` when the write lost to a concurrent update of the object, in which case the
/// caller abandons the write and requeues.
#[tracing::instrument(level = "debug", skip(ctx, cluster, status))]
async fn persist_status(ctx: &Ctx, cluster: &KafkaCluster, status: &KafkaClusterStatus) -> Result<bool, Error> {
    let api: Api<KafkaCluster> = Api::namespaced(ctx.client.clone(), cluster.namespace());
    let mut updated = cluster.clone();
    updated.status = Some(status.clone());
    let body = serde_json::to_vec(&updated).context("error serializing KafkaCluster status")?;
    let res = timeout(API_TIMEOUT, api.replace_status(cluster.name(), &PostParams::default(), body))
        .await
        .context("timeout updating KafkaCluster status")?;
    match res {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(api_err)) if api_err.code == http::StatusCode::CONFLICT => {
            tracing::debug!(name = %cluster.name(), "KafkaCluster status update conflict, abandoning write");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// The broker id label of the given object, if present.
fn broker_id_of(meta: &ObjectMeta) -> Option<i32> {
    meta.labels.as_ref()?.get(resources::LABEL_FRANZ_RS_BROKER_ID)?.parse().ok()
}

/// The named annotation of the given object, if present.
fn annotation(meta: &ObjectMeta, key: &str) -> Option<String> {
    meta.annotations.as_ref()?.get(key).cloned()
}

/// The storage request carried by a claim's resource requirements.
fn storage_request(resources: Option<&Option<k8s_openapi::api::core::v1::ResourceRequirements>>) -> Option<String> {
    resources?
        .as_ref()?
        .requests
        .as_ref()?
        .get("storage")
        .map(|quantity| quantity.0.clone())
}

/// Whether quantity `a` is strictly smaller than quantity `b`.
///
/// Unparseable quantities are never considered smaller, so malformed sizes do not trigger
/// spurious expansion requests.
fn quantity_lt(a: &str, b: &str) -> bool {
    match (resources::parse_quantity(a), resources::parse_quantity(b)) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}
