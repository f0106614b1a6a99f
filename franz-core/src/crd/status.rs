//! KafkaCluster status types.
//!
//! Status is exclusively owned and mutated by the operator's reconciliation loop; no other
//! writer may update these fields. Entries in `brokers` are created when a broker id first
//! appears in spec and removed only after a successful graceful downscale and resource teardown.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CRD status object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KafkaClusterStatus {
    /// The cluster-level phase.
    #[serde(default)]
    pub phase: ClusterPhase,
    /// Per-broker observed state, keyed by broker id.
    #[serde(default)]
    pub brokers: BTreeMap<String, BrokerState>,
    /// State of the in-flight rolling upgrade, if any.
    #[serde(default)]
    pub rolling_upgrade: RollingUpgradeStatus,
    /// Human-readable detail on the current phase, surfaced for `Invalid` and halted clusters.
    #[serde(default)]
    pub message: Option<String>,
}

impl KafkaClusterStatus {
    /// Get a mutable handle to the state of the given broker, creating a default entry as needed.
    pub fn broker_mut(&mut self, id: i32) -> &mut BrokerState {
        self.brokers.entry(id.to_string()).or_default()
    }

    /// The number of brokers currently mid-restart.
    pub fn reconciling_count(&self) -> u32 {
        self.brokers.values().filter(|state| state.phase == BrokerPhase::Reconciling).count() as u32
    }
}

/// The cluster-level phase.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
pub enum ClusterPhase {
    /// The cluster has outstanding convergence work.
    Reconciling,
    /// All brokers are converged and in sync with spec.
    Running,
    /// A rolling upgrade is in flight.
    RollingUpgrading,
    /// The rolling upgrade failure threshold has been exceeded; restarts are halted until the
    /// condition is cleared by spec change or manual remediation.
    RollingUpgradeHalted,
    /// The spec violates an invariant; no resources are mutated until the spec changes.
    Invalid,
}

impl Default for ClusterPhase {
    fn default() -> Self {
        Self::Reconciling
    }
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Reconciling => "Reconciling",
                Self::Running => "Running",
                Self::RollingUpgrading => "RollingUpgrading",
                Self::RollingUpgradeHalted => "RollingUpgradeHalted",
                Self::Invalid => "Invalid",
            }
        )
    }
}

/// Observed state of a single broker.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrokerState {
    /// The configuration version last applied to the broker's workload.
    #[serde(default)]
    pub config_version: String,
    /// The broker's lifecycle phase.
    #[serde(default)]
    pub phase: BrokerPhase,
    /// State of the broker's outstanding graceful action, if any.
    #[serde(default)]
    pub graceful_action: GracefulActionState,
    /// Per-volume state, keyed by mount path.
    #[serde(default)]
    pub volumes: BTreeMap<String, VolumeState>,
}

impl BrokerState {
    /// Whether all of this broker's volumes are in sync with their requested size.
    pub fn volumes_in_sync(&self) -> bool {
        self.volumes.values().all(|volume| volume.phase == VolumePhase::InSync)
    }
}

/// A broker's lifecycle phase.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
pub enum BrokerPhase {
    /// The broker's backing resources have not yet been created.
    Pending,
    /// Steady state: the broker's applied configuration matches spec.
    ConfigInSync,
    /// The broker's configuration changed and a restart is owed or in flight.
    Reconciling,
    /// A graceful upscale is coordinating with the rebalancing service.
    GracefulUpscaleRunning,
    /// The graceful upscale completed; partition data has moved onto the broker.
    GracefulUpscaleSucceeded,
    /// A graceful downscale is coordinating with the rebalancing service.
    GracefulDownscaleRunning,
    /// Terminal: partition data has moved off the broker and its resources may be torn down.
    GracefulDownscaleSucceeded,
}

impl Default for BrokerPhase {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for BrokerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Pending => "Pending",
                Self::ConfigInSync => "ConfigInSync",
                Self::Reconciling => "Reconciling",
                Self::GracefulUpscaleRunning => "GracefulUpscaleRunning",
                Self::GracefulUpscaleSucceeded => "GracefulUpscaleSucceeded",
                Self::GracefulDownscaleRunning => "GracefulDownscaleRunning",
                Self::GracefulDownscaleSucceeded => "GracefulDownscaleSucceeded",
            }
        )
    }
}

/// State of a broker's outstanding rebalancing-service task.
///
/// At most one task is outstanding per broker at a time.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GracefulActionState {
    /// The id of the outstanding task, if any.
    #[serde(default)]
    pub task_id: Option<String>,
    /// The last observed phase of the task.
    #[serde(default)]
    pub task_phase: TaskPhase,
    /// The failure reason of the last task attempt, if it failed.
    #[serde(default)]
    pub error_message: Option<String>,
    /// RFC3339 timestamp of the last task submission, driving the retry cooldown.
    #[serde(default)]
    pub last_attempt: Option<String>,
}

/// The phase of a rebalancing-service task.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
pub enum TaskPhase {
    None,
    Requested,
    Running,
    Succeeded,
    Failed,
}

impl Default for TaskPhase {
    fn default() -> Self {
        Self::None
    }
}

/// Observed state of a single broker volume.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeState {
    /// The currently provisioned capacity.
    #[serde(default)]
    pub provisioned: String,
    /// The capacity requested by spec.
    #[serde(default)]
    pub requested: String,
    /// The volume's phase.
    #[serde(default)]
    pub phase: VolumePhase,
}

/// The phase of a broker volume.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
pub enum VolumePhase {
    /// The provisioned capacity satisfies the request.
    InSync,
    /// An expansion has been requested and has not yet been fulfilled.
    StorageExpanding,
}

impl Default for VolumePhase {
    fn default() -> Self {
        Self::InSync
    }
}

/// State of the in-flight rolling upgrade.
///
/// Reset only once the triggering configuration change set is fully converged.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpgradeStatus {
    /// The number of brokers which have failed readiness since the upgrade began.
    #[serde(default)]
    pub error_count: u32,
    /// The ids of brokers counted in `error_count`, keeping the count idempotent across passes.
    #[serde(default)]
    pub failed_brokers: Vec<i32>,
}

impl RollingUpgradeStatus {
    /// Record a readiness failure for the given broker, once.
    pub fn record_failure(&mut self, id: i32) {
        if !self.failed_brokers.contains(&id) {
            self.failed_brokers.push(id);
            self.error_count += 1;
        }
    }
}
