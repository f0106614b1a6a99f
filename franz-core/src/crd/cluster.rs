//! KafkaCluster CRD.
//!
//! The code here is used to generate the actual CRD used in K8s. See examples/crd.rs.

use std::collections::{BTreeMap, BTreeSet};

use kube::CustomResource;
use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::status::KafkaClusterStatus;
use crate::error::AppError;

pub type KafkaCluster = KafkaClusterCRD; // Mostly to resolve a Rust Analyzer issue.

lazy_static! {
    /// Pattern matching a whole-number percentage, `0%` through `100%`.
    static ref PERCENTAGE: Regex = Regex::new(r"^(100|[0-9]{1,2})%$").expect("error compiling percentage regex");
}

/// CRD spec for the KafkaCluster resource.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, CustomResource, JsonSchema)]
#[kube(
    struct = "KafkaClusterCRD",
    status = "KafkaClusterStatus",
    group = "franz.rs",
    version = "v1beta1",
    kind = "KafkaCluster",
    namespaced,
    derive = "PartialEq",
    apiextensions = "v1",
    shortname = "kafka",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaClusterSpec {
    /// The default broker container image for the cluster.
    ///
    /// May be overridden per config group or per broker.
    pub image: String,
    /// The ZooKeeper connection addresses used by the cluster's brokers.
    pub zk_addresses: Vec<String>,

    /// The desired set of brokers of this cluster.
    ///
    /// Broker ids are unique and stable. Once a broker id has been observed in status it must
    /// never be reused for a different identity.
    pub brokers: Vec<Broker>,
    /// Named broker config groups which brokers may reference instead of carrying inline config.
    #[serde(default)]
    pub broker_config_groups: BTreeMap<String, BrokerConfig>,

    /// The cluster's listener definitions.
    pub listeners: ListenersConfig,
    /// Rack awareness config, distributing brokers across failure domains by node label.
    #[serde(default)]
    pub rack_awareness: Option<RackAwareness>,
    /// The budget under which rolling restarts of the cluster's brokers are sequenced.
    #[serde(default)]
    pub rolling_upgrade: RollingUpgradeConfig,
    /// Cruise Control integration config.
    #[serde(default)]
    pub cruise_control: CruiseControlConfig,

    /// The portion of brokers which may be voluntarily disrupted at once, as a percentage.
    ///
    /// When unset, the cluster's disruption budget tolerates the loss of all but one broker.
    #[serde(default)]
    pub disruption_budget: Option<String>,
}

/// One desired broker of the cluster, identified by a stable id.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Broker {
    /// The broker's unique, stable id.
    pub id: i32,
    /// The name of the config group providing this broker's config.
    #[serde(default)]
    pub broker_config_group: Option<String>,
    /// Inline broker config, taking precedence over any referenced config group.
    #[serde(default)]
    pub broker_config: Option<BrokerConfig>,
}

/// Configuration applied to a broker, either inline or via a named config group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Override of the cluster-level broker image.
    #[serde(default)]
    pub image: Option<String>,
    /// The broker's storage mounts.
    #[serde(default)]
    pub storage_configs: Vec<StorageConfig>,
    /// Compute resources requested for the broker's container.
    #[serde(default)]
    pub resource_requirements: Option<ResourceRequirementsSpec>,
    /// Additional Kafka properties merged into the broker's rendered config.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// A single storage mount of a broker.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// The path at which the volume is mounted in the broker container.
    pub mount_path: String,
    /// The requested volume size, e.g. `10Gi`.
    pub size: String,
    /// The storage class to use for the backing PVC.
    #[serde(default)]
    pub storage_class: Option<String>,
    /// The access modes to use for the backing PVC.
    #[serde(default)]
    pub access_modes: Option<Vec<String>>,
}

/// Compute resource requests and limits for a broker container.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirementsSpec {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

/// The cluster's listener definitions.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenersConfig {
    /// Listeners used within the cluster and its namespace.
    pub internal: Vec<InternalListener>,
    /// Listeners exposed outside of the cluster.
    #[serde(default)]
    pub external: Vec<ExternalListener>,
}

/// An internal listener definition.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalListener {
    /// The listener's name, unique among all listeners of the cluster.
    pub name: String,
    /// The listener's security protocol, e.g. `PLAINTEXT`.
    #[serde(default = "InternalListener::default_protocol")]
    pub protocol: String,
    /// The container port the listener is bound to.
    pub container_port: i32,
    /// Whether this listener carries inter-broker replication traffic.
    ///
    /// Exactly one internal listener must have this set.
    #[serde(default)]
    pub used_for_inner_broker_communication: bool,
    /// Whether this listener carries control plane traffic.
    ///
    /// Exactly one internal listener must have this set.
    #[serde(default)]
    pub used_for_controller_communication: bool,
}

impl InternalListener {
    fn default_protocol() -> String {
        "PLAINTEXT".into()
    }
}

/// An external listener definition.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalListener {
    /// The listener's name, unique among all listeners of the cluster.
    pub name: String,
    /// The listener's security protocol, e.g. `PLAINTEXT`.
    #[serde(default = "InternalListener::default_protocol")]
    pub protocol: String,
    /// The container port the listener is bound to.
    pub container_port: i32,
}

/// Rack awareness config.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RackAwareness {
    /// The node labels from which broker rack identifiers are derived.
    pub labels: Vec<String>,
}

/// The budget under which rolling restarts are sequenced.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpgradeConfig {
    /// The maximum number of brokers which may be mid-restart at once.
    #[serde(default = "RollingUpgradeConfig::default_max_concurrent_restarts")]
    pub max_concurrent_restarts: u32,
    /// The number of broker readiness failures tolerated during an upgrade.
    ///
    /// Once the observed failure count exceeds this threshold, no further broker restarts take
    /// place until the condition is cleared by spec change or manual remediation.
    #[serde(default = "RollingUpgradeConfig::default_failure_threshold")]
    pub failure_threshold: u32,
    /// The duration for which a restarted broker must continuously report ready before its
    /// restart is considered complete.
    #[serde(default = "RollingUpgradeConfig::default_readiness_stability_seconds")]
    pub readiness_stability_seconds: u64,
    /// The duration after which a restarted broker which has not become ready counts as a
    /// readiness failure, even if its pod has not terminally failed.
    #[serde(default = "RollingUpgradeConfig::default_restart_deadline_seconds")]
    pub restart_deadline_seconds: u64,
}

impl RollingUpgradeConfig {
    fn default_max_concurrent_restarts() -> u32 {
        1
    }

    fn default_failure_threshold() -> u32 {
        1
    }

    fn default_readiness_stability_seconds() -> u64 {
        10
    }

    fn default_restart_deadline_seconds() -> u64 {
        300
    }
}

impl Default for RollingUpgradeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_restarts: Self::default_max_concurrent_restarts(),
            failure_threshold: Self::default_failure_threshold(),
            readiness_stability_seconds: Self::default_readiness_stability_seconds(),
            restart_deadline_seconds: Self::default_restart_deadline_seconds(),
        }
    }
}

/// Cruise Control integration config.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CruiseControlConfig {
    /// Whether graceful broker add/remove is coordinated with Cruise Control.
    ///
    /// When disabled, upscale and downscale skip their graceful holding states entirely.
    #[serde(default = "CruiseControlConfig::default_enabled")]
    pub enabled: bool,
    /// Override of the Cruise Control API endpoint.
    ///
    /// Defaults to the in-namespace Cruise Control service of this cluster.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// The cooldown applied between submissions of a failed graceful action task.
    ///
    /// Retries are unbounded. Persistent failures are surfaced on status and expected to be
    /// resolved by operator intervention.
    #[serde(default = "CruiseControlConfig::default_task_cooldown_seconds")]
    pub task_cooldown_seconds: u64,
}

impl CruiseControlConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_task_cooldown_seconds() -> u64 {
        60
    }
}

impl Default for CruiseControlConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            endpoint: None,
            task_cooldown_seconds: Self::default_task_cooldown_seconds(),
        }
    }
}

impl KafkaClusterSpec {
    /// Validate the spec's invariants.
    ///
    /// A violation is terminal for the reconciliation pass which observes it: no resources are
    /// mutated, and the violation is surfaced on status until the spec changes.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen_ids = BTreeSet::new();
        for broker in self.brokers.iter() {
            if broker.id < 0 {
                return Err(AppError::InvalidInput(format!("broker id {} is invalid, ids must be non-negative", broker.id)));
            }
            if !seen_ids.insert(broker.id) {
                return Err(AppError::InvalidInput(format!("broker id {} is declared more than once", broker.id)));
            }
            if let Some(group) = broker.broker_config_group.as_deref() {
                if broker.broker_config.is_none() && !self.broker_config_groups.contains_key(group) {
                    return Err(AppError::InvalidInput(format!("broker {} references unknown config group {}", broker.id, group)));
                }
            }
        }

        let mut seen_names = BTreeSet::new();
        let mut seen_ports = BTreeSet::new();
        let listeners = self
            .listeners
            .internal
            .iter()
            .map(|listener| (listener.name.as_str(), listener.container_port))
            .chain(self.listeners.external.iter().map(|listener| (listener.name.as_str(), listener.container_port)));
        for (name, port) in listeners {
            if !seen_names.insert(name.to_uppercase()) {
                return Err(AppError::InvalidInput(format!("listener name {} is declared more than once", name)));
            }
            if !seen_ports.insert(port) {
                return Err(AppError::InvalidInput(format!("listener port {} is declared more than once", port)));
            }
        }
        if self.inter_broker_listener().is_none() {
            return Err(AppError::InvalidInput("exactly one internal listener must be marked for inter-broker communication".into()));
        }
        if self.controller_listener().is_none() {
            return Err(AppError::InvalidInput("exactly one internal listener must be marked for controller communication".into()));
        }

        if let Some(rack) = self.rack_awareness.as_ref() {
            if rack.labels.is_empty() {
                return Err(AppError::InvalidInput("rack awareness is enabled but no node labels are configured".into()));
            }
        }

        if self.rolling_upgrade.max_concurrent_restarts < 1 {
            return Err(AppError::InvalidInput("rollingUpgrade.maxConcurrentRestarts must be at least 1".into()));
        }

        if let Some(budget) = self.disruption_budget.as_deref() {
            if !PERCENTAGE.is_match(budget) {
                return Err(AppError::InvalidInput(format!("disruptionBudget {} is malformed, expected a percentage such as 20%", budget)));
            }
        }

        Ok(())
    }

    /// Resolve the effective config of the given broker.
    ///
    /// Inline config takes precedence over a referenced config group; a broker declaring neither
    /// receives the default config.
    pub fn config_for(&self, broker: &Broker) -> Result<BrokerConfig, AppError> {
        if let Some(config) = broker.broker_config.as_ref() {
            return Ok(config.clone());
        }
        match broker.broker_config_group.as_deref() {
            Some(group) => self
                .broker_config_groups
                .get(group)
                .cloned()
                .ok_or_else(|| AppError::InvalidInput(format!("broker {} references unknown config group {}", broker.id, group))),
            None => Ok(BrokerConfig::default()),
        }
    }

    /// The internal listener carrying inter-broker traffic, when unambiguously declared.
    pub fn inter_broker_listener(&self) -> Option<&InternalListener> {
        let mut marked = self.listeners.internal.iter().filter(|listener| listener.used_for_inner_broker_communication);
        match (marked.next(), marked.next()) {
            (Some(listener), None) => Some(listener),
            _ => None,
        }
    }

    /// The internal listener carrying control plane traffic, when unambiguously declared.
    pub fn controller_listener(&self) -> Option<&InternalListener> {
        let mut marked = self.listeners.internal.iter().filter(|listener| listener.used_for_controller_communication);
        match (marked.next(), marked.next()) {
            (Some(listener), None) => Some(listener),
            _ => None,
        }
    }

    /// The minimum number of brokers which must remain available through voluntary disruption.
    ///
    /// A configured percentage describes the disruptable portion of the cluster; the remainder
    /// must stay available. When unset, the budget tolerates loss of all but one broker.
    pub fn disruption_min_available(&self) -> i32 {
        let count = self.brokers.len() as i64;
        let budget = self
            .disruption_budget
            .as_deref()
            .and_then(|budget| PERCENTAGE.captures(budget))
            .and_then(|caps| caps.get(1))
            .and_then(|pct| pct.as_str().parse::<i64>().ok());
        match budget {
            Some(pct) => {
                let disruptable = count * pct / 100;
                std::cmp::max(count - disruptable, 1) as i32
            }
            None => 1,
        }
    }
}
