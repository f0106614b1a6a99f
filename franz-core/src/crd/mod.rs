//! Franz CRDs.
//!
//! References:
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definitions/
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definitions/#additional-printer-columns
//! - https://kubernetes.io/docs/reference/kubectl/jsonpath/

mod cluster;
#[cfg(test)]
mod cluster_test;
mod status;

use kube::Resource;

pub use cluster::{
    Broker, BrokerConfig, CruiseControlConfig, ExternalListener, InternalListener, KafkaCluster, KafkaClusterSpec, ListenersConfig, RackAwareness,
    ResourceRequirementsSpec, RollingUpgradeConfig, StorageConfig,
};
pub use status::{
    BrokerPhase, BrokerState, ClusterPhase, GracefulActionState, KafkaClusterStatus, RollingUpgradeStatus, TaskPhase, VolumePhase, VolumeState,
};

/// A convenience trait built around the fact that all implementors
/// must have the following attributes.
pub trait RequiredMetadata {
    /// The namespace of this object.
    fn namespace(&self) -> &str;

    /// The name of this object.
    fn name(&self) -> &str;
}

impl RequiredMetadata for KafkaCluster {
    fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }
}
