//! Resource set generator.
//!
//! Pure mapping from (cluster spec, broker identity) to the desired set of owned objects: one
//! config object and one Service per broker, one Service aggregating all brokers, one disruption
//! budget per cluster, one PVC per declared storage mount per broker, and one Pod per broker.
//! Everything here is deterministic and side-effect-free so the reconciler's diffing is stable
//! across passes with unchanged spec.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, ExecAction, Handler, Lifecycle,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod, PodAffinityTerm, PodAntiAffinity, PodSpec,
    ResourceRequirements, Service, ServicePort, ServiceSpec, TopologySpreadConstraint, Volume, VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use maplit::btreemap;

use crate::k8s::APP_NAME;
use franz_core::crd::{Broker, KafkaCluster, RequiredMetadata, StorageConfig};
use franz_core::AppError;

/// The canonical Franz label identifying the cluster an object belongs to.
pub(super) const LABEL_FRANZ_RS_CLUSTER: &str = "franz.rs/cluster";
/// The canonical Franz label identifying the broker an object belongs to.
pub(super) const LABEL_FRANZ_RS_BROKER_ID: &str = "franz.rs/broker-id";
/// The annotation carrying the configuration version rendered into a broker pod.
pub(super) const ANNOTATION_CONFIG_VERSION: &str = "franz.rs/config-version";
/// The annotation carrying the mount path a broker PVC backs.
pub(super) const ANNOTATION_MOUNT_PATH: &str = "franz.rs/mount-path";

/// The data key under which the rendered broker config is stored in its ConfigMap.
pub(super) const CONFIG_MAP_KEY_BROKER_CONFIG: &str = "broker-config";
/// The pod container name of the Kafka broker.
const CONTAINER_NAME_KAFKA: &str = "kafka";
/// The port on which the JMX exporter serves broker metrics.
const METRICS_PORT: i32 = 9020;
/// The grace period applied to broker pod termination.
const TERMINATION_GRACE_SECONDS: i64 = 120;
/// Default image providing the Cruise Control metrics reporter jar.
const METRICS_REPORTER_IMAGE: &str = "ghcr.io/banzaicloud/cruise-control-metrics-reporter:2.5.101";
/// Default image providing the JMX exporter java agent.
const JMX_EXPORTER_IMAGE: &str = "ghcr.io/banzaicloud/jmx-javaagent:0.16.1";

/// Builder of the desired resource set of a single cluster.
pub(super) struct ResourceBuilder<'a> {
    cluster: &'a KafkaCluster,
    name: &'a str,
    namespace: &'a str,
}

impl<'a> ResourceBuilder<'a> {
    /// Create a new instance.
    pub(super) fn new(cluster: &'a KafkaCluster) -> Self {
        Self {
            cluster,
            name: cluster.name(),
            namespace: cluster.namespace(),
        }
    }

    /// The canonical labels applied to every object of this cluster.
    pub(super) fn labels(&self) -> BTreeMap<String, String> {
        btreemap! {
            "app".into() => "kafka".into(),
            "franz.rs/controlled-by".into() => APP_NAME.into(),
            LABEL_FRANZ_RS_CLUSTER.into() => self.name.into(),
        }
    }

    /// The canonical labels applied to every object of the given broker.
    pub(super) fn broker_labels(&self, id: i32) -> BTreeMap<String, String> {
        let mut labels = self.labels();
        labels.insert(LABEL_FRANZ_RS_BROKER_ID.into(), id.to_string());
        labels
    }

    /// Render the configuration text of the given broker.
    ///
    /// Properties are rendered in sorted order so the output is deterministic. Per-broker config
    /// overrides are merged last and win over generated properties.
    pub(super) fn rendered_broker_config(&self, broker: &Broker) -> Result<String, AppError> {
        let config = self.cluster.spec.config_for(broker)?;
        let broker_host = format!("{}-{}.{}.svc.cluster.local", self.name, broker.id, self.namespace);
        let all_broker_host = format!("{}-all-broker.{}.svc.cluster.local", self.name, self.namespace);

        let mut props = BTreeMap::new();
        props.insert("broker.id".to_string(), broker.id.to_string());

        let mut listeners = Vec::new();
        let mut advertised = Vec::new();
        let mut protocol_map = Vec::new();
        for listener in self.cluster.spec.listeners.internal.iter() {
            let name = listener.name.to_uppercase();
            listeners.push(format!("{}://:{}", name, listener.container_port));
            advertised.push(format!("{}://{}:{}", name, broker_host, listener.container_port));
            protocol_map.push(format!("{}:{}", name, listener.protocol.to_uppercase()));
        }
        for listener in self.cluster.spec.listeners.external.iter() {
            let name = listener.name.to_uppercase();
            listeners.push(format!("{}://:{}", name, listener.container_port));
            protocol_map.push(format!("{}:{}", name, listener.protocol.to_uppercase()));
        }
        props.insert("listeners".into(), listeners.join(","));
        props.insert("advertised.listeners".into(), advertised.join(","));
        props.insert("listener.security.protocol.map".into(), protocol_map.join(","));

        // Listener designations are validated before any resource is generated.
        if let Some(inter_broker) = self.cluster.spec.inter_broker_listener() {
            props.insert("inter.broker.listener.name".into(), inter_broker.name.to_uppercase());
            if self.cluster.spec.cruise_control.enabled {
                props.insert(
                    "cruise.control.metrics.reporter.bootstrap.servers".into(),
                    format!("{}:{}", all_broker_host, inter_broker.container_port),
                );
                props.insert("cruise.control.metrics.reporter.kubernetes.mode".into(), "true".into());
                props.insert(
                    "metric.reporters".into(),
                    "com.linkedin.kafka.cruisecontrol.metricsreporter.CruiseControlMetricsReporter".into(),
                );
            }
        }
        if let Some(controller) = self.cluster.spec.controller_listener() {
            props.insert("control.plane.listener.name".into(), controller.name.to_uppercase());
        }

        let log_dirs = config.storage_configs.iter().map(|storage| format!("{}/kafka", storage.mount_path)).collect::<Vec<_>>();
        props.insert("log.dirs".into(), log_dirs.join(","));
        props.insert("zookeeper.connect".into(), self.cluster.spec.zk_addresses.join(","));

        for (key, value) in config.config.iter() {
            props.insert(key.clone(), value.clone());
        }

        let mut rendered = String::new();
        for (key, value) in props.iter() {
            rendered.push_str(key);
            rendered.push('=');
            rendered.push_str(value);
            rendered.push('\n');
        }
        Ok(rendered)
    }

    /// The configuration version of the given rendered config.
    pub(super) fn config_version(rendered: &str) -> String {
        format!("{:016x}", seahash::hash(rendered.as_bytes()))
    }

    /// Build the ConfigMap carrying the given broker's rendered configuration.
    pub(super) fn broker_configmap(&self, broker: &Broker, rendered: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(format!("{}-config-{}", self.name, broker.id)),
                namespace: Some(self.namespace.into()),
                labels: Some(self.broker_labels(broker.id)),
                ..Default::default()
            },
            data: Some(btreemap! { CONFIG_MAP_KEY_BROKER_CONFIG.into() => rendered.into() }),
            ..Default::default()
        }
    }

    /// Build the Service addressing the given broker.
    pub(super) fn broker_service(&self, broker: &Broker) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(format!("{}-{}", self.name, broker.id)),
                namespace: Some(self.namespace.into()),
                labels: Some(self.broker_labels(broker.id)),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(self.broker_labels(broker.id)),
                ports: Some(self.listener_ports(true)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the Service aggregating all brokers of the cluster.
    pub(super) fn all_broker_service(&self) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(format!("{}-all-broker", self.name)),
                namespace: Some(self.namespace.into()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(self.labels()),
                ports: Some(self.listener_ports(false)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the cluster's disruption budget, selecting all of its brokers.
    pub(super) fn disruption_budget(&self) -> PodDisruptionBudget {
        PodDisruptionBudget {
            metadata: ObjectMeta {
                name: Some(format!("{}-pdb", self.name)),
                namespace: Some(self.namespace.into()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            spec: Some(PodDisruptionBudgetSpec {
                min_available: Some(IntOrString::Int(self.cluster.spec.disruption_min_available())),
                selector: Some(LabelSelector {
                    match_labels: Some(self.labels()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build one PVC per storage mount declared for the given broker.
    ///
    /// PVCs are generate-named; the backing mount path is carried as an annotation so observed
    /// claims can be matched back to their declared mount across passes.
    pub(super) fn broker_pvcs(&self, broker: &Broker) -> Result<Vec<PersistentVolumeClaim>, AppError> {
        let config = self.cluster.spec.config_for(broker)?;
        let mut pvcs = Vec::with_capacity(config.storage_configs.len());
        for (idx, storage) in config.storage_configs.iter().enumerate() {
            pvcs.push(PersistentVolumeClaim {
                metadata: ObjectMeta {
                    generate_name: Some(format!("{}-{}-storage-{}-", self.name, broker.id, idx)),
                    namespace: Some(self.namespace.into()),
                    labels: Some(self.broker_labels(broker.id)),
                    annotations: Some(btreemap! { ANNOTATION_MOUNT_PATH.into() => storage.mount_path.clone() }),
                    ..Default::default()
                },
                spec: Some(Self::pvc_spec(storage)),
                ..Default::default()
            });
        }
        Ok(pvcs)
    }

    /// Build the PVC spec backing the given storage mount.
    pub(super) fn pvc_spec(storage: &StorageConfig) -> PersistentVolumeClaimSpec {
        PersistentVolumeClaimSpec {
            access_modes: Some(storage.access_modes.clone().unwrap_or_else(|| vec!["ReadWriteOnce".into()])),
            storage_class_name: storage.storage_class.clone(),
            resources: Some(ResourceRequirements {
                requests: Some(btreemap! { "storage".into() => Quantity(storage.size.clone()) }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the Pod running the given broker.
    ///
    /// The given PVCs must be the observed (or just created) claims of the broker, as their
    /// generated names are referenced by the pod's volumes. The pod carries the rendered
    /// configuration version as an annotation, which is what restart detection diffs against.
    pub(super) fn broker_pod(&self, broker: &Broker, config_version: &str, pvcs: &[PersistentVolumeClaim]) -> Result<Pod, AppError> {
        let config = self.cluster.spec.config_for(broker)?;
        let image = config.image.clone().unwrap_or_else(|| self.cluster.spec.image.clone());

        let mut volumes = vec![
            Volume {
                name: "broker-config".into(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some(format!("{}-config-{}", self.name, broker.id)),
                    ..Default::default()
                }),
                ..Default::default()
            },
            Volume {
                name: "extensions".into(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
            Volume {
                name: "jmx-jar-data".into(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        ];
        let mut mounts = vec![
            VolumeMount {
                name: "broker-config".into(),
                mount_path: "/config".into(),
                ..Default::default()
            },
            VolumeMount {
                name: "extensions".into(),
                mount_path: "/opt/kafka/libs/extensions".into(),
                ..Default::default()
            },
            VolumeMount {
                name: "jmx-jar-data".into(),
                mount_path: "/opt/jmx-exporter".into(),
                ..Default::default()
            },
        ];
        for (idx, pvc) in pvcs.iter().enumerate() {
            let claim_name = match pvc.metadata.name.clone() {
                Some(claim_name) => claim_name,
                None => continue, // Claim not yet created, its mount is added once observed.
            };
            let mount_path = pvc
                .metadata
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(ANNOTATION_MOUNT_PATH))
                .cloned()
                .unwrap_or_else(|| format!("/kafka-logs-{}", idx));
            volumes.push(Volume {
                name: format!("storage-{}", idx),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name,
                    ..Default::default()
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name: format!("storage-{}", idx),
                mount_path,
                ..Default::default()
            });
        }

        let mut ports = Vec::new();
        for listener in self.cluster.spec.listeners.internal.iter() {
            ports.push(ContainerPort {
                name: Some(listener.name.to_lowercase()),
                container_port: listener.container_port,
                ..Default::default()
            });
        }
        for listener in self.cluster.spec.listeners.external.iter() {
            ports.push(ContainerPort {
                name: Some(listener.name.to_lowercase()),
                container_port: listener.container_port,
                ..Default::default()
            });
        }
        ports.push(ContainerPort {
            name: Some("metrics".into()),
            container_port: METRICS_PORT,
            ..Default::default()
        });

        let resources = config.resource_requirements.as_ref().map(|reqs| ResourceRequirements {
            requests: Some(reqs.requests.iter().map(|(key, value)| (key.clone(), Quantity(value.clone()))).collect()),
            limits: Some(reqs.limits.iter().map(|(key, value)| (key.clone(), Quantity(value.clone()))).collect()),
        });

        let mut spec = PodSpec {
            init_containers: Some(vec![
                Container {
                    name: "cruise-control-reporter".into(),
                    image: Some(METRICS_REPORTER_IMAGE.into()),
                    command: Some(vec!["cp".into(), "-v".into(), "/opt/cruise-control-reporter/cruise-control-metrics-reporter.jar".into(), "/opt/kafka/libs/extensions/".into()]),
                    volume_mounts: Some(vec![VolumeMount {
                        name: "extensions".into(),
                        mount_path: "/opt/kafka/libs/extensions".into(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
                Container {
                    name: "jmx-exporter".into(),
                    image: Some(JMX_EXPORTER_IMAGE.into()),
                    command: Some(vec!["cp".into(), "-v".into(), "/jmx_prometheus_javaagent.jar".into(), "/opt/jmx-exporter/".into()]),
                    volume_mounts: Some(vec![VolumeMount {
                        name: "jmx-jar-data".into(),
                        mount_path: "/opt/jmx-exporter".into(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
            ]),
            containers: vec![Container {
                name: CONTAINER_NAME_KAFKA.into(),
                image: Some(image),
                env: Some(vec![
                    EnvVar {
                        name: "CLASSPATH".into(),
                        value: Some("/opt/kafka/libs/extensions/*".into()),
                        ..Default::default()
                    },
                    EnvVar {
                        name: "KAFKA_OPTS".into(),
                        value: Some(format!("-javaagent:/opt/jmx-exporter/jmx_prometheus_javaagent.jar={}", METRICS_PORT)),
                        ..Default::default()
                    },
                ]),
                ports: Some(ports),
                resources,
                volume_mounts: Some(mounts),
                lifecycle: Some(Lifecycle {
                    pre_stop: Some(Handler {
                        exec: Some(ExecAction {
                            command: Some(vec!["bash".into(), "-c".into(), "kill -s TERM 1 && while kill -0 1; do sleep 1; done".into()]),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            affinity: Some(self.broker_anti_affinity()),
            restart_policy: Some("Never".into()),
            termination_grace_period_seconds: Some(TERMINATION_GRACE_SECONDS),
            volumes: Some(volumes),
            ..Default::default()
        };
        if let Some(rack) = self.cluster.spec.rack_awareness.as_ref() {
            spec.topology_spread_constraints = Some(
                rack.labels
                    .iter()
                    .map(|label| TopologySpreadConstraint {
                        label_selector: Some(LabelSelector {
                            match_labels: Some(self.labels()),
                            ..Default::default()
                        }),
                        max_skew: 1,
                        topology_key: label.clone(),
                        when_unsatisfiable: "ScheduleAnyway".into(),
                    })
                    .collect(),
            );
        }

        Ok(Pod {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-{}-", self.name, broker.id)),
                namespace: Some(self.namespace.into()),
                labels: Some(self.broker_labels(broker.id)),
                annotations: Some(btreemap! { ANNOTATION_CONFIG_VERSION.into() => config_version.into() }),
                ..Default::default()
            },
            spec: Some(spec),
            ..Default::default()
        })
    }

    /// The service ports exposed for the cluster's listeners.
    ///
    /// External listeners are only exposed on per-broker services.
    fn listener_ports(&self, include_external: bool) -> Vec<ServicePort> {
        let mut ports = Vec::new();
        for listener in self.cluster.spec.listeners.internal.iter() {
            ports.push(ServicePort {
                name: Some(listener.name.to_lowercase()),
                port: listener.container_port,
                target_port: Some(IntOrString::Int(listener.container_port)),
                ..Default::default()
            });
        }
        if include_external {
            for listener in self.cluster.spec.listeners.external.iter() {
                ports.push(ServicePort {
                    name: Some(listener.name.to_lowercase()),
                    port: listener.container_port,
                    target_port: Some(IntOrString::Int(listener.container_port)),
                    ..Default::default()
                });
            }
        }
        ports.push(ServicePort {
            name: Some("metrics".into()),
            port: METRICS_PORT,
            target_port: Some(IntOrString::Int(METRICS_PORT)),
            ..Default::default()
        });
        ports
    }

    /// Anti-affinity keeping brokers of the same cluster off of shared nodes where possible.
    fn broker_anti_affinity(&self) -> Affinity {
        Affinity {
            pod_anti_affinity: Some(PodAntiAffinity {
                preferred_during_scheduling_ignored_during_execution: Some(vec![WeightedPodAffinityTerm {
                    weight: 100,
                    pod_affinity_term: PodAffinityTerm {
                        label_selector: Some(LabelSelector {
                            match_labels: Some(self.labels()),
                            ..Default::default()
                        }),
                        topology_key: "kubernetes.io/hostname".into(),
                        ..Default::default()
                    },
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Parse a K8s resource quantity such as `10Gi` into bytes.
///
/// Only the binary and decimal suffixes used for storage sizes are understood; anything else
/// yields `None` and is treated as never satisfied by callers.
pub(super) fn parse_quantity(quantity: &str) -> Option<i64> {
    let quantity = quantity.trim();
    let split = quantity.find(|c: char| !c.is_ascii_digit()).unwrap_or_else(|| quantity.len());
    let (digits, suffix) = quantity.split_at(split);
    let value = digits.parse::<i64>().ok()?;
    let scale: i64 = match suffix {
        "" => 1,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1i64 << 40,
        _ => return None,
    };
    value.checked_mul(scale)
}
