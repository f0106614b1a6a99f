use super::cluster::*;

fn base_spec() -> KafkaClusterSpec {
    KafkaClusterSpec {
        image: "ghcr.io/franz/kafka:2.13-3.1.0".into(),
        zk_addresses: vec!["zk-client.zookeeper:2181".into()],
        brokers: vec![
            Broker { id: 0, broker_config_group: Some("default".into()), broker_config: None },
            Broker { id: 1, broker_config_group: Some("default".into()), broker_config: None },
            Broker { id: 2, broker_config_group: Some("default".into()), broker_config: None },
        ],
        broker_config_groups: maplit::btreemap! {
            "default".to_string() => BrokerConfig {
                storage_configs: vec![StorageConfig {
                    mount_path: "/kafka-logs".into(),
                    size: "10Gi".into(),
                    storage_class: None,
                    access_modes: None,
                }],
                ..Default::default()
            },
        },
        listeners: ListenersConfig {
            internal: vec![
                InternalListener {
                    name: "internal".into(),
                    protocol: "PLAINTEXT".into(),
                    container_port: 29092,
                    used_for_inner_broker_communication: true,
                    used_for_controller_communication: false,
                },
                InternalListener {
                    name: "controller".into(),
                    protocol: "PLAINTEXT".into(),
                    container_port: 29093,
                    used_for_inner_broker_communication: false,
                    used_for_controller_communication: true,
                },
            ],
            external: vec![ExternalListener {
                name: "external".into(),
                protocol: "PLAINTEXT".into(),
                container_port: 9094,
            }],
        },
        rack_awareness: None,
        rolling_upgrade: Default::default(),
        cruise_control: Default::default(),
        disruption_budget: None,
    }
}

#[test]
fn validate_accepts_well_formed_spec() {
    let spec = base_spec();
    let res = spec.validate();
    assert!(res.is_ok(), "expected well-formed spec to validate, got {:?}", res);
}

#[test]
fn validate_rejects_duplicate_broker_ids() {
    let mut spec = base_spec();
    spec.brokers.push(Broker { id: 1, broker_config_group: Some("default".into()), broker_config: None });
    let res = spec.validate();
    assert!(res.is_err(), "expected duplicate broker id to be rejected");
    assert!(res.unwrap_err().to_string().contains("broker id 1"), "unexpected error for duplicate broker id");
}

#[test]
fn validate_rejects_negative_broker_id() {
    let mut spec = base_spec();
    spec.brokers[0].id = -1;
    assert!(spec.validate().is_err(), "expected negative broker id to be rejected");
}

#[test]
fn validate_rejects_unknown_config_group() {
    let mut spec = base_spec();
    spec.brokers[2].broker_config_group = Some("does-not-exist".into());
    let res = spec.validate();
    assert!(res.is_err(), "expected unknown config group reference to be rejected");
    assert!(res.unwrap_err().to_string().contains("does-not-exist"), "unexpected error for unknown config group");
}

#[test]
fn validate_allows_unknown_group_when_inline_config_present() {
    let mut spec = base_spec();
    spec.brokers[2].broker_config_group = Some("does-not-exist".into());
    spec.brokers[2].broker_config = Some(BrokerConfig::default());
    assert!(spec.validate().is_ok(), "inline config should take precedence over group reference");
}

#[test]
fn validate_rejects_overlapping_listener_ports() {
    let mut spec = base_spec();
    spec.listeners.external[0].container_port = 29092;
    assert!(spec.validate().is_err(), "expected overlapping listener ports to be rejected");
}

#[test]
fn validate_rejects_duplicate_listener_names() {
    let mut spec = base_spec();
    spec.listeners.external[0].name = "INTERNAL".into();
    assert!(spec.validate().is_err(), "expected case-insensitive duplicate listener names to be rejected");
}

#[test]
fn validate_requires_inter_broker_listener() {
    let mut spec = base_spec();
    spec.listeners.internal[0].used_for_inner_broker_communication = false;
    assert!(spec.validate().is_err(), "expected spec without inter-broker listener to be rejected");
}

#[test]
fn validate_requires_unambiguous_controller_listener() {
    let mut spec = base_spec();
    spec.listeners.internal[0].used_for_controller_communication = true;
    assert!(spec.validate().is_err(), "expected two controller listeners to be rejected");
}

#[test]
fn validate_rejects_empty_rack_labels() {
    let mut spec = base_spec();
    spec.rack_awareness = Some(RackAwareness { labels: vec![] });
    assert!(spec.validate().is_err(), "expected empty rack awareness labels to be rejected");
}

#[test]
fn validate_rejects_zero_concurrent_restarts() {
    let mut spec = base_spec();
    spec.rolling_upgrade.max_concurrent_restarts = 0;
    assert!(spec.validate().is_err(), "expected zero maxConcurrentRestarts to be rejected");
}

#[test]
fn validate_rejects_malformed_disruption_budget() {
    let mut spec = base_spec();
    spec.disruption_budget = Some("twenty".into());
    assert!(spec.validate().is_err(), "expected malformed disruption budget to be rejected");

    spec.disruption_budget = Some("200%".into());
    assert!(spec.validate().is_err(), "expected out-of-range disruption budget to be rejected");
}

#[test]
fn config_for_prefers_inline_config() {
    let mut spec = base_spec();
    let inline = BrokerConfig {
        image: Some("ghcr.io/franz/kafka:custom".into()),
        ..Default::default()
    };
    spec.brokers[0].broker_config = Some(inline.clone());
    let resolved = spec.config_for(&spec.brokers[0]).expect("error resolving broker config");
    assert!(resolved == inline, "expected inline config to win over config group, got {:?}", resolved);
}

#[test]
fn config_for_resolves_group() {
    let spec = base_spec();
    let resolved = spec.config_for(&spec.brokers[1]).expect("error resolving broker config");
    assert!(
        resolved.storage_configs.len() == 1 && resolved.storage_configs[0].mount_path == "/kafka-logs",
        "expected group config to be resolved, got {:?}",
        resolved
    );
}

#[test]
fn config_for_defaults_when_unconfigured() {
    let mut spec = base_spec();
    spec.brokers[0].broker_config_group = None;
    let resolved = spec.config_for(&spec.brokers[0]).expect("error resolving broker config");
    assert!(resolved == BrokerConfig::default(), "expected default config for unconfigured broker");
}

#[test]
fn disruption_min_available_defaults_to_one() {
    let spec = base_spec();
    assert!(spec.disruption_min_available() == 1, "expected unset budget to default to minAvailable 1");
}

#[test]
fn disruption_min_available_respects_percentage() {
    let mut spec = base_spec();
    spec.disruption_budget = Some("20%".into());
    // 3 brokers, 20% disruptable => floor(0.6) = 0 disruptable, min available stays 3.
    assert!(spec.disruption_min_available() == 3, "got {}", spec.disruption_min_available());

    spec.brokers = (0..10).map(|id| Broker { id, broker_config_group: None, broker_config: None }).collect();
    // 10 brokers, 20% disruptable => 2 disruptable, 8 must remain.
    assert!(spec.disruption_min_available() == 8, "got {}", spec.disruption_min_available());
}
