//! A script used to generate the CRD used by this project.
//!
//! Any time the CRD spec changes, this script can be run to ensure that the CRD manifest is
//! up-to-date and ready to be synced with the cluster.

use anyhow::{Context, Result};
use franz_core::crd::KafkaCluster;
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crd = KafkaCluster::crd();
    let crd_yaml = serde_yaml::to_string(&crd).context("error serializing KafkaCluster CRD to yaml")?;
    println!("{}", crd_yaml);
    Ok(())
}
