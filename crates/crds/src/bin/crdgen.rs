//! # CRD Generator
//!
//! Prints the `Logging` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > charts/crds/logging.yaml
//! ```
//!
//! `Cluster`, `OperatingSystemConfig` and `ManagedResource` are owned by
//! Gardener and are not generated here.

use crds::Logging;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Logging::crd())?);
    Ok(())
}
