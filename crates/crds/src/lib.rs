//! Logging Extension CRD Definitions
//!
//! The `Logging` custom resource owned by the logging extension, plus typed
//! projections of the Gardener resources it reads or mutates (`Cluster`,
//! `OperatingSystemConfig`, `ManagedResource`).

pub mod cluster;
pub mod logging;
pub mod managed_resource;
pub mod operation;
pub mod osc;

pub use cluster::*;
pub use logging::*;
pub use managed_resource::*;
pub use operation::*;
pub use osc::*;
