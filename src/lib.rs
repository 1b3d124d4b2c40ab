//! Replica set failover test engine.
//!
//! Requests a primary restart through the cluster-management control plane,
//! times the resulting election from the replica set's own topology, and runs
//! read/write load through several independently configured client profiles
//! so their survival of the election can be compared.
//!
//! The pieces, leaf first:
//! - [`ControlPlaneClient`]: digest-authenticated cluster-management API
//! - [`ClusterMonitor`]: topology polling and election timing
//! - [`WorkloadRunner`]: per-profile write/read loops and metrics
//! - [`TestOrchestrator`]: test lifecycle and the outward event stream

mod cluster;
mod config;
mod constants;
mod control_plane;
mod errors;
mod orchestrator;
mod profiles;
mod storage;
mod workload;

pub mod metrics;
pub mod server;
pub mod utils;

pub use cluster::*;
pub use config::*;
pub use control_plane::*;
pub use errors::*;
pub use orchestrator::*;
pub use profiles::*;
pub use storage::*;
pub use workload::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
