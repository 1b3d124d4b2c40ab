//! In-process stand-ins for a replica set, shared by the unit tests of the
//! monitor, the workload runner and the orchestrator
mod common;
mod fake_cluster;

pub use common::*;
pub use fake_cluster::*;
