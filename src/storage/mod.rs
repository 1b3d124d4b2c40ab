//! Database access seams.
//!
//! The monitor and the workload runner never talk to a driver directly: they
//! open connections through a [`DatabaseConnector`], which hands out one
//! [`TopologyProbe`] for status polling and one independent
//! [`WorkloadStore`] per profile. Dropping a handle releases its connection.

mod mongo;
pub use mongo::*;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use mongodb::bson::DateTime;
use serde::Deserialize;
use serde::Serialize;

use crate::ClusterNode;
use crate::ConnectionProfile;
use crate::Result;

/// Document inserted by every workload write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDocument {
    /// Issuance time, stored as a BSON date
    pub timestamp: DateTime,
    pub sequence: u64,
    pub test_id: String,
    pub profile: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatabaseConnector: Send + Sync + 'static {
    /// Dedicated long-timeout connection used only for topology polling
    async fn connect_monitor(&self) -> Result<Arc<dyn TopologyProbe>>;

    /// Fresh connection configured from the profile's frozen settings
    async fn connect_workload(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Arc<dyn WorkloadStore>>;
}

#[async_trait]
pub trait TopologyProbe: Send + Sync + 'static {
    /// Current replica set members; fails while the set cannot be reached
    async fn members(&self) -> Result<Vec<ClusterNode>>;
}

#[async_trait]
pub trait WorkloadStore: Send + Sync + 'static {
    async fn insert(
        &self,
        document: TestDocument,
    ) -> Result<()>;

    /// Most recent documents of `test_id`, newest first
    async fn recent(
        &self,
        test_id: &str,
        limit: i64,
    ) -> Result<Vec<TestDocument>>;
}
