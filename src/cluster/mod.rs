//! Replica set topology as observed by the monitor.
//!
//! [`ClusterStatus`] values are rebuilt on every poll and never mutated in
//! place; the only state carried between polls lives in the
//! [`FailoverTracker`] owned by the [`ClusterMonitor`].

mod monitor;
mod tracker;
pub use monitor::*;
pub use tracker::*;


use serde::Deserialize;
use serde::Serialize;

use crate::utils::time::timestamp_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    Primary,
    Secondary,
    Arbiter,
    Unknown,
}

impl NodeRole {
    /// Map a member `stateStr` such as `PRIMARY` or `(not reachable/healthy)`
    pub fn from_state_str(state: &str) -> Self {
        match state.to_ascii_uppercase().as_str() {
            "PRIMARY" => NodeRole::Primary,
            "SECONDARY" => NodeRole::Secondary,
            "ARBITER" => NodeRole::Arbiter,
            _ => NodeRole::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
    pub health: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Healthy,
    FailoverInProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub cluster_name: String,
    pub state: ClusterState,
    pub primary: Option<ClusterNode>,
    pub secondaries: Vec<ClusterNode>,
    /// Milliseconds since the unix epoch
    pub timestamp: u64,
}

impl ClusterStatus {
    pub fn from_members(
        cluster_name: &str,
        members: Vec<ClusterNode>,
    ) -> Self {
        let mut primary = None;
        let mut secondaries = Vec::new();
        for node in members {
            match node.role {
                NodeRole::Primary => primary = Some(node),
                NodeRole::Secondary => secondaries.push(node),
                NodeRole::Arbiter | NodeRole::Unknown => {}
            }
        }
        Self {
            cluster_name: cluster_name.to_string(),
            state: if primary.is_some() {
                ClusterState::Healthy
            } else {
                ClusterState::FailoverInProgress
            },
            primary,
            secondaries,
            timestamp: timestamp_millis(),
        }
    }

    /// Snapshot emitted when the topology could not be read at all
    pub fn unreachable(cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            state: ClusterState::FailoverInProgress,
            primary: None,
            secondaries: Vec::new(),
            timestamp: timestamp_millis(),
        }
    }

    pub fn primary_host(&self) -> Option<&str> {
        self.primary.as_ref().map(|node| node.host.as_str())
    }
}
