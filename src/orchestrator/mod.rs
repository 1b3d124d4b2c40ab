//! Test lifecycle and the outward event stream.
//!
//! Every occurrence worth showing to a front end becomes one
//! [`FailoverEvent`], serialized as `{"event": "<name>", "data": {...}}`.
//! Front ends send back [`InboundCommand`]s in the same envelope.

mod test_orchestrator;
pub use test_orchestrator::*;


use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::ClusterStatus;
use crate::OperationResult;
use crate::ProfileMetrics;
use crate::ProfileName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Idle,
    Running,
    Stopping,
    Complete,
}

/// The single mutable record of the current (or last) test
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestState {
    pub status: TestStatus,
    pub test_id: Option<String>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub profiles: Vec<ProfileName>,
    /// Seconds
    pub election_duration: Option<f64>,
    pub old_primary: Option<String>,
    pub new_primary: Option<String>,
}

impl Default for TestState {
    fn default() -> Self {
        Self {
            status: TestStatus::Idle,
            test_id: None,
            start_time: None,
            end_time: None,
            profiles: Vec::new(),
            election_duration: None,
            old_primary: None,
            new_primary: None,
        }
    }
}

/// Final report, built once when a test completes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub test_id: String,
    pub start_time: u64,
    pub end_time: u64,
    /// Seconds; 0 when no election was observed
    pub election_duration: f64,
    pub old_primary: String,
    pub new_primary: String,
    pub metrics: BTreeMap<ProfileName, ProfileMetrics>,
}

/// Payload of `test:start`; omitted values fall back to the configured defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    pub profiles: Vec<ProfileName>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub operation_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum FailoverEvent {
    #[serde(rename = "cluster:status")]
    ClusterStatus(ClusterStatus),

    #[serde(rename = "operation:result")]
    OperationResult(OperationResult),

    #[serde(rename = "test:started", rename_all = "camelCase")]
    TestStarted {
        test_id: String,
        profiles: Vec<ProfileName>,
        timestamp: u64,
    },

    #[serde(rename = "failover:triggered")]
    FailoverTriggered { timestamp: u64 },

    #[serde(rename = "failover:detected", rename_all = "camelCase")]
    FailoverDetected { old_primary: String, timestamp: u64 },

    #[serde(rename = "failover:complete", rename_all = "camelCase")]
    FailoverComplete {
        old_primary: String,
        new_primary: String,
        election_duration_seconds: f64,
        timestamp: u64,
    },

    #[serde(rename = "test:complete")]
    TestComplete(TestResults),

    #[serde(rename = "test:error")]
    TestError { error: String },

    /// Sent to each new subscriber only
    #[serde(rename = "connection:status")]
    ConnectionStatus {
        connected: bool,
        profiles: Vec<ProfileName>,
    },
}

impl FailoverEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FailoverEvent::ClusterStatus(_) => "cluster:status",
            FailoverEvent::OperationResult(_) => "operation:result",
            FailoverEvent::TestStarted { .. } => "test:started",
            FailoverEvent::FailoverTriggered { .. } => "failover:triggered",
            FailoverEvent::FailoverDetected { .. } => "failover:detected",
            FailoverEvent::FailoverComplete { .. } => "failover:complete",
            FailoverEvent::TestComplete(_) => "test:complete",
            FailoverEvent::TestError { .. } => "test:error",
            FailoverEvent::ConnectionStatus { .. } => "connection:status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundCommand {
    #[serde(rename = "test:start")]
    Start(TestRequest),

    #[serde(rename = "test:stop")]
    Stop,
}
