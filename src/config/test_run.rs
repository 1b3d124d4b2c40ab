use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Defaults for a failover test run
///
/// `duration_seconds` and `operation_interval_ms` may be overridden per run by
/// the `test:start` command; the remaining values are fixed for the process.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestRunConfig {
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,

    /// Period of each profile's write/read loop
    #[serde(default = "default_operation_interval_ms")]
    pub operation_interval_ms: u64,

    /// Period of the topology poll
    #[serde(default = "default_cluster_poll_interval_ms")]
    pub cluster_poll_interval_ms: u64,

    /// Baseline traffic before the restart is requested
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default = "default_healthy_poll_interval_ms")]
    pub healthy_poll_interval_ms: u64,

    #[serde(default = "default_healthy_max_wait_ms")]
    pub healthy_max_wait_ms: u64,
}

impl Default for TestRunConfig {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration_seconds(),
            operation_interval_ms: default_operation_interval_ms(),
            cluster_poll_interval_ms: default_cluster_poll_interval_ms(),
            warmup_ms: default_warmup_ms(),
            healthy_poll_interval_ms: default_healthy_poll_interval_ms(),
            healthy_max_wait_ms: default_healthy_max_wait_ms(),
        }
    }
}

impl TestRunConfig {
    pub fn cluster_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cluster_poll_interval_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn healthy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.healthy_poll_interval_ms)
    }

    pub fn healthy_max_wait(&self) -> Duration {
        Duration::from_millis(self.healthy_max_wait_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("test.duration_seconds", self.duration_seconds),
            ("test.operation_interval_ms", self.operation_interval_ms),
            ("test.cluster_poll_interval_ms", self.cluster_poll_interval_ms),
            ("test.healthy_poll_interval_ms", self.healthy_poll_interval_ms),
            ("test.healthy_max_wait_ms", self.healthy_max_wait_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be greater than 0", field)));
            }
        }
        Ok(())
    }
}

fn default_duration_seconds() -> u64 {
    90
}
fn default_operation_interval_ms() -> u64 {
    150
}
fn default_cluster_poll_interval_ms() -> u64 {
    2000
}
fn default_warmup_ms() -> u64 {
    5000
}
fn default_healthy_poll_interval_ms() -> u64 {
    2000
}
fn default_healthy_max_wait_ms() -> u64 {
    120_000
}
