use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::require_non_empty;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Connection string of the replica set under test
    #[serde(default)]
    pub uri: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Collection receiving workload documents
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Server selection timeout of the monitoring connection. Kept long so
    /// the monitor itself is never starved during an election.
    #[serde(default = "default_monitor_server_selection_timeout_ms")]
    pub monitor_server_selection_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: default_database(),
            collection: default_collection(),
            monitor_server_selection_timeout_ms: default_monitor_server_selection_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn monitor_server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_server_selection_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("database.uri", &self.uri)?;
        require_non_empty("database.database", &self.database)?;
        require_non_empty("database.collection", &self.collection)?;

        if self.monitor_server_selection_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "database.monitor_server_selection_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_database() -> String {
    "failover-test".to_string()
}
fn default_collection() -> String {
    "test-operations".to_string()
}
fn default_monitor_server_selection_timeout_ms() -> u64 {
    60_000
}
