//! Configuration management for the failover tester.
//!
//! Provides hierarchical configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. `config/default` file
//! 3. Explicit config file passed on the command line
//! 4. File named by `CONFIG_PATH`
//! 5. `config/local` overrides
//! 6. Environment variables (highest priority)
//!
//! Settings are loaded once at process start and shared read-only.

mod control_plane;
mod database;
mod server;
mod test_run;
pub use control_plane::*;
pub use database::*;
pub use server::*;
pub use test_run::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prefix of environment overrides, e.g. `FAILOVER__DATABASE__URI`
pub const ENV_PREFIX: &str = "FAILOVER";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Cluster-management API credentials and identifiers
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    /// Database connection used by the monitor and workloads
    #[serde(default)]
    pub database: DatabaseConfig,
    /// HTTP/WebSocket listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Defaults for a single failover test run
    #[serde(default)]
    pub test: TestRunConfig,
}

impl Settings {
    /// Load configuration from all sources and validate the result
    ///
    /// # Arguments
    /// * `config_path` - Optional path to an explicit configuration file
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder().add_source(Config::try_from(&Settings::default())?);

        config = config.add_source(File::with_name("config/default").required(false));

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path));
        }

        config = config.add_source(File::with_name("config/local").required(false));

        config = config.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize().map_err(Error::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.control_plane.validate()?;
        self.database.validate()?;
        self.server.validate()?;
        self.test.validate()?;
        Ok(())
    }
}

pub(crate) fn require_non_empty(
    field: &str,
    value: &str,
) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidConfig(format!("{} is required", field)));
    }
    Ok(())
}
