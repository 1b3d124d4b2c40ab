use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::require_non_empty;
use crate::Error;
use crate::Result;

/// Cluster-management API access
///
/// Keys are used as digest credentials: `public_key` is the identity and
/// `private_key` the secret, which is never transmitted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub public_key: String,

    #[serde(default)]
    pub private_key: String,

    /// Project (group) owning the cluster
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub cluster_name: String,

    /// Versioned media type requested from the API
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            public_key: String::new(),
            private_key: String::new(),
            project_id: String::new(),
            cluster_name: String::new(),
            accept: default_accept(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ControlPlaneConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates control plane configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when a credential or identifier is
    /// missing, or the base url is not http(s)
    pub fn validate(&self) -> Result<()> {
        require_non_empty("control_plane.public_key", &self.public_key)?;
        require_non_empty("control_plane.private_key", &self.private_key)?;
        require_non_empty("control_plane.project_id", &self.project_id)?;
        require_non_empty("control_plane.cluster_name", &self.cluster_name)?;

        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(Error::InvalidConfig(format!(
                "control_plane.base_url {} must be an http(s) url",
                self.base_url
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "control_plane.request_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://cloud.mongodb.com/api/atlas/v2".to_string()
}
fn default_accept() -> String {
    "application/vnd.atlas.2023-11-15+json".to_string()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
