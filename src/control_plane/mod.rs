//! Cluster-management API client.
//!
//! Provides the two administrative operations a failover test needs from the
//! control plane, both behind HTTP digest authentication:
//! - [`ControlPlane::cluster_status`] - cluster description and state
//! - [`ControlPlane::trigger_failover`] - restart of the current primary
//!
//! # Basic Usage
//! ```no_run
//! use failover_tester::{ControlPlane, ControlPlaneClient, ControlPlaneConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = ControlPlaneConfig {
//!         public_key: "public".into(),
//!         private_key: "private".into(),
//!         project_id: "project".into(),
//!         cluster_name: "Cluster0".into(),
//!         ..Default::default()
//!     };
//!     let client = ControlPlaneClient::new(&config).unwrap();
//!
//!     let status = client.cluster_status().await.unwrap();
//!     println!("cluster {} is {}", status.name, status.state_name);
//!
//!     client.trigger_failover().await.unwrap();
//! }
//! ```

mod digest;
pub use digest::*;

#[cfg(test)]
mod control_plane_test;
#[cfg(test)]
mod digest_test;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::constants::CONTROL_PLANE_IDLE_STATE;
use crate::AuthError;
use crate::ControlPlaneConfig;
use crate::ControlPlaneError;
use crate::Result;

/// Cluster description returned by `GET .../clusters/{name}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescription {
    pub name: String,
    /// `IDLE` once pending changes, including a restart, have been applied
    pub state_name: String,
    #[serde(rename = "mongoDBVersion", default)]
    pub mongo_db_version: Option<String>,
    #[serde(default)]
    pub connection_strings: Option<ConnectionStrings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrings {
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub standard_srv: Option<String>,
}

/// A database process as enumerated by `GET .../processes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProcess {
    pub id: String,
    pub hostname: String,
    pub port: u16,
    pub type_name: String,
    #[serde(default)]
    pub user_alias: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessesPage {
    #[serde(default)]
    results: Vec<ClusterProcess>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    async fn cluster_status(&self) -> Result<ClusterDescription>;

    /// Ask the control plane to restart the current primary, forcing an election
    async fn trigger_failover(&self) -> Result<()>;

    /// Processes belonging to the configured cluster
    async fn cluster_processes(&self) -> Result<Vec<ClusterProcess>>;
}

pub struct ControlPlaneClient {
    http: reqwest::Client,
    credentials: DigestCredentials,
    base_url: String,
    project_id: String,
    cluster_name: String,
    accept: String,
}

impl ControlPlaneClient {
    pub fn new(config: &ControlPlaneConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            http,
            credentials: DigestCredentials::new(&config.public_key, &config.private_key),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            cluster_name: config.cluster_name.clone(),
            accept: config.accept.clone(),
        })
    }

    fn cluster_path(&self) -> String {
        format!("/groups/{}/clusters/{}", self.project_id, self.cluster_name)
    }

    /// Issue the request unauthenticated, answer a digest challenge once,
    /// and return the body (`None` when empty)
    async fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<Option<String>> {
        let url = format!("{}{}", self.base_url, path);

        let initial = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, &self.accept)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if initial.status() != StatusCode::UNAUTHORIZED {
            return read_body(initial).await;
        }

        let header = initial
            .headers()
            .get(WWW_AUTHENTICATE)
            .ok_or(AuthError::MissingChallenge)?
            .to_str()
            .map_err(|e| AuthError::MalformedChallenge(e.to_string()))?
            .to_string();
        let challenge = DigestChallenge::parse(&header)?;

        let uri = reqwest::Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| path.to_string());
        let authorization = self.credentials.authorization(method.as_str(), &uri, &challenge);

        let response = self
            .http
            .request(method, &url)
            .header(ACCEPT, &self.accept)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { body }.into());
        }
        read_body(response).await
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T> {
        let body = self.request(method, path).await?.unwrap_or_else(|| "{}".to_string());
        serde_json::from_str(&body).map_err(|e| ControlPlaneError::Decode(e).into())
    }
}

async fn read_body(response: reqwest::Response) -> Result<Option<String>> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ControlPlaneError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(body))
}

/// Whether a process is a member of `cluster_name`
pub fn belongs_to_cluster(
    process: &ClusterProcess,
    cluster_name: &str,
) -> bool {
    process
        .user_alias
        .as_deref()
        .is_some_and(|alias| alias.contains(cluster_name))
        || process.hostname.contains(&cluster_name.to_lowercase())
}

#[async_trait]
impl ControlPlane for ControlPlaneClient {
    async fn cluster_status(&self) -> Result<ClusterDescription> {
        self.request_json(Method::GET, &self.cluster_path()).await
    }

    async fn trigger_failover(&self) -> Result<()> {
        let path = format!("{}/restartPrimaries", self.cluster_path());
        self.request(Method::POST, &path).await?;
        info!("restart of primary requested for cluster {}", self.cluster_name);
        Ok(())
    }

    async fn cluster_processes(&self) -> Result<Vec<ClusterProcess>> {
        let path = format!("/groups/{}/processes", self.project_id);
        let page: ProcessesPage = self.request_json(Method::GET, &path).await?;
        Ok(page
            .results
            .into_iter()
            .filter(|p| belongs_to_cluster(p, &self.cluster_name))
            .collect())
    }
}

/// Poll the cluster status until it reports idle.
///
/// Individual polling errors are expected while the cluster transitions and
/// are ignored; only exhausting `max_wait` is an error.
pub async fn poll_until_healthy(
    control_plane: &dyn ControlPlane,
    max_wait: Duration,
    interval: Duration,
) -> Result<()> {
    let started = Instant::now();
    while started.elapsed() < max_wait {
        match control_plane.cluster_status().await {
            Ok(status) if status.state_name == CONTROL_PLANE_IDLE_STATE => return Ok(()),
            Ok(status) => debug!("cluster state is {}, waiting", status.state_name),
            Err(e) => debug!("cluster status poll failed while waiting for idle: {}", e),
        }
        sleep(interval).await;
    }
    Err(ControlPlaneError::HealthyTimeout(max_wait).into())
}
