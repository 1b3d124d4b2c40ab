use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::options::ClientOptions;
use mongodb::options::FindOptions;
use mongodb::Client;
use mongodb::Collection;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;

use super::DatabaseConnector;
use super::TestDocument;
use super::TopologyProbe;
use super::WorkloadStore;
use crate::ClusterNode;
use crate::ConnectionProfile;
use crate::DatabaseConfig;
use crate::DatabaseError;
use crate::Error;
use crate::NodeRole;
use crate::Result;

const APP_NAME: &str = "failover-tester";
const DEFAULT_PORT: u16 = 27017;

/// Opens MongoDB clients for the monitor and the workload profiles
pub struct MongoConnector {
    config: DatabaseConfig,
}

impl MongoConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    async fn base_options(&self) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(&self.config.uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        Ok(options)
    }

    /// Drop the collection holding workload documents
    pub async fn drop_test_data(&self) -> Result<()> {
        let client = Client::with_options(self.base_options().await?)?;
        client
            .database(&self.config.database)
            .collection::<Document>(&self.config.collection)
            .drop(None)
            .await?;
        info!(
            "dropped {}.{}",
            self.config.database, self.config.collection
        );
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnector for MongoConnector {
    async fn connect_monitor(&self) -> Result<Arc<dyn TopologyProbe>> {
        let mut options = self.base_options().await?;
        options.server_selection_timeout = Some(self.config.monitor_server_selection_timeout());
        options.direct_connection = Some(false);

        let client = Client::with_options(options)?;
        // Fail fast on bad credentials or hosts instead of on the first poll
        client.database("admin").run_command(doc! { "ping": 1 }, None).await?;

        Ok(Arc::new(MongoTopologyProbe { client }))
    }

    async fn connect_workload(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Arc<dyn WorkloadStore>> {
        let settings = &profile.settings;
        let mut options = self.base_options().await?;
        if let Some(server_selection_timeout) = settings.server_selection_timeout() {
            options.server_selection_timeout = Some(server_selection_timeout);
        }
        if let Some(retry_writes) = settings.retry_writes {
            options.retry_writes = Some(retry_writes);
        }
        if let Some(retry_reads) = settings.retry_reads {
            options.retry_reads = Some(retry_reads);
        }

        info!(
            "[{}] connecting with options: {}",
            profile.name,
            if settings.has_overrides() {
                settings.uri_options()
            } else {
                "driver defaults".to_string()
            }
        );

        let client = Client::with_options(options)?;
        client.database("admin").run_command(doc! { "ping": 1 }, None).await?;

        let collection = client
            .database(&self.config.database)
            .collection::<TestDocument>(&self.config.collection);

        Ok(Arc::new(MongoWorkloadStore {
            collection,
            socket_timeout: settings.socket_timeout().filter(|t| !t.is_zero()),
        }))
    }
}

pub struct MongoTopologyProbe {
    client: Client,
}

#[async_trait]
impl TopologyProbe for MongoTopologyProbe {
    async fn members(&self) -> Result<Vec<ClusterNode>> {
        let status = self
            .client
            .database("admin")
            .run_command(doc! { "replSetGetStatus": 1 }, None)
            .await?;
        parse_members(&status)
    }
}

/// Map a `replSetGetStatus` reply onto cluster nodes
pub(crate) fn parse_members(status: &Document) -> Result<Vec<ClusterNode>> {
    let members = status
        .get_array("members")
        .map_err(|e| DatabaseError::MalformedStatus(e.to_string()))?;

    let mut nodes = Vec::with_capacity(members.len());
    for member in members {
        let Bson::Document(member) = member else {
            return Err(DatabaseError::MalformedStatus("member is not a document".into()).into());
        };
        let name = member.get_str("name").unwrap_or("unknown");
        let (host, port) = match name.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().unwrap_or(DEFAULT_PORT)),
            None => (name, DEFAULT_PORT),
        };
        let id = match member.get("_id") {
            Some(Bson::Int32(id)) => id.to_string(),
            Some(Bson::Int64(id)) => id.to_string(),
            _ => name.to_string(),
        };
        let health = match member.get("health") {
            Some(Bson::Double(h)) => *h,
            Some(Bson::Int32(h)) => f64::from(*h),
            Some(Bson::Int64(h)) => *h as f64,
            _ => 0.0,
        };
        nodes.push(ClusterNode {
            id,
            host: host.to_string(),
            port,
            role: NodeRole::from_state_str(member.get_str("stateStr").unwrap_or_default()),
            health,
        });
    }
    Ok(nodes)
}

pub struct MongoWorkloadStore {
    collection: Collection<TestDocument>,
    /// Client-side deadline per operation; the driver has no socket timeout
    socket_timeout: Option<Duration>,
}

impl MongoWorkloadStore {
    async fn with_socket_timeout<T, F>(
        &self,
        operation: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.socket_timeout {
            Some(limit) => timeout(limit, operation)
                .await
                .map_err(|_| DatabaseError::Timeout(limit))?,
            None => operation.await,
        }
    }
}

#[async_trait]
impl WorkloadStore for MongoWorkloadStore {
    async fn insert(
        &self,
        document: TestDocument,
    ) -> Result<()> {
        self.with_socket_timeout(async {
            self.collection.insert_one(document, None).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn recent(
        &self,
        test_id: &str,
        limit: i64,
    ) -> Result<Vec<TestDocument>> {
        self.with_socket_timeout(async {
            let options = FindOptions::builder()
                .sort(doc! { "timestamp": -1 })
                .limit(limit)
                .build();
            let cursor = self.collection.find(doc! { "testId": test_id }, options).await?;
            let documents: Vec<TestDocument> = cursor.try_collect().await?;
            debug!("read {} documents for {}", documents.len(), test_id);
            Ok::<_, Error>(documents)
        })
        .await
    }
}
