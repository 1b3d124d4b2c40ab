use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::ClusterNode;
use crate::ConnectionProfile;
use crate::DatabaseConnector;
use crate::DatabaseError;
use crate::NodeRole;
use crate::Result;
use crate::TestDocument;
use crate::TopologyProbe;
use crate::WorkloadStore;

/// Driver default server selection timeout
pub const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Time a fake operation spends on the wire once a primary is selected
pub const FAKE_OPERATION_LATENCY: Duration = Duration::from_millis(5);

/// A replica set whose primary can be taken away and handed to another host.
///
/// Workload handles behave like a driver: they wait for a primary up to the
/// profile's server selection timeout, and an operation interrupted by a
/// primary change is retried once only when retries are enabled.
#[derive(Clone)]
pub struct FakeCluster {
    inner: Arc<FakeClusterInner>,
}

struct FakeClusterInner {
    hosts: Vec<String>,
    primary: watch::Sender<Option<String>>,
    probe_unreachable: AtomicBool,
    refuse_connections: AtomicBool,
    documents: Mutex<Vec<TestDocument>>,
    /// One clone per open handle
    lease: Arc<()>,
}

impl FakeCluster {
    /// Replica set over `hosts`, with the first host as primary
    pub fn new(hosts: &[&str]) -> Self {
        let (primary, _) = watch::channel(hosts.first().map(|h| h.to_string()));
        Self {
            inner: Arc::new(FakeClusterInner {
                hosts: hosts.iter().map(|h| h.to_string()).collect(),
                primary,
                probe_unreachable: AtomicBool::new(false),
                refuse_connections: AtomicBool::new(false),
                documents: Mutex::new(Vec::new()),
                lease: Arc::new(()),
            }),
        }
    }

    pub fn connector(&self) -> Arc<FakeConnector> {
        Arc::new(FakeConnector { cluster: self.clone() })
    }

    pub fn primary(&self) -> Option<String> {
        self.inner.primary.borrow().clone()
    }

    pub fn set_primary(
        &self,
        primary: Option<&str>,
    ) {
        self.inner.primary.send_replace(primary.map(str::to_string));
    }

    /// Make topology polls fail outright, as while the set is unreachable
    pub fn set_probe_unreachable(
        &self,
        unreachable: bool,
    ) {
        self.inner.probe_unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn refuse_connections(
        &self,
        refuse: bool,
    ) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    pub fn documents(&self) -> Vec<TestDocument> {
        self.inner.documents.lock().clone()
    }

    /// Monitor and workload handles not yet dropped
    pub fn open_handles(&self) -> usize {
        Arc::strong_count(&self.inner.lease) - 1
    }

    fn members(&self) -> Vec<ClusterNode> {
        let primary = self.primary();
        self.inner
            .hosts
            .iter()
            .enumerate()
            .map(|(id, host)| ClusterNode {
                id: id.to_string(),
                host: host.clone(),
                port: 27017,
                role: if primary.as_deref() == Some(host.as_str()) {
                    NodeRole::Primary
                } else {
                    NodeRole::Secondary
                },
                health: 1.0,
            })
            .collect()
    }

    fn check_connectable(&self) -> Result<()> {
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("connection refused".to_string()).into());
        }
        Ok(())
    }
}

pub struct FakeConnector {
    cluster: FakeCluster,
}

#[async_trait]
impl DatabaseConnector for FakeConnector {
    async fn connect_monitor(&self) -> Result<Arc<dyn TopologyProbe>> {
        self.cluster.check_connectable()?;
        Ok(Arc::new(FakeProbe {
            cluster: self.cluster.clone(),
            _lease: Arc::clone(&self.cluster.inner.lease),
        }))
    }

    async fn connect_workload(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Arc<dyn WorkloadStore>> {
        self.cluster.check_connectable()?;
        let settings = &profile.settings;
        Ok(Arc::new(FakeStore {
            cluster: self.cluster.clone(),
            server_selection_timeout: settings
                .server_selection_timeout()
                .unwrap_or(DEFAULT_SERVER_SELECTION_TIMEOUT),
            retry_writes: settings.retry_writes.unwrap_or(true),
            retry_reads: settings.retry_reads.unwrap_or(true),
            _lease: Arc::clone(&self.cluster.inner.lease),
        }))
    }
}

pub struct FakeProbe {
    cluster: FakeCluster,
    _lease: Arc<()>,
}

#[async_trait]
impl TopologyProbe for FakeProbe {
    async fn members(&self) -> Result<Vec<ClusterNode>> {
        if self.cluster.inner.probe_unreachable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("replica set unreachable".to_string()).into());
        }
        Ok(self.cluster.members())
    }
}

pub struct FakeStore {
    cluster: FakeCluster,
    server_selection_timeout: Duration,
    retry_writes: bool,
    retry_reads: bool,
    _lease: Arc<()>,
}

impl FakeStore {
    async fn select_primary(&self) -> Result<String> {
        let mut primary = self.cluster.inner.primary.subscribe();
        let selected = timeout(self.server_selection_timeout, async {
            primary
                .wait_for(|p| p.is_some())
                .await
                .map(|p| p.clone().unwrap_or_default())
        })
        .await;
        match selected {
            Ok(Ok(host)) => Ok(host),
            Ok(Err(_)) => Err(DatabaseError::Unavailable("cluster dropped".to_string()).into()),
            Err(_) => Err(DatabaseError::Unavailable(format!(
                "Server selection timed out after {} ms",
                self.server_selection_timeout.as_millis()
            ))
            .into()),
        }
    }

    /// Run against the primary; a stepdown during the round trip fails the
    /// attempt unless `retry` allows one more selection
    async fn on_primary(
        &self,
        retry: bool,
    ) -> Result<()> {
        let attempts = if retry { 2 } else { 1 };
        for _ in 0..attempts {
            let host = self.select_primary().await?;
            sleep(FAKE_OPERATION_LATENCY).await;
            if self.cluster.primary().as_deref() == Some(host.as_str()) {
                return Ok(());
            }
        }
        Err(DatabaseError::Unavailable("connection closed by stepdown".to_string()).into())
    }
}

#[async_trait]
impl WorkloadStore for FakeStore {
    async fn insert(
        &self,
        document: TestDocument,
    ) -> Result<()> {
        self.on_primary(self.retry_writes).await?;
        self.cluster.inner.documents.lock().push(document);
        Ok(())
    }

    async fn recent(
        &self,
        test_id: &str,
        limit: i64,
    ) -> Result<Vec<TestDocument>> {
        self.on_primary(self.retry_reads).await?;
        let mut documents: Vec<TestDocument> = self
            .cluster
            .documents()
            .into_iter()
            .filter(|d| d.test_id == test_id)
            .collect();
        documents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        documents.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(documents)
    }
}
