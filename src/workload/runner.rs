use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mongodb::bson::DateTime;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::OperationKind;
use super::OperationResult;
use super::ProfileMetrics;
use crate::constants::RECENT_DOCUMENT_LIMIT;
use crate::metrics::OPERATION_LATENCY_MS;
use crate::metrics::OPERATION_RESULTS;
use crate::utils::time::duration_as_millis;
use crate::utils::time::timestamp_millis;
use crate::ConnectionProfile;
use crate::DatabaseConnector;
use crate::ProfileName;
use crate::Result;
use crate::TestDocument;
use crate::WorkloadStore;

/// Drives one independent write/read loop per profile.
///
/// Every profile owns its own connection, sequence counter and metrics;
/// results leave the runner only through the `results` channel.
pub struct WorkloadRunner {
    connector: Arc<dyn DatabaseConnector>,
    test_id: String,
    results: mpsc::UnboundedSender<OperationResult>,

    workloads: DashMap<ProfileName, Arc<ProfileWorkload>>,
    running: Mutex<Option<CancellationToken>>,
}

struct ProfileWorkload {
    profile: ProfileName,
    test_id: String,
    store: Arc<dyn WorkloadStore>,
    sequence: AtomicU64,
    metrics: Mutex<ProfileMetrics>,
    results: mpsc::UnboundedSender<OperationResult>,
}

impl WorkloadRunner {
    pub fn new(
        connector: Arc<dyn DatabaseConnector>,
        test_id: impl Into<String>,
        results: mpsc::UnboundedSender<OperationResult>,
    ) -> Self {
        Self {
            connector,
            test_id: test_id.into(),
            results,
            workloads: DashMap::new(),
            running: Mutex::new(None),
        }
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Open one connection per profile with zeroed counters. Nothing is kept
    /// if any profile fails to connect.
    pub async fn initialize(
        &self,
        profiles: &[ConnectionProfile],
    ) -> Result<()> {
        self.cleanup();

        let mut opened = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let store = self.connector.connect_workload(profile).await?;
            info!("[{}] workload connection ready", profile.name);
            opened.push(Arc::new(ProfileWorkload {
                profile: profile.name,
                test_id: self.test_id.clone(),
                store,
                sequence: AtomicU64::new(0),
                metrics: Mutex::new(ProfileMetrics::default()),
                results: self.results.clone(),
            }));
        }

        for workload in opened {
            self.workloads.insert(workload.profile, workload);
        }
        Ok(())
    }

    /// Start a fixed-period loop per profile issuing one write and one read
    /// each tick. Ticks never wait for earlier operations. Calling this while
    /// running is a no-op.
    pub fn start_operations(
        &self,
        interval: Duration,
    ) {
        let token = {
            let mut running = self.running.lock();
            if running.is_some() {
                debug!("workload operations already running");
                return;
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };

        for entry in self.workloads.iter() {
            let workload = Arc::clone(entry.value());
            let token = token.clone();
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("[{}] workload loop stopped", workload.profile);
                            break;
                        }
                        _ = ticker.tick() => {
                            tokio::spawn(Arc::clone(&workload).write());
                            tokio::spawn(Arc::clone(&workload).read());
                        }
                    }
                }
            });
        }
        info!(
            "workload started for {} profile(s), interval {:?}",
            self.workloads.len(),
            interval
        );
    }

    /// Cancel future ticks; operations already in flight still report
    pub fn stop_operations(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
        }
    }

    /// Stop and release every profile connection, metrics and counters
    pub fn cleanup(&self) {
        self.stop_operations();
        self.workloads.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn metrics(
        &self,
        profile: ProfileName,
    ) -> Option<ProfileMetrics> {
        self.workloads
            .get(&profile)
            .map(|workload| workload.metrics.lock().clone())
    }

    /// Cloned metrics of every initialized profile
    pub fn metrics_snapshot(&self) -> BTreeMap<ProfileName, ProfileMetrics> {
        self.workloads
            .iter()
            .map(|entry| (*entry.key(), entry.value().metrics.lock().clone()))
            .collect()
    }

    /// Profiles that currently hold a connection
    pub fn active_connections(&self) -> Vec<ProfileName> {
        let mut profiles: Vec<ProfileName> = self.workloads.iter().map(|entry| *entry.key()).collect();
        profiles.sort();
        profiles
    }
}

impl ProfileWorkload {
    async fn write(self: Arc<Self>) {
        // Assigned at issuance, so the order holds even when completions interleave
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let document = TestDocument {
            timestamp: DateTime::now(),
            sequence,
            test_id: self.test_id.clone(),
            profile: self.profile.to_string(),
        };

        let started = Instant::now();
        let outcome = self.store.insert(document).await;
        self.complete(OperationKind::Write, started, outcome, Some(sequence));
    }

    async fn read(self: Arc<Self>) {
        let started = Instant::now();
        let outcome = self
            .store
            .recent(&self.test_id, RECENT_DOCUMENT_LIMIT)
            .await
            .map(|_| ());
        self.complete(OperationKind::Read, started, outcome, None);
    }

    fn complete(
        &self,
        kind: OperationKind,
        started: Instant,
        outcome: Result<()>,
        sequence: Option<u64>,
    ) {
        let latency_ms = duration_as_millis(started.elapsed());
        let success = outcome.is_ok();
        self.metrics.lock().record(kind, success, latency_ms);

        let profile = self.profile.as_str();
        OPERATION_RESULTS
            .with_label_values(&[profile, kind.as_str(), if success { "success" } else { "failure" }])
            .inc();
        OPERATION_LATENCY_MS
            .with_label_values(&[profile, kind.as_str()])
            .observe(latency_ms as f64);

        let error = outcome.err().map(|e| {
            debug!("[{}] {} failed after {}ms: {}", profile, kind, latency_ms, e);
            e.to_string()
        });

        let result = OperationResult {
            profile: self.profile,
            kind,
            success,
            latency_ms,
            timestamp: timestamp_millis(),
            error,
            sequence,
        };
        if self.results.send(result).is_err() {
            debug!("[{}] operation result dropped, receiver closed", profile);
        }
    }
}
