use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ClusterStatus;
use super::FailoverTracker;
use super::Transition;
use crate::metrics::CLUSTER_POLL_FAILURES;
use crate::metrics::ELECTION_DURATION_SECONDS;
use crate::DatabaseConnector;
use crate::Result;
use crate::TopologyProbe;

/// Everything the monitor reports back to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Status(ClusterStatus),
    FailoverDetected {
        old_primary: String,
    },
    FailoverComplete {
        old_primary: String,
        new_primary: String,
        election_duration_seconds: f64,
    },
}

/// Polls replica set topology on a fixed period and times primary
/// elections.
///
/// Poll failures are never fatal: while a failover is being watched they are
/// reported as detection of the transition, otherwise they are only counted.
pub struct ClusterMonitor {
    connector: Arc<dyn DatabaseConnector>,
    cluster_name: String,
    events: mpsc::UnboundedSender<MonitorEvent>,

    probe: Mutex<Option<Arc<dyn TopologyProbe>>>,
    tracker: Mutex<FailoverTracker>,
    polling: Mutex<Option<CancellationToken>>,
}

impl ClusterMonitor {
    pub fn new(
        connector: Arc<dyn DatabaseConnector>,
        cluster_name: impl Into<String>,
        events: mpsc::UnboundedSender<MonitorEvent>,
    ) -> Self {
        Self {
            connector,
            cluster_name: cluster_name.into(),
            events,
            probe: Mutex::new(None),
            tracker: Mutex::new(FailoverTracker::new()),
            polling: Mutex::new(None),
        }
    }

    /// Open the dedicated monitoring connection and capture the primary.
    /// Nothing is emitted; status events start with the first scheduled poll.
    pub async fn initialize(&self) -> Result<()> {
        let probe = self.connector.connect_monitor().await?;
        match probe.members().await {
            Ok(members) => {
                let status = ClusterStatus::from_members(&self.cluster_name, members);
                self.tracker.lock().observe(status.primary_host(), Instant::now());
            }
            Err(e) => {
                CLUSTER_POLL_FAILURES.inc();
                debug!("cluster status poll failed: {:?}", e);
            }
        }
        *self.probe.lock() = Some(probe);

        match self.current_primary() {
            Some(primary) => info!("cluster monitor initialized, primary: {}", primary),
            None => warn!("cluster monitor initialized without a visible primary"),
        }
        Ok(())
    }

    /// Poll every `interval` until stopped. Ticks do not wait for the
    /// previous poll to finish. Calling this while already polling is a no-op.
    pub fn start_monitoring(
        self: &Arc<Self>,
        interval: Duration,
    ) {
        let token = {
            let mut polling = self.polling.lock();
            if polling.is_some() {
                debug!("cluster monitoring already running");
                return;
            }
            let token = CancellationToken::new();
            *polling = Some(token.clone());
            token
        };

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("cluster monitoring stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let monitor = Arc::clone(&monitor);
                        tokio::spawn(async move { monitor.poll_once().await });
                    }
                }
            }
        });
        info!("cluster monitoring started, interval {:?}", interval);
    }

    pub(crate) async fn poll_once(&self) {
        let probe = self.probe.lock().clone();
        let Some(probe) = probe else {
            debug!("poll skipped, monitor is not connected");
            return;
        };

        match probe.members().await {
            Ok(members) => {
                let status = ClusterStatus::from_members(&self.cluster_name, members);
                let transitions = self.tracker.lock().observe(status.primary_host(), Instant::now());
                self.emit(MonitorEvent::Status(status));
                for transition in transitions {
                    self.report(transition);
                }
            }
            Err(e) => {
                CLUSTER_POLL_FAILURES.inc();
                debug!("cluster status poll failed: {:?}", e);

                let (watching, detected) = {
                    let mut tracker = self.tracker.lock();
                    (tracker.is_failover_in_progress(), tracker.observe_poll_failure())
                };
                if let Some(transition) = detected {
                    self.report(transition);
                }
                if watching {
                    self.emit(MonitorEvent::Status(ClusterStatus::unreachable(&self.cluster_name)));
                }
            }
        }
    }

    fn report(
        &self,
        transition: Transition,
    ) {
        match transition {
            Transition::Detected { old_primary } => {
                info!("failover detected, primary {} is gone", old_primary);
                self.emit(MonitorEvent::FailoverDetected { old_primary });
            }
            Transition::Completed {
                old_primary,
                new_primary,
                election_duration,
            } => {
                let election_duration_seconds = election_duration.as_secs_f64();
                ELECTION_DURATION_SECONDS.set(election_duration_seconds);
                info!(
                    "failover complete: {} -> {} in {:.2}s",
                    old_primary, new_primary, election_duration_seconds
                );
                self.emit(MonitorEvent::FailoverComplete {
                    old_primary,
                    new_primary,
                    election_duration_seconds,
                });
            }
        }
    }

    fn emit(
        &self,
        event: MonitorEvent,
    ) {
        if self.events.send(event).is_err() {
            debug!("monitor event dropped, receiver closed");
        }
    }

    /// Record the pre-failover primary; call right before requesting the
    /// restart. Returns the primary being watched, if any.
    pub fn mark_failover_triggered(&self) -> Option<String> {
        let watched = self.tracker.lock().mark_triggered(Instant::now());
        match &watched {
            Some(primary) => info!("watching primary {} for failover", primary),
            None => warn!("failover triggered without a known primary, election will not be timed"),
        }
        watched
    }

    pub fn current_primary(&self) -> Option<String> {
        self.tracker.lock().current_primary().map(str::to_string)
    }

    /// Stop scheduling polls; in-flight polls still report
    pub fn stop_monitoring(&self) {
        if let Some(token) = self.polling.lock().take() {
            token.cancel();
        }
    }

    /// Stop polling, release the connection and forget the failover
    pub fn cleanup(&self) {
        self.stop_monitoring();
        self.probe.lock().take();
        self.tracker.lock().reset();
    }

    pub fn is_connected(&self) -> bool {
        self.probe.lock().is_some()
    }

    pub fn is_monitoring(&self) -> bool {
        self.polling.lock().is_some()
    }
}
