use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::FailoverEvent;
use super::TestRequest;
use super::TestResults;
use super::TestState;
use super::TestStatus;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::constants::UNKNOWN_PRIMARY;
use crate::utils::time::timestamp_millis;
use crate::ClusterMonitor;
use crate::ConnectionProfile;
use crate::ControlPlane;
use crate::DatabaseConnector;
use crate::MonitorEvent;
use crate::OperationResult;
use crate::OrchestrationError;
use crate::ProfileName;
use crate::ProfileRegistry;
use crate::Result;
use crate::Settings;
use crate::WorkloadRunner;

/// Owns the test lifecycle: `IDLE -> RUNNING -> (STOPPING ->) COMPLETE -> IDLE`.
///
/// Cheap to clone; clones share one [`TestState`] and one event stream. All
/// state mutations go through the `state` mutex and are tagged with the test
/// id they belong to, so a finished test can never write into the next one.
#[derive(Clone)]
pub struct TestOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    settings: Arc<Settings>,
    control_plane: Arc<dyn ControlPlane>,
    connector: Arc<dyn DatabaseConnector>,
    profiles: Arc<ProfileRegistry>,

    state: Mutex<TestState>,
    session: Mutex<Option<Arc<Session>>>,
    events: broadcast::Sender<FailoverEvent>,
    runs: AtomicU64,
}

/// Components constructed for one test and dropped with it
struct Session {
    test_id: String,
    runner: WorkloadRunner,
    monitor: Arc<ClusterMonitor>,
    /// Cancels warm-up, the pending restart request and the duration timer
    cancel: CancellationToken,
}

impl Session {
    /// Forwarders are left running: they end on their own once the runner,
    /// the monitor and every in-flight operation have dropped their senders.
    fn release(&self) {
        self.cancel.cancel();
        self.runner.cleanup();
        self.monitor.cleanup();
    }
}

impl TestOrchestrator {
    pub fn new(
        settings: Arc<Settings>,
        control_plane: Arc<dyn ControlPlane>,
        connector: Arc<dyn DatabaseConnector>,
        profiles: Arc<ProfileRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(OrchestratorInner {
                settings,
                control_plane,
                connector,
                profiles,
                state: Mutex::new(TestState::default()),
                session: Mutex::new(None),
                events,
                runs: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FailoverEvent> {
        self.inner.events.subscribe()
    }

    /// Cloned view of the current test state
    pub fn state(&self) -> TestState {
        self.inner.state.lock().clone()
    }

    pub fn profiles(&self) -> &Arc<ProfileRegistry> {
        &self.inner.profiles
    }

    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.inner.control_plane
    }

    /// Profiles holding a workload connection right now
    pub fn active_profiles(&self) -> Vec<ProfileName> {
        self.current_session()
            .map(|session| session.runner.active_connections())
            .unwrap_or_default()
    }

    /// Greeting for a new subscriber
    pub fn connection_status(&self) -> FailoverEvent {
        FailoverEvent::ConnectionStatus {
            connected: true,
            profiles: self.active_profiles(),
        }
    }

    /// Start a test and return its id once the restart has been requested.
    ///
    /// Rejected with a single `test:error` event when a test is already in
    /// progress. Any failure while starting also ends in `test:error`, with
    /// every opened connection released and the state back to idle.
    pub async fn start_test(
        &self,
        request: TestRequest,
    ) -> Result<String> {
        let (duration, interval) = match self.validate(&request) {
            Ok(timing) => timing,
            Err(e) => {
                self.emit(FailoverEvent::TestError { error: e.to_string() });
                return Err(e);
            }
        };
        let profiles = self.inner.profiles.snapshot(&request.profiles);
        let names: Vec<ProfileName> = profiles.iter().map(|p| p.name).collect();

        let session = {
            let mut state = self.inner.state.lock();
            if state.status != TestStatus::Idle {
                drop(state);
                warn!("test start rejected, a test is already running");
                let e = OrchestrationError::AlreadyRunning;
                self.emit(FailoverEvent::TestError { error: e.to_string() });
                return Err(e.into());
            }

            let session = self.new_session();
            *state = TestState {
                status: TestStatus::Running,
                test_id: Some(session.test_id.clone()),
                start_time: Some(timestamp_millis()),
                profiles: names.clone(),
                ..TestState::default()
            };
            *self.inner.session.lock() = Some(Arc::clone(&session));
            session
        };
        info!("starting test {} with profiles {:?}", session.test_id, names);

        let outcome = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => {
                info!("test {} stopped before the restart was requested", session.test_id);
                Ok(())
            }
            outcome = self.run_session(&session, &profiles, duration, interval) => outcome,
        };

        match outcome {
            Ok(()) => Ok(session.test_id.clone()),
            Err(e) => {
                error!("test {} failed to start: {}", session.test_id, e);
                self.emit(FailoverEvent::TestError { error: e.to_string() });
                self.abort_session(&session.test_id);
                Err(e)
            }
        }
    }

    fn validate(
        &self,
        request: &TestRequest,
    ) -> Result<(Duration, Duration)> {
        if request.profiles.is_empty() {
            return Err(OrchestrationError::NoProfiles.into());
        }
        let defaults = &self.inner.settings.test;
        let duration_seconds = request.duration_seconds.unwrap_or(defaults.duration_seconds);
        let interval_ms = request.operation_interval_ms.unwrap_or(defaults.operation_interval_ms);
        if duration_seconds == 0 {
            return Err(OrchestrationError::InvalidRequest("durationSeconds must be greater than 0".into()).into());
        }
        if interval_ms == 0 {
            return Err(
                OrchestrationError::InvalidRequest("operationIntervalMs must be greater than 0".into()).into(),
            );
        }
        Ok((Duration::from_secs(duration_seconds), Duration::from_millis(interval_ms)))
    }

    fn new_session(&self) -> Arc<Session> {
        let run = self.inner.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let test_id = format!("test-{}-{}", timestamp_millis(), run);

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (monitor_tx, monitor_rx) = mpsc::unbounded_channel();
        let runner = WorkloadRunner::new(Arc::clone(&self.inner.connector), test_id.clone(), results_tx);
        let monitor = Arc::new(ClusterMonitor::new(
            Arc::clone(&self.inner.connector),
            self.inner.settings.control_plane.cluster_name.clone(),
            monitor_tx,
        ));

        self.forward_results(results_rx);
        self.forward_monitor_events(test_id.clone(), monitor_rx);

        Arc::new(Session {
            test_id,
            runner,
            monitor,
            cancel: CancellationToken::new(),
        })
    }

    async fn run_session(
        &self,
        session: &Arc<Session>,
        profiles: &[ConnectionProfile],
        duration: Duration,
        interval: Duration,
    ) -> Result<()> {
        let settings = &self.inner.settings.test;

        session.runner.initialize(profiles).await?;
        session.monitor.initialize().await?;
        session.monitor.start_monitoring(settings.cluster_poll_interval());

        self.emit(FailoverEvent::TestStarted {
            test_id: session.test_id.clone(),
            profiles: profiles.iter().map(|p| p.name).collect(),
            timestamp: timestamp_millis(),
        });
        session.runner.start_operations(interval);

        // baseline traffic before the election
        sleep(settings.warmup()).await;

        let old_primary = session.monitor.current_primary();
        self.update_state(&session.test_id, |state| state.old_primary = old_primary.clone());
        session.monitor.mark_failover_triggered();

        info!(
            "requesting primary restart, current primary: {}",
            old_primary.as_deref().unwrap_or(UNKNOWN_PRIMARY)
        );
        self.inner.control_plane.trigger_failover().await?;
        self.emit(FailoverEvent::FailoverTriggered {
            timestamp: timestamp_millis(),
        });

        let orchestrator = self.clone();
        let test_id = session.test_id.clone();
        let cancel = session.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(duration) => {
                    info!("test {} reached its duration", test_id);
                    orchestrator.complete_test(&test_id);
                }
            }
        });
        Ok(())
    }

    /// Manual stop; a no-op unless a test is running
    pub fn stop_test(&self) -> Option<TestResults> {
        let test_id = {
            let mut state = self.inner.state.lock();
            if state.status != TestStatus::Running {
                debug!("stop ignored, no test running");
                return None;
            }
            state.status = TestStatus::Stopping;
            state.test_id.clone()?
        };
        info!("stopping test {}", test_id);
        self.complete_test(&test_id)
    }

    /// Single completion path for manual stops and the duration timer.
    /// Only the first call for a given test builds a report.
    pub(crate) fn complete_test(
        &self,
        test_id: &str,
    ) -> Option<TestResults> {
        let session = self.take_session(test_id)?;
        session.cancel.cancel();
        session.runner.stop_operations();
        session.monitor.stop_monitoring();

        let metrics = session.runner.metrics_snapshot();
        let results = {
            let mut state = self.inner.state.lock();
            let end_time = timestamp_millis();
            state.end_time = Some(end_time);
            state.status = TestStatus::Complete;
            TestResults {
                test_id: test_id.to_string(),
                start_time: state.start_time.unwrap_or(end_time),
                end_time,
                election_duration: state.election_duration.unwrap_or(0.0),
                old_primary: state.old_primary.clone().unwrap_or_else(|| UNKNOWN_PRIMARY.to_string()),
                new_primary: state.new_primary.clone().unwrap_or_else(|| UNKNOWN_PRIMARY.to_string()),
                metrics: metrics
                    .into_iter()
                    .filter(|(profile, _)| state.profiles.contains(profile))
                    .collect(),
            }
        };

        info!(
            "test {} complete, election {:.2}s ({} -> {})",
            test_id, results.election_duration, results.old_primary, results.new_primary
        );
        self.emit(FailoverEvent::TestComplete(results.clone()));

        session.release();
        self.update_state(test_id, |state| state.status = TestStatus::Idle);
        Some(results)
    }

    /// Tear down a test that failed to start, without a report
    fn abort_session(
        &self,
        test_id: &str,
    ) {
        if let Some(session) = self.take_session(test_id) {
            session.release();
        }
        self.update_state(test_id, |state| {
            state.status = TestStatus::Idle;
            state.end_time = Some(timestamp_millis());
        });
    }

    fn take_session(
        &self,
        test_id: &str,
    ) -> Option<Arc<Session>> {
        let mut slot = self.inner.session.lock();
        match slot.as_ref() {
            Some(session) if session.test_id == test_id => slot.take(),
            _ => None,
        }
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        self.inner.session.lock().clone()
    }

    /// Apply `f` only while `test_id` is still the test on record
    fn update_state<F>(
        &self,
        test_id: &str,
        f: F,
    ) -> bool
    where
        F: FnOnce(&mut TestState),
    {
        let mut state = self.inner.state.lock();
        if state.test_id.as_deref() != Some(test_id) {
            return false;
        }
        f(&mut state);
        true
    }

    fn forward_results(
        &self,
        mut results: mpsc::UnboundedReceiver<OperationResult>,
    ) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            // Results are streamed even after their test completed
            while let Some(result) = results.recv().await {
                orchestrator.emit(FailoverEvent::OperationResult(result));
            }
        });
    }

    fn forward_monitor_events(
        &self,
        test_id: String,
        mut monitor_events: mpsc::UnboundedReceiver<MonitorEvent>,
    ) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            while let Some(event) = monitor_events.recv().await {
                orchestrator.apply_monitor_event(&test_id, event);
            }
        });
    }

    /// Fold a monitor event into the state of `test_id` and broadcast it.
    /// Failover events of a test that is no longer on record are dropped;
    /// status snapshots carry no test state and always go out.
    pub(crate) fn apply_monitor_event(
        &self,
        test_id: &str,
        event: MonitorEvent,
    ) {
        let timestamp = timestamp_millis();
        let outward = match event {
            MonitorEvent::Status(status) => Some(FailoverEvent::ClusterStatus(status)),
            MonitorEvent::FailoverDetected { old_primary } => {
                let applied = self.update_state(test_id, |state| {
                    state.old_primary = Some(old_primary.clone());
                });
                applied.then_some(FailoverEvent::FailoverDetected { old_primary, timestamp })
            }
            MonitorEvent::FailoverComplete {
                old_primary,
                new_primary,
                election_duration_seconds,
            } => {
                let applied = self.update_state(test_id, |state| {
                    state.old_primary = Some(old_primary.clone());
                    state.new_primary = Some(new_primary.clone());
                    state.election_duration = Some(election_duration_seconds);
                });
                applied.then_some(FailoverEvent::FailoverComplete {
                    old_primary,
                    new_primary,
                    election_duration_seconds,
                    timestamp,
                })
            }
        };

        match outward {
            Some(event) => self.emit(event),
            None => debug!("dropped monitor event of finished test {}", test_id),
        }
    }

    fn emit(
        &self,
        event: FailoverEvent,
    ) {
        let name = event.name();
        if self.inner.events.send(event).is_err() {
            trace!("no subscribers for {}", name);
        }
    }
}
