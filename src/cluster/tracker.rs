use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverPhase {
    /// No failover requested
    Idle,
    /// Restart requested, the pre-failover primary is still tracked
    Watching,
    /// Primary missing or unreachable, no replacement confirmed yet
    TransitionDetected,
    /// New primary confirmed and election duration computed
    Complete,
}

/// Outcome of feeding one observation into the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Detected {
        old_primary: String,
    },
    Completed {
        old_primary: String,
        new_primary: String,
        election_duration: Duration,
    },
}

/// Primary-election state machine.
///
/// Election duration is measured from the last poll that still showed the
/// pre-failover primary, not from the restart request: the delay before the
/// control plane acts is not part of the election.
#[derive(Debug)]
pub struct FailoverTracker {
    phase: FailoverPhase,
    current_primary: Option<String>,
    initial_primary: Option<String>,
    triggered_at: Option<Instant>,
    last_seen_initial: Option<Instant>,
}

impl Default for FailoverTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FailoverTracker {
    pub fn new() -> Self {
        Self {
            phase: FailoverPhase::Idle,
            current_primary: None,
            initial_primary: None,
            triggered_at: None,
            last_seen_initial: None,
        }
    }

    pub fn phase(&self) -> FailoverPhase {
        self.phase
    }

    pub fn current_primary(&self) -> Option<&str> {
        self.current_primary.as_deref()
    }

    pub fn initial_primary(&self) -> Option<&str> {
        self.initial_primary.as_deref()
    }

    /// Time since the restart was requested
    pub fn since_triggered(
        &self,
        now: Instant,
    ) -> Option<Duration> {
        self.triggered_at.map(|t| now.saturating_duration_since(t))
    }

    pub fn is_failover_in_progress(&self) -> bool {
        matches!(self.phase, FailoverPhase::Watching | FailoverPhase::TransitionDetected)
    }

    /// Start watching the current primary. The last-seen clock starts now,
    /// since the primary was confirmed by the poll that set it.
    ///
    /// Without a known primary there is nothing to watch and the tracker
    /// stays idle.
    pub fn mark_triggered(
        &mut self,
        now: Instant,
    ) -> Option<String> {
        self.triggered_at = Some(now);
        self.initial_primary = self.current_primary.clone();
        if self.initial_primary.is_some() {
            self.phase = FailoverPhase::Watching;
            self.last_seen_initial = Some(now);
        } else {
            self.phase = FailoverPhase::Idle;
            self.last_seen_initial = None;
        }
        self.initial_primary.clone()
    }

    /// Feed the primary host seen by a successful poll.
    ///
    /// `Detected` is produced at most once per failover; completing straight
    /// from `Watching` yields `Detected` followed by `Completed`.
    pub fn observe(
        &mut self,
        primary: Option<&str>,
        now: Instant,
    ) -> Vec<Transition> {
        let mut transitions = Vec::new();

        if self.is_failover_in_progress() {
            if let Some(initial) = self.initial_primary.clone() {
                match primary {
                    Some(host) if host == initial => {
                        self.last_seen_initial = Some(now);
                    }
                    Some(host) => {
                        if self.phase == FailoverPhase::Watching {
                            transitions.push(Transition::Detected {
                                old_primary: initial.clone(),
                            });
                        }
                        let last_seen = self.last_seen_initial.or(self.triggered_at).unwrap_or(now);
                        transitions.push(Transition::Completed {
                            old_primary: initial,
                            new_primary: host.to_string(),
                            election_duration: now.saturating_duration_since(last_seen),
                        });
                        self.phase = FailoverPhase::Complete;
                    }
                    None => {
                        if let Some(detected) = self.enter_transition(initial) {
                            transitions.push(detected);
                        }
                    }
                }
            }
        }

        if let Some(host) = primary {
            self.current_primary = Some(host.to_string());
        }
        transitions
    }

    /// A poll that failed outright while watching is itself evidence that
    /// the election has begun
    pub fn observe_poll_failure(&mut self) -> Option<Transition> {
        if !self.is_failover_in_progress() {
            return None;
        }
        let initial = self.initial_primary.clone()?;
        self.enter_transition(initial)
    }

    fn enter_transition(
        &mut self,
        old_primary: String,
    ) -> Option<Transition> {
        if self.phase != FailoverPhase::Watching {
            return None;
        }
        self.phase = FailoverPhase::TransitionDetected;
        Some(Transition::Detected { old_primary })
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
