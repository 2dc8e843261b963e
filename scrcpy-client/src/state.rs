//! Connection state and progress reporting.
//!
//! Exactly one [`ConnectionState`] value is current at any time. The
//! orchestrator and the reconnection supervisor are the only writers (the
//! "only one reconnection in flight" invariant keeps them from racing);
//! everything else observes through cloned watch receivers.
//!
//! Connect progress is reported step by step: the step list is rebuilt
//! fresh on every attempt, and an update for a step already in the list
//! replaces it in place so observers always see one entry per step.

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::watch;

/// High-level connection state of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; nothing in progress.
    Disconnected,
    /// A connect attempt is running.
    Connecting,
    /// Steady state: streams and control channel live.
    Connected,
    /// Explicit disconnect in progress.
    Disconnecting,
    /// A stream fault occurred and the supervisor is retrying.
    Reconnecting,
    /// Terminal failure; no further attempts will be made.
    Error(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// One step of the connect sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStep {
    AdbConnect,
    AdbForward,
    PushServer,
    StartServer,
    ConnectSocket,
    Completed,
}

impl fmt::Display for ConnectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdbConnect => write!(f, "ADB_CONNECT"),
            Self::AdbForward => write!(f, "ADB_FORWARD"),
            Self::PushServer => write!(f, "PUSH_SERVER"),
            Self::StartServer => write!(f, "START_SERVER"),
            Self::ConnectSocket => write!(f, "CONNECT_SOCKET"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Status of a single connect step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Success,
    Failed,
}

/// Progress record for one connect step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub step: ConnectionStep,
    pub status: StepStatus,
    pub message: String,
    pub error: Option<String>,
}

/// Step-by-step progress tracker, observed via a watch channel.
pub struct ProgressTracker {
    steps: Mutex<Vec<StepProgress>>,
    tx: watch::Sender<Vec<StepProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            steps: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Record a step update, replacing any earlier entry for the same
    /// step.
    pub fn update(
        &self,
        step: ConnectionStep,
        status: StepStatus,
        message: impl Into<String>,
        error: Option<String>,
    ) {
        let progress = StepProgress {
            step,
            status,
            message: message.into(),
            error,
        };

        let snapshot = {
            let mut steps = self.steps.lock();
            match steps.iter_mut().find(|p| p.step == step) {
                Some(existing) => *existing = progress,
                None => steps.push(progress),
            }
            steps.clone()
        };
        let _ = self.tx.send(snapshot);
    }

    /// Drop all recorded steps; called at the start of every attempt.
    pub fn clear(&self) {
        self.steps.lock().clear();
        let _ = self.tx.send(Vec::new());
    }

    /// Subscribe to progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Vec<StepProgress>> {
        self.tx.subscribe()
    }

    /// Current snapshot of all recorded steps.
    pub fn snapshot(&self) -> Vec<StepProgress> {
        self.steps.lock().clone()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-writer cell for the current [`ConnectionState`].
pub struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Publish a new state.
    pub fn set(&self, state: ConnectionState) {
        if *self.tx.borrow() != state {
            tracing::debug!(state = %state, "connection state changed");
        }
        let _ = self.tx.send(state);
    }

    /// Current state.
    pub fn get(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_or_replace() {
        let tracker = ProgressTracker::new();

        tracker.update(ConnectionStep::AdbConnect, StepStatus::Running, "", None);
        tracker.update(ConnectionStep::AdbForward, StepStatus::Running, "", None);
        tracker.update(ConnectionStep::AdbConnect, StepStatus::Success, "ok", None);

        let steps = tracker.snapshot();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step, ConnectionStep::AdbConnect);
        assert_eq!(steps[0].status, StepStatus::Success);
        assert_eq!(steps[0].message, "ok");
        assert_eq!(steps[1].step, ConnectionStep::AdbForward);
    }

    #[test]
    fn test_clear_rebuilds_fresh() {
        let tracker = ProgressTracker::new();
        tracker.update(ConnectionStep::Completed, StepStatus::Success, "", None);
        tracker.clear();
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn test_failed_step_carries_error() {
        let tracker = ProgressTracker::new();
        tracker.update(
            ConnectionStep::PushServer,
            StepStatus::Failed,
            "",
            Some("no space left".to_string()),
        );
        let steps = tracker.snapshot();
        assert_eq!(steps[0].error.as_deref(), Some("no space left"));
    }

    #[test]
    fn test_state_cell() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Disconnected);

        let mut rx = cell.subscribe();
        cell.set(ConnectionState::Connecting);
        assert_eq!(cell.get(), ConnectionState::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "Reconnecting");
        assert_eq!(
            ConnectionState::Error("boom".to_string()).to_string(),
            "Error: boom"
        );
        assert_eq!(ConnectionStep::ConnectSocket.to_string(), "CONNECT_SOCKET");
    }
}
