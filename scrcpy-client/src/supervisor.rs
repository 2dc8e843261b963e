//! Reconnection supervisor.
//!
//! Listens for stream faults and drives the recovery state machine:
//!
//! ```text
//! Connected --(fault)--> Reconnecting --(success)--> Connected
//!                             |
//!                             +--(exhausted / permanent)--> Error
//! ```
//!
//! Invariants:
//! - only one reconnection sequence runs at a time; a second trigger
//!   while one is in flight is a no-op
//! - the attempt counter resets only on success or explicit disconnect
//! - attempt n waits `base_delay * 2^(n-1)` first; the count is capped
//! - the device connection is re-verified with a cheap probe before each
//!   attempt, and a dead device is terminal immediately
//! - error messages matching the permanent phrase list short-circuit to
//!   the terminal state without consuming further attempts
//! - attempts replay the identical cached connection parameters

use crate::config::SessionOptions;
use crate::connect::Connector;
use crate::device::DeviceRegistry;
use crate::errors::{message_is_permanent, ClientError};
use crate::messages::SessionEvent;
use crate::session::Session;
use crate::state::{ConnectionState, StateCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Supervises one connected session's recovery.
pub struct ReconnectSupervisor {
    connector: Arc<Connector>,
    registry: Arc<dyn DeviceRegistry>,
    state: Arc<StateCell>,
    device_id: String,
    /// The exact options the original connect ran with; reconnects must
    /// produce an equivalent session.
    options: SessionOptions,
    in_flight: AtomicBool,
}

impl ReconnectSupervisor {
    pub fn new(
        connector: Arc<Connector>,
        registry: Arc<dyn DeviceRegistry>,
        state: Arc<StateCell>,
        device_id: String,
        options: SessionOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector,
            registry,
            state,
            device_id,
            options,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Spawn the supervision task.
    ///
    /// Consumes fault events; replacement sessions from successful
    /// reconnects are delivered through `sessions`.
    pub fn spawn(
        self: Arc<Self>,
        faults: flume::Receiver<SessionEvent>,
        sessions: flume::Sender<Session>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok(event) = faults.recv_async().await {
                if !event.is_fault() {
                    continue;
                }

                // Only a connected session can fall into reconnection;
                // faults from an attempt already being replaced, or after
                // a terminal error, are ignored.
                if self.state.get() != ConnectionState::Connected {
                    debug!("ignoring fault outside Connected state: {event:?}");
                    continue;
                }

                if self
                    .in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    debug!("reconnection already in flight, ignoring trigger");
                    continue;
                }

                warn!("stream fault, starting reconnection: {event:?}");
                let outcome = self.reconnect_sequence(&sessions).await;
                self.in_flight.store(false, Ordering::SeqCst);

                // Faults queued up by the session that just died must not
                // re-trigger recovery against the fresh session.
                while faults.try_recv().is_ok() {}

                if matches!(outcome, SequenceOutcome::Terminal) {
                    break;
                }
            }
        })
    }

    async fn reconnect_sequence(&self, sessions: &flume::Sender<Session>) -> SequenceOutcome {
        let max_attempts = self.options.reconnect.max_attempts;
        let base_delay = Duration::from_millis(self.options.reconnect.base_delay_ms);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if attempt > max_attempts {
                return self.terminal(format!(
                    "reconnect failed: gave up after {max_attempts} attempts"
                ));
            }

            self.state.set(ConnectionState::Reconnecting);

            // Exponential backoff: d, 2d, 4d, ...
            let delay = base_delay * 2u32.saturating_pow(attempt - 1);
            info!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "waiting before reconnect attempt"
            );
            eprintln!("DIAG before sleep attempt={attempt} delay={delay:?}");
            tokio::time::sleep(delay).await;
            eprintln!("DIAG after sleep attempt={attempt}");

            // Re-verify the device before spending the attempt on a full
            // handshake; a dead transport will not come back on its own.
            match self.registry.connection(&self.device_id).await {
                Some(device) => {
                    if let Err(e) = device.verify().await {
                        self.connector.forget_session();
                        return self
                            .terminal(format!("device not connected: probe failed: {e}"));
                    }
                }
                None => {
                    self.connector.forget_session();
                    return self.terminal("device not connected: no transport".to_string());
                }
            }

            self.state.set(ConnectionState::Connecting);
            match self.connector.attempt(&self.device_id, &self.options).await {
                Ok(session) => {
                    info!(attempt, "reconnect succeeded");
                    self.state.set(ConnectionState::Connected);
                    if sessions.send(session).is_err() {
                        // Nobody is listening for sessions anymore; treat
                        // as an external shutdown.
                        return SequenceOutcome::Terminal;
                    }
                    return SequenceOutcome::Recovered;
                }
                Err(e) => {
                    if self.classify_terminal(&e) {
                        return self.terminal(format!("reconnect failed: {e}"));
                    }
                    warn!(attempt, "reconnect attempt failed: {e}");
                }
            }
        }
    }

    fn classify_terminal(&self, error: &ClientError) -> bool {
        error.is_permanent() || message_is_permanent(&error.to_string())
    }

    fn terminal(&self, message: String) -> SequenceOutcome {
        error!("{message}");
        self.state.set(ConnectionState::Error(message));
        SequenceOutcome::Terminal
    }
}

enum SequenceOutcome {
    Recovered,
    Terminal,
}
