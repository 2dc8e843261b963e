//! High-level async scrcpy client engine.
//!
//! This crate drives a scrcpy-compatible server process on an Android
//! device (reached through an opaque device-connection capability) and
//! exchanges framed video, audio, and input-control data with it over
//! plain TCP sockets forwarded through the transport. It is the
//! connection and protocol engine only: encoded access units and their
//! timestamps come out, input messages go in, and decoding/rendering is
//! someone else's job.
//!
//! # Features
//!
//! - **Async I/O**: one tokio task per long-lived blocking operation
//! - **Resumable handshake**: port-forward, server push, server launch,
//!   socket connect, and metadata validation as separately reported steps
//! - **Stream demuxing**: video required, audio and control optional and
//!   individually degradable
//! - **Automatic reconnection**: exponential backoff, capped attempts,
//!   permanent-error short-circuiting, identical replayed parameters
//! - **No platform dependency**: the transport is consumed behind the
//!   [`DeviceConnection`]/[`DeviceRegistry`] traits
//!
//! # Quick Start
//!
//! ```no_run
//! use scrcpy_client::{ScrcpyClient, SessionOptions};
//! use std::sync::Arc;
//! # async fn example(registry: Arc<dyn scrcpy_client::DeviceRegistry>) -> anyhow::Result<()> {
//! let client = ScrcpyClient::new(registry);
//! let options = SessionOptions::builder().max_fps(30).build()?;
//!
//! let mut session = client.connect("192.168.1.20:5555", options).await?;
//! println!("mirroring {} at {}", session.device_name, session.resolution);
//!
//! loop {
//!     let packet = session.video.read().await?;
//!     // hand packet.payload / packet.pts_and_flags to the decoder
//! }
//! # }
//! ```
//!
//! # Architecture
//!
//! The connect call runs the orchestrated handshake and returns a
//! [`Session`] owning the demuxers and control channel. Stream faults are
//! routed to a supervision task which re-runs the handshake with the
//! cached options; replacement sessions arrive on the
//! [`sessions()`](ScrcpyClient::sessions) channel, and the observable
//! [`ConnectionState`] moves through `Reconnecting` back to `Connected`
//! or to a terminal `Error`.
//!
//! # Error Handling
//!
//! No panics in library paths: everything resolves to a
//! [`ClientError`] and a single observable state value. Best-effort
//! cleanup failures are logged and swallowed; handshake failures are
//! attributed to their step; stream failures feed reconnection.

#![forbid(unsafe_code)]

pub mod config;
pub mod control_channel;
pub mod demux;
pub mod device;
pub mod errors;
pub mod messages;
pub mod monitor;
pub mod session;
pub mod state;

mod connect;
mod supervisor;

// Re-exports
pub use config::SessionOptions;
pub use connect::Connector;
pub use control_channel::{ControlChannel, ControlLiveness};
pub use demux::{AudioDemuxer, ReadStep, VideoDemuxer};
pub use device::{DeviceConnection, DeviceRegistry, KeepAliveNotifier, ShellEvent};
pub use errors::ClientError;
pub use messages::{FaultSource, SessionEvent};
pub use session::Session;
pub use state::{ConnectionState, ConnectionStep, StepProgress, StepStatus};
pub use supervisor::ReconnectSupervisor;

use crate::state::{ProgressTracker, StateCell};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The client facade: owns the orchestrator, the state machinery, and
/// the supervision task for the current session.
pub struct ScrcpyClient {
    registry: Arc<dyn DeviceRegistry>,
    connector: Arc<Connector>,
    state: Arc<StateCell>,
    progress: Arc<ProgressTracker>,
    events_rx: flume::Receiver<SessionEvent>,
    sessions_tx: flume::Sender<Session>,
    sessions_rx: flume::Receiver<Session>,
    supervisor_task: Mutex<Option<JoinHandle<()>>>,
}

impl ScrcpyClient {
    /// Create a client over a device registry.
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        Self::with_keepalive(registry, None)
    }

    /// Create a client that also notifies a keep-alive service when a
    /// session comes up.
    pub fn with_keepalive(
        registry: Arc<dyn DeviceRegistry>,
        keepalive: Option<Arc<dyn KeepAliveNotifier>>,
    ) -> Self {
        let state = Arc::new(StateCell::new());
        let progress = Arc::new(ProgressTracker::new());
        // Unbounded: the supervisor may have terminated while demuxers
        // and the monitor still report, and a blocked sender would stall
        // a worker thread.
        let (events_tx, events_rx) = flume::unbounded();
        let (sessions_tx, sessions_rx) = flume::bounded(1);
        let connector = Arc::new(Connector::new(
            registry.clone(),
            keepalive,
            progress.clone(),
            events_tx,
        ));

        Self {
            registry,
            connector,
            state,
            progress,
            events_rx,
            sessions_tx,
            sessions_rx,
            supervisor_task: Mutex::new(None),
        }
    }

    /// Connect to a device and return the established session.
    ///
    /// On success, a reconnection supervisor is armed with the same
    /// options; if the session later faults, replacement sessions appear
    /// on [`sessions()`](Self::sessions).
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or any handshake step
    /// fails; a failed connect is fully torn down (no partial sockets).
    pub async fn connect(
        &self,
        device_id: &str,
        options: SessionOptions,
    ) -> Result<Session, ClientError> {
        options.validate()?;
        self.state.set(ConnectionState::Connecting);

        match self.connector.attempt(device_id, &options).await {
            Ok(session) => {
                self.state.set(ConnectionState::Connected);
                self.arm_supervisor(device_id, options);
                Ok(session)
            }
            Err(e) => {
                self.state.set(ConnectionState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Disconnect an active session: stop supervision, close sockets,
    /// and run best-effort device-side cleanup.
    pub async fn disconnect(&self, session: Session) {
        self.state.set(ConnectionState::Disconnecting);

        if let Some(task) = self.supervisor_task.lock().take() {
            task.abort();
        }

        // A replacement session may have been produced concurrently;
        // tear it down too.
        while let Ok(stale) = self.sessions_rx.try_recv() {
            stale.shutdown().await;
        }

        self.connector.teardown(&session).await;
        self.state.set(ConnectionState::Disconnected);
    }

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to step-by-step connect progress.
    pub fn progress(&self) -> watch::Receiver<Vec<StepProgress>> {
        self.progress.subscribe()
    }

    /// Replacement sessions produced by successful reconnects.
    pub fn sessions(&self) -> flume::Receiver<Session> {
        self.sessions_rx.clone()
    }

    fn arm_supervisor(&self, device_id: &str, options: SessionOptions) {
        let supervisor = ReconnectSupervisor::new(
            self.connector.clone(),
            self.registry.clone(),
            self.state.clone(),
            device_id.to_string(),
            options,
        );
        let task = supervisor.spawn(self.events_rx.clone(), self.sessions_tx.clone());

        if let Some(previous) = self.supervisor_task.lock().replace(task) {
            previous.abort();
        }
    }
}
