//! Device connection capability.
//!
//! The engine never talks to ADB directly. Everything it needs from the
//! transport — shell execution, port forwarding, pushing the server
//! binary — is consumed through the [`DeviceConnection`] trait, and
//! connections are resolved by device id through a [`DeviceRegistry`].
//! This keeps the core free of any platform SDK dependency and makes the
//! whole engine testable against in-process fakes.

use crate::errors::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use scrcpy_common::Resolution;
use std::sync::Arc;

/// One record from a device-side shell process.
#[derive(Debug, Clone)]
pub enum ShellEvent {
    /// A chunk of stdout output.
    Stdout(Bytes),
    /// A chunk of stderr output.
    Stderr(Bytes),
    /// The process exited with the given code. Terminal.
    Exit(i32),
}

/// Live output stream of a device-side shell process.
///
/// The sender side is owned by the transport; the stream ends when the
/// process exits or the transport drops it.
pub type ShellStream = tokio::sync::mpsc::Receiver<ShellEvent>;

/// An established connection to one device.
///
/// Implementations wrap whatever transport actually reaches the device
/// (a TCP ADB session, a USB channel). All methods are cancel-safe from
/// the engine's perspective: a cancelled call must not leave the
/// connection unusable.
#[async_trait]
pub trait DeviceConnection: Send + Sync {
    /// Run a shell command to completion and return its combined output.
    async fn execute_shell(&self, command: &str) -> Result<String, ClientError>;

    /// Start a shell command and stream its output.
    async fn open_shell_stream(&self, command: &str) -> Result<ShellStream, ClientError>;

    /// Forward `localabstract:<socket_name>` on the device to
    /// `tcp:<local_port>` locally.
    async fn setup_forward(&self, local_port: u16, socket_name: &str) -> Result<(), ClientError>;

    /// Remove the forward for the given local port.
    async fn remove_forward(&self, local_port: u16) -> Result<(), ClientError>;

    /// Push the server binary to its device-side path.
    async fn push_server_binary(&self) -> Result<(), ClientError>;

    /// Cheap liveness probe.
    ///
    /// The default implementation runs `echo ok` and only checks that the
    /// shell round-trips.
    async fn verify(&self) -> Result<(), ClientError> {
        self.execute_shell("echo ok").await.map(|_| ())
    }
}

/// Resolves device connections by id and re-establishes network devices.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Look up an existing connection for a device id.
    async fn connection(&self, device_id: &str) -> Option<Arc<dyn DeviceConnection>>;

    /// Dial (or re-dial) a network device.
    async fn connect_device(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Arc<dyn DeviceConnection>, ClientError>;
}

/// Receives the resolved session facts once a connection completes.
///
/// Fire-and-forget: the engine never waits on or retries this call. The
/// application typically uses it to start a foreground keep-alive
/// service.
pub trait KeepAliveNotifier: Send + Sync {
    fn session_established(&self, device_id: &str, device_name: &str, resolution: Resolution);
}

/// Parsed form of a device id.
///
/// Network devices are `host:port` and can be re-dialed after a transport
/// drop; USB devices cannot self-heal and fail fast instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceId {
    Network { host: String, port: u16 },
    Usb { id: String },
}

impl DeviceId {
    /// Default ADB TCP port for ids written without one.
    pub const DEFAULT_PORT: u16 = 5555;

    /// Parse a device id string.
    pub fn parse(device_id: &str) -> Self {
        if let Some(id) = device_id.strip_prefix("usb:") {
            return Self::Usb { id: id.to_string() };
        }
        match device_id.split_once(':') {
            Some((host, port)) => Self::Network {
                host: host.to_string(),
                port: port.parse().unwrap_or(Self::DEFAULT_PORT),
            },
            None => Self::Usb {
                id: device_id.to_string(),
            },
        }
    }

    /// True for devices reachable over the network.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
