//! Error types for the scrcpy client.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure phrases that mark an error as permanent.
///
/// A reconnect attempt whose error message contains one of these (case
/// insensitive) is not worth retrying: the condition will not clear on
/// its own.
const PERMANENT_PHRASES: &[&str] = &[
    "device not connected",
    "unauthorized",
    "permission denied",
    "unsupported",
    "invalid parameter",
];

/// Errors that can occur during client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Device transport failure (shell exec, connection resolution).
    #[error("Device error: {0}")]
    Device(String),

    /// Port-forward setup failed.
    #[error("Forward failed: {0}")]
    Forward(String),

    /// Server binary push failed.
    #[error("Push failed: {0}")]
    Push(String),

    /// Server process failed to start or reported a fatal line.
    #[error("Server start failed: {0}")]
    ServerStart(String),

    /// A wire socket could not be connected.
    #[error("Socket error: {0}")]
    Socket(String),

    /// The stream metadata header was missing or malformed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A media stream failed mid-session (EOF, oversized packet, dead
    /// control channel). Routed to the reconnection supervisor.
    #[error("Stream error: {0}")]
    Stream(String),

    /// A control message could not be delivered.
    #[error("Control error: {0}")]
    Control(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation exceeded its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The session has been disconnected.
    #[error("Session closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns true if this error should never be retried.
    ///
    /// Classification is by message content against a fixed phrase list,
    /// because transports report the interesting conditions (unauthorized
    /// device, dead USB session) as strings. Everything else is treated
    /// as transient.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Config(_) | Self::Closed => true,
            other => message_is_permanent(&other.to_string()),
        }
    }
}

/// Check a failure message against the permanent phrase list.
#[must_use]
pub fn message_is_permanent(message: &str) -> bool {
    let lower = message.to_lowercase();
    PERMANENT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
