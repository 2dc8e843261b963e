//! Configuration types for the scrcpy client.

use crate::errors::ClientError;
use scrcpy_protocol::command::{AudioParams, ServerCommand};
use scrcpy_protocol::scid::Scid;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete session configuration.
///
/// Captured at connect time and cached verbatim by the engine so that a
/// reconnect replays an identical handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Video capture settings.
    pub video: VideoOptions,
    /// Audio capture settings.
    pub audio: AudioOptions,
    /// Device behavior flags.
    pub behavior: BehaviorOptions,
    /// Local socket and timing settings.
    pub connection: ConnectionOptions,
    /// Reconnection settings.
    pub reconnect: ReconnectOptions,
}

/// Video capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoOptions {
    /// Cap on the longer screen dimension (0 = no cap).
    #[serde(default)]
    pub max_size: u32,
    /// Target bit rate in bits per second.
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,
    /// Frame rate cap.
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    /// Codec name passed to the server (h264, h265, av1).
    #[serde(default = "default_video_codec")]
    pub codec: String,
    /// Specific encoder name; empty selects the server default.
    #[serde(default)]
    pub encoder: String,
}

fn default_bit_rate() -> u32 {
    8_000_000
}

fn default_max_fps() -> u32 {
    60
}

fn default_video_codec() -> String {
    "h264".to_string()
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioOptions {
    /// Capture audio at all. Audio remains best-effort even when enabled:
    /// a failed audio socket disables it for the session without failing
    /// the connect.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Codec name passed to the server.
    #[serde(default = "default_audio_codec")]
    pub codec: String,
    /// Target bit rate in bits per second.
    #[serde(default = "default_audio_bit_rate")]
    pub bit_rate: u32,
    /// Specific encoder name; empty selects the server default.
    #[serde(default)]
    pub encoder: String,
}

fn default_true() -> bool {
    true
}

fn default_audio_codec() -> String {
    "opus".to_string()
}

fn default_audio_bit_rate() -> u32 {
    128_000
}

/// Device behavior flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorOptions {
    /// Keep the device awake while connected.
    #[serde(default)]
    pub stay_awake: bool,
    /// Turn the physical screen off while mirroring.
    #[serde(default)]
    pub turn_screen_off: bool,
    /// Power the screen off when the session closes.
    #[serde(default)]
    pub power_off_on_close: bool,
    /// Key-frame interval in seconds; also the basis for the video read
    /// timeout.
    #[serde(default = "default_key_frame_interval")]
    pub key_frame_interval: u32,
}

fn default_key_frame_interval() -> u32 {
    2
}

/// Local socket and timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Fixed local TCP port the device-side socket is forwarded to.
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Per-socket TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Handshake read timeout (dummy byte + metadata) in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Settle delay after launching the server, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_local_port() -> u16 {
    27183
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_settle_delay_ms() -> u64 {
    1_500
}

/// Reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectOptions {
    /// Maximum reconnect attempts before the terminal error state.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; attempt n waits
    /// `base * 2^(n-1)`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2_000
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            video: VideoOptions {
                max_size: 0,
                bit_rate: default_bit_rate(),
                max_fps: default_max_fps(),
                codec: default_video_codec(),
                encoder: String::new(),
            },
            audio: AudioOptions {
                enabled: default_true(),
                codec: default_audio_codec(),
                bit_rate: default_audio_bit_rate(),
                encoder: String::new(),
            },
            behavior: BehaviorOptions {
                stay_awake: false,
                turn_screen_off: false,
                power_off_on_close: false,
                key_frame_interval: default_key_frame_interval(),
            },
            connection: ConnectionOptions {
                local_port: default_local_port(),
                connect_timeout_ms: default_connect_timeout_ms(),
                handshake_timeout_ms: default_handshake_timeout_ms(),
                settle_delay_ms: default_settle_delay_ms(),
            },
            reconnect: ReconnectOptions {
                max_attempts: default_max_attempts(),
                base_delay_ms: default_base_delay_ms(),
            },
        }
    }
}

impl SessionOptions {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.connection.local_port == 0 {
            return Err(ClientError::Config("Local port cannot be 0".to_string()));
        }
        if self.video.bit_rate == 0 {
            return Err(ClientError::Config(
                "Video bit rate cannot be 0".to_string(),
            ));
        }
        if self.video.max_fps == 0 {
            return Err(ClientError::Config("Max fps cannot be 0".to_string()));
        }
        if self.video.codec.is_empty() {
            return Err(ClientError::Config(
                "Video codec cannot be empty".to_string(),
            ));
        }
        if self.behavior.key_frame_interval == 0 {
            return Err(ClientError::Config(
                "Key-frame interval cannot be 0".to_string(),
            ));
        }
        if self.audio.enabled && self.audio.codec.is_empty() {
            return Err(ClientError::Config(
                "Audio codec cannot be empty when audio is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Video socket read timeout: one key-frame interval, so a healthy
    /// stream always delivers at least one packet per window.
    #[must_use]
    pub fn video_read_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.behavior.key_frame_interval))
    }

    /// Handshake (metadata) read timeout.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.handshake_timeout_ms)
    }

    /// Per-socket TCP connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.connect_timeout_ms)
    }

    /// Render the server launch command for a session id.
    #[must_use]
    pub fn server_command(&self, scid: Scid) -> String {
        let mut cmd = ServerCommand::new(scid)
            .max_size(self.video.max_size)
            .video_bit_rate(self.video.bit_rate)
            .max_fps(self.video.max_fps)
            .video_codec(&self.video.codec)
            .video_encoder(&self.video.encoder)
            .stay_awake(self.behavior.stay_awake)
            .power_off_on_close(self.behavior.power_off_on_close)
            .key_frame_interval(self.behavior.key_frame_interval);

        if self.audio.enabled {
            cmd = cmd.audio(AudioParams {
                codec: self.audio.codec.clone(),
                bit_rate: self.audio.bit_rate,
                encoder: (!self.audio.encoder.is_empty()).then(|| self.audio.encoder.clone()),
            });
        }

        cmd.build()
    }
}

/// Builder for creating [`SessionOptions`].
#[derive(Default)]
pub struct SessionOptionsBuilder {
    options: SessionOptions,
}

impl SessionOptionsBuilder {
    /// Sets the video bit rate.
    #[must_use]
    pub fn bit_rate(mut self, bit_rate: u32) -> Self {
        self.options.video.bit_rate = bit_rate;
        self
    }

    /// Sets the frame rate cap.
    #[must_use]
    pub fn max_fps(mut self, max_fps: u32) -> Self {
        self.options.video.max_fps = max_fps;
        self
    }

    /// Sets the cap on the longer screen dimension.
    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.options.video.max_size = max_size;
        self
    }

    /// Sets the video codec.
    #[must_use]
    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.options.video.codec = codec.into();
        self
    }

    /// Enables or disables audio capture.
    #[must_use]
    pub fn audio(mut self, enabled: bool) -> Self {
        self.options.audio.enabled = enabled;
        self
    }

    /// Sets the local forwarded port.
    #[must_use]
    pub fn local_port(mut self, port: u16) -> Self {
        self.options.connection.local_port = port;
        self
    }

    /// Sets the reconnect policy.
    #[must_use]
    pub fn reconnect(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.options.reconnect.max_attempts = max_attempts;
        self.options.reconnect.base_delay_ms = base_delay_ms;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<SessionOptions, ClientError> {
        self.options.validate()?;
        Ok(self.options)
    }
}
