//! Server launch command construction.
//!
//! The server is started by shell-executing a single `app_process`
//! invocation on the device, with configuration passed as space-separated
//! `key=value` parameters. The parameter names and defaults here must
//! match the server version we push.

use crate::scid::Scid;

/// On-device path the server binary is pushed to.
pub const SERVER_PATH: &str = "/data/local/tmp/scrcpy-server.jar";

/// Server version the client is built against.
pub const SERVER_VERSION: &str = "3.3.4";

/// Builder for the server launch command line.
///
/// # Examples
///
/// ```
/// use scrcpy_protocol::command::ServerCommand;
/// use scrcpy_protocol::scid::Scid;
///
/// let scid = Scid::from_raw(0x1234abcd).unwrap();
/// let cmd = ServerCommand::new(scid)
///     .video_bit_rate(8_000_000)
///     .max_fps(60)
///     .video_codec("h264")
///     .build();
/// assert!(cmd.contains("scid=1234abcd"));
/// assert!(cmd.contains("tunnel_forward=true"));
/// ```
#[derive(Debug, Clone)]
pub struct ServerCommand {
    scid: Scid,
    max_size: Option<u32>,
    video_bit_rate: u32,
    max_fps: u32,
    video_codec: String,
    video_encoder: Option<String>,
    audio: Option<AudioParams>,
    stay_awake: bool,
    power_off_on_close: bool,
    key_frame_interval: u32,
}

/// Audio parameters included when audio capture is enabled.
#[derive(Debug, Clone)]
pub struct AudioParams {
    pub codec: String,
    pub bit_rate: u32,
    pub encoder: Option<String>,
}

impl ServerCommand {
    /// Start a command for the given session id with server defaults.
    pub fn new(scid: Scid) -> Self {
        Self {
            scid,
            max_size: None,
            video_bit_rate: 8_000_000,
            max_fps: 60,
            video_codec: "h264".to_string(),
            video_encoder: None,
            audio: None,
            stay_awake: false,
            power_off_on_close: false,
            key_frame_interval: 2,
        }
    }

    /// Cap the longer video dimension (0 disables the cap).
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.max_size = (max_size > 0).then_some(max_size);
        self
    }

    pub fn video_bit_rate(mut self, bit_rate: u32) -> Self {
        self.video_bit_rate = bit_rate;
        self
    }

    pub fn max_fps(mut self, max_fps: u32) -> Self {
        self.max_fps = max_fps;
        self
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = codec.into();
        self
    }

    /// Select a specific encoder; empty selects the server default.
    pub fn video_encoder(mut self, encoder: impl Into<String>) -> Self {
        let encoder = encoder.into();
        self.video_encoder = (!encoder.is_empty()).then_some(encoder);
        self
    }

    /// Enable audio capture with the given parameters.
    pub fn audio(mut self, params: AudioParams) -> Self {
        self.audio = Some(params);
        self
    }

    pub fn stay_awake(mut self, stay_awake: bool) -> Self {
        self.stay_awake = stay_awake;
        self
    }

    pub fn power_off_on_close(mut self, power_off: bool) -> Self {
        self.power_off_on_close = power_off;
        self
    }

    pub fn key_frame_interval(mut self, seconds: u32) -> Self {
        self.key_frame_interval = seconds;
        self
    }

    /// Render the full shell command line.
    pub fn build(&self) -> String {
        let mut params = vec![
            format!("scid={}", self.scid),
            "log_level=debug".to_string(),
        ];

        if let Some(max_size) = self.max_size {
            params.push(format!("max_size={}", max_size));
        }

        params.push(format!("video_bit_rate={}", self.video_bit_rate));
        params.push(format!("max_fps={}", self.max_fps));
        params.push(format!("video_codec={}", self.video_codec));
        params.push(format!("stay_awake={}", self.stay_awake));
        params.push(format!("power_off_on_close={}", self.power_off_on_close));
        params.push("tunnel_forward=true".to_string());

        if let Some(encoder) = &self.video_encoder {
            params.push(format!("video_encoder={}", encoder));
        }

        match &self.audio {
            Some(audio) => {
                params.push(format!("audio_codec={}", audio.codec));
                params.push(format!("audio_bit_rate={}", audio.bit_rate));
                if let Some(encoder) = &audio.encoder {
                    params.push(format!("audio_encoder={}", encoder));
                }
            }
            None => params.push("audio=false".to_string()),
        }

        // Low-latency encoder profile; key-frame interval doubles as the
        // video read-timeout basis on the client side.
        params.push(format!(
            "video_codec_options=profile=1,level=52,key-frame-interval={}",
            self.key_frame_interval
        ));

        format!(
            "CLASSPATH={} app_process / com.genymobile.scrcpy.Server {} {}",
            SERVER_PATH,
            SERVER_VERSION,
            params.join(" ")
        )
    }
}
