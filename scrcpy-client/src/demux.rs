//! Video and audio stream demuxers.
//!
//! Each demuxer wraps one socket read half as a lazy sequence of framed
//! packets. The read primitive returns an explicit three-way outcome
//! ([`ReadStep`]) instead of overloading timeout errors with two
//! meanings; the retry policy is a bounded loop in [`read()`], never
//! recursion, so a pathological timeout storm cannot grow the stack.
//!
//! A video read timeout is benign when the control channel is still
//! alive — the device has probably just turned its screen off and stopped
//! producing frames. With the control channel dead too, the same timeout
//! means the session is gone. Audio is stricter: audio absence is
//! tolerable, so a timeout there is immediately a fault rather than a
//! reason to wait.
//!
//! EOF is a clean close signal but still routed through the fault path:
//! at steady state, a stream closing under us means the session ended
//! unexpectedly.

use crate::control_channel::ControlLiveness;
use crate::errors::ClientError;
use crate::messages::{FaultSource, SessionEvent};
use scrcpy_protocol::frame::{StreamPacket, AUDIO_MAX_PACKET_SIZE, VIDEO_MAX_PACKET_SIZE};
use scrcpy_protocol::io::ScrcpyInStream;
use scrcpy_protocol::metadata::AudioCodec;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tracing::debug;

/// Consecutive benign timeouts tolerated before the demuxer gives up.
///
/// Bounds the retry loop that replaced the original's unbounded
/// retry-by-recursion; at the default two-second read timeout this is
/// over a minute of screen-off silence.
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 32;

/// Outcome of a single read attempt.
#[derive(Debug)]
pub enum ReadStep {
    /// A complete packet.
    Packet(StreamPacket),
    /// A benign condition; the caller may retry immediately.
    Retryable,
    /// The stream is dead or desynchronized.
    Fatal(ClientError),
}

/// Demuxer for the video stream.
pub struct VideoDemuxer<R> {
    stream: ScrcpyInStream<R>,
    control: ControlLiveness,
    events: flume::Sender<SessionEvent>,
    read_timeout: Duration,
}

impl<R: AsyncRead + Unpin> VideoDemuxer<R> {
    /// Wrap the video stream the metadata header was just read from.
    ///
    /// Takes the buffered stream rather than the raw read half so that
    /// bytes read ahead during the metadata handshake are not lost.
    /// `read_timeout` should cover at least one key-frame interval so a
    /// healthy stream always produces a packet per window.
    pub fn new(
        stream: ScrcpyInStream<R>,
        control: ControlLiveness,
        events: flume::Sender<SessionEvent>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            control,
            events,
            read_timeout,
        }
    }

    /// One read attempt with the three-way outcome.
    pub async fn read_step(&mut self) -> ReadStep {
        match timeout(
            self.read_timeout,
            StreamPacket::read_from(&mut self.stream, VIDEO_MAX_PACKET_SIZE),
        )
        .await
        {
            Ok(Ok(packet)) => ReadStep::Packet(packet),
            Ok(Err(e)) => ReadStep::Fatal(classify_io_error("video", &e)),
            Err(_) => {
                if self.control.is_alive() {
                    ReadStep::Retryable
                } else {
                    ReadStep::Fatal(ClientError::Stream(
                        "video read timed out with dead control channel".to_string(),
                    ))
                }
            }
        }
    }

    /// Read the next packet, retrying benign timeouts in a bounded loop.
    ///
    /// # Errors
    ///
    /// Any fatal outcome is reported to the supervisor's fault channel
    /// before being returned.
    pub async fn read(&mut self) -> Result<StreamPacket, ClientError> {
        for _ in 0..MAX_CONSECUTIVE_TIMEOUTS {
            match self.read_step().await {
                ReadStep::Packet(packet) => return Ok(packet),
                ReadStep::Retryable => {
                    debug!("video read timeout, control channel alive; retrying");
                }
                ReadStep::Fatal(error) => {
                    self.report_fault(&error);
                    return Err(error);
                }
            }
        }

        let error = ClientError::Stream(format!(
            "video stream silent for {} consecutive timeouts",
            MAX_CONSECUTIVE_TIMEOUTS
        ));
        self.report_fault(&error);
        Err(error)
    }

    fn report_fault(&self, error: &ClientError) {
        let _ = self.events.send(SessionEvent::StreamFault {
            source: FaultSource::Video,
            message: error.to_string(),
        });
    }
}

/// Demuxer for the optional audio stream.
pub struct AudioDemuxer<R> {
    stream: ScrcpyInStream<R>,
    codec: AudioCodec,
    events: flume::Sender<SessionEvent>,
    read_timeout: Duration,
}

impl<R: AsyncRead + Unpin> AudioDemuxer<R> {
    /// Wrap an audio socket read half whose codec tag has already been
    /// consumed.
    pub fn new(
        reader: ScrcpyInStream<R>,
        codec: AudioCodec,
        events: flume::Sender<SessionEvent>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            stream: reader,
            codec,
            events,
            read_timeout,
        }
    }

    /// The codec announced at the head of the stream.
    pub fn codec(&self) -> AudioCodec {
        self.codec
    }

    /// Read the next audio packet.
    ///
    /// No benign-timeout retries here: a silent audio stream is a fault,
    /// and losing audio does not take the session down with it.
    pub async fn read(&mut self) -> Result<StreamPacket, ClientError> {
        let result = match timeout(
            self.read_timeout,
            StreamPacket::read_from(&mut self.stream, AUDIO_MAX_PACKET_SIZE),
        )
        .await
        {
            Ok(Ok(packet)) => Ok(packet),
            Ok(Err(e)) => Err(classify_io_error("audio", &e)),
            Err(_) => Err(ClientError::Timeout(self.read_timeout)),
        };

        if let Err(error) = &result {
            let _ = self.events.send(SessionEvent::StreamFault {
                source: FaultSource::Audio,
                message: error.to_string(),
            });
        }
        result
    }
}

fn classify_io_error(stream: &str, error: &std::io::Error) -> ClientError {
    match error.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            ClientError::Stream(format!("{stream} stream closed"))
        }
        std::io::ErrorKind::InvalidData => {
            ClientError::Stream(format!("{stream} stream desynchronized: {error}"))
        }
        _ => ClientError::Stream(format!("{stream} stream read failed: {error}")),
    }
}
