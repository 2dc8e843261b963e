//! Stream metadata headers.
//!
//! The first socket the server accepts (video) sends, before any packets:
//!
//! - 1 dummy byte (0x00, the forward-tunnel readiness probe)
//! - 64 bytes: device name, UTF-8, right-padded with NUL
//! - 12 bytes: codec block = `(codec_id: u32, width: u32, height: u32)`,
//!   big-endian
//!
//! The audio socket sends only a 4-byte codec tag before its packets.

use crate::io::ScrcpyInStream;
use scrcpy_common::Resolution;
use tokio::io::AsyncRead;

/// Maximum dimension accepted from the metadata header.
///
/// Anything above this (or zero) means we are reading garbage — typically
/// a half-started server or a desynchronized forward.
pub const MAX_DIMENSION: u32 = 4096;

/// Length of the device-name field.
pub const DEVICE_NAME_LEN: usize = 64;

/// Video stream metadata, read once per session off the video socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    /// Device model name, NUL-trimmed.
    pub device_name: String,
    /// Raw codec id as sent by the server (e.g. 0x68323634 = "h264").
    pub codec_id: u32,
    /// Stream resolution.
    pub resolution: Resolution,
}

impl VideoMetadata {
    /// Read and validate the video metadata header.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if a dimension is zero or above
    /// [`MAX_DIMENSION`], or if the codec id is one of the values an
    /// unready server emits (all zeros, or the 0x5a padding pattern).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut ScrcpyInStream<R>,
    ) -> std::io::Result<Self> {
        // Dummy byte: the server writes 0x00 as soon as it accepts the
        // first socket. Anything else is tolerated but suspicious.
        let _dummy = stream.read_u8().await?;

        let mut name_bytes = [0u8; DEVICE_NAME_LEN];
        stream.read_bytes(&mut name_bytes).await?;
        let device_name = String::from_utf8_lossy(&name_bytes)
            .trim_end_matches('\0')
            .to_string();

        let codec_id = stream.read_u32().await?;
        let width = stream.read_u32().await?;
        let height = stream.read_u32().await?;

        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid video resolution {}x{}", width, height),
            ));
        }

        if codec_id == 0x0000_0000 || codec_id == 0x5a5a_5a5a {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid codec id 0x{:08x} (server not ready)", codec_id),
            ));
        }

        Ok(Self {
            device_name,
            codec_id,
            resolution: Resolution::new(width, height),
        })
    }
}

/// Audio codec, negotiated by the server and announced as a 4-byte
/// ASCII-derived tag at the head of the audio socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Opus,
    Aac,
    Flac,
    Raw,
}

impl AudioCodec {
    /// Wire tag for opus ("opus").
    pub const TAG_OPUS: u32 = 0x6f70_7573;
    /// Wire tag for aac ("\0aac").
    pub const TAG_AAC: u32 = 0x0061_6163;
    /// Wire tag for flac ("flac").
    pub const TAG_FLAC: u32 = 0x666c_6163;
    /// Wire tag for raw pcm ("\0raw").
    pub const TAG_RAW: u32 = 0x0072_6177;

    /// Map a wire tag to a codec.
    ///
    /// An unknown tag is a hard error: the tag is the first word on the
    /// audio socket, so a value we don't recognize means the stream is
    /// already desynchronized, and guessing a codec would only defer the
    /// failure to the decoder.
    pub fn from_tag(tag: u32) -> std::io::Result<Self> {
        match tag {
            Self::TAG_OPUS => Ok(Self::Opus),
            Self::TAG_AAC => Ok(Self::Aac),
            Self::TAG_FLAC => Ok(Self::Flac),
            Self::TAG_RAW => Ok(Self::Raw),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown audio codec tag 0x{:08x}", other),
            )),
        }
    }

    /// Read the codec tag off the head of the audio socket.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut ScrcpyInStream<R>,
    ) -> std::io::Result<Self> {
        let tag = stream.read_u32().await?;
        Self::from_tag(tag)
    }

    /// Canonical lower-case name, as used in server parameters.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn metadata_bytes(name: &str, codec_id: u32, width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0x00];
        let mut name_field = [0u8; DEVICE_NAME_LEN];
        name_field[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&name_field);
        data.extend_from_slice(&codec_id.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data
    }

    #[tokio::test]
    async fn test_device_name_trimmed() {
        let data = metadata_bytes("Pixel", 0x6832_3634, 1080, 2400);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let meta = VideoMetadata::read_from(&mut stream).await.unwrap();
        assert_eq!(meta.device_name, "Pixel");
        assert_eq!(meta.codec_id, 0x6832_3634);
        assert_eq!(meta.resolution, Resolution::new(1080, 2400));
    }

    #[tokio::test]
    async fn test_rejects_zero_dimension() {
        let data = metadata_bytes("Pixel", 0x6832_3634, 0, 2400);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let result = VideoMetadata::read_from(&mut stream).await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_rejects_oversized_dimension() {
        let data = metadata_bytes("Pixel", 0x6832_3634, 1080, MAX_DIMENSION + 1);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let result = VideoMetadata::read_from(&mut stream).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rejects_unready_codec_id() {
        for bad in [0x0000_0000u32, 0x5a5a_5a5a] {
            let data = metadata_bytes("Pixel", bad, 1080, 2400);
            let mut stream = ScrcpyInStream::new(Cursor::new(data));
            assert!(VideoMetadata::read_from(&mut stream).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_truncated_header_is_eof() {
        let mut data = metadata_bytes("Pixel", 0x6832_3634, 1080, 2400);
        data.truncate(40);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let result = VideoMetadata::read_from(&mut stream).await;
        assert_eq!(
            result.unwrap_err().kind(),
            std::io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_audio_codec_tags() {
        assert_eq!(AudioCodec::from_tag(0x6f70_7573).unwrap(), AudioCodec::Opus);
        assert_eq!(AudioCodec::from_tag(0x0061_6163).unwrap(), AudioCodec::Aac);
        assert_eq!(AudioCodec::from_tag(0x666c_6163).unwrap(), AudioCodec::Flac);
        assert_eq!(AudioCodec::from_tag(0x0072_6177).unwrap(), AudioCodec::Raw);
    }

    #[test]
    fn test_unknown_audio_tag_is_error() {
        let result = AudioCodec::from_tag(0xdead_beef);
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_audio_codec_read() {
        let data = 0x6f70_7573u32.to_be_bytes().to_vec();
        let mut stream = ScrcpyInStream::new(Cursor::new(data));
        assert_eq!(
            AudioCodec::read_from(&mut stream).await.unwrap(),
            AudioCodec::Opus
        );
    }
}
