//! Stream packet framing.
//!
//! Every media packet on a scrcpy video or audio socket is framed as a
//! 12-byte header followed by the payload:
//!
//! - 8 bytes: pts+flags (u64, big-endian)
//! - 4 bytes: payload size (u32, big-endian)
//!
//! The two high-order bits of the pts field are flags:
//! - bit 63: config packet (codec initialization data, e.g. SPS/PPS)
//! - bit 62: key frame
//!
//! The remaining 62 bits are the presentation timestamp in microseconds.
//!
//! A size of zero or a size above the per-stream cap means the stream is
//! desynchronized; decoding rejects it with an error rather than trying
//! to resynchronize.

use crate::io::{ScrcpyInStream, ScrcpyOutStream};
use tokio::io::{AsyncRead, AsyncWrite};

/// Flag bit marking a config packet (codec initialization data).
pub const PACKET_FLAG_CONFIG: u64 = 1 << 63;

/// Flag bit marking a key frame.
pub const PACKET_FLAG_KEY_FRAME: u64 = 1 << 62;

/// Mask selecting the 62-bit presentation timestamp.
pub const PACKET_PTS_MASK: u64 = PACKET_FLAG_KEY_FRAME - 1;

/// Maximum accepted video packet payload (10 MiB).
pub const VIDEO_MAX_PACKET_SIZE: u32 = 10 * 1024 * 1024;

/// Maximum accepted audio packet payload (4 MiB).
pub const AUDIO_MAX_PACKET_SIZE: u32 = 4 * 1024 * 1024;

/// Packed pts+flags field of a stream packet header.
///
/// # Examples
///
/// ```
/// use scrcpy_protocol::frame::PtsAndFlags;
///
/// let packed = PtsAndFlags::pack(123_456, false, true);
/// assert_eq!(packed.pts(), 123_456);
/// assert!(!packed.is_config());
/// assert!(packed.is_key_frame());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PtsAndFlags(pub u64);

impl PtsAndFlags {
    /// Pack a pts and flag pair into the wire representation.
    ///
    /// The pts is masked to 62 bits; callers never produce timestamps
    /// anywhere near that bound in practice.
    pub const fn pack(pts: u64, is_config: bool, is_key_frame: bool) -> Self {
        let mut raw = pts & PACKET_PTS_MASK;
        if is_config {
            raw |= PACKET_FLAG_CONFIG;
        }
        if is_key_frame {
            raw |= PACKET_FLAG_KEY_FRAME;
        }
        Self(raw)
    }

    /// The presentation timestamp with both flag bits masked off.
    pub const fn pts(&self) -> u64 {
        self.0 & PACKET_PTS_MASK
    }

    /// True if this packet carries codec initialization data.
    pub const fn is_config(&self) -> bool {
        self.0 & PACKET_FLAG_CONFIG != 0
    }

    /// True if this packet is a key frame.
    pub const fn is_key_frame(&self) -> bool {
        self.0 & PACKET_FLAG_KEY_FRAME != 0
    }
}

/// Stream packet header (12 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub pts_and_flags: PtsAndFlags,
    pub size: u32,
}

impl FrameHeader {
    /// Read a frame header from the stream and validate the payload size
    /// against `max_size`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the size is zero or above the cap — both
    /// mean the stream is desynchronized and must be torn down. Sizes
    /// with the top bit set (a negative i32 on a misbehaving peer) exceed
    /// any cap and are rejected by the same check.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut ScrcpyInStream<R>,
        max_size: u32,
    ) -> std::io::Result<Self> {
        let pts_and_flags = PtsAndFlags(stream.read_u64().await?);
        let size = stream.read_u32().await?;

        if size == 0 || size > max_size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid packet size {} (cap {})", size, max_size),
            ));
        }

        Ok(Self {
            pts_and_flags,
            size,
        })
    }

    /// Write this frame header to an output stream.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut ScrcpyOutStream<W>) {
        stream.write_u64(self.pts_and_flags.0);
        stream.write_u32(self.size);
    }
}

/// A complete demuxed stream packet: header fields plus the encoded
/// access-unit payload. Decoding the payload is the consumer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPacket {
    pub pts_and_flags: PtsAndFlags,
    pub payload: Vec<u8>,
}

impl StreamPacket {
    /// Read a full packet (header + payload) from the stream.
    ///
    /// # Errors
    ///
    /// Propagates header validation failures and short reads.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut ScrcpyInStream<R>,
        max_size: u32,
    ) -> std::io::Result<Self> {
        let header = FrameHeader::read_from(stream, max_size).await?;
        let mut payload = vec![0u8; header.size as usize];
        stream.read_bytes(&mut payload).await?;
        Ok(Self {
            pts_and_flags: header.pts_and_flags,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame_bytes(pts_and_flags: u64, size: u32, payload_len: usize) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&pts_and_flags.to_be_bytes());
        data.extend_from_slice(&size.to_be_bytes());
        data.extend(std::iter::repeat(0xAB).take(payload_len));
        data
    }

    #[test]
    fn test_pack_unpack() {
        let packed = PtsAndFlags::pack(987_654_321, true, false);
        assert_eq!(packed.pts(), 987_654_321);
        assert!(packed.is_config());
        assert!(!packed.is_key_frame());

        let both = PtsAndFlags::pack(0, true, true);
        assert_eq!(both.0, PACKET_FLAG_CONFIG | PACKET_FLAG_KEY_FRAME);
        assert_eq!(both.pts(), 0);
    }

    #[tokio::test]
    async fn test_read_packet() {
        let data = frame_bytes(PtsAndFlags::pack(1000, false, true).0, 5, 5);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let packet = StreamPacket::read_from(&mut stream, VIDEO_MAX_PACKET_SIZE)
            .await
            .unwrap();
        assert_eq!(packet.pts_and_flags.pts(), 1000);
        assert!(packet.pts_and_flags.is_key_frame());
        assert_eq!(packet.payload.len(), 5);
    }

    #[tokio::test]
    async fn test_rejects_zero_size() {
        let data = frame_bytes(0, 0, 0);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let result = FrameHeader::read_from(&mut stream, VIDEO_MAX_PACKET_SIZE).await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_rejects_size_above_cap() {
        let data = frame_bytes(0, VIDEO_MAX_PACKET_SIZE + 1, 0);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let result = FrameHeader::read_from(&mut stream, VIDEO_MAX_PACKET_SIZE).await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_rejects_negative_size() {
        // 0xFFFFFFFF would be -1 as an i32; it must fail the cap check,
        // never wrap into an allocation.
        let data = frame_bytes(0, u32::MAX, 0);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let result = FrameHeader::read_from(&mut stream, AUDIO_MAX_PACKET_SIZE).await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_cap_boundary_accepted() {
        let data = frame_bytes(0, AUDIO_MAX_PACKET_SIZE, AUDIO_MAX_PACKET_SIZE as usize);
        let mut stream = ScrcpyInStream::new(Cursor::new(data));

        let packet = StreamPacket::read_from(&mut stream, AUDIO_MAX_PACKET_SIZE)
            .await
            .unwrap();
        assert_eq!(packet.payload.len(), AUDIO_MAX_PACKET_SIZE as usize);
    }

    #[tokio::test]
    async fn test_header_round_trip() {
        let original = FrameHeader {
            pts_and_flags: PtsAndFlags::pack(555, false, false),
            size: 1200,
        };

        let mut buffer = Vec::new();
        let mut out = ScrcpyOutStream::new(&mut buffer);
        original.write_to(&mut out);
        out.flush().await.unwrap();

        let mut inp = ScrcpyInStream::new(Cursor::new(buffer));
        let read_back = FrameHeader::read_from(&mut inp, VIDEO_MAX_PACKET_SIZE)
            .await
            .unwrap();
        assert_eq!(original, read_back);
    }
}
