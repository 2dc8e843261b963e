//! Property tests for packet framing.
//!
//! These verify that header parsing is robust against fragmentation at
//! arbitrary byte boundaries (as happens over real sockets) and that the
//! pts/flag packing round-trips exactly for the whole value space.

#[cfg(test)]
mod tests {
    use crate::frame::*;
    use crate::io::ScrcpyInStream;
    use crate::scid::Scid;
    use proptest::prelude::*;

    /// A fragmenting reader that splits reads at a specific boundary.
    ///
    /// Simulates network fragmentation by only allowing reads up to a
    /// given position, then requiring another read for the rest.
    struct FragmentingReader {
        data: Vec<u8>,
        pos: usize,
        boundary: usize,
    }

    impl FragmentingReader {
        fn new(data: Vec<u8>, boundary: usize) -> Self {
            let boundary = boundary.min(data.len());
            Self {
                data,
                pos: 0,
                boundary,
            }
        }
    }

    impl tokio::io::AsyncRead for FragmentingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.pos >= self.data.len() {
                return std::task::Poll::Ready(Ok(()));
            }

            let available = if self.pos < self.boundary {
                (self.boundary - self.pos).min(buf.remaining())
            } else {
                (self.data.len() - self.pos).min(buf.remaining())
            };

            if available == 0 {
                return std::task::Poll::Ready(Ok(()));
            }

            let data = &self.data[self.pos..self.pos + available];
            buf.put_slice(data);
            self.pos += available;

            std::task::Poll::Ready(Ok(()))
        }
    }

    proptest! {
        #[test]
        fn pts_flags_round_trip(
            pts in 0u64..=PACKET_PTS_MASK,
            is_config in any::<bool>(),
            is_key_frame in any::<bool>(),
        ) {
            let packed = PtsAndFlags::pack(pts, is_config, is_key_frame);
            prop_assert_eq!(packed.pts(), pts);
            prop_assert_eq!(packed.is_config(), is_config);
            prop_assert_eq!(packed.is_key_frame(), is_key_frame);
        }

        #[test]
        fn scid_hex_round_trip(raw in 0u32..0x7FFF_FFFF) {
            let scid = Scid::from_raw(raw).unwrap();
            let rendered = scid.to_string();
            prop_assert_eq!(rendered.len(), 8);
            prop_assert!(rendered.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            let parsed: Scid = rendered.parse().unwrap();
            prop_assert_eq!(parsed, scid);
        }

        #[test]
        fn packet_parse_survives_fragmentation(
            pts in 0u64..=PACKET_PTS_MASK,
            payload in prop::collection::vec(any::<u8>(), 1..512),
            boundary in 0usize..600,
        ) {
            let header = PtsAndFlags::pack(pts, false, false);
            let mut wire = Vec::new();
            wire.extend_from_slice(&header.0.to_be_bytes());
            wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            wire.extend_from_slice(&payload);

            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let packet = rt.block_on(async {
                let reader = FragmentingReader::new(wire, boundary);
                let mut stream = ScrcpyInStream::new(reader);
                StreamPacket::read_from(&mut stream, VIDEO_MAX_PACKET_SIZE).await
            }).unwrap();

            prop_assert_eq!(packet.pts_and_flags.pts(), pts);
            prop_assert_eq!(packet.payload, payload);
        }
    }
}
