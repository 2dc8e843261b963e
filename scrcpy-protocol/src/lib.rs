//! scrcpy wire protocol implementation.
//!
//! This crate provides the protocol layer for scrcpy client connections:
//! buffered big-endian I/O streams, stream-packet framing, the session
//! metadata header, input-control message encodings, session ids, and the
//! server launch command.
//!
//! # Modules
//!
//! - [`io`] - Buffered I/O streams (ScrcpyInStream, ScrcpyOutStream)
//! - [`frame`] - Stream packet framing (pts+flags, size caps)
//! - [`metadata`] - Video metadata header and audio codec tags
//! - [`control`] - Input-control message encodings
//! - [`scid`] - Session connection ids
//! - [`command`] - Server launch command construction
//!
//! # Wire Format
//!
//! All multi-byte integers are **big-endian**. There is no version or
//! capability negotiation on the sockets: the streams are distinguished
//! purely by the order in which the server accepts them (video, then
//! audio, then control).

pub mod command;
pub mod control;
pub mod frame;
pub mod io;
pub mod metadata;
pub mod scid;

#[cfg(test)]
mod proptest_framing;

// Re-export commonly used types
pub use command::ServerCommand;
pub use control::{ControlMessage, KeyAction, TouchAction};
pub use frame::{FrameHeader, PtsAndFlags, StreamPacket};
pub use io::{ScrcpyInStream, ScrcpyOutStream};
pub use metadata::{AudioCodec, VideoMetadata};
pub use scid::Scid;
