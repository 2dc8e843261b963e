//! Control message encodings.
//!
//! Messages written by the client to the control socket to inject input on
//! the device. All multi-byte fields are big-endian. The message type is
//! the first byte:
//!
//! - 0: inject keycode (14 bytes)
//! - 1: inject text (5 bytes + UTF-8 payload, payload capped at 300 bytes)
//! - 2: inject touch event (32 bytes)
//!
//! Clipboard injection is deliberately not a wire message here: it is a
//! shell side-channel implemented by the client crate.

use bytes::{BufMut, BytesMut};

/// Message type byte for keycode injection.
pub const MSG_TYPE_INJECT_KEYCODE: u8 = 0;

/// Message type byte for text injection.
pub const MSG_TYPE_INJECT_TEXT: u8 = 1;

/// Message type byte for touch event injection.
pub const MSG_TYPE_INJECT_TOUCH_EVENT: u8 = 2;

/// Maximum UTF-8 payload of a text-injection message.
pub const INJECT_TEXT_MAX_LENGTH: usize = 300;

/// Key event action (matches Android KeyEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyAction {
    Down = 0,
    Up = 1,
}

/// Touch event action (matches Android MotionEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TouchAction {
    /// First finger down.
    Down = 0,
    /// Last finger up.
    Up = 1,
    /// Finger moved.
    Move = 2,
    Cancel = 3,
    /// Additional finger down (multi-touch).
    PointerDown = 5,
    /// Additional finger up (multi-touch).
    PointerUp = 6,
}

/// Android keycode for waking the device screen (KEYCODE_WAKEUP).
pub const KEYCODE_WAKEUP: i32 = 224;

/// Android keycode for pasting the clipboard (KEYCODE_PASTE).
pub const KEYCODE_PASTE: i32 = 279;

/// A single input-control message, built per call and encoded on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Inject a single key transition.
    ///
    /// A "full press" is two wire messages (down, then up after a short
    /// delay), not a single message; the client crate provides that
    /// convenience.
    KeyEvent {
        action: KeyAction,
        keycode: i32,
        repeat: i32,
        meta_state: i32,
    },

    /// Inject a UTF-8 text string.
    TextInject { text: String },

    /// Inject a touch event.
    TouchEvent {
        action: TouchAction,
        pointer_id: i64,
        x: i32,
        y: i32,
        screen_width: u16,
        screen_height: u16,
        /// Pressure in `[0.0, 1.0]`, quantized to u16 on the wire.
        pressure: f32,
        action_button: i32,
        buttons: i32,
    },
}

impl ControlMessage {
    /// Encode the message into its wire representation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a text payload exceeds
    /// [`INJECT_TEXT_MAX_LENGTH`] bytes; payloads are never truncated.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::KeyEvent {
                action,
                keycode,
                repeat,
                meta_state,
            } => {
                let mut buf = BytesMut::with_capacity(14);
                buf.put_u8(MSG_TYPE_INJECT_KEYCODE);
                buf.put_u8(*action as u8);
                buf.put_i32(*keycode);
                buf.put_i32(*repeat);
                buf.put_i32(*meta_state);
                Ok(buf.to_vec())
            }

            Self::TextInject { text } => {
                let bytes = text.as_bytes();
                if bytes.len() > INJECT_TEXT_MAX_LENGTH {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!(
                            "text payload {} bytes exceeds limit of {}",
                            bytes.len(),
                            INJECT_TEXT_MAX_LENGTH
                        ),
                    ));
                }
                let mut buf = BytesMut::with_capacity(5 + bytes.len());
                buf.put_u8(MSG_TYPE_INJECT_TEXT);
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(bytes);
                Ok(buf.to_vec())
            }

            Self::TouchEvent {
                action,
                pointer_id,
                x,
                y,
                screen_width,
                screen_height,
                pressure,
                action_button,
                buttons,
            } => {
                let mut buf = BytesMut::with_capacity(32);
                buf.put_u8(MSG_TYPE_INJECT_TOUCH_EVENT);
                buf.put_u8(*action as u8);
                buf.put_i64(*pointer_id);
                buf.put_i32(*x);
                buf.put_i32(*y);
                buf.put_u16(*screen_width);
                buf.put_u16(*screen_height);
                buf.put_u16(quantize_pressure(*pressure));
                buf.put_i32(*action_button);
                buf.put_i32(*buttons);
                Ok(buf.to_vec())
            }
        }
    }

    /// True for messages that may be dropped under backpressure (touch
    /// moves); key, text, and touch up/down transitions must never be
    /// dropped.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            Self::TouchEvent {
                action: TouchAction::Move,
                ..
            }
        )
    }
}

/// Quantize a `[0.0, 1.0]` pressure to the u16 wire field, clamping
/// out-of-range input.
fn quantize_pressure(pressure: f32) -> u16 {
    let scaled = (pressure * 0xFFFF as f32) as i64;
    scaled.clamp(0, 0xFFFF) as u16
}
