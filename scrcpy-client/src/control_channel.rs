//! Control channel: input injection toward the device.
//!
//! Messages go over the control socket when it is live (single write +
//! flush). The socket is optional infrastructure though — it may never
//! have connected, or may die mid-session — so on any write failure the
//! broken socket is discarded and the same bytes are piped through a
//! shell fallback into the forwarded port. The session stays minimally
//! controllable either way.

use crate::device::DeviceConnection;
use crate::errors::ClientError;
use base64::Engine;
use scrcpy_protocol::control::{ControlMessage, KeyAction, KEYCODE_PASTE, KEYCODE_WAKEUP};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared liveness flag for the control socket.
///
/// The video demuxer consults this to decide whether a read timeout is
/// benign (device screen off, control channel still up) or a real fault.
#[derive(Clone)]
pub struct ControlLiveness(Arc<AtomicBool>);

impl ControlLiveness {
    pub fn new(alive: bool) -> Self {
        Self(Arc::new(AtomicBool::new(alive)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn mark_dead(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Delay between the down and up halves of a full key press.
const KEY_PRESS_DELAY: Duration = Duration::from_millis(10);

/// Delay between setting the clipboard and sending the paste key.
const CLIPBOARD_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Sends control messages to the device.
pub struct ControlChannel {
    socket: Mutex<Option<OwnedWriteHalf>>,
    liveness: ControlLiveness,
    device: Arc<dyn DeviceConnection>,
    local_port: u16,
}

impl ControlChannel {
    /// Create a channel backed by a live control socket.
    pub fn connected(
        socket: OwnedWriteHalf,
        device: Arc<dyn DeviceConnection>,
        local_port: u16,
    ) -> Self {
        Self {
            socket: Mutex::new(Some(socket)),
            liveness: ControlLiveness::new(true),
            device,
            local_port,
        }
    }

    /// Create a channel with no socket; every send uses the shell
    /// fallback. Used when the control socket failed to connect.
    pub fn fallback_only(device: Arc<dyn DeviceConnection>, local_port: u16) -> Self {
        Self {
            socket: Mutex::new(None),
            liveness: ControlLiveness::new(false),
            device,
            local_port,
        }
    }

    /// Handle for liveness checks by the demuxers.
    pub fn liveness(&self) -> ControlLiveness {
        self.liveness.clone()
    }

    /// Encode and send a single control message.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails (oversized text) or if both the
    /// socket and the shell fallback fail.
    pub async fn send(&self, message: &ControlMessage) -> Result<(), ClientError> {
        let bytes = message.encode()?;
        self.send_raw(&bytes).await
    }

    async fn send_raw(&self, bytes: &[u8]) -> Result<(), ClientError> {
        {
            let mut guard = self.socket.lock().await;
            if let Some(socket) = guard.as_mut() {
                match write_all_flush(socket, bytes).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!("control socket write failed, falling back to shell: {e}");
                        // The socket is broken; drop it so later sends go
                        // straight to the fallback.
                        *guard = None;
                        self.liveness.mark_dead();
                    }
                }
            }
        }

        self.send_via_shell(bytes).await
    }

    /// Pipe the raw message bytes through the device shell into the
    /// forwarded port.
    async fn send_via_shell(&self, bytes: &[u8]) -> Result<(), ClientError> {
        let hex = hex::encode(bytes);
        let command = format!(
            "echo -n '{}' | xxd -r -p | nc 127.0.0.1 {}",
            hex, self.local_port
        );
        debug!(len = bytes.len(), "sending control message via shell fallback");
        self.device
            .execute_shell(&command)
            .await
            .map(|_| ())
            .map_err(|e| ClientError::Control(format!("shell fallback failed: {e}")))
    }

    /// Send a full key press: down, a short delay, then up.
    pub async fn tap_key(&self, keycode: i32) -> Result<(), ClientError> {
        self.send(&key_event(KeyAction::Down, keycode)).await?;
        tokio::time::sleep(KEY_PRESS_DELAY).await;
        self.send(&key_event(KeyAction::Up, keycode)).await
    }

    /// Inject a UTF-8 text string (wire limit 300 bytes).
    pub async fn inject_text(&self, text: &str) -> Result<(), ClientError> {
        self.send(&ControlMessage::TextInject {
            text: text.to_string(),
        })
        .await
    }

    /// Set the device clipboard and paste it.
    ///
    /// Workaround, not part of the binary control protocol: the text is
    /// base64-encoded into a broadcast/service shell command, then the
    /// paste keycode is sent. Survives non-ASCII text that the text
    /// injection path cannot carry.
    pub async fn set_clipboard_and_paste(&self, text: &str) -> Result<(), ClientError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
        let command = format!(
            "am broadcast -a clipper.set -e text \"{}\" 2>/dev/null || \
             service call clipboard 1 i32 0 s16 com.android.shell s16 \"{}\"",
            encoded, text
        );

        if let Err(e) = self.device.execute_shell(&command).await {
            warn!("clipboard set failed, sending paste anyway: {e}");
        }

        tokio::time::sleep(CLIPBOARD_SETTLE_DELAY).await;
        self.tap_key(KEYCODE_PASTE).await
    }

    /// Best-effort screen wake. Failures are logged, never propagated:
    /// a dark screen is not worth failing a connect over.
    pub async fn wake_screen(&self) {
        if let Err(e) = self.tap_key(KEYCODE_WAKEUP).await {
            warn!("wake screen failed: {e}");
        }
    }

    /// Close the control socket, if any. Idempotent.
    pub async fn close(&self) {
        let mut guard = self.socket.lock().await;
        if let Some(mut socket) = guard.take() {
            let _ = socket.shutdown().await;
        }
        self.liveness.mark_dead();
    }
}

async fn write_all_flush(socket: &mut OwnedWriteHalf, bytes: &[u8]) -> std::io::Result<()> {
    socket.write_all(bytes).await?;
    socket.flush().await
}

fn key_event(action: KeyAction, keycode: i32) -> ControlMessage {
    ControlMessage::KeyEvent {
        action,
        keycode,
        repeat: 0,
        meta_state: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ShellEvent, ShellStream};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Fake device that records executed shell commands.
    struct RecordingDevice {
        commands: SyncMutex<Vec<String>>,
    }

    impl RecordingDevice {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                commands: SyncMutex::new(Vec::new()),
            })
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().clone()
        }
    }

    #[async_trait]
    impl DeviceConnection for RecordingDevice {
        async fn execute_shell(&self, command: &str) -> Result<String, ClientError> {
            self.commands.lock().push(command.to_string());
            Ok(String::new())
        }

        async fn open_shell_stream(&self, _command: &str) -> Result<ShellStream, ClientError> {
            let (_tx, rx) = tokio::sync::mpsc::channel::<ShellEvent>(1);
            Ok(rx)
        }

        async fn setup_forward(&self, _port: u16, _name: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn remove_forward(&self, _port: u16) -> Result<(), ClientError> {
            Ok(())
        }

        async fn push_server_binary(&self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_over_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 14];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (_read, write) = stream.into_split();
        let device = RecordingDevice::new();
        let channel = ControlChannel::connected(write, device.clone(), 27183);

        channel
            .send(&key_event(KeyAction::Down, 224))
            .await
            .unwrap();

        let received = server.await.unwrap();
        assert_eq!(received[0], 0); // keycode message type
        assert_eq!(&received[2..6], &224i32.to_be_bytes());
        // Socket path used; no shell fallback.
        assert!(device.commands().is_empty());
        assert!(channel.liveness().is_alive());
    }

    #[tokio::test]
    async fn test_fallback_without_socket() {
        let device = RecordingDevice::new();
        let channel = ControlChannel::fallback_only(device.clone(), 27183);
        assert!(!channel.liveness().is_alive());

        channel.send(&key_event(KeyAction::Up, 3)).await.unwrap();

        let commands = device.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("xxd -r -p | nc 127.0.0.1 27183"));
        // The hex payload round-trips to the encoded message.
        let hex = commands[0]
            .split('\'')
            .nth(1)
            .expect("hex payload in command");
        let bytes = hex::decode(hex).unwrap();
        assert_eq!(bytes, key_event(KeyAction::Up, 3).encode().unwrap());
    }

    #[tokio::test]
    async fn test_broken_socket_falls_back_and_marks_dead() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        // Accept then immediately drop the server side.
        let (server_side, _) = listener.accept().await.unwrap();
        drop(server_side);
        drop(listener);

        let (_read, write) = stream.into_split();
        let device = RecordingDevice::new();
        let channel = ControlChannel::connected(write, device.clone(), 27183);
        let liveness = channel.liveness();

        // The peer is gone; the write eventually errors and the channel
        // must recover through the fallback.
        let mut fell_back = false;
        for _ in 0..20 {
            channel.send(&key_event(KeyAction::Down, 66)).await.unwrap();
            if !device.commands().is_empty() {
                fell_back = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(fell_back, "send never reached the shell fallback");
        assert!(!liveness.is_alive());
    }

    #[tokio::test]
    async fn test_clipboard_uses_side_channel() {
        let device = RecordingDevice::new();
        let channel = ControlChannel::fallback_only(device.clone(), 27183);

        channel.set_clipboard_and_paste("héllo").await.unwrap();

        let commands = device.commands();
        // One clipboard command plus two fallback key events (down + up).
        assert_eq!(commands.len(), 3);
        let expected =
            base64::engine::general_purpose::STANDARD.encode("héllo".as_bytes());
        assert!(commands[0].contains(&expected));
        assert!(commands[0].contains("clipper.set"));
    }

    #[tokio::test]
    async fn test_oversized_text_rejected_before_io() {
        let device = RecordingDevice::new();
        let channel = ControlChannel::fallback_only(device.clone(), 27183);

        let result = channel.inject_text(&"x".repeat(301)).await;
        assert!(result.is_err());
        assert!(device.commands().is_empty());
    }
}
