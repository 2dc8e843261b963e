//! Connection orchestrator.
//!
//! Drives the multi-step handshake that turns a device id and a set of
//! options into a live [`Session`]:
//!
//! 1. resolve + verify the device connection (re-dial network devices)
//! 2. best-effort cleanup of stale forwards and server processes
//! 3. generate a fresh SCID
//! 4. port-forward setup and server push, concurrently
//! 5. launch the server, hand its shell stream to the monitor
//! 6. open the wire sockets in accept order (video, audio, control)
//! 7. read and validate the stream metadata
//! 8. best-effort screen wake
//! 9. fire-and-forget keep-alive hand-off
//!
//! Every step is reported through the progress tracker. A failure at any
//! step tears the attempt down completely — sockets are dropped, the
//! monitor is aborted — so a failed connect never leaves partial state
//! behind.

use crate::config::SessionOptions;
use crate::control_channel::ControlChannel;
use crate::demux::{AudioDemuxer, VideoDemuxer};
use crate::device::{DeviceConnection, DeviceId, DeviceRegistry, KeepAliveNotifier};
use crate::errors::ClientError;
use crate::messages::SessionEvent;
use crate::monitor::{self, ShellMonitor};
use crate::session::Session;
use crate::state::{ConnectionStep, ProgressTracker, StepStatus};
use parking_lot::Mutex;
use scrcpy_protocol::io::ScrcpyInStream;
use scrcpy_protocol::metadata::{AudioCodec, VideoMetadata};
use scrcpy_protocol::scid::Scid;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Settle delay after stale-resource cleanup.
const CLEANUP_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Bound on the server-ready wait during launch.
const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds sessions out of device connections.
pub struct Connector {
    registry: Arc<dyn DeviceRegistry>,
    keepalive: Option<Arc<dyn KeepAliveNotifier>>,
    progress: Arc<ProgressTracker>,
    events: flume::Sender<SessionEvent>,
    last_scid: Mutex<Option<Scid>>,
}

impl Connector {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        keepalive: Option<Arc<dyn KeepAliveNotifier>>,
        progress: Arc<ProgressTracker>,
        events: flume::Sender<SessionEvent>,
    ) -> Self {
        Self {
            registry,
            keepalive,
            progress,
            events,
            last_scid: Mutex::new(None),
        }
    }

    /// Run one full connect attempt.
    ///
    /// Does not touch the connection state; the caller (client facade or
    /// reconnection supervisor) owns state transitions so there is a
    /// single writer at any time.
    pub async fn attempt(
        &self,
        device_id: &str,
        options: &SessionOptions,
    ) -> Result<Session, ClientError> {
        self.progress.clear();

        // Step 1: resolve and verify the device connection.
        self.progress.update(
            ConnectionStep::AdbConnect,
            StepStatus::Running,
            "verifying device connection",
            None,
        );
        let device = match self.resolve_device(device_id).await {
            Ok(device) => device,
            Err(e) => {
                self.fail_step(ConnectionStep::AdbConnect, &e);
                return Err(e);
            }
        };
        self.progress.update(
            ConnectionStep::AdbConnect,
            StepStatus::Success,
            "device connection verified",
            None,
        );

        // Step 2: best-effort cleanup of a previous session's leftovers.
        self.cleanup_stale_resources(&device, options.connection.local_port)
            .await;

        // Step 3: fresh session id.
        let scid = Scid::generate();
        *self.last_scid.lock() = Some(scid);
        debug!(%scid, "starting connect attempt");

        // Step 4: forward and push, concurrently; both must succeed.
        self.forward_and_push(&device, scid, options).await?;

        // Step 5: launch the server and start monitoring its output.
        let monitor = self.start_server(&device, scid, options).await?;

        // Steps 6-9 share teardown: abort the monitor if any of them
        // fails so nothing lingers from the dead attempt.
        match self
            .open_streams(&device, device_id, scid, options, monitor)
            .await
        {
            Ok(session) => {
                self.progress.update(
                    ConnectionStep::Completed,
                    StepStatus::Success,
                    "connection established",
                    None,
                );
                info!(
                    device = device_id,
                    resolution = %session.resolution,
                    "session established"
                );
                Ok(session)
            }
            Err(e) => {
                self.fail_step(ConnectionStep::ConnectSocket, &e);
                Err(e)
            }
        }
    }

    /// Device-side teardown after a session ends: remove the forward and
    /// kill the server process. Best-effort; failures are logged only.
    pub async fn teardown(&self, session: &Session) {
        session.shutdown().await;

        if let Err(e) = session.device.remove_forward(session.local_port).await {
            warn!("forward removal failed: {e}");
        }

        let kill = format!("pkill -f '{}' || true", session.scid.kill_pattern());
        if let Err(e) = session.device.execute_shell(&kill).await {
            warn!("server process kill failed: {e}");
        }

        *self.last_scid.lock() = None;
        self.progress.clear();
    }

    /// Forget the previous session id without a device round-trip; used
    /// when the device connection itself is already gone.
    pub fn forget_session(&self) {
        *self.last_scid.lock() = None;
    }

    async fn resolve_device(
        &self,
        device_id: &str,
    ) -> Result<Arc<dyn DeviceConnection>, ClientError> {
        if let Some(device) = self.registry.connection(device_id).await {
            match device.verify().await {
                Ok(()) => return Ok(device),
                Err(e) => warn!("existing device connection failed verification: {e}"),
            }
        }

        // No usable connection. Network devices get one re-dial; USB
        // devices cannot self-heal.
        match DeviceId::parse(device_id) {
            DeviceId::Network { host, port } => {
                self.progress.update(
                    ConnectionStep::AdbConnect,
                    StepStatus::Running,
                    "re-establishing device connection",
                    None,
                );
                self.registry
                    .connect_device(&host, port)
                    .await
                    .map_err(|e| ClientError::Device(format!("reconnect failed: {e}")))
            }
            DeviceId::Usb { id } => Err(ClientError::Device(format!(
                "USB device not connected: {id}"
            ))),
        }
    }

    async fn cleanup_stale_resources(&self, device: &Arc<dyn DeviceConnection>, local_port: u16) {
        if let Err(e) = device.remove_forward(local_port).await {
            debug!("stale forward removal failed (ignored): {e}");
        }

        let previous = *self.last_scid.lock();
        if let Some(scid) = previous {
            let kill = format!("pkill -f '{}' || true", scid.kill_pattern());
            match device.execute_shell(&kill).await {
                Ok(_) => debug!(%scid, "killed stale server process"),
                Err(e) => warn!("stale server kill failed (ignored): {e}"),
            }
        }

        tokio::time::sleep(CLEANUP_SETTLE_DELAY).await;
    }

    async fn forward_and_push(
        &self,
        device: &Arc<dyn DeviceConnection>,
        scid: Scid,
        options: &SessionOptions,
    ) -> Result<(), ClientError> {
        let socket_name = scid.socket_name();
        let local_port = options.connection.local_port;

        self.progress.update(
            ConnectionStep::AdbForward,
            StepStatus::Running,
            format!("{local_port} -> {socket_name}"),
            None,
        );
        self.progress.update(
            ConnectionStep::PushServer,
            StepStatus::Running,
            "pushing server binary",
            None,
        );

        let (forward, push) = tokio::join!(
            device.setup_forward(local_port, &socket_name),
            device.push_server_binary()
        );

        let forward = forward.map_err(|e| ClientError::Forward(e.to_string()));
        match &forward {
            Ok(()) => self.progress.update(
                ConnectionStep::AdbForward,
                StepStatus::Success,
                "port forwarded",
                None,
            ),
            Err(e) => self.fail_step(ConnectionStep::AdbForward, e),
        }

        let push = push.map_err(|e| ClientError::Push(e.to_string()));
        match &push {
            Ok(()) => self.progress.update(
                ConnectionStep::PushServer,
                StepStatus::Success,
                "server binary pushed",
                None,
            ),
            Err(e) => self.fail_step(ConnectionStep::PushServer, e),
        }

        forward.and(push)
    }

    async fn start_server(
        &self,
        device: &Arc<dyn DeviceConnection>,
        scid: Scid,
        options: &SessionOptions,
    ) -> Result<ShellMonitor, ClientError> {
        self.progress.update(
            ConnectionStep::StartServer,
            StepStatus::Running,
            format!("starting server (scid {scid})"),
            None,
        );

        let command = options.server_command(scid);
        debug!("server command: {command}");

        let result = async {
            let mut stream = device
                .open_shell_stream(&command)
                .await
                .map_err(|e| ClientError::ServerStart(e.to_string()))?;
            monitor::wait_for_server_ready(&mut stream, SERVER_READY_TIMEOUT).await?;
            Ok(ShellMonitor::spawn(stream, self.events.clone()))
        }
        .await;

        match result {
            Ok(shell_monitor) => {
                tokio::time::sleep(Duration::from_millis(options.connection.settle_delay_ms))
                    .await;
                self.progress.update(
                    ConnectionStep::StartServer,
                    StepStatus::Success,
                    "server started",
                    None,
                );
                Ok(shell_monitor)
            }
            Err(e) => {
                self.fail_step(ConnectionStep::StartServer, &e);
                Err(e)
            }
        }
    }

    async fn open_streams(
        &self,
        device: &Arc<dyn DeviceConnection>,
        device_id: &str,
        scid: Scid,
        options: &SessionOptions,
        shell_monitor: ShellMonitor,
    ) -> Result<Session, ClientError> {
        let local_port = options.connection.local_port;
        self.progress.update(
            ConnectionStep::ConnectSocket,
            StepStatus::Running,
            format!("connecting streams (127.0.0.1:{local_port})"),
            None,
        );

        // Sockets must be opened in the order the server accepts them:
        // video, then audio, then control.
        let video_socket = open_socket(local_port, options.connect_timeout(), "video").await?;

        let audio_socket = if options.audio.enabled {
            match open_socket(local_port, options.connect_timeout(), "audio").await {
                Ok(socket) => Some(socket),
                Err(e) => {
                    warn!("audio socket unavailable, continuing without audio: {e}");
                    None
                }
            }
        } else {
            None
        };

        let control_socket =
            match open_socket(local_port, options.connect_timeout(), "control").await {
                Ok(socket) => Some(socket),
                Err(e) => {
                    warn!("control socket unavailable, input will use shell fallback: {e}");
                    None
                }
            };

        // Metadata handshake on the video socket, under a hard deadline.
        let (video_read, _video_write) = video_socket.into_split();
        let mut video_stream = ScrcpyInStream::new(video_read);
        let metadata = match timeout(
            options.handshake_timeout(),
            VideoMetadata::read_from(&mut video_stream),
        )
        .await
        {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => {
                shell_monitor.abort();
                return Err(ClientError::Metadata(e.to_string()));
            }
            Err(_) => {
                shell_monitor.abort();
                return Err(ClientError::Timeout(options.handshake_timeout()));
            }
        };
        debug!(
            device_name = %metadata.device_name,
            resolution = %metadata.resolution,
            codec_id = format_args!("0x{:08x}", metadata.codec_id),
            "video metadata read"
        );

        let control = Arc::new(match control_socket {
            Some(socket) => {
                let (_read, write) = socket.into_split();
                ControlChannel::connected(write, device.clone(), local_port)
            }
            None => ControlChannel::fallback_only(device.clone(), local_port),
        });

        let video = VideoDemuxer::new(
            video_stream,
            control.liveness(),
            self.events.clone(),
            options.video_read_timeout(),
        );

        // The audio socket announces its codec before the first packet;
        // a bad tag disables audio rather than failing the session.
        let audio = match audio_socket {
            Some(socket) => {
                let (read, _write) = socket.into_split();
                let mut stream = ScrcpyInStream::new(read);
                match timeout(options.handshake_timeout(), AudioCodec::read_from(&mut stream))
                    .await
                {
                    Ok(Ok(codec)) => {
                        debug!(%codec, "audio stream ready");
                        Some(AudioDemuxer::new(
                            stream,
                            codec,
                            self.events.clone(),
                            options.handshake_timeout(),
                        ))
                    }
                    Ok(Err(e)) => {
                        warn!("audio codec header rejected, disabling audio: {e}");
                        None
                    }
                    Err(_) => {
                        warn!("audio codec header timed out, disabling audio");
                        None
                    }
                }
            }
            None => None,
        };

        self.progress.update(
            ConnectionStep::ConnectSocket,
            StepStatus::Success,
            "streams connected",
            None,
        );

        // Step 8: best-effort wake; a failure must not fail the connect.
        control.wake_screen().await;

        // Step 9: fire-and-forget keep-alive hand-off.
        if let Some(notifier) = &self.keepalive {
            notifier.session_established(device_id, &metadata.device_name, metadata.resolution);
        }

        Ok(Session {
            scid,
            device_id: device_id.to_string(),
            device_name: metadata.device_name,
            resolution: metadata.resolution,
            video,
            audio,
            control,
            device: device.clone(),
            monitor: shell_monitor,
            local_port,
        })
    }

    fn fail_step(&self, step: ConnectionStep, error: &ClientError) {
        self.progress
            .update(step, StepStatus::Failed, "", Some(error.to_string()));
    }
}

/// Open one wire socket to the forwarded local port.
async fn open_socket(
    local_port: u16,
    connect_timeout: Duration,
    label: &str,
) -> Result<TcpStream, ClientError> {
    let connect = TcpStream::connect(("127.0.0.1", local_port));
    let socket = match timeout(connect_timeout, connect).await {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => {
            return Err(ClientError::Socket(format!(
                "{label} socket connect failed: {e}"
            )))
        }
        Err(_) => {
            return Err(ClientError::Socket(format!(
                "{label} socket connect timed out"
            )))
        }
    };

    // Input and frame latency both matter more than throughput here.
    socket
        .set_nodelay(true)
        .map_err(|e| ClientError::Socket(format!("{label} socket configuration failed: {e}")))?;

    Ok(socket)
}
