//! The established mirroring session.
//!
//! All per-session state — the id, the resolved facts, the stream
//! demuxers, the control channel, the shell monitor — lives in one
//! explicit object built by the orchestrator and handed to the caller,
//! rather than scattered through nullable client fields. When a session
//! is replaced on reconnect, the old object is simply dropped.

use crate::control_channel::ControlChannel;
use crate::demux::{AudioDemuxer, VideoDemuxer};
use crate::device::DeviceConnection;
use crate::monitor::ShellMonitor;
use scrcpy_common::Resolution;
use scrcpy_protocol::scid::Scid;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;

/// A live mirroring session.
pub struct Session {
    pub(crate) scid: Scid,
    pub(crate) device_id: String,
    /// Device model name from the metadata header.
    pub device_name: String,
    /// Video resolution, immutable for the session's lifetime.
    pub resolution: Resolution,
    /// Video packet source.
    pub video: VideoDemuxer<OwnedReadHalf>,
    /// Audio packet source; `None` when audio is disabled or its socket
    /// failed to come up.
    pub audio: Option<AudioDemuxer<OwnedReadHalf>>,
    /// Input injection channel.
    pub control: Arc<ControlChannel>,
    pub(crate) device: Arc<dyn DeviceConnection>,
    pub(crate) monitor: ShellMonitor,
    pub(crate) local_port: u16,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("scid", &self.scid)
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .field("resolution", &self.resolution)
            .field("local_port", &self.local_port)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// The session id.
    pub fn scid(&self) -> Scid {
        self.scid
    }

    /// The device this session mirrors.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Tear down the session's local resources: stop the shell monitor
    /// and close the control socket. Device-side cleanup (forward
    /// removal, process kill) is the orchestrator's job since it must
    /// also work when the session itself is already broken.
    pub async fn shutdown(&self) {
        self.monitor.abort();
        self.control.close().await;
    }
}
