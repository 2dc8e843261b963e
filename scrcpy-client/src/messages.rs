//! Internal event types exchanged between the engine's tasks.

/// Which component raised a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSource {
    /// Video demuxer.
    Video,
    /// Audio demuxer.
    Audio,
    /// Shell output monitor (server process).
    Server,
}

/// Events published by the demuxers and the shell monitor.
///
/// The reconnection supervisor is the only consumer that acts on faults;
/// diagnostics are informational.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A stream failed mid-session. At steady state this always means the
    /// session is dead, so the supervisor reacts by reconnecting.
    StreamFault {
        source: FaultSource,
        message: String,
    },

    /// The server process exited. Any exit code implies a dead session
    /// regardless of socket state.
    ServerExited {
        code: i32,
    },

    /// A diagnostic line from the server's shell stream.
    Diagnostic {
        line: String,
        from_stderr: bool,
    },
}

impl SessionEvent {
    /// True for events the supervisor must react to.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::StreamFault { .. } | Self::ServerExited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        assert!(SessionEvent::StreamFault {
            source: FaultSource::Video,
            message: "eof".to_string(),
        }
        .is_fault());
        assert!(SessionEvent::ServerExited { code: 0 }.is_fault());
        assert!(!SessionEvent::Diagnostic {
            line: "INFO: started".to_string(),
            from_stderr: false,
        }
        .is_fault());
    }

    #[test]
    fn test_event_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SessionEvent>();
    }
}
