/// Session event logging.
///
/// Sender and receiver loops report what happens on a connection as
/// structured [`StreamEvent`]s. The default sink forwards them to
/// `tracing`; tests plug in their own logger to inspect them.

use std::fmt;

/// Structured log entry for one session.
#[derive(Debug, Clone)]
pub struct StreamLog {
    pub component: &'static str,
    pub peer: String,
    pub event: StreamEvent,
}

/// Events a session can report.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Session loop started on a connection.
    SessionStarted { payload_len: Option<usize> },
    /// Periodic throughput report.
    Progress {
        frames: u64,
        fps: f64,
        frame_len: usize,
    },
    /// Receiver: sequence did not follow the previous one.
    SequenceGap { expected: u32, received: u32 },
    /// Sender: fell behind schedule, sequence restarted at 0.
    PacingReset { behind_ms: u64 },
    /// Receiver: payload sink rejected a frame.
    SinkFailed { sequence: u32, message: String },
    /// Session loop exited.
    SessionClosed {
        frames: u64,
        bytes: u64,
        duration_ms: u64,
        reason: String,
    },
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionStarted { payload_len: Some(len) } => {
                write!(f, "session_started payload_len={}", len)
            }
            Self::SessionStarted { payload_len: None } => write!(f, "session_started"),
            Self::Progress { frames, fps, frame_len } => {
                write!(f, "progress frames={} fps={:.2} frame_len={}", frames, fps, frame_len)
            }
            Self::SequenceGap { expected, received } => {
                write!(f, "sequence_gap expected={} received={}", expected, received)
            }
            Self::PacingReset { behind_ms } => {
                write!(f, "pacing_reset behind_ms={}", behind_ms)
            }
            Self::SinkFailed { sequence, message } => {
                write!(f, "sink_failed seq={}: {}", sequence, message)
            }
            Self::SessionClosed { frames, bytes, duration_ms, reason } => {
                write!(
                    f,
                    "session_closed frames={} bytes={} duration_ms={} reason={}",
                    frames, bytes, duration_ms, reason
                )
            }
        }
    }
}

/// Trait for session logging.
pub trait StreamLogger: Send + Sync {
    fn log(&self, entry: StreamLog);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl StreamLogger for TracingLogger {
    fn log(&self, entry: StreamLog) {
        match &entry.event {
            StreamEvent::SequenceGap { .. }
            | StreamEvent::PacingReset { .. }
            | StreamEvent::SinkFailed { .. } => {
                tracing::warn!(component = entry.component, peer = %entry.peer, "{}", entry.event);
            }
            StreamEvent::SessionStarted { .. }
            | StreamEvent::Progress { .. }
            | StreamEvent::SessionClosed { .. } => {
                tracing::info!(component = entry.component, peer = %entry.peer, "{}", entry.event);
            }
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl StreamLogger for NullLogger {
    fn log(&self, _entry: StreamLog) {}
}
