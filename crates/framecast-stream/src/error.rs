use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the frame writer, frame reader and the session loops.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Header declared a length of zero or above the maximum payload.
    /// The stream can no longer be interpreted.
    #[error("invalid frame length {length} (sequence {sequence})")]
    InvalidLength { sequence: u32, length: u32 },

    /// Refused to transmit a payload outside `1..=MAX_PAYLOAD`.
    #[error("payload size {0} out of range")]
    PayloadSize(usize),

    /// Underlying socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Peer closed the connection part way through a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },

    /// Writer stayed blocked for longer than the configured bound.
    #[error("peer not draining for {0:?}")]
    BackpressureTimeout(Duration),

    /// Stop signal observed while waiting on the connection.
    #[error("stopped")]
    Stopped,
}

impl StreamError {
    /// Protocol violations: the peer sent something uninterpretable.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::InvalidLength { .. })
    }

    /// Connection-level failures: reset, partial I/O, stalled peer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Truncated { .. } | Self::BackpressureTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
