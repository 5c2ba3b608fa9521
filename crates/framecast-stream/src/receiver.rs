/// Receiver side: pulls frames off one connection until the peer closes,
/// the frame limit is hit, the stop signal fires, or something breaks.
///
/// Flow per frame:
///   1. Read and validate header + payload
///   2. Check the sequence against the previous one, warn on a gap
///   3. Report throughput every `report_every` frames
///   4. Hand the payload to the sink (failures are logged, not fatal)
///   5. Stop at `max_frames` if configured
///
/// There is no reconnect: the first protocol or transport error ends the
/// session and is returned to the caller.

use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, StreamError};
use crate::logging::{StreamEvent, StreamLog, StreamLogger, TracingLogger};
use crate::protocol::REPORT_EVERY;
use crate::reader::FrameReader;
use crate::sink::PayloadSink;
use crate::stats::{SessionEnd, SessionStats, SessionSummary};
use crate::stop::StopSignal;

/// Default socket read timeout: how often an idle receiver checks its stop signal.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receiver configuration.
#[derive(Clone)]
pub struct ReceiverConfig {
    /// Stop after this many frames. `None` runs until the peer closes.
    pub max_frames: Option<u64>,
    pub report_every: u64,
    pub logger: Arc<dyn StreamLogger>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            report_every: REPORT_EVERY,
            logger: Arc::new(TracingLogger),
        }
    }
}

/// A sequence discontinuity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub expected: u32,
    pub received: u32,
}

/// Tracks the last sequence seen and flags anything that is not its
/// successor. A sender that rebases its pacing restarts at 0, which shows
/// up here as a gap like any other.
#[derive(Debug, Default)]
pub struct GapDetector {
    last_seen: Option<u32>,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self) -> Option<u32> {
        self.last_seen
    }

    pub fn observe(&mut self, sequence: u32) -> Option<Gap> {
        let gap = self.last_seen.and_then(|last| {
            let expected = last.wrapping_add(1);
            (sequence != expected).then_some(Gap {
                expected,
                received: sequence,
            })
        });
        self.last_seen = Some(sequence);
        gap
    }
}

/// Run one receiver session over `stream`. The stream is dropped, and so
/// closed, on return.
pub fn run_receiver_session<R: Read>(
    stream: R,
    peer: &str,
    sink: &mut dyn PayloadSink,
    config: &ReceiverConfig,
    stop: &StopSignal,
) -> Result<SessionSummary> {
    let log = |event: StreamEvent| {
        config.logger.log(StreamLog {
            component: "receiver",
            peer: peer.to_string(),
            event,
        })
    };

    let mut reader = FrameReader::new(stream, stop.clone());
    let mut gaps = GapDetector::new();
    let mut stats = SessionStats::new();
    let report_every = config.report_every.max(1);

    log(StreamEvent::SessionStarted { payload_len: None });

    let outcome = loop {
        if stop.is_stopped() {
            break Ok(SessionEnd::Stopped);
        }

        let frame = match reader.receive_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(SessionEnd::PeerClosed),
            Err(StreamError::Stopped) => break Ok(SessionEnd::Stopped),
            Err(e) => break Err(e),
        };

        let now = Instant::now();
        stats.record_frame(frame.len(), now);

        if let Some(gap) = gaps.observe(frame.sequence) {
            stats.record_gap();
            log(StreamEvent::SequenceGap {
                expected: gap.expected,
                received: gap.received,
            });
        }

        if stats.frames() % report_every == 0 {
            log(StreamEvent::Progress {
                frames: stats.frames(),
                fps: stats.fps(now),
                frame_len: stats.last_frame_len(),
            });
        }

        if let Err(e) = sink.consume(&frame) {
            log(StreamEvent::SinkFailed {
                sequence: frame.sequence,
                message: e.to_string(),
            });
        }

        if config.max_frames.is_some_and(|max| stats.frames() >= max) {
            break Ok(SessionEnd::FrameLimit);
        }
    };

    let end = *outcome.as_ref().unwrap_or(&SessionEnd::PeerClosed);
    let summary = stats.summary(end, Instant::now());
    let reason = match &outcome {
        Ok(SessionEnd::PeerClosed) => "peer closed".to_string(),
        Ok(SessionEnd::FrameLimit) => "frame limit".to_string(),
        Ok(SessionEnd::Stopped) => "stopped".to_string(),
        Err(e) => e.to_string(),
    };
    log(StreamEvent::SessionClosed {
        frames: summary.frames,
        bytes: summary.bytes,
        duration_ms: summary.elapsed.as_millis() as u64,
        reason,
    });

    outcome.map(|_| summary)
}
