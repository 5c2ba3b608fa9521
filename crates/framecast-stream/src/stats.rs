/// Per-session counters. Owned by the session loop, so plain fields are
/// enough; nothing else touches them while the session runs.

use std::time::{Duration, Instant};

/// Why a session loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the connection on a frame boundary.
    PeerClosed,
    /// Configured frame limit reached.
    FrameLimit,
    /// Stop signal observed.
    Stopped,
}

#[derive(Debug, Default)]
pub struct SessionStats {
    started_at: Option<Instant>,
    frames: u64,
    bytes: u64,
    last_frame_len: usize,
    gaps: u64,
    pacing_resets: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame. The first call fixes the session start time.
    pub fn record_frame(&mut self, len: usize, now: Instant) {
        self.started_at.get_or_insert(now);
        self.frames += 1;
        self.bytes += len as u64;
        self.last_frame_len = len;
    }

    pub fn record_gap(&mut self) {
        self.gaps += 1;
    }

    pub fn record_pacing_reset(&mut self) {
        self.pacing_resets += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame_len(&self) -> usize {
        self.last_frame_len
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Average frames per second since the first frame.
    pub fn fps(&self, now: Instant) -> f64 {
        rate(self.frames, self.elapsed(now))
    }

    pub fn summary(&self, end: SessionEnd, now: Instant) -> SessionSummary {
        SessionSummary {
            frames: self.frames,
            bytes: self.bytes,
            elapsed: self.elapsed(now),
            gaps: self.gaps,
            pacing_resets: self.pacing_resets,
            end,
        }
    }
}

/// Final tally of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub gaps: u64,
    pub pacing_resets: u64,
    pub end: SessionEnd,
}

impl SessionSummary {
    pub fn fps(&self) -> f64 {
        rate(self.frames, self.elapsed)
    }
}

fn rate(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { frames as f64 / secs } else { 0.0 }
}
