/// Frame pacing for the sender.
///
/// Frame `k` is due at `start + k * interval`. After each send the pacer
/// says how long to sleep until the next frame is due. When the sender has
/// fallen more than a whole interval behind, the schedule is rebased on the
/// current instant and the frame counter (which doubles as the sequence
/// number) restarts at 0, so lag never accumulates. Receivers see that as a
/// sequence discontinuity.

use std::time::{Duration, Instant};

/// What the sender should do after a frame went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceAction {
    /// Next frame is due after this delay.
    Sleep(Duration),
    /// Next frame is already due, but within one interval of schedule.
    Proceed,
    /// Fell too far behind; schedule and sequence restarted.
    Reset { behind: Duration },
}

#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    start: Instant,
    frames: u32,
    resets: u64,
}

impl Pacer {
    pub fn new(fps: u32, now: Instant) -> Self {
        Self::with_interval(Duration::from_secs(1) / fps.max(1), now)
    }

    pub fn with_interval(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            start: now,
            frames: 0,
            resets: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sequence number for the next frame to send.
    pub fn sequence(&self) -> u32 {
        self.frames
    }

    /// Number of times the schedule has been rebased.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Record that the current frame was sent at `now`.
    pub fn on_frame_sent(&mut self, now: Instant) -> PaceAction {
        self.frames = self.frames.wrapping_add(1);
        let due = self.start + self.interval * self.frames;

        if due > now {
            return PaceAction::Sleep(due - now);
        }

        let behind = now - due;
        if behind > self.interval {
            self.start = now;
            self.frames = 0;
            self.resets += 1;
            PaceAction::Reset { behind }
        } else {
            PaceAction::Proceed
        }
    }
}
