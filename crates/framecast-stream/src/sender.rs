/// Sender side: accept loop and the paced per-connection session.
///
/// ```text
/// [accept] ---> [load payload] ---> [send frame k] ---> [pace] --+
///    ^                                   ^                       |
///    |                                   +-----------------------+
///    +--- peer gone / write error / stop
/// ```
///
/// One connection is served at a time. The accept loop only returns once
/// the stop signal fires.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::error::{Result, StreamError};
use crate::logging::{StreamEvent, StreamLog, StreamLogger, TracingLogger};
use crate::pacing::{PaceAction, Pacer};
use crate::protocol::{CHUNK_SIZE, REPORT_EVERY, is_valid_length};
use crate::socket::tune_stream;
use crate::source::PayloadSource;
use crate::stats::{SessionEnd, SessionStats, SessionSummary};
use crate::stop::StopSignal;
use crate::writer::{FrameWriter, RETRY_DELAY};

/// How often the idle accept loop checks the stop signal.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on the write timeout of accepted sockets.
pub const MAX_WRITE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Write timeout for accepted sockets streaming at `fps`. A stalled peer
/// surfaces as would-block after this long, which lets the writer check the
/// stop signal well within one frame interval.
pub fn write_poll_interval(fps: u32) -> Duration {
    let half_interval = Duration::from_secs(1) / fps.max(1) / 2;
    half_interval.clamp(Duration::from_millis(1), MAX_WRITE_POLL_INTERVAL)
}

/// Configuration for the sender.
#[derive(Clone)]
pub struct SenderConfig {
    pub fps: u32,
    pub chunk_size: usize,
    pub retry_delay: Duration,
    /// `None` keeps retrying a blocked write until the stop signal fires.
    pub backpressure_timeout: Option<Duration>,
    pub report_every: u64,
    pub logger: Arc<dyn StreamLogger>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            chunk_size: CHUNK_SIZE,
            retry_delay: RETRY_DELAY,
            backpressure_timeout: None,
            report_every: REPORT_EVERY,
            logger: Arc::new(TracingLogger),
        }
    }
}

/// Stream `payload` over `stream` at `config.fps` until the write fails or
/// `stop` fires. The stream is dropped, and so closed, on return.
///
/// Ends with `Ok` only when stopped; a peer going away shows up as the
/// write error that detected it.
pub fn run_sender_session<W: Write>(
    stream: W,
    peer: &str,
    payload: &Bytes,
    config: &SenderConfig,
    stop: &StopSignal,
) -> Result<SessionSummary> {
    if !is_valid_length(payload.len()) {
        return Err(StreamError::PayloadSize(payload.len()));
    }

    let log = |event: StreamEvent| {
        config.logger.log(StreamLog {
            component: "sender",
            peer: peer.to_string(),
            event,
        })
    };

    let mut writer = FrameWriter::new(stream, stop.clone())
        .with_chunk_size(config.chunk_size)
        .with_retry_delay(config.retry_delay)
        .with_backpressure_timeout(config.backpressure_timeout);
    let mut stats = SessionStats::new();
    let report_every = config.report_every.max(1);

    log(StreamEvent::SessionStarted {
        payload_len: Some(payload.len()),
    });

    let mut pacer = Pacer::new(config.fps, Instant::now());
    let outcome = loop {
        if stop.is_stopped() {
            break Ok(SessionEnd::Stopped);
        }

        match writer.send_frame(pacer.sequence(), payload) {
            Ok(()) => {}
            Err(StreamError::Stopped) => break Ok(SessionEnd::Stopped),
            Err(e) => break Err(e),
        }

        let sent_at = Instant::now();
        stats.record_frame(payload.len(), sent_at);
        if stats.frames() % report_every == 0 {
            log(StreamEvent::Progress {
                frames: stats.frames(),
                fps: stats.fps(sent_at),
                frame_len: stats.last_frame_len(),
            });
        }

        match pacer.on_frame_sent(Instant::now()) {
            PaceAction::Sleep(delay) => {
                if stop.sleep(delay) {
                    break Ok(SessionEnd::Stopped);
                }
            }
            PaceAction::Proceed => {}
            PaceAction::Reset { behind } => {
                stats.record_pacing_reset();
                log(StreamEvent::PacingReset {
                    behind_ms: behind.as_millis() as u64,
                });
            }
        }
    };

    let summary = stats.summary(SessionEnd::Stopped, Instant::now());
    let reason = match &outcome {
        Ok(_) => "stopped".to_string(),
        Err(e) => e.to_string(),
    };
    log(StreamEvent::SessionClosed {
        frames: summary.frames,
        bytes: summary.bytes,
        duration_ms: summary.elapsed.as_millis() as u64,
        reason,
    });

    outcome.map(|end| SessionSummary { end, ..summary })
}

/// Accept connections one at a time and stream the payload to each.
/// Returns the number of connections served once `stop` fires.
pub fn serve(
    listener: TcpListener,
    source: &dyn PayloadSource,
    config: &SenderConfig,
    stop: &StopSignal,
) -> io::Result<u64> {
    listener.set_nonblocking(true)?;
    let mut served = 0u64;

    while !stop.is_stopped() {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!("Client connected: {}", addr);
                served += 1;
                handle_client(stream, addr, source, config, stop);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                stop.sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                error!("Accept error: {}", e);
                stop.sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }

    info!("Accept loop stopped after {} connection(s)", served);
    Ok(served)
}

fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    source: &dyn PayloadSource,
    config: &SenderConfig,
    stop: &StopSignal,
) {
    // Accepted sockets may inherit non-blocking mode from the listener.
    let setup = stream
        .set_nonblocking(false)
        .and_then(|_| stream.set_write_timeout(Some(write_poll_interval(config.fps))))
        .and_then(|_| tune_stream(&stream));
    if let Err(e) = setup {
        warn!("Socket setup failed for {}: {}", addr, e);
        return;
    }

    let payload = match source.load() {
        Ok(p) if is_valid_length(p.len()) => p,
        Ok(p) => {
            warn!("Payload size {} out of range, closing {}", p.len(), addr);
            return;
        }
        Err(e) => {
            warn!("Cannot load payload for {}: {}", addr, e);
            return;
        }
    };
    info!("Streaming {} byte payload at {} fps to {}", payload.len(), config.fps, addr);

    match run_sender_session(stream, &addr.to_string(), &payload, config, stop) {
        Ok(summary) => info!(
            "Session with {} ended: {} frames in {:.1}s",
            addr,
            summary.frames,
            summary.elapsed.as_secs_f64()
        ),
        Err(e) if e.is_transport() => info!("Client {} disconnected: {}", addr, e),
        Err(e) => warn!("Session with {} failed: {}", addr, e),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::logging::NullLogger;
    use crate::reader::FrameReader;

    /// Accepts `budget` bytes, then fails like a closed socket.
    struct Budget {
        out: Vec<u8>,
        budget: usize,
    }

    impl Write for Budget {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn quiet(fps: u32) -> SenderConfig {
        SenderConfig {
            fps,
            logger: Arc::new(NullLogger),
            ..Default::default()
        }
    }

    #[test]
    fn sequences_start_at_zero_and_increment() {
        let payload = Bytes::from_static(b"0123456789");
        let frame_bytes = 8 + payload.len();
        let mut out = Budget {
            out: Vec::new(),
            budget: frame_bytes * 6,
        };

        let err = run_sender_session(&mut out, "test", &payload, &quiet(1000), &StopSignal::new())
            .unwrap_err();
        assert!(err.is_transport());

        let mut reader = FrameReader::new(Cursor::new(out.out), StopSignal::new());
        let mut seqs = Vec::new();
        while let Some(frame) = reader.receive_frame().unwrap() {
            assert_eq!(frame.payload, payload);
            seqs.push(frame.sequence);
        }
        assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn stop_ends_session_between_frames() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            remote.stop();
        });

        let start = Instant::now();
        let payload = Bytes::from_static(b"x");
        let summary =
            run_sender_session(Vec::<u8>::new(), "test", &payload, &quiet(2), &stop).unwrap();
        handle.join().unwrap();

        assert_eq!(summary.end, SessionEnd::Stopped);
        assert!(summary.frames >= 1);
        // 2 fps means a 500ms interval; stop must cut the sleep short.
        assert!(start.elapsed() < Duration::from_millis(450));
    }

    /// Stalls once before the frame at `stall_at`, then trips `stop` once
    /// `frames` whole frames went out.
    struct Stall {
        out: Vec<u8>,
        frame_len: usize,
        stall_at: usize,
        stalled: bool,
        frames: usize,
        stop: StopSignal,
    }

    impl Write for Stall {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.stalled && self.out.len() == self.stall_at * self.frame_len {
                self.stalled = true;
                std::thread::sleep(Duration::from_millis(400));
            }
            self.out.extend_from_slice(buf);
            if self.out.len() >= self.frames * self.frame_len {
                self.stop.stop();
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn falling_behind_restarts_sequence() {
        let payload = Bytes::from_static(b"frame");
        let stop = StopSignal::new();
        let mut out = Stall {
            out: Vec::new(),
            frame_len: 8 + payload.len(),
            stall_at: 2,
            stalled: false,
            frames: 6,
            stop: stop.clone(),
        };

        // 20 fps: the 400ms stall leaves the sender several intervals late.
        let summary = run_sender_session(&mut out, "test", &payload, &quiet(20), &stop).unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.pacing_resets, 1);

        let mut reader = FrameReader::new(Cursor::new(out.out), StopSignal::new());
        let mut seqs = Vec::new();
        while let Some(frame) = reader.receive_frame().unwrap() {
            seqs.push(frame.sequence);
        }
        assert_eq!(seqs, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn write_poll_stays_under_half_a_frame() {
        assert_eq!(write_poll_interval(15), Duration::from_secs(1) / 30);
        assert_eq!(write_poll_interval(1), MAX_WRITE_POLL_INTERVAL);
        assert_eq!(write_poll_interval(0), MAX_WRITE_POLL_INTERVAL);
        assert_eq!(write_poll_interval(100), Duration::from_millis(5));
        assert_eq!(write_poll_interval(5000), Duration::from_millis(1));
    }

    #[test]
    fn rejects_empty_payload() {
        let stop = StopSignal::new();
        let result = run_sender_session(Vec::<u8>::new(), "test", &Bytes::new(), &quiet(15), &stop);
        assert!(matches!(result, Err(StreamError::PayloadSize(0))));
    }
}
