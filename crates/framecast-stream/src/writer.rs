/// Frame writer: serializes frames onto a byte stream.
///
/// The header goes out first, then the payload in chunks of at most
/// `chunk_size` bytes. A would-block from the socket is absorbed by
/// sleeping `retry_delay` and trying again; by default there is no bound
/// on how long that can go on, only the stop signal ends it.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Result, StreamError};
use crate::protocol::{CHUNK_SIZE, encode_header, is_valid_length};
use crate::stop::StopSignal;

/// Delay between retries when the socket reports would-block.
pub const RETRY_DELAY: Duration = Duration::from_millis(1);

pub struct FrameWriter<W> {
    inner: W,
    chunk_size: usize,
    retry_delay: Duration,
    backpressure_timeout: Option<Duration>,
    stop: StopSignal,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W, stop: StopSignal) -> Self {
        Self {
            inner,
            chunk_size: CHUNK_SIZE,
            retry_delay: RETRY_DELAY,
            backpressure_timeout: None,
            stop,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Give up with [`StreamError::BackpressureTimeout`] once the peer has
    /// accepted nothing for this long. `None` retries forever.
    pub fn with_backpressure_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.backpressure_timeout = timeout;
        self
    }

    /// Write one frame. Any error leaves the stream mid-frame, so the
    /// caller must stop using the connection.
    pub fn send_frame(&mut self, sequence: u32, payload: &[u8]) -> Result<()> {
        if !is_valid_length(payload.len()) {
            return Err(StreamError::PayloadSize(payload.len()));
        }

        let header = encode_header(sequence, payload.len() as u32);
        self.write_retrying(&header)?;

        for chunk in payload.chunks(self.chunk_size) {
            self.write_retrying(chunk)?;
        }

        self.inner.flush()?;
        trace!(sequence, len = payload.len(), "frame written");
        Ok(())
    }

    fn write_retrying(&mut self, mut buf: &[u8]) -> Result<()> {
        let mut blocked_since: Option<Instant> = None;

        while !buf.is_empty() {
            match self.inner.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection accepted no more bytes",
                    )
                    .into());
                }
                Ok(n) => {
                    buf = &buf[n..];
                    blocked_since = None;
                    // Socket writes with a timeout may return short.
                    if !buf.is_empty() && self.stop.is_stopped() {
                        return Err(StreamError::Stopped);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let since = *blocked_since.get_or_insert_with(Instant::now);
                    if let Some(limit) = self.backpressure_timeout {
                        if since.elapsed() >= limit {
                            return Err(StreamError::BackpressureTimeout(limit));
                        }
                    }
                    if self.stop.sleep(self.retry_delay) {
                        return Err(StreamError::Stopped);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::protocol::{HEADER_SIZE, MAX_PAYLOAD, decode_header};

    enum Step {
        Accept(usize),
        Block,
        Fail(io::ErrorKind),
    }

    /// Writer that follows a script of per-call outcomes, then accepts everything.
    #[derive(Default)]
    struct ScriptedWriter {
        script: VecDeque<Step>,
        written: Vec<u8>,
        calls: Vec<usize>,
    }

    impl ScriptedWriter {
        fn with_script(steps: Vec<Step>) -> Self {
            Self {
                script: steps.into(),
                ..Default::default()
            }
        }
    }

    impl Write for ScriptedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = match self.script.pop_front() {
                Some(Step::Accept(max)) => max.min(buf.len()),
                Some(Step::Block) => return Err(io::ErrorKind::WouldBlock.into()),
                Some(Step::Fail(kind)) => return Err(kind.into()),
                None => buf.len(),
            };
            self.written.extend_from_slice(&buf[..n]);
            self.calls.push(n);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_header_then_payload() {
        let mut writer = FrameWriter::new(Vec::<u8>::new(), StopSignal::new());
        writer.send_frame(3, b"hello").unwrap();
        let out = writer.into_inner();

        let header: [u8; HEADER_SIZE] = out[..HEADER_SIZE].try_into().unwrap();
        let hdr = decode_header(&header);
        assert_eq!(hdr.sequence, 3);
        assert_eq!(hdr.length, 5);
        assert_eq!(&out[HEADER_SIZE..], b"hello");
    }

    #[test]
    fn payload_is_chunked() {
        let payload = vec![0xAB; 10];
        let mut writer =
            FrameWriter::new(ScriptedWriter::default(), StopSignal::new()).with_chunk_size(4);
        writer.send_frame(0, &payload).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.calls, vec![HEADER_SIZE, 4, 4, 2]);
        assert_eq!(&inner.written[HEADER_SIZE..], &payload[..]);
    }

    #[test]
    fn short_writes_are_completed() {
        let script = vec![Step::Accept(3), Step::Accept(5), Step::Accept(1)];
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), StopSignal::new());
        writer.send_frame(9, b"abcdef").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.written.len(), HEADER_SIZE + 6);
        assert_eq!(&inner.written[HEADER_SIZE..], b"abcdef");
    }

    #[test]
    fn would_block_is_retried() {
        let script = vec![Step::Block, Step::Block, Step::Accept(8), Step::Block];
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), StopSignal::new());
        writer.send_frame(1, b"xyz").unwrap();
        assert_eq!(&writer.get_ref().written[HEADER_SIZE..], b"xyz");
    }

    #[test]
    fn hard_failure_is_reported() {
        let script = vec![Step::Accept(8), Step::Fail(io::ErrorKind::BrokenPipe)];
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), StopSignal::new());
        let err = writer.send_frame(1, b"xyz").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn zero_write_is_reported() {
        let script = vec![Step::Accept(0)];
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), StopSignal::new());
        match writer.send_frame(1, b"xyz") {
            Err(StreamError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::WriteZero),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_out_of_range_payloads() {
        let mut writer = FrameWriter::new(ScriptedWriter::default(), StopSignal::new());
        assert!(matches!(writer.send_frame(0, &[]), Err(StreamError::PayloadSize(0))));

        let big = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            writer.send_frame(0, &big),
            Err(StreamError::PayloadSize(n)) if n == MAX_PAYLOAD + 1
        ));
        assert!(writer.get_ref().written.is_empty());
    }

    #[test]
    fn backpressure_bound() {
        let script = (0..10_000).map(|_| Step::Block).collect();
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), StopSignal::new())
            .with_backpressure_timeout(Some(Duration::from_millis(20)));
        assert!(matches!(
            writer.send_frame(0, b"data"),
            Err(StreamError::BackpressureTimeout(_))
        ));
    }

    #[test]
    fn stop_ends_blocked_write() {
        let stop = StopSignal::new();
        stop.stop();
        let script = vec![Step::Block];
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), stop);
        assert!(matches!(writer.send_frame(0, b"data"), Err(StreamError::Stopped)));
    }

    #[test]
    fn stop_ends_slowly_drained_write() {
        let stop = StopSignal::new();
        stop.stop();
        let script = vec![Step::Accept(3)];
        let mut writer = FrameWriter::new(ScriptedWriter::with_script(script), stop);
        assert!(matches!(writer.send_frame(0, b"data"), Err(StreamError::Stopped)));
        assert_eq!(writer.get_ref().written.len(), 3);
    }
}
