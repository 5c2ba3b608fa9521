/// Frame reader: pulls frames off a byte stream and validates them.
///
/// The header length is checked before any payload buffer exists, so a
/// corrupt or hostile header can never trigger an oversized allocation.
/// Read timeouts on the socket are retried; between frames they also give
/// the reader a chance to notice the stop signal.

use std::io::{self, Read};

use bytes::Bytes;
use tracing::trace;

use crate::error::{Result, StreamError};
use crate::protocol::{Frame, HEADER_SIZE, decode_header};
use crate::stop::StopSignal;

pub struct FrameReader<R> {
    inner: R,
    stop: StopSignal,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, stop: StopSignal) -> Self {
        Self { inner, stop }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed cleanly on a frame boundary.
    /// A close anywhere inside a frame is [`StreamError::Truncated`] and
    /// the partial frame is dropped.
    pub fn receive_frame(&mut self) -> Result<Option<Frame>> {
        let mut header = [0u8; HEADER_SIZE];
        let got = self.fill(&mut header, true)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_SIZE {
            return Err(StreamError::Truncated {
                expected: HEADER_SIZE,
                received: got,
            });
        }

        let hdr = decode_header(&header);
        if !hdr.has_valid_length() {
            return Err(StreamError::InvalidLength {
                sequence: hdr.sequence,
                length: hdr.length,
            });
        }

        let len = hdr.length as usize;
        let mut payload = vec![0u8; len];
        let got = self.fill(&mut payload, false)?;
        if got < len {
            return Err(StreamError::Truncated {
                expected: len,
                received: got,
            });
        }

        trace!(sequence = hdr.sequence, len, "frame read");
        Ok(Some(Frame {
            sequence: hdr.sequence,
            payload: Bytes::from(payload),
        }))
    }

    /// Read until `buf` is full or the peer closes. Returns the byte count.
    fn fill(&mut self, buf: &mut [u8], at_boundary: bool) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    if at_boundary && filled == 0 && self.stop.is_stopped() {
                        return Err(StreamError::Stopped);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
