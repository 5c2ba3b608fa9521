/// TCP frame format for the frame stream.
///
/// ```text
/// [0..4]   Sequence number (u32 BE)
/// [4..8]   Payload length in bytes (u32 BE)
/// [8..]    Payload (exactly `length` bytes)
/// ```
///
/// No magic, no version, no checksum. Frames are concatenated back to back
/// and the stream ends when the connection closes.

use bytes::Bytes;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single frame may carry (10 MiB).
pub const MAX_PAYLOAD: usize = 10 * 1024 * 1024;

/// Payload bytes handed to the socket per write call (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Frames between progress reports (10 seconds at 15 fps).
pub const REPORT_EVERY: u64 = 150;

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sequence: u32,
    pub length: u32,
}

impl FrameHeader {
    pub fn new(sequence: u32, length: u32) -> Self {
        Self { sequence, length }
    }

    /// Whether the declared length may be trusted for a buffer allocation.
    pub fn has_valid_length(&self) -> bool {
        is_valid_length(self.length as usize)
    }
}

/// One header-plus-payload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(sequence: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Payload lengths in `1..=MAX_PAYLOAD` are the only ones allowed on the wire.
pub fn is_valid_length(length: usize) -> bool {
    length != 0 && length <= MAX_PAYLOAD
}

/// Encode a frame header into its 8-byte wire form.
pub fn encode_header(sequence: u32, length: u32) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&sequence.to_be_bytes());
    buf[4..8].copy_from_slice(&length.to_be_bytes());
    buf
}

/// Decode a frame header. The length is returned as-is; callers check it
/// with [`FrameHeader::has_valid_length`] before allocating anything.
pub fn decode_header(buf: &[u8; HEADER_SIZE]) -> FrameHeader {
    let sequence = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    FrameHeader { sequence, length }
}
