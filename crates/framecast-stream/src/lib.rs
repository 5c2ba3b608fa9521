/// Framecast: paced frame streaming over a single TCP connection.
///
/// Provides:
/// - A fixed 8-byte big-endian frame header (sequence, length) + opaque payload
/// - A chunked frame writer that absorbs would-block with a short retry delay
/// - A validating frame reader that never trusts an out-of-range length
/// - A sender session paced to a target frame rate, with schedule rebasing
/// - A receiver session with sequence gap detection and pluggable payload sinks
/// - An explicit stop signal checked by every loop at frame boundaries

pub mod error;
pub mod logging;
pub mod pacing;
pub mod protocol;
pub mod reader;
pub mod receiver;
pub mod sender;
pub mod sink;
pub mod socket;
pub mod source;
pub mod stats;
pub mod stop;
pub mod writer;

// Re-export key types for convenience.
pub use error::{Result, StreamError};
pub use logging::{NullLogger, StreamEvent, StreamLog, StreamLogger, TracingLogger};
pub use pacing::{PaceAction, Pacer};
pub use protocol::{
    CHUNK_SIZE, Frame, FrameHeader, HEADER_SIZE, MAX_PAYLOAD, REPORT_EVERY, decode_header,
    encode_header, is_valid_length,
};
pub use reader::FrameReader;
pub use receiver::{Gap, GapDetector, READ_POLL_INTERVAL, ReceiverConfig, run_receiver_session};
pub use sender::{SenderConfig, run_sender_session, serve};
pub use sink::{DirectorySink, NullSink, PayloadSink};
pub use socket::{bind_listener, connect, tune_stream};
pub use source::{FileSource, PayloadSource};
pub use stats::{SessionEnd, SessionStats, SessionSummary};
pub use stop::StopSignal;
pub use writer::FrameWriter;
