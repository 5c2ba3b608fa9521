/// Payload sinks: where the receiver puts each validated frame.
///
/// A sink failure is reported by the session and the session keeps going.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::protocol::Frame;

pub trait PayloadSink: Send {
    fn consume(&mut self, frame: &Frame) -> io::Result<()>;
}

/// Writes every frame to `<dir>/frame_<sequence:06>.<extension>`.
pub struct DirectorySink {
    dir: PathBuf,
    extension: String,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if it does not exist yet.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            extension: "jpg".into(),
        })
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_path(&self, sequence: u32) -> PathBuf {
        self.dir
            .join(format!("frame_{:06}.{}", sequence, self.extension))
    }
}

impl PayloadSink for DirectorySink {
    fn consume(&mut self, frame: &Frame) -> io::Result<()> {
        fs::write(self.frame_path(frame.sequence), &frame.payload)
    }
}

/// Discards every frame.
pub struct NullSink;

impl PayloadSink for NullSink {
    fn consume(&mut self, _frame: &Frame) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps every frame in memory.
impl PayloadSink for Vec<Frame> {
    fn consume(&mut self, frame: &Frame) -> io::Result<()> {
        self.push(frame.clone());
        Ok(())
    }
}
