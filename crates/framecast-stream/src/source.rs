/// Payload sources: where the sender gets the bytes it repeats every frame.
///
/// The accept loop loads the payload once per connection, so a file that
/// changes on disk is picked up by the next client.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;

pub trait PayloadSource: Send + Sync {
    fn load(&self) -> io::Result<Bytes>;
}

/// Reads the whole file at the start of each session.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PayloadSource for FileSource {
    fn load(&self) -> io::Result<Bytes> {
        std::fs::read(&self.path).map(Bytes::from)
    }
}

/// Fixed in-memory payload.
impl PayloadSource for Bytes {
    fn load(&self) -> io::Result<Bytes> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_source_reads_each_time() {
        let path = std::env::temp_dir()
            .join(format!("framecast_source_{}.jpg", std::process::id()));
        std::fs::write(&path, b"one").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(&source.load().unwrap()[..], b"one");

        std::fs::write(&path, b"two!").unwrap();
        assert_eq!(&source.load().unwrap()[..], b"two!");

        let _ = std::fs::remove_file(&path);
        assert!(source.load().is_err());
    }
}
