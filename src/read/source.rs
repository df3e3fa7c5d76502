//! Byte sources an archive can be read from.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A seekable byte source that can be reopened with an independent cursor.
///
/// Reopening must yield a handle over the same bytes; pooled readers rely
/// on this to decompress concurrently without sharing a cursor.
pub trait ArchiveSource: Read + Seek + Send {
    /// Opens a new handle positioned at the start of the source.
    fn reopen(&self) -> io::Result<Self>
    where
        Self: Sized;
}

/// In-memory archive bytes.
pub type MemorySource = Cursor<Arc<[u8]>>;

impl ArchiveSource for MemorySource {
    fn reopen(&self) -> io::Result<Self> {
        Ok(Cursor::new(Arc::clone(self.get_ref())))
    }
}

/// A buffered archive file on disk.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    reader: BufReader<File>,
}

impl FileSource {
    /// Opens `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl ArchiveSource for FileSource {
    fn reopen(&self) -> io::Result<Self> {
        Self::open(&self.path)
    }
}
