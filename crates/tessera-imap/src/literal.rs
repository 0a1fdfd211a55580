//! Literal payload storage.
//!
//! Literals at or below the configured threshold are buffered in memory.
//! Larger ones are streamed into a sink obtained from a [`LiteralFactory`],
//! so a multi-megabyte message body never has to sit in a single buffer.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

/// Default size above which literals are routed to the factory.
pub const DEFAULT_LITERAL_THRESHOLD: usize = 4096;

/// Default upper bound on an announced literal size (1 GiB).
pub const DEFAULT_MAX_LITERAL_SIZE: usize = 1 << 30;

/// Buffers never reserve more than this up front; the size comes from the server.
pub(crate) const MAX_PREALLOCATION: usize = 64 * 1024;

/// A literal payload received from the server.
#[derive(Clone)]
pub enum Literal {
    /// Payload held in memory.
    Memory(Bytes),
    /// Payload held by external storage.
    Stored(Arc<dyn StoredLiteral>),
}

impl Literal {
    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Memory(bytes) => bytes.len(),
            Self::Stored(stored) => stored.len(),
        }
    }

    /// Returns true for a zero-length literal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the payload if it is held in memory.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Memory(bytes) => Some(bytes),
            Self::Stored(_) => None,
        }
    }

    /// Opens a reader over the payload.
    pub fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Memory(bytes) => Ok(Box::new(io::Cursor::new(bytes.clone()))),
            Self::Stored(stored) => stored.open(),
        }
    }

    /// Reads the whole payload into memory.
    pub fn to_bytes(&self) -> io::Result<Bytes> {
        match self {
            Self::Memory(bytes) => Ok(bytes.clone()),
            Self::Stored(stored) => {
                let mut buf = Vec::with_capacity(stored.len());
                stored.open()?.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Reads the payload as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> io::Result<String> {
        Ok(String::from_utf8_lossy(&self.to_bytes()?).into_owned())
    }
}

impl From<Bytes> for Literal {
    fn from(bytes: Bytes) -> Self {
        Self::Memory(bytes)
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(bytes) if bytes.len() <= 64 => {
                f.debug_tuple("Memory").field(bytes).finish()
            }
            Self::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            Self::Stored(stored) => write!(f, "Stored({stored:?})"),
        }
    }
}

// Stored literals compare by identity; reading them back could fail.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Memory(a), Self::Memory(b)) => a == b,
            (Self::Stored(a), Self::Stored(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Creates sinks for literals larger than the threshold.
pub trait LiteralFactory: Send + Sync {
    /// Allocates storage for a literal of exactly `size` bytes.
    fn create(&self, size: usize) -> io::Result<Box<dyn LiteralSink>>;
}

/// Receives literal bytes as they arrive from the network.
pub trait LiteralSink: Write + Send {
    /// Completes the literal once all bytes were written.
    fn finish(self: Box<Self>) -> io::Result<Literal>;
}

/// Externally stored literal payload.
pub trait StoredLiteral: fmt::Debug + Send + Sync {
    /// Payload length in bytes.
    fn len(&self) -> usize;

    /// Returns true for a zero-length payload.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a fresh reader positioned at the start of the payload.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Default factory: buffers every literal in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryLiteralFactory;

impl LiteralFactory for MemoryLiteralFactory {
    fn create(&self, size: usize) -> io::Result<Box<dyn LiteralSink>> {
        let capacity = size.min(MAX_PREALLOCATION);
        Ok(Box::new(MemorySink(BytesMut::with_capacity(capacity).writer())))
    }
}

struct MemorySink(bytes::buf::Writer<BytesMut>);

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LiteralSink for MemorySink {
    fn finish(self: Box<Self>) -> io::Result<Literal> {
        Ok(Literal::Memory(self.0.into_inner().freeze()))
    }
}

/// Spools large literals to files in a directory.
///
/// Each file is deleted when the last [`Literal`] handle referring to it is dropped.
#[derive(Debug)]
pub struct FileLiteralFactory {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileLiteralFactory {
    /// Creates a factory writing into `dir`, which must exist.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl LiteralFactory for FileLiteralFactory {
    fn create(&self, size: usize) -> io::Result<Box<dyn LiteralSink>> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self
            .dir
            .join(format!("literal-{}-{n}.tmp", std::process::id()));
        let file = File::create(&path)?;
        tracing::trace!(path = %path.display(), size, "spooling literal to file");
        Ok(Box::new(FileSink {
            writer: BufWriter::new(file),
            path,
            written: 0,
            finished: false,
        }))
    }
}

struct FileSink {
    writer: BufWriter<File>,
    path: PathBuf,
    written: usize,
    // Set once the file is owned by a `FileLiteral`.
    finished: bool,
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl LiteralSink for FileSink {
    fn finish(mut self: Box<Self>) -> io::Result<Literal> {
        self.writer.flush()?;
        self.finished = true;
        Ok(Literal::Stored(Arc::new(FileLiteral {
            path: self.path.clone(),
            len: self.written,
        })))
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), %err, "failed to remove partial spool file");
        }
    }
}

/// A literal stored in a spool file.
#[derive(Debug)]
pub struct FileLiteral {
    path: PathBuf,
    len: usize,
}

impl FileLiteral {
    /// Location of the spool file.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl StoredLiteral for FileLiteral {
    fn len(&self) -> usize {
        self.len
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

impl Drop for FileLiteral {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), %err, "failed to remove spool file");
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_factory() {
        let mut sink = MemoryLiteralFactory.create(5).unwrap();
        sink.write_all(b"hel").unwrap();
        sink.write_all(b"lo").unwrap();
        let literal = sink.finish().unwrap();
        assert_eq!(literal.len(), 5);
        assert_eq!(literal.as_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_file_factory_roundtrip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileLiteralFactory::new(dir.path());
        let mut sink = factory.create(11).unwrap();
        sink.write_all(b"hello world").unwrap();
        let literal = sink.finish().unwrap();

        assert_eq!(literal.len(), 11);
        assert!(literal.as_bytes().is_none());
        assert_eq!(literal.to_string_lossy().unwrap(), "hello world");

        let mut again = String::new();
        literal.reader().unwrap().read_to_string(&mut again).unwrap();
        assert_eq!(again, "hello world");

        let path = match &literal {
            Literal::Stored(_) => std::fs::read_dir(dir.path())
                .unwrap()
                .next()
                .unwrap()
                .unwrap()
                .path(),
            Literal::Memory(_) => panic!("expected stored literal"),
        };
        assert!(path.exists());
        drop(literal);
        assert!(!path.exists());
    }

    #[test]
    fn test_memory_factory_bounds_preallocation() {
        let mut sink = MemoryLiteralFactory.create(usize::MAX).unwrap();
        sink.write_all(b"tiny").unwrap();
        assert_eq!(sink.finish().unwrap().as_bytes().unwrap(), b"tiny");
    }

    #[test]
    fn test_abandoned_file_sink_removes_spool_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileLiteralFactory::new(dir.path());
        let mut sink = factory.create(64).unwrap();
        sink.write_all(b"partial").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        drop(sink);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_literal_equality() {
        let a = Literal::from(Bytes::from_static(b"abc"));
        let b = Literal::from(Bytes::from_static(b"abc"));
        assert_eq!(a, b);
        assert_ne!(a, Literal::from(Bytes::from_static(b"abd")));
    }
}
