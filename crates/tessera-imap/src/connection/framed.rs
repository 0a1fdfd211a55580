//! Framed I/O for IMAP protocol.
//!
//! IMAP responses are CRLF-terminated lines that may announce literals with
//! `{n}`. [`FramedStream`] reads one complete response at a time as a
//! [`Frame`], routing large literal payloads to a [`LiteralFactory`] instead
//! of buffering them.

#![allow(clippy::missing_errors_doc)]

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::literal::{
    DEFAULT_LITERAL_THRESHOLD, DEFAULT_MAX_LITERAL_SIZE, Literal, LiteralFactory, LiteralSink,
    MAX_PREALLOCATION, MemoryLiteralFactory,
};
use crate::parser::tokenizer::{Frame, FramePart, trailing_literal};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Framed connection for IMAP protocol.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    literal_threshold: usize,
    max_literal_size: usize,
    factory: Arc<dyn LiteralFactory>,
    io_timeout: Option<Duration>,
}

enum LiteralTarget {
    Memory(BytesMut),
    Sink(Box<dyn LiteralSink>),
}

impl LiteralTarget {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            Self::Memory(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            Self::Sink(sink) => sink.write_all(chunk),
        }
    }

    fn finish(self) -> io::Result<Literal> {
        match self {
            Self::Memory(buf) => Ok(Literal::Memory(buf.freeze())),
            Self::Sink(sink) => sink.finish(),
        }
    }
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a framed stream that keeps every literal in memory.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            literal_threshold: DEFAULT_LITERAL_THRESHOLD,
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
            factory: Arc::new(MemoryLiteralFactory),
            io_timeout: None,
        }
    }

    /// Routes literals larger than `threshold` bytes to `factory`.
    #[must_use]
    pub fn with_literal_policy(mut self, threshold: usize, factory: Arc<dyn LiteralFactory>) -> Self {
        self.literal_threshold = threshold;
        self.factory = factory;
        self
    }

    /// Rejects literals announced larger than `limit` bytes.
    #[must_use]
    pub const fn with_max_literal_size(mut self, limit: usize) -> Self {
        self.max_literal_size = limit;
        self
    }

    /// Bounds the time spent reading one frame.
    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Reads one complete response, including any literals it carries.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_frame_inner())
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.read_frame_inner().await,
        }
    }

    async fn read_frame_inner(&mut self) -> Result<Frame> {
        let mut parts = Vec::new();

        loop {
            let line = self.read_line().await?;
            let announced = trailing_literal(&line);
            parts.push(FramePart::Line(line));

            match announced {
                Some(size) if size > self.max_literal_size => {
                    return Err(Error::Protocol(format!(
                        "literal of {size} bytes exceeds the {} byte limit",
                        self.max_literal_size
                    )));
                }
                Some(size) => {
                    let literal = self.read_literal(size).await?;
                    parts.push(FramePart::Literal(literal));
                }
                None => break,
            }
        }

        Ok(Frame::from_parts(parts))
    }

    /// Reads a single CRLF-terminated line, CRLF included.
    async fn read_line(&mut self) -> Result<Bytes> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = find_crlf(&line, buf) {
                let take = pos + 1;
                line.extend_from_slice(&buf[..take]);
                self.reader.consume(take);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        Ok(Bytes::from(line))
    }

    async fn read_literal(&mut self, size: usize) -> Result<Literal> {
        let mut target = if size > self.literal_threshold {
            tracing::trace!(size, "routing literal to factory");
            LiteralTarget::Sink(self.factory.create(size)?)
        } else {
            LiteralTarget::Memory(BytesMut::with_capacity(size.min(MAX_PREALLOCATION)))
        };

        let mut received = 0;
        while received < size {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Truncated {
                    expected: size,
                    received,
                });
            }
            let take = buf.len().min(size - received);
            target.write(&buf[..take])?;
            self.reader.consume(take);
            received += take;
        }

        Ok(target.finish()?)
    }

    /// Writes bytes and flushes them to the server.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Returns the underlying stream for a transport upgrade.
    ///
    /// Fails if the server sent bytes that were read ahead but not consumed:
    /// anything received before a TLS or SASL layer is installed must not be
    /// interpreted after it.
    pub fn into_inner(self) -> Result<S> {
        let pending = self.reader.buffer().len();
        if pending > 0 {
            return Err(Error::Protocol(format!(
                "{pending} unexpected bytes buffered before transport upgrade"
            )));
        }
        Ok(self.reader.into_inner())
    }
}

/// Finds the LF of a CRLF in `buf`, allowing the CR to end `line`.
fn find_crlf(line: &[u8], buf: &[u8]) -> Option<usize> {
    if line.last() == Some(&b'\r') && buf.first() == Some(&b'\n') {
        return Some(0);
    }
    buf.windows(2).position(|w| w == b"\r\n").map(|p| p + 1)
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
    use crate::literal::FileLiteralFactory;
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"", b"hello\r\n"), Some(6));
        assert_eq!(find_crlf(b"", b"\r\n"), Some(1));
        assert_eq!(find_crlf(b"", b"no newline"), None);
        assert_eq!(find_crlf(b"", b"just\n"), None);
        assert_eq!(find_crlf(b"abc\r", b"\nrest"), Some(0));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        let frame = framed.read_frame().await.unwrap();
        assert_eq!(
            frame.parts(),
            &[FramePart::Line(Bytes::from_static(b"* OK ready\r\n"))]
        );
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"* OK rea")
            .read(b"dy\r")
            .read(b"\n* OK next\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_frame().await.unwrap().summary(), "* OK ready");
        assert_eq!(framed.read_frame().await.unwrap().summary(), "* OK next");
    }

    #[tokio::test]
    async fn test_small_literal_stays_in_memory() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"hel")
            .read(b"lo)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let frame = framed.read_frame().await.unwrap();
        assert_eq!(frame.parts().len(), 3);
        assert_eq!(
            frame.parts()[1],
            FramePart::Literal(Literal::Memory(Bytes::from_static(b"hello")))
        );
        assert_eq!(frame.summary(), "* 1 FETCH (BODY[] {5}<5 bytes>)");
    }

    #[tokio::test]
    async fn test_large_literal_goes_to_factory() {
        let dir = tempfile::tempdir().unwrap();
        let body = vec![b'x'; 64];
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {64}\r\n")
            .read(&body)
            .read(b")\r\n")
            .build();
        let mut framed = FramedStream::new(mock)
            .with_literal_policy(16, Arc::new(FileLiteralFactory::new(dir.path())));

        let frame = framed.read_frame().await.unwrap();
        match &frame.parts()[1] {
            FramePart::Literal(literal @ Literal::Stored(_)) => {
                assert_eq!(literal.len(), 64);
                assert_eq!(literal.to_bytes().unwrap(), body);
            }
            other => panic!("expected stored literal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_literal_at_threshold_stays_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {4}\r\nabcd)\r\n")
            .build();
        let mut framed = FramedStream::new(mock)
            .with_literal_policy(4, Arc::new(FileLiteralFactory::new(dir.path())));

        let frame = framed.read_frame().await.unwrap();
        assert!(matches!(
            frame.parts()[1],
            FramePart::Literal(Literal::Memory(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {10}\r\n")
            .read(b"short")
            .build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 10,
                received: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let result = framed.read_frame().await;
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let mock = Builder::new().wait(Duration::from_secs(5)).build();
        let mut framed = FramedStream::new(mock).with_io_timeout(Duration::from_millis(10));

        let err = framed.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_write_all() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_all(b"A0001 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_into_inner_rejects_buffered_bytes() {
        let mock = Builder::new()
            .read(b"A0001 OK begin TLS\r\n* injected\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        framed.read_frame().await.unwrap();
        assert!(framed.into_inner().is_err());
    }

    #[tokio::test]
    async fn test_braces_in_status_text_are_not_a_literal() {
        let mock = Builder::new()
            .read(b"* OK [ALERT] quota {5}\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_frame().await.unwrap().parts().len(), 1);
        assert_eq!(framed.read_frame().await.unwrap().summary(), "A0001 OK done");
    }

    #[tokio::test]
    async fn test_oversized_literal_rejected_before_allocation() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {18446744073709551615}\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_max_literal_size_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Builder::new().read(b"* 1 FETCH (BODY[] {65}\r\n").build();
        let mut framed = FramedStream::new(mock)
            .with_literal_policy(16, Arc::new(FileLiteralFactory::new(dir.path())))
            .with_max_literal_size(64);

        assert!(matches!(
            framed.read_frame().await.unwrap_err(),
            Error::Protocol(_)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_large_memory_literal_within_limit() {
        let body = vec![b'm'; MAX_PREALLOCATION * 2];
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", body.len());
        let mock = Builder::new()
            .read(header.as_bytes())
            .read(&body)
            .read(b")\r\n")
            .build();
        let mut framed =
            FramedStream::new(mock).with_literal_policy(usize::MAX, Arc::new(MemoryLiteralFactory));

        let frame = framed.read_frame().await.unwrap();
        assert_eq!(
            frame.parts()[1],
            FramePart::Literal(Literal::Memory(Bytes::from(body)))
        );
    }

    #[tokio::test]
    async fn test_truncated_spooled_literal_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {64}\r\n")
            .read(b"short")
            .build();
        let mut framed = FramedStream::new(mock)
            .with_literal_policy(16, Arc::new(FileLiteralFactory::new(dir.path())));

        let err = framed.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 64,
                received: 5
            }
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_literal_keeps_announced_length(
            payload in proptest::collection::vec(any::<u8>(), 0..4096),
            threshold in 0usize..2048,
            split in any::<prop::sample::Index>(),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let at = split.index(payload.len() + 1);
            let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", payload.len());
            let mut script = Builder::new();
            script.read(header.as_bytes());
            if at > 0 {
                script.read(&payload[..at]);
            }
            if at < payload.len() {
                script.read(&payload[at..]);
            }
            script.read(b")\r\n");
            let mut framed = FramedStream::new(script.build())
                .with_literal_policy(threshold, Arc::new(FileLiteralFactory::new(dir.path())));

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let frame = runtime.block_on(framed.read_frame()).unwrap();

            let FramePart::Literal(literal) = &frame.parts()[1] else {
                panic!("expected a literal part");
            };
            prop_assert_eq!(literal.len(), payload.len());
            prop_assert_eq!(matches!(literal, Literal::Stored(_)), payload.len() > threshold);
            prop_assert_eq!(&literal.to_bytes().unwrap()[..], &payload[..]);
        }
    }
}
