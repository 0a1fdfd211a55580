//! SASL security layer transport.
//!
//! After a mechanism negotiates integrity or confidentiality protection,
//! every byte in both directions travels inside frames of a 4-byte
//! big-endian length followed by the wrapped payload (RFC 4422 section 3.7).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes, BytesMut};
use tessera_sasl::SaslClient;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Largest plaintext chunk wrapped into one frame.
const MAX_CHUNK: usize = 64 * 1024;

/// Largest frame accepted from the server.
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 8192;

/// A stream that wraps writes and unwraps reads with a SASL mechanism.
pub struct SaslStream<S> {
    inner: S,
    client: Box<dyn SaslClient>,
    incoming: BytesMut,
    plain: Bytes,
    outgoing: Vec<u8>,
    outgoing_pos: usize,
}

fn invalid_data(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

impl<S> SaslStream<S> {
    /// Layers the security layer negotiated by `client` over `inner`.
    pub fn new(inner: S, client: Box<dyn SaslClient>) -> Self {
        Self {
            inner,
            client,
            incoming: BytesMut::new(),
            plain: Bytes::new(),
            outgoing: Vec::new(),
            outgoing_pos: 0,
        }
    }

    /// The mechanism providing the layer.
    pub fn mechanism(&self) -> &'static str {
        self.client.mechanism()
    }

    fn take_frame(&mut self) -> io::Result<Option<BytesMut>> {
        let Some(header) = self.incoming.get(..4) else {
            return Ok(None);
        };
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(invalid_data(format!(
                "SASL frame of {len} bytes exceeds {MAX_FRAME_SIZE}"
            )));
        }
        if self.incoming.len() < 4 + len {
            return Ok(None);
        }
        self.incoming.advance(4);
        Ok(Some(self.incoming.split_to(len)))
    }
}

impl<S: AsyncWrite + Unpin> SaslStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.outgoing_pos < self.outgoing.len() {
            let n = ready!(
                Pin::new(&mut self.inner).poll_write(cx, &self.outgoing[self.outgoing_pos..])
            )?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.outgoing_pos += n;
        }
        self.outgoing.clear();
        self.outgoing_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for SaslStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.plain.is_empty() {
                let n = this.plain.len().min(buf.remaining());
                buf.put_slice(&this.plain.split_to(n));
                return Poll::Ready(Ok(()));
            }

            if let Some(frame) = this.take_frame()? {
                let plain = this.client.unwrap(&frame).map_err(invalid_data)?;
                this.plain = Bytes::from(plain);
                continue;
            }

            let mut chunk = [0u8; READ_CHUNK];
            let mut read = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read))?;
            if read.filled().is_empty() {
                if this.incoming.is_empty() {
                    return Poll::Ready(Ok(()));
                }
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside a SASL frame",
                )));
            }
            this.incoming.extend_from_slice(read.filled());
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for SaslStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let n = buf.len().min(MAX_CHUNK);
        let wrapped = this.client.wrap(&buf[..n]).map_err(invalid_data)?;
        let len = u32::try_from(wrapped.len()).map_err(invalid_data)?;
        this.outgoing.extend_from_slice(&len.to_be_bytes());
        this.outgoing.extend_from_slice(&wrapped);

        // The chunk is accepted once staged; a failed drain surfaces on the
        // next write or flush.
        let _ = this.poll_drain(cx)?;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
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
    use tessera_sasl::Qop;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::io::Builder;

    /// Integrity layer that XORs every byte with a fixed key.
    struct XorLayer;

    impl SaslClient for XorLayer {
        fn mechanism(&self) -> &'static str {
            "X-XOR"
        }
        fn has_initial_response(&self) -> bool {
            false
        }
        fn evaluate_challenge(&mut self, _challenge: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn is_complete(&self) -> bool {
            true
        }
        fn qop(&self) -> Qop {
            Qop::AuthInt
        }
        fn wrap(&mut self, data: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
            Ok(data.iter().map(|b| b ^ 0x5A).collect())
        }
        fn unwrap(&mut self, data: &[u8]) -> tessera_sasl::Result<Vec<u8>> {
            Ok(data.iter().map(|b| b ^ 0x5A).collect())
        }
    }

    fn framed(plain: &[u8]) -> Vec<u8> {
        let mut out = u32::try_from(plain.len()).unwrap().to_be_bytes().to_vec();
        out.extend(plain.iter().map(|b| b ^ 0x5A));
        out
    }

    #[tokio::test]
    async fn test_write_wraps_in_length_prefixed_frame() {
        let mock = Builder::new().write(&framed(b"A0002 NOOP\r\n")).build();
        let mut stream = SaslStream::new(mock, Box::new(XorLayer));

        stream.write_all(b"A0002 NOOP\r\n").await.unwrap();
        stream.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_unwraps_frames_split_across_reads() {
        let wire = [framed(b"* OK one\r\n"), framed(b"A0002 OK done\r\n")].concat();
        let (head, tail) = wire.split_at(6);
        let mock = Builder::new().read(head).read(tail).build();
        let mut stream = SaslStream::new(mock, Box::new(XorLayer));

        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "* OK one\r\nA0002 OK done\r\n");
    }

    #[tokio::test]
    async fn test_eof_inside_frame_is_an_error() {
        let wire = framed(b"* OK partial\r\n");
        let mock = Builder::new().read(&wire[..8]).build();
        let mut stream = SaslStream::new(mock, Box::new(XorLayer));

        let mut out = Vec::new();
        let err = stream.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mock = Builder::new().read(&[0xFF, 0xFF, 0xFF, 0xFF]).build();
        let mut stream = SaslStream::new(mock, Box::new(XorLayer));

        let mut buf = [0u8; 16];
        let err = stream.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
