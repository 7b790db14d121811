//! Incremental tokenizer over an unbounded byte source.
//!
//! The wire protocol mixes `:`-delimited fields with length-prefixed raw
//! payloads, so the reader has two modes: scan-to-delimiter and
//! exact-byte-count. Payload fields may contain the delimiter, which is why
//! they are always preceded by their byte length as a delimited integer.
//! The reader never consumes past the end of the field it was asked for --
//! the mode of the next field depends on the value of the previous one, so
//! built-in line buffering would corrupt the stream.
//!
//! Data arrives in arbitrarily sized chunks at arbitrary times. Every read
//! operation suspends without consuming a partial result until enough bytes
//! are buffered, and completes immediately when they already are.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::{Result, ServerError};

/// Field separator used by the wire protocol.
pub const DELIMITER: u8 = b':';

/// Buffered incremental reader over any async byte source.
pub struct FrameReader<R> {
    source: R,
    buf: BytesMut,
    delimiter: u8,
    closed: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_delimiter(source, DELIMITER)
    }

    pub fn with_delimiter(source: R, delimiter: u8) -> Self {
        Self {
            source,
            buf: BytesMut::with_capacity(4096),
            delimiter,
            closed: false,
        }
    }

    /// Pull one chunk from the source into the buffer. Returns the number of
    /// bytes read; zero means the source is permanently closed.
    async fn fill(&mut self) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let n = self.source.read_buf(&mut self.buf).await?;
        if n == 0 {
            self.closed = true;
        }
        Ok(n)
    }

    /// Suspends until at least one byte is buffered or the source is closed.
    ///
    /// Returns `false` exactly when the source is closed with no buffered
    /// data left; that state is terminal, so every later call also returns
    /// `false`.
    pub async fn await_readable(&mut self) -> Result<bool> {
        while self.buf.is_empty() {
            if self.fill().await? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Consumes bytes up to (not including) the next delimiter, which is
    /// discarded. The source closing mid-field is a protocol error.
    pub async fn read_delimited(&mut self) -> Result<String> {
        let raw = self.read_until_delimiter().await?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| ServerError::Protocol("delimited field is not valid UTF-8".to_string()))
    }

    async fn read_until_delimiter(&mut self) -> Result<Bytes> {
        // Remember how far we already scanned so refills don't rescan.
        let mut searched = 0;
        loop {
            if let Some(pos) = self.buf[searched..].iter().position(|&b| b == self.delimiter) {
                let field = self.buf.split_to(searched + pos).freeze();
                self.buf.advance(1);
                return Ok(field);
            }
            searched = self.buf.len();
            if self.fill().await? == 0 {
                return Err(ServerError::Protocol(
                    "stream closed inside a delimited field".to_string(),
                ));
            }
        }
    }

    /// Reads a delimited field and parses it as a base-10 integer.
    pub async fn read_delimited_int(&mut self) -> Result<i64> {
        let field = self.read_delimited().await?;
        field
            .parse()
            .map_err(|_| ServerError::Protocol(format!("expected integer field, got {field:?}")))
    }

    /// Reads a delimited field and parses it as a decimal number.
    pub async fn read_delimited_float(&mut self) -> Result<f64> {
        let field = self.read_delimited().await?;
        field
            .parse()
            .map_err(|_| ServerError::Protocol(format!("expected float field, got {field:?}")))
    }

    /// Consumes exactly `n` raw bytes regardless of content; the delimiter
    /// has no special meaning here.
    pub async fn read_fixed(&mut self, n: usize) -> Result<Bytes> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(ServerError::Protocol(format!(
                    "stream closed inside a fixed-length field ({} of {n} bytes)",
                    self.buf.len()
                )));
            }
        }
        Ok(self.buf.split_to(n).freeze())
    }

    /// Like [`read_fixed`](Self::read_fixed), decoded as UTF-8.
    pub async fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        let raw = self.read_fixed(n).await?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| ServerError::Protocol("fixed-length field is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn delimited_fields_across_chunk_boundaries() {
        // One logical message split at awkward points.
        let source = Builder::new()
            .read(b"eq1")
            .read(b":req")
            .read(b"uest:")
            .read(b"42:")
            .build();
        let mut reader = FrameReader::new(source);

        assert!(reader.await_readable().await.unwrap());
        assert_eq!(reader.read_delimited().await.unwrap(), "eq1");
        assert_eq!(reader.read_delimited().await.unwrap(), "request");
        assert_eq!(reader.read_delimited_int().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn fixed_reads_are_delimiter_transparent() {
        let source = Builder::new().read(b"5:a:b:c").build();
        let mut reader = FrameReader::new(source);

        let len = reader.read_delimited_int().await.unwrap() as usize;
        assert_eq!(reader.read_fixed_string(len).await.unwrap(), "a:b:c");
    }

    #[tokio::test]
    async fn fixed_read_suspends_until_all_bytes_arrive() {
        let source = Builder::new().read(b"ab").read(b"cd").read(b"ef:next:").build();
        let mut reader = FrameReader::new(source);

        assert_eq!(reader.read_fixed_string(6).await.unwrap(), "abcdef");
        // The reader did not over-read: the following field is intact.
        assert_eq!(reader.read_delimited().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn await_readable_is_terminally_false_at_eof() {
        let source = Builder::new().read(b"x:").build();
        let mut reader = FrameReader::new(source);

        assert!(reader.await_readable().await.unwrap());
        assert_eq!(reader.read_delimited().await.unwrap(), "x");
        assert!(!reader.await_readable().await.unwrap());
        assert!(!reader.await_readable().await.unwrap());
    }

    #[tokio::test]
    async fn closing_mid_field_is_a_protocol_error() {
        let source = Builder::new().read(b"partial").build();
        let mut reader = FrameReader::new(source);

        let err = reader.read_delimited().await.unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[tokio::test]
    async fn closing_inside_a_fixed_field_is_a_protocol_error() {
        let source = Builder::new().read(b"abc").build();
        let mut reader = FrameReader::new(source);

        let err = reader.read_fixed(10).await.unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[tokio::test]
    async fn non_numeric_int_field_is_a_protocol_error() {
        let source = Builder::new().read(b"abc:").build();
        let mut reader = FrameReader::new(source);

        let err = reader.read_delimited_int().await.unwrap_err();
        assert!(matches!(err, ServerError::Protocol(_)));
    }

    #[tokio::test]
    async fn float_fields_parse_decimals() {
        let source = Builder::new().read(b"1.5:0.25:").build();
        let mut reader = FrameReader::new(source);

        assert_eq!(reader.read_delimited_float().await.unwrap(), 1.5);
        assert_eq!(reader.read_delimited_float().await.unwrap(), 0.25);
    }

    #[tokio::test]
    async fn buffered_data_is_returned_without_another_read() {
        // A single chunk carrying several fields: only one source read.
        let source = Builder::new().read(b"a:b:c:").build();
        let mut reader = FrameReader::new(source);

        assert_eq!(reader.read_delimited().await.unwrap(), "a");
        assert_eq!(reader.read_delimited().await.unwrap(), "b");
        assert_eq!(reader.read_delimited().await.unwrap(), "c");
    }
}
