use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use tracing::{debug, trace};

use crate::codec::{check_payload_len, FrameConfig, LengthDecoder};
use crate::error::{FrameError, Result};

/// Largest step by which a payload buffer grows while reading.
pub const READ_CHUNK: usize = 64 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// The reader never pulls bytes past the end of the current frame, so the
/// stream is always positioned at a frame boundary between calls.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame payload (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` if the peer closes the
    /// stream anywhere inside the frame, including before its first byte.
    ///
    /// The payload buffer grows as bytes arrive, so a bogus length prefix
    /// cannot reserve more than [`READ_CHUNK`] ahead of the data.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let len = self.read_length()?;
        let len = check_payload_len(len, self.config.max_payload_size).inspect_err(|err| {
            debug!(error = %err, "rejecting frame");
        })?;

        let mut payload = BytesMut::with_capacity(len.min(READ_CHUNK));
        while payload.len() < len {
            let start = payload.len();
            payload.resize(start + (len - start).min(READ_CHUNK), 0);
            self.fill(&mut payload[start..])?;
        }
        trace!(len, "frame read");
        Ok(payload.freeze())
    }

    fn read_length(&mut self) -> Result<u64> {
        let mut decoder = LengthDecoder::new();
        loop {
            let mut byte = [0u8; 1];
            self.fill(&mut byte)?;
            if let Some(len) = decoder.push(byte[0])? {
                return Ok(len);
            }
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, encode_length};

    fn wire(frames: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in frames {
            encode_frame(payload, &mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"", b"three"])));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert!(reader.read_frame().unwrap().is_empty());
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"three");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn consumes_exact_prefix_width() {
        for (len, width) in [(0usize, 1u64), (127, 1), (128, 2), (16383, 2), (16384, 3)] {
            let payload = vec![7u8; len];
            let mut bytes = wire(&[&payload]);
            bytes.extend_from_slice(b"after");

            let mut reader = FrameReader::new(Cursor::new(bytes));
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.len(), len);
            assert_eq!(reader.get_ref().position(), width + len as u64);
        }
    }

    #[test]
    fn byte_by_byte_stream() {
        let payload = vec![0xab; 300];
        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire(&[&payload]),
            pos: 0,
        });
        assert_eq!(reader.read_frame().unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn closed_inside_prefix() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x80, 0x80]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(!err.is_timeout());
    }

    #[test]
    fn closed_inside_payload() {
        let mut bytes = BytesMut::new();
        encode_length(16, &mut bytes);
        bytes.extend_from_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(bytes.to_vec()));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn oversized_frame_is_rejected_before_allocation() {
        let mut bytes = BytesMut::new();
        encode_length(1 << 20, &mut bytes);

        let cfg = FrameConfig {
            max_payload_size: 1024,
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes.to_vec()), cfg);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::PayloadTooLarge { .. }
        ));
    }

    #[test]
    fn huge_announced_length_fails_on_close_without_reserving_it() {
        let mut bytes = BytesMut::new();
        encode_length(1 << 30, &mut bytes);
        bytes.extend_from_slice(&[0u8; 100]);

        let mut reader = FrameReader::new(Cursor::new(bytes.to_vec()));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn payload_spanning_several_chunks() {
        let payload: Vec<u8> = (0..READ_CHUNK * 3 + 17).map(|i| i as u8).collect();
        let mut reader = FrameReader::new(Cursor::new(wire(&[&payload, b"next"])));
        assert_eq!(reader.read_frame().unwrap().as_ref(), payload.as_slice());
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"next");
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[b"ok"])),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn timeout_is_distinct_from_close() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        left.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let mut reader = FrameReader::new(left);

        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let big = vec![0x11; 64 * 1024];
        let handle = std::thread::spawn(move || {
            writer.send(b"ping").unwrap();
            writer.send(&big).unwrap();
        });

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"ping");
        assert_eq!(reader.read_frame().unwrap().len(), 64 * 1024);
        handle.join().unwrap();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
