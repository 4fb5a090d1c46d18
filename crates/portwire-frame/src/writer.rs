use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::encode_frame;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// `WouldBlock` is not retried: on a socket with a timeout it is how an
/// expired send deadline is reported.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one payload.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        encode_frame(payload, &mut buf);
        let result = self.send_encoded(&buf);
        self.buf = buf;
        result
    }

    /// Send bytes that already carry their length prefix.
    pub fn send_encoded(&mut self, frame: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < frame.len() {
            match self.inner.write(&frame[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{decode_frame, encode_to_bytes, DEFAULT_MAX_PAYLOAD};

    #[test]
    fn send_writes_prefixed_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"first").unwrap();
        writer.send(b"").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let f1 = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(f1.as_ref(), b"first");
        assert!(f2.is_empty());
        assert!(wire.is_empty());
    }

    #[test]
    fn send_encoded_matches_send() {
        let mut direct = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        direct.send(b"payload").unwrap();

        let mut pre = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        pre.send_encoded(&encode_to_bytes(b"payload")).unwrap();

        assert_eq!(
            direct.into_inner().into_inner(),
            pre.into_inner().into_inner()
        );
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        assert!(matches!(
            writer.send(b"x").unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn would_block_is_surfaced() {
        let mut writer = FrameWriter::new(BlockingWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn write_to_closed_peer_fails() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        drop(right);
        let mut writer = FrameWriter::new(left);
        let err = writer.send(b"lost").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BlockingWriter;

    impl Write for BlockingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
