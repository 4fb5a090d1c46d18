use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Widest length prefix accepted: ten 7-bit groups cover a `u64`.
pub const MAX_LENGTH_PREFIX: usize = 10;

/// Default maximum payload size: the largest message the daemon's
/// serializer can produce.
pub const DEFAULT_MAX_PAYLOAD: usize = i32::MAX as usize;

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: [`DEFAULT_MAX_PAYLOAD`].
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Number of prefix bytes used to encode `len`.
pub fn length_prefix_len(len: usize) -> usize {
    let mut len = len as u64;
    let mut bytes = 1;
    while len > 0x7f {
        len >>= 7;
        bytes += 1;
    }
    bytes
}

/// Append the varint encoding of `len` to `dst`.
pub fn encode_length(len: usize, dst: &mut BytesMut) {
    let mut len = len as u64;
    dst.reserve(length_prefix_len(len as usize));
    while len > 0x7f {
        dst.put_u8(0x80 | (len & 0x7f) as u8);
        len >>= 7;
    }
    dst.put_u8(len as u8);
}

/// Append a complete frame (length prefix + payload) to `dst`.
///
/// ```text
/// ┌───────────────────────────┬──────────────────┐
/// │ Length (1-10B varint)     │ Payload          │
/// │ 7 bits per byte, LE order │ (Length bytes)   │
/// └───────────────────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(length_prefix_len(payload.len()) + payload.len());
    encode_length(payload.len(), dst);
    dst.put_slice(payload);
}

/// Encode a frame into a fresh buffer.
pub fn encode_to_bytes(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    encode_frame(payload, &mut buf);
    buf.freeze()
}

/// Incremental decoder for the varint length prefix.
///
/// Feed bytes one at a time; the final length comes back once a byte with
/// the continuation bit clear is seen.
#[derive(Debug, Default, Clone)]
pub struct LengthDecoder {
    value: u64,
    consumed: usize,
}

impl LengthDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one prefix byte.
    pub fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        if self.consumed >= MAX_LENGTH_PREFIX {
            return Err(FrameError::LengthOverflow {
                max: MAX_LENGTH_PREFIX,
            });
        }
        // The tenth group holds only bit 63.
        if self.consumed == MAX_LENGTH_PREFIX - 1 && byte > 0x01 {
            return Err(FrameError::LengthOverflow {
                max: MAX_LENGTH_PREFIX,
            });
        }
        let shift = 7 * self.consumed as u32;
        self.value |= u64::from(byte & 0x7f) << shift;
        self.consumed += 1;

        if byte & 0x80 == 0 {
            Ok(Some(self.value))
        } else {
            Ok(None)
        }
    }

    /// Prefix bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

pub(crate) fn check_payload_len(len: u64, max_payload: usize) -> Result<usize> {
    match usize::try_from(len) {
        Ok(size) if size <= max_payload => Ok(size),
        _ => Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        }),
    }
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    let mut decoder = LengthDecoder::new();
    let mut len = None;
    for &byte in src.iter() {
        if let Some(value) = decoder.push(byte)? {
            len = Some(value);
            break;
        }
    }
    let Some(len) = len else {
        return Ok(None); // Need more prefix bytes
    };

    let payload_len = check_payload_len(len, max_payload)?;
    let prefix_len = decoder.consumed();
    if src.len() < prefix_len + payload_len {
        return Ok(None); // Need more data
    }

    src.advance(prefix_len);
    Ok(Some(src.split_to(payload_len).freeze()))
}
