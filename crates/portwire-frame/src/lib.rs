//! Varint length-prefixed message framing.
//!
//! Every message on the wire is:
//! - the payload length as a base-128 varint (low groups first, high bit
//!   set on every byte except the last)
//! - exactly that many payload bytes
//!
//! The payload itself is opaque at this layer.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_frame, encode_frame, encode_length, encode_to_bytes, length_prefix_len, FrameConfig,
    LengthDecoder, DEFAULT_MAX_PAYLOAD, MAX_LENGTH_PREFIX,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, READ_CHUNK};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::VarintCodec;
