//! Length-prefixed framing for the operator link
//!
//! Both the Bluetooth and the TCP operator links are byte streams, so each
//! envelope is framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: protobuf Envelope ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::proto::Envelope;

/// Largest frame accepted (10 MB)
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("Protobuf decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Protobuf encode error: {0}")]
    EncodeError(#[from] prost::EncodeError),
}

/// Encode an envelope into a single framed buffer
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let msg_len = envelope.encoded_len();
    if msg_len > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(msg_len));
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + msg_len);
    buf.put_u32(msg_len as u32);
    envelope.encode(&mut buf)?;

    Ok(buf.freeze())
}

/// Try to take one complete frame off the front of `buf`
///
/// Returns `Ok(None)` and leaves `buf` untouched when the frame is incomplete.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
    if buf.len() < LENGTH_PREFIX {
        return Ok(None);
    }

    let msg_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if msg_len > MAX_MESSAGE_SIZE {
        return Err(CodecError::InvalidLength(msg_len));
    }

    let total_len = LENGTH_PREFIX + msg_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(LENGTH_PREFIX);
    let msg_bytes = buf.split_to(msg_len as usize);

    Ok(Some(Envelope::decode(msg_bytes)?))
}

/// Accumulates stream reads and yields complete envelopes
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append bytes read from the link
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete envelope, if any
    ///
    /// Call repeatedly until `Ok(None)` to drain every buffered frame.
    pub fn decode_next(&mut self) -> Result<Option<Envelope>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Drop any partial frame, e.g. after the peer reconnects
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
