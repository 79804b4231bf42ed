// TLV framing: `[i16 type][i32 length][payload]`, big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

pub const HEADER_LEN: usize = 6;

/// Largest payload accepted from a client.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// One undecoded message: type tag and raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: i16,
    pub payload: Bytes,
}

pub fn encode_frame(msg_type: i16, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_i16(msg_type);
    buf.put_i32(payload.len() as i32);
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Splits one frame off the front of `buf`.
///
/// Returns `Ok(None)` until the header and the whole payload are buffered; nothing is
/// consumed in that case. Negative or oversized lengths are errors the stream cannot
/// recover from.
pub fn try_decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let msg_type = i16::from_be_bytes([buf[0], buf[1]]);
    let len = i32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len));
    }
    let len = len as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    if buf.len() < HEADER_LEN + len {
        buf.reserve(HEADER_LEN + len - buf.len());
        return Ok(None);
    }
    buf.advance(HEADER_LEN);
    let payload = buf.split_to(len).freeze();
    Ok(Some(Frame { msg_type, payload }))
}
