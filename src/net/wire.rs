// Field-level helpers for message payloads.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// Cursor over one payload. Every read is bounds-checked and reports the message type.
pub struct WireReader<'a> {
    msg_type: i16,
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(msg_type: i16, buf: &'a [u8]) -> Self {
        Self { msg_type, buf }
    }

    pub fn msg_type(&self) -> i16 {
        self.msg_type
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                msg_type: self.msg_type,
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    pub fn i16(&mut self) -> Result<i16, ProtocolError> {
        self.need(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn i32(&mut self) -> Result<i32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn i64(&mut self) -> Result<i64, ProtocolError> {
        self.need(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn f32(&mut self) -> Result<f32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_f32())
    }

    fn utf8(&mut self, len: usize) -> Result<String, ProtocolError> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        let s = std::str::from_utf8(head).map_err(|_| ProtocolError::InvalidUtf8(self.msg_type))?;
        self.buf = tail;
        Ok(s.to_owned())
    }

    /// `u16` length + UTF-8.
    pub fn str(&mut self) -> Result<String, ProtocolError> {
        self.need(2)?;
        let len = self.buf.get_u16() as usize;
        self.utf8(len)
    }

    /// `i32` length + UTF-8, used for tokens.
    pub fn str32(&mut self) -> Result<String, ProtocolError> {
        let len = self.i32()?;
        if len < 0 {
            return Err(ProtocolError::InvalidValue {
                msg_type: self.msg_type,
                field: "string length",
            });
        }
        self.utf8(len as usize)
    }

    /// `i16` element count of a collection.
    pub fn count(&mut self) -> Result<usize, ProtocolError> {
        let n = self.i16()?;
        if n < 0 {
            return Err(ProtocolError::InvalidValue {
                msg_type: self.msg_type,
                field: "collection count",
            });
        }
        Ok(n as usize)
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn put_str(buf: &mut BytesMut, s: &str) {
    let s = clip(s, u16::MAX as usize);
    buf.put_u16(s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
}

pub fn put_str32(buf: &mut BytesMut, s: &str) {
    let s = clip(s, i32::MAX as usize);
    buf.put_i32(s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

pub fn put_bool(buf: &mut BytesMut, v: bool) {
    buf.put_u8(v as u8);
}

/// Writes an `i16` count; collections are capped at `i16::MAX` elements.
pub fn put_count(buf: &mut BytesMut, n: usize) -> usize {
    let n = n.min(i16::MAX as usize);
    buf.put_i16(n as i16);
    n
}
