//! Big-endian wire primitives shared by every layer.
//!
//! Readers take a slice and hand back `(value, remainder)` so callers can
//! thread the unread tail through a chain of `let (x, rest) = ...?;`
//! bindings. Writers append to a `Vec<u8>`.

use crate::error::{Error, Result};

/// Width of a length prefix in front of a variable-length vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    U8,
    U16,
    U24,
}

impl LengthPrefix {
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U24 => 3,
        }
    }

    /// Largest payload this prefix can describe.
    #[must_use]
    pub const fn max(self) -> usize {
        match self {
            Self::U8 => 0xff,
            Self::U16 => 0xffff,
            Self::U24 => 0x00ff_ffff,
        }
    }
}

fn split(buf: &[u8], n: usize) -> Result<(&[u8], &[u8])> {
    if buf.len() < n {
        return Err(Error::truncated(n, buf.len()));
    }
    Ok(buf.split_at(n))
}

pub fn read_u8(buf: &[u8]) -> Result<(u8, &[u8])> {
    let (head, rest) = split(buf, 1)?;
    Ok((head[0], rest))
}

pub fn read_u16(buf: &[u8]) -> Result<(u16, &[u8])> {
    let (head, rest) = split(buf, 2)?;
    Ok((u16::from_be_bytes([head[0], head[1]]), rest))
}

pub fn read_u24(buf: &[u8]) -> Result<(u32, &[u8])> {
    let (head, rest) = split(buf, 3)?;
    Ok((u32::from_be_bytes([0, head[0], head[1], head[2]]), rest))
}

pub fn read_u32(buf: &[u8]) -> Result<(u32, &[u8])> {
    let (head, rest) = split(buf, 4)?;
    Ok((u32::from_be_bytes([head[0], head[1], head[2], head[3]]), rest))
}

/// Read exactly `N` opaque bytes.
pub fn read_array<const N: usize>(buf: &[u8]) -> Result<([u8; N], &[u8])> {
    let (head, rest) = split(buf, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

/// Read a length prefix of the given width followed by that many bytes.
pub fn read_length_prefixed(buf: &[u8], prefix: LengthPrefix) -> Result<(&[u8], &[u8])> {
    let (len, rest) = match prefix {
        LengthPrefix::U8 => read_u8(buf).map(|(v, r)| (v as usize, r))?,
        LengthPrefix::U16 => read_u16(buf).map(|(v, r)| (v as usize, r))?,
        LengthPrefix::U24 => read_u24(buf).map(|(v, r)| (v as usize, r))?,
    };
    if rest.len() < len {
        return Err(Error::truncated(prefix.width() + len, buf.len()));
    }
    Ok(rest.split_at(len))
}

pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write the low 24 bits of `value`; larger values cannot be represented.
pub fn write_u24(out: &mut Vec<u8>, value: u32) -> Result<()> {
    if value as usize > LengthPrefix::U24.max() {
        return Err(Error::LengthOverflow {
            len: value as usize,
            max: LengthPrefix::U24.max(),
        });
    }
    out.extend_from_slice(&value.to_be_bytes()[1..]);
    Ok(())
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_length(out: &mut [u8], prefix: LengthPrefix, len: usize) {
    let bytes = (len as u32).to_be_bytes();
    out.copy_from_slice(&bytes[4 - prefix.width()..]);
}

/// Write `payload` behind a length prefix of the given width.
pub fn write_length_prefixed(out: &mut Vec<u8>, prefix: LengthPrefix, payload: &[u8]) -> Result<()> {
    write_nested(out, prefix, |out| {
        out.extend_from_slice(payload);
        Ok(())
    })
}

/// Write a length placeholder, let `body` append the vector contents, then
/// backfill the placeholder with the number of bytes appended.
pub fn write_nested<F>(out: &mut Vec<u8>, prefix: LengthPrefix, body: F) -> Result<()>
where
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let start = out.len();
    out.resize(start + prefix.width(), 0);
    if let Err(e) = body(out) {
        out.truncate(start);
        return Err(e);
    }

    let len = out.len() - start - prefix.width();
    if len > prefix.max() {
        out.truncate(start);
        return Err(Error::LengthOverflow {
            len,
            max: prefix.max(),
        });
    }
    put_length(&mut out[start..start + prefix.width()], prefix, len);
    Ok(())
}
