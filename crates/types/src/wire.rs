//! Big-endian fixed-width integer codecs and length-prefixed UTF-8 strings,
//! per spec §6 "Integer encodings". Grounded on the teacher's manual
//! byte-slicing in `state::State::encode`/`decode`, switched from
//! little-endian to big-endian to match this spec's wire contract.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    UnexpectedEof { wanted: usize, available: usize },
    InvalidUtf8,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::UnexpectedEof { wanted, available } => write!(
                f,
                "unexpected end of buffer: wanted {wanted} bytes, {available} available"
            ),
            WireError::InvalidUtf8 => write!(f, "invalid utf-8 in length-prefixed string"),
        }
    }
}

impl std::error::Error for WireError {}

/// A small forward-only cursor over a byte slice, used by the persistence
/// and classfile codecs alike.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof {
                wanted: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

pub fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_i32(out: &mut Vec<u8>, v: i32) {
    write_u32(out, v as u32);
}

pub fn write_string(out: &mut Vec<u8>, v: &str) {
    write_u32(out, v.len() as u32);
    out.extend_from_slice(v.as_bytes());
}

pub fn write_bytes(out: &mut Vec<u8>, v: &[u8]) {
    write_u32(out, v.len() as u32);
    out.extend_from_slice(v);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_fields() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0xdead_beef);
        write_string(&mut buf, "hello");
        write_bytes(&mut buf, &[1, 2, 3]);

        let mut cur = Cursor::new(&buf);
        assert_eq!(cur.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(cur.read_string().unwrap(), "hello");
        assert_eq!(cur.read_bytes().unwrap(), vec![1, 2, 3]);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn reports_unexpected_eof() {
        let buf = [0u8; 2];
        let mut cur = Cursor::new(&buf);
        assert!(matches!(cur.read_u32(), Err(WireError::UnexpectedEof { .. })));
    }
}
