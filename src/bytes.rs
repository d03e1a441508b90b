use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

/// Raised when a read would run past the end of the underlying buffer.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("truncated input at offset {offset} (needed {wanted} more byte(s))")]
pub struct TruncatedInput {
    pub offset: usize,
    pub wanted: usize,
}

pub type Result<T> = std::result::Result<T, TruncatedInput>;

/// Random-access cursor over an immutable byte slice.
///
/// All multi-byte reads default to little-endian, matching the layout of
/// the MySQL on-disk formats this crate decodes. Big-endian variants are
/// provided for the handful of fields stored in network order.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> ByteReader<'a> {
        ByteReader { buf, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(TruncatedInput {
                offset: self.pos,
                wanted: n - self.remaining(),
            });
        }
        Ok(())
    }

    /// Move the cursor to an absolute offset. The end of the buffer is a
    /// valid position.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(TruncatedInput {
                offset: self.buf.len(),
                wanted: pos - self.buf.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Run `f` with the cursor repositioned at `offset`; the original
    /// position is restored on every exit path, including errors.
    pub fn at<T, E>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<TruncatedInput>,
    {
        let saved = self.pos;
        let result = match self.seek(offset) {
            Ok(()) => f(self),
            Err(err) => Err(E::from(err)),
        };
        self.pos = saved;
        result
    }

    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_at(&mut self, n: usize, offset: usize) -> Result<&'a [u8]> {
        self.at(offset, |r| r.read(n))
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read(2)?))
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.read(2)?))
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.read(2)?))
    }

    pub fn u24(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u24(self.read(3)?))
    }

    pub fn u24_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u24(self.read(3)?))
    }

    pub fn i24(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i24(self.read(3)?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read(4)?))
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.read(4)?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read(4)?))
    }

    pub fn i32_be(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.read(4)?))
    }

    pub fn u40(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_uint(self.read(5)?, 5))
    }

    pub fn u40_be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_uint(self.read(5)?, 5))
    }

    pub fn u48(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_uint(self.read(6)?, 6))
    }

    pub fn u48_be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_uint(self.read(6)?, 6))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read(8)?))
    }

    pub fn u64_be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.read(8)?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.read(8)?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read(4)?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read(8)?))
    }

    /// Unsigned big-endian integer of 1..=8 bytes.
    pub fn uint_be(&mut self, nbytes: usize) -> Result<u64> {
        debug_assert!((1..=8).contains(&nbytes));
        Ok(BigEndian::read_uint(self.read(nbytes)?, nbytes))
    }

    /// u16 length-prefixed byte string.
    pub fn bytes_prefix16(&mut self) -> Result<&'a [u8]> {
        let len = self.u16()? as usize;
        self.read(len)
    }

    /// u32 length-prefixed byte string.
    pub fn bytes_prefix32(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.read(len)
    }

    /// NUL-terminated byte string, cursor left past the terminator.
    /// Without a terminator the rest of the buffer is consumed.
    pub fn bytes_nul(&mut self) -> Result<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(idx) => {
                let out = &rest[..idx];
                self.pos += idx + 1;
                Ok(out)
            }
            None => {
                self.pos = self.buf.len();
                Ok(rest)
            }
        }
    }

    // Offset variants used for fixed-layout headers: read one value at an
    // absolute offset without disturbing the cursor.

    pub fn u8_at(&mut self, offset: usize) -> Result<u8> {
        self.at(offset, |r| r.u8())
    }

    pub fn u16_at(&mut self, offset: usize) -> Result<u16> {
        self.at(offset, |r| r.u16())
    }

    pub fn u24_at(&mut self, offset: usize) -> Result<u32> {
        self.at(offset, |r| r.u24())
    }

    pub fn u32_at(&mut self, offset: usize) -> Result<u32> {
        self.at(offset, |r| r.u32())
    }
}
