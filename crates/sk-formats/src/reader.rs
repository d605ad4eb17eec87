//! Big-endian byte cursor over a track chunk.

use crate::varint;
use crate::FormatError;

/// Cursor over a borrowed byte slice. Every read is bounds-checked and
/// leaves the position unchanged on failure.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        if n > self.remaining() {
            return Err(FormatError::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, FormatError> {
        self.data.get(self.pos).copied().ok_or(FormatError::UnexpectedEof)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, FormatError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, FormatError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_varint(&mut self) -> Result<u32, FormatError> {
        let (value, used) = varint::decode_varint(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(FormatError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let data = [0x12, 0x34, 0x24, 0x24, 0x00, 0x08, 0x81, 0x00, 0xAA];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u16_be(), Ok(0x1234));
        assert_eq!(r.read_u32_be(), Ok(0x2424_0008));
        assert_eq!(r.read_varint(), Ok(0x80));
        assert_eq!(r.peek_u8(), Ok(0xAA));
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.read_u16_be(), Err(FormatError::UnexpectedEof));
        assert_eq!(r.position(), 8);
    }

    #[test]
    fn skip_and_bytes() {
        let data = [1, 2, 3, 4];
        let mut r = ByteReader::new(&data);
        r.skip(1).unwrap();
        assert_eq!(r.read_bytes(2), Ok(&data[1..3]));
        assert!(r.skip(2).is_err());
        assert_eq!(r.read_u8(), Ok(4));
        assert!(r.is_empty());
    }
}
