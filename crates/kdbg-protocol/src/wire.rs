//! Little-endian body cursor helpers.
//!
//! [`BodyWriter`] appends into a caller-owned buffer so the monitor can reuse
//! one preallocated reply buffer for every exchange.

use crate::error::BodyError;

/// Appends little-endian fields to a reusable buffer.
pub struct BodyWriter<'a>
{
    buf: &'a mut Vec<u8>,
}

impl<'a> BodyWriter<'a>
{
    /// Start a new body, discarding whatever the buffer held.
    pub fn new(buf: &'a mut Vec<u8>) -> Self
    {
        buf.clear();
        Self { buf }
    }

    /// Append a 32-bit word.
    pub fn put_u32(&mut self, value: u32)
    {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a signed 32-bit word.
    pub fn put_i32(&mut self, value: i32)
    {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8])
    {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `len` zero bytes and return them for the caller to fill.
    pub fn reserve_bytes(&mut self, len: usize) -> &mut [u8]
    {
        let start = self.buf.len();
        self.buf.resize(start + len, 0);
        &mut self.buf[start..]
    }

    /// Overwrite a previously written word, used to patch counts.
    pub fn patch_u32(&mut self, offset: usize, value: u32)
    {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.buf.len()
    }

    /// True when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.buf.is_empty()
    }
}

/// Reads little-endian fields from a received body.
pub struct BodyReader<'a>
{
    data: &'a [u8],
    offset: usize,
}

impl<'a> BodyReader<'a>
{
    /// Start reading at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self
    {
        Self { data, offset: 0 }
    }

    /// Read a 32-bit word.
    pub fn u32(&mut self) -> Result<u32, BodyError>
    {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a signed 32-bit word.
    pub fn i32(&mut self) -> Result<i32, BodyError>
    {
        let bytes = self.bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read exactly `len` raw bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], BodyError>
    {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(BodyError::Truncated {
                offset: self.offset,
                needed: len,
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Read a count and check that `count` items of `item_size` bytes remain.
    pub fn count(&mut self, item_size: usize) -> Result<usize, BodyError>
    {
        let count = self.u32()?;
        let fits = (count as usize)
            .checked_mul(item_size)
            .is_some_and(|needed| needed <= self.remaining());
        if fits {
            Ok(count as usize)
        } else {
            Err(BodyError::BadCount { count })
        }
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize
    {
        self.data.len() - self.offset
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_writer_reuses_buffer()
    {
        let mut buf = vec![0xAA; 16];
        let mut writer = BodyWriter::new(&mut buf);
        assert!(writer.is_empty());
        writer.put_u32(0x0403_0201);
        writer.put_i32(-2);
        writer.patch_u32(0, 7);
        assert_eq!(writer.len(), 8);
        assert_eq!(buf, [7, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_reader_reports_truncation()
    {
        let data = [1, 0, 0, 0, 9];
        let mut reader = BodyReader::new(&data);
        assert_eq!(reader.u32(), Ok(1));
        assert_eq!(reader.u32(), Err(BodyError::Truncated { offset: 4, needed: 4 }));
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_count_must_fit()
    {
        let data = [3, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(BodyReader::new(&data).count(4), Err(BodyError::BadCount { count: 3 }));
        assert_eq!(BodyReader::new(&data).count(2), Ok(3));
    }
}
