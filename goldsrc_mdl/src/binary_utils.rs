use std::borrow::Cow;

use byteorder::{ByteOrder, LittleEndian};
use zerocopy::{FromBytes, Ref, Unaligned};

use crate::{Error, Result};

pub fn null_terminated_prefix(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.is_empty() {
        return None;
    }
    bytes.splitn(2, |&b| b == 0).next()
}

/// Decodes a fixed-width, null-padded name field.
///
/// Names are raw bytes in the file, invalid utf8 is replaced rather than rejected.
#[must_use]
pub fn fixed_str(bytes: &[u8]) -> Cow<str> {
    String::from_utf8_lossy(null_terminated_prefix(bytes).unwrap_or_default())
}

/// Seekable reader over an immutable model buffer.
///
/// All reads are little-endian and unaligned. Reading past the end of the
/// buffer returns [`Error::Eof`] and leaves the position unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Seeks to an absolute offset. Seeking to the very end is allowed.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the offset is past the end of the buffer.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.bytes.len() {
            return Err(Error::Eof { offset, size: 0 });
        }
        self.position = offset;
        Ok(())
    }

    /// Seeks relative to the current position.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the resulting offset is outside the buffer.
    pub fn skip(&mut self, delta: isize) -> Result<()> {
        let offset = self
            .position
            .checked_add_signed(delta)
            .ok_or(Error::Eof {
                offset: self.position,
                size: delta.unsigned_abs(),
            })?;
        self.seek(offset)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than `size` bytes remain.
    pub fn read_bytes(&mut self, size: usize) -> Result<&'a [u8]> {
        let eof = Error::Eof {
            offset: self.position,
            size,
        };
        let end = self.position.checked_add(size).ok_or_else(|| eof.clone())?;
        let bytes = self.bytes.get(self.position..end).ok_or(eof)?;
        self.position = end;
        Ok(bytes)
    }

    /// Reads a record by value.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the record extends past the end of the buffer.
    pub fn read<T: FromBytes + Unaligned>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>())?;
        T::read_from(bytes).ok_or(Error::Corrupted("record size mismatch"))
    }

    /// Borrows `count` consecutive records from the buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the records extend past the end of the buffer.
    pub fn read_slice<T: FromBytes + Unaligned>(&mut self, count: usize) -> Result<&'a [T]> {
        if count == 0 {
            return Ok(&[]);
        }

        let size = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(Error::Eof {
                offset: self.position,
                size: usize::MAX,
            })?;
        let bytes = self.read_bytes(size)?;

        Ref::<_, [T]>::new_slice_unaligned(bytes)
            .map(Ref::into_slice)
            .ok_or(Error::Corrupted("record slice size mismatch"))
    }

    /// # Errors
    ///
    /// Returns `Err` on eof.
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_bytes(2).map(LittleEndian::read_i16)
    }

    /// # Errors
    ///
    /// Returns `Err` on eof.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_bytes(4).map(LittleEndian::read_i32)
    }

    /// # Errors
    ///
    /// Returns `Err` on eof.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }

    /// # Errors
    ///
    /// Returns `Err` on eof.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_bytes(4).map(LittleEndian::read_f32)
    }

    /// # Errors
    ///
    /// Returns `Err` on eof.
    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Reads a fixed-length, null-padded string field.
    ///
    /// # Errors
    ///
    /// Returns `Err` on eof.
    pub fn read_string(&mut self, size: usize) -> Result<Cow<'a, str>> {
        self.read_bytes(size).map(fixed_str)
    }

    /// Reads an `i32` count or offset that must not be negative.
    ///
    /// # Errors
    ///
    /// Returns `Err` on eof or with `error` if the value is negative.
    pub fn read_size(&mut self, error: &'static str) -> Result<usize> {
        self.read_i32()?
            .try_into()
            .map_err(|_| Error::Corrupted(error))
    }
}
