use crate::error::{JunaiError, Result};
use scroll::{Pread, Pwrite, BE, LE};
use std::ops::{Deref, DerefMut};

macro_rules! read_int {
    ($name:ident, $ty:ty, $endian:expr) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.read_bytes(std::mem::size_of::<$ty>())?;
            Ok(bytes.pread_with::<$ty>(0, $endian)?)
        }
    };
}

macro_rules! write_int {
    ($name:ident, $ty:ty, $endian:expr) => {
        pub fn $name(&mut self, value: $ty) -> Result<()> {
            let size = std::mem::size_of::<$ty>();
            let pos = self.pos;
            self.reserve(size);
            self.inner.as_mut_slice().pwrite_with::<$ty>(value, pos, $endian)?;
            self.pos += size;
            Ok(())
        }
    };
}

#[derive(Debug, Clone, Default)]
pub struct ByteCursor<T> {
    inner: T,
    pos: usize,
}

impl<T: AsRef<[u8]>> ByteCursor<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().len()
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn peek(&mut self, pos: usize) -> Peek<'_, T> {
        let restore = self.pos;
        self.pos = pos;
        Peek {
            cursor: self,
            restore,
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8]> {
        let offset = self.pos;
        let available = self.remaining();
        if count > available {
            return Err(JunaiError::TruncatedInput {
                offset,
                needed: count,
                available,
            });
        }
        self.pos += count;
        Ok(&self.inner.as_ref()[offset..offset + count])
    }

    pub fn read_to_end(&mut self) -> &[u8] {
        let offset = self.pos.min(self.len());
        self.pos = self.pos.max(self.len());
        &self.inner.as_ref()[offset..]
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    read_int!(read_u16_le, u16, LE);
    read_int!(read_u16_be, u16, BE);
    read_int!(read_u32_le, u32, LE);
    read_int!(read_u32_be, u32, BE);
    read_int!(read_u64_le, u64, LE);
    read_int!(read_u64_be, u64, BE);
}

impl ByteCursor<Vec<u8>> {
    fn reserve(&mut self, size: usize) {
        let end = self.pos + size;
        if end > self.inner.len() {
            self.inner.resize(end, 0);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let pos = self.pos;
        self.reserve(bytes.len());
        self.inner[pos..pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    write_int!(write_u16_le, u16, LE);
    write_int!(write_u16_be, u16, BE);
    write_int!(write_u32_le, u32, LE);
    write_int!(write_u32_be, u32, BE);
    write_int!(write_u64_le, u64, LE);
    write_int!(write_u64_be, u64, BE);
}

#[derive(Debug)]
pub struct Peek<'c, T: AsRef<[u8]>> {
    cursor: &'c mut ByteCursor<T>,
    restore: usize,
}

impl<T: AsRef<[u8]>> Deref for Peek<'_, T> {
    type Target = ByteCursor<T>;

    fn deref(&self) -> &Self::Target {
        self.cursor
    }
}

impl<T: AsRef<[u8]>> DerefMut for Peek<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cursor
    }
}

impl<T: AsRef<[u8]>> Drop for Peek<'_, T> {
    fn drop(&mut self) {
        self.cursor.pos = self.restore;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_byte_orders() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut cursor = ByteCursor::new(&data[..]);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0201);
        assert_eq!(cursor.read_u16_be().unwrap(), 0x0304);
        assert_eq!(cursor.read_u32_be().unwrap(), 0x05060708);
        assert!(cursor.is_empty());

        cursor.seek(0);
        assert_eq!(cursor.read_u64_le().unwrap(), 0x0807060504030201);
        cursor.seek(0);
        assert_eq!(cursor.read_u64_be().unwrap(), 0x0102030405060708);
        cursor.seek(4);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x08070605);
    }

    #[test]
    fn read_past_end_is_truncated_input() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut cursor = ByteCursor::new(&data[..]);
        cursor.read_u8().unwrap();
        match cursor.read_u32_le() {
            Err(JunaiError::TruncatedInput {
                offset,
                needed,
                available,
            }) => {
                assert_eq!((offset, needed, available), (1, 4, 2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(cursor.tell(), 1);
    }

    #[test]
    fn peek_restores_position_on_error() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data[..]);
        cursor.seek(3);
        let result = (|| -> Result<u32> {
            let mut peek = cursor.peek(6);
            peek.read_u32_le()
        })();
        assert!(result.is_err());
        assert_eq!(cursor.tell(), 3);

        {
            let mut peek = cursor.peek(4);
            assert_eq!(peek.read_u32_le().unwrap(), 0);
            assert_eq!(peek.tell(), 8);
        }
        assert_eq!(cursor.tell(), 3);
    }

    #[test]
    fn writes_grow_buffer_and_fill_gaps() {
        let mut cursor = ByteCursor::new(Vec::new());
        cursor.seek(2);
        cursor.write_u16_be(0x1234).unwrap();
        cursor.write_u32_le(0xDEADBEEF).unwrap();
        cursor.seek(0);
        cursor.write_u8(0xFF);
        assert_eq!(
            cursor.into_inner(),
            vec![0xFF, 0x00, 0x12, 0x34, 0xEF, 0xBE, 0xAD, 0xDE]
        );
    }

    #[test]
    fn overwrites_in_place() {
        let mut cursor = ByteCursor::new(vec![0u8; 12]);
        cursor.seek(4);
        cursor.write_u64_le(u64::MAX).unwrap();
        cursor.seek(0);
        cursor.write_u32_be(1).unwrap();
        assert_eq!(cursor.len(), 12);
        assert_eq!(cursor.get_ref()[..4], [0, 0, 0, 1]);
        cursor.seek(4);
        assert_eq!(cursor.read_u64_le().unwrap(), u64::MAX);
    }
}
