//! Exact-count reads from a blocking byte source.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder};

use crate::{
    error::{Error, Result},
    marker::Category,
};

/// Reads exactly `buf.len()` bytes. A short first read gets exactly one retry for the remainder;
/// anything less after that is an error.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let expected = buf.len();
    let n = reader.read(buf)?;
    if n == expected {
        return Ok(());
    }
    // Buffered readers may only hand back what's left in their buffer on the first call.
    let n2 = reader.read(&mut buf[n..])?;
    if n + n2 != expected {
        return Err(Error::ShortRead {
            expected,
            actual: n + n2,
        });
    }
    Ok(())
}

/// The byte-level half of a decoder: owns the source and a small scratch buffer that every
/// fixed-width read goes through.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    scratch: [u8; 16],
    pending: Option<u8>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scratch: [0; 16],
            pending: None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read exactly `buf.len()` bytes from the source into `buf`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        read_full(&mut self.inner, buf)
    }

    fn fill(&mut self, n: usize) -> Result<&[u8]> {
        let ByteReader { inner, scratch, .. } = self;
        read_full(inner, &mut scratch[..n])?;
        Ok(&scratch[..n])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.fill(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.fill(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.fill(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.fill(8)?))
    }

    /// Read the next tag byte, honoring any byte left behind by [`peek_tag`](Self::peek_tag).
    pub fn read_tag(&mut self) -> Result<u8> {
        match self.pending.take() {
            Some(tag) => Ok(tag),
            None => self.read_u8(),
        }
    }

    /// Look at the next tag byte without consuming it.
    pub fn peek_tag(&mut self) -> Result<u8> {
        match self.pending {
            Some(tag) => Ok(tag),
            None => {
                let tag = self.read_u8()?;
                self.pending = Some(tag);
                Ok(tag)
            }
        }
    }

    /// Decode the length that follows (or is embedded in) `tag`, using the inline, 16-bit, or
    /// 32-bit form of the given category.
    pub fn read_container_len(&mut self, tag: u8, category: Category) -> Result<usize> {
        let desc = category.descriptor();
        if tag == desc.tag16 {
            Ok(self.read_u16()? as usize)
        } else if tag == desc.tag32 {
            Ok(self.read_u32()? as usize)
        } else if let Some(len) = category.inline_len(tag) {
            Ok(len)
        } else {
            Err(Error::bad_tag(tag, category.name()))
        }
    }
}
