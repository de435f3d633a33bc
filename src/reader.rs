use byteorder::{BigEndian, ByteOrder};

use crate::error::{FontError, Result};

/// A cursor over a contiguous, immutable byte region. All TrueType integers
/// are big-endian; every typed read here decodes big-endian and advances the
/// cursor by exactly the read width.
///
/// `table` is carried purely for diagnostics: it names the table this reader
/// was cut from, so a short read reports e.g. `'glyf' at offset 118` instead
/// of a bare index-out-of-bounds.
#[derive(Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    table: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8], table: &'static str) -> Self {
        ByteReader { data, pos: 0, table }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn require(&self, n: usize) -> Result<()> {
        if self.pos.checked_add(n).map_or(true, |end| end > self.data.len()) {
            return Err(FontError::parse(
                self.table,
                self.pos,
                format!("read of {} bytes overruns buffer of {} bytes", n, self.data.len()),
            ));
        }
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(FontError::parse(
                self.table,
                offset,
                "seek target past end of buffer",
            ));
        }
        self.pos = offset;
        Ok(())
    }

    /// A sub-view starting at `offset` (relative to this reader's own base),
    /// sharing the same backing slice but with an independent cursor. Does
    /// not consume from `self`.
    pub fn sub_view(&self, offset: usize, table: &'static str) -> Result<ByteReader<'a>> {
        if offset > self.data.len() {
            return Err(FontError::parse(
                self.table,
                offset,
                "sub-view offset past end of buffer",
            ));
        }
        Ok(ByteReader {
            data: &self.data[offset..],
            pos: 0,
            table,
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        let v = BigEndian::read_u16(&self.data[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.require(2)?;
        let v = BigEndian::read_i16(&self.data[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let v = BigEndian::read_u32(&self.data[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.require(4)?;
        let v = BigEndian::read_i32(&self.data[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.require(8)?;
        let v = BigEndian::read_u64(&self.data[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.require(8)?;
        let v = BigEndian::read_i64(&self.data[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    /// Reads a four-byte ASCII tag, lowercased.
    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        self.require(4)?;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        for b in &mut tag {
            b.make_ascii_lowercase();
        }
        Ok(tag)
    }
}
