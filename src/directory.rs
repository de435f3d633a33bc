use std::collections::HashMap;

use log::{debug, trace};

use crate::error::{FontError, Result};
use crate::reader::ByteReader;

const VERSION_1_0: u32 = 0x0001_0000;
const VERSION_TRUE: u32 = 0x7472_7565; // "true"

/// Maps a lowercase four-character table tag to its byte offset in the font
/// buffer. Built once at [`crate::Parser::open`] time.
pub struct TableDirectory {
    offsets: HashMap<[u8; 4], u32>,
}

impl TableDirectory {
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<TableDirectory> {
        let version = reader.read_u32()?;
        if version != VERSION_1_0 && version != VERSION_TRUE {
            return Err(FontError::UnsupportedFormat(version));
        }

        let num_tables = reader.read_u16()?;
        reader.skip(6)?; // searchRange, entrySelector, rangeShift

        debug!("sfnt version {:#010x}, {} tables", version, num_tables);

        let mut offsets = HashMap::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let tag = reader.read_tag()?;
            reader.skip(4)?; // checksum
            let offset = reader.read_u32()?;
            reader.skip(4)?; // length
            trace!("table '{}' at offset {}", String::from_utf8_lossy(&tag), offset);
            offsets.insert(tag, offset);
        }

        Ok(TableDirectory { offsets })
    }

    pub fn offset(&self, tag: &'static str) -> Result<u32> {
        let bytes = tag.as_bytes();
        debug_assert_eq!(bytes.len(), 4, "table tags are always four bytes");
        let mut key = [0u8; 4];
        key.copy_from_slice(bytes);
        self.offsets
            .get(&key)
            .copied()
            .ok_or(FontError::TableMissing { tag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_header(version: u32, tables: &[(&str, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&version.to_be_bytes());
        buf.extend_from_slice(&(tables.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0u8; 6]);
        for (tag, offset) in tables {
            buf.extend_from_slice(tag.as_bytes());
            buf.extend_from_slice(&0u32.to_be_bytes()); // checksum
            buf.extend_from_slice(&offset.to_be_bytes());
            buf.extend_from_slice(&0u32.to_be_bytes()); // length
        }
        buf
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let buf = build_header(0xDEAD_BEEF, &[]);
        let mut r = ByteReader::new(&buf, "sfnt");
        match TableDirectory::parse(&mut r) {
            Err(FontError::UnsupportedFormat(v)) => assert_eq!(v, 0xDEAD_BEEF),
            other => panic!("expected UnsupportedFormat, got {:?}", other.err()),
        }
    }

    #[test]
    fn true_version_is_accepted() {
        let buf = build_header(0x7472_7565, &[("head", 12)]);
        let mut r = ByteReader::new(&buf, "sfnt");
        let dir = TableDirectory::parse(&mut r).unwrap();
        assert_eq!(dir.offset("head").unwrap(), 12);
    }

    #[test]
    fn missing_table_is_an_error() {
        let buf = build_header(VERSION_1_0, &[("head", 12)]);
        let mut r = ByteReader::new(&buf, "sfnt");
        let dir = TableDirectory::parse(&mut r).unwrap();
        assert!(matches!(dir.offset("glyf"), Err(FontError::TableMissing { tag: "glyf" })));
    }

    #[test]
    fn tags_resolve_to_their_offsets() {
        let buf = build_header(VERSION_1_0, &[("cmap", 28), ("glyf", 512), ("loca", 256)]);
        let mut r = ByteReader::new(&buf, "sfnt");
        let dir = TableDirectory::parse(&mut r).unwrap();
        assert_eq!(dir.offset("cmap").unwrap(), 28);
        assert_eq!(dir.offset("glyf").unwrap(), 512);
        assert_eq!(dir.offset("loca").unwrap(), 256);
    }
}
