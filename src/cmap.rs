use log::{debug, trace, warn};

use crate::error::{FontError, Result};
use crate::reader::ByteReader;

const TABLE: &str = "cmap";

#[derive(Debug)]
struct Segment {
    start: u16,
    end: u16,
    id_delta: u16,
    id_range_offset: u16,
}

/// A selected cmap subtable, capable of mapping a Unicode code point to a
/// glyph index. Owns all of its data (no raw pointers into the font buffer),
/// per the polymorphic-encoder redesign.
pub enum Encoder {
    Format0 {
        glyph_ids: [u8; 256],
    },
    Format4 {
        segments: Vec<Segment>,
        glyph_id_array: Vec<u16>,
    },
}

impl Encoder {
    /// Scans the cmap's encoding records in order and builds the first
    /// recognised subtable format encountered (0 or 4).
    pub fn select(font: &[u8], cmap_offset: u32) -> Result<Encoder> {
        let mut reader = ByteReader::new(&font[cmap_offset as usize..], TABLE);
        let _version = reader.read_u16()?;
        let num_tables = reader.read_u16()?;
        debug!("cmap: {} encoding records", num_tables);

        for i in 0..num_tables {
            reader.seek(4 + 8 * i as usize)?;
            let _platform_id = reader.read_u16()?;
            let _encoding_id = reader.read_u16()?;
            let subtable_offset = reader.read_u32()?;

            let mut sub = reader.sub_view(subtable_offset as usize, TABLE)?;
            let format = sub.read_u16()?;
            trace!("encoding record {}: subtable format {}", i, format);

            match format {
                0 => return Self::parse_format0(&mut sub),
                4 => return Self::parse_format4(&mut sub),
                _ => {
                    trace!("skipping unsupported cmap subtable format {}", format);
                    continue;
                }
            }
        }

        Err(FontError::NoUsableEncoding)
    }

    fn parse_format0(sub: &mut ByteReader<'_>) -> Result<Encoder> {
        sub.seek(6)?;
        let mut glyph_ids = [0u8; 256];
        for slot in &mut glyph_ids {
            *slot = sub.read_u8()?;
        }
        Ok(Encoder::Format0 { glyph_ids })
    }

    fn parse_format4(sub: &mut ByteReader<'_>) -> Result<Encoder> {
        sub.skip(4)?; // length, language
        let seg_count_x2 = sub.read_u16()?;
        let segment_count = (seg_count_x2 / 2) as usize;
        sub.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut end_count = Vec::with_capacity(segment_count);
        for _ in 0..segment_count {
            end_count.push(sub.read_u16()?);
        }
        sub.skip(2)?; // reservedPad
        let mut start_count = Vec::with_capacity(segment_count);
        for _ in 0..segment_count {
            start_count.push(sub.read_u16()?);
        }
        let mut id_delta = Vec::with_capacity(segment_count);
        for _ in 0..segment_count {
            id_delta.push(sub.read_u16()?);
        }
        let mut id_range_offset = Vec::with_capacity(segment_count);
        for _ in 0..segment_count {
            id_range_offset.push(sub.read_u16()?);
        }

        let mut glyph_id_array = Vec::new();
        while sub.remaining() >= 2 {
            glyph_id_array.push(sub.read_u16()?);
        }

        let segments = (0..segment_count)
            .map(|i| Segment {
                start: start_count[i],
                end: end_count[i],
                id_delta: id_delta[i],
                id_range_offset: id_range_offset[i],
            })
            .collect();

        debug!(
            "cmap format 4: {} segments, {} trailing glyph ids",
            segment_count,
            glyph_id_array.len()
        );

        Ok(Encoder::Format4 {
            segments,
            glyph_id_array,
        })
    }

    /// Resolves a Unicode code point to a glyph index.
    ///
    /// Format 0 treats an unmapped code point as a hard error. Format 4
    /// treats it as the `.notdef` glyph (index 0) and proceeds normally.
    pub fn lookup(&self, code_point: u32) -> Result<u32> {
        match self {
            Encoder::Format0 { glyph_ids } => {
                if code_point > 0xff {
                    return Err(FontError::UnmappedCodePoint { code_point });
                }
                Ok(glyph_ids[code_point as usize] as u32)
            }
            Encoder::Format4 {
                segments,
                glyph_id_array,
            } => {
                if code_point > 0xffff {
                    return Ok(0);
                }
                let c = code_point as u16;
                for (index, seg) in segments.iter().enumerate() {
                    if seg.start <= c && c <= seg.end {
                        if seg.id_range_offset == 0 {
                            return Ok(c.wrapping_add(seg.id_delta) as u32);
                        }
                        let slot = (seg.id_range_offset as usize / 2) + (c - seg.start) as usize
                            - (segments.len() - index);
                        return match glyph_id_array.get(slot) {
                            Some(&gid) => Ok(gid as u32),
                            None => {
                                warn!("format 4 idRangeOffset indexes past glyphIdArray end");
                                Err(FontError::parse(
                                    TABLE,
                                    slot,
                                    "idRangeOffset indirection out of range",
                                ))
                            }
                        };
                    }
                }
                Ok(0)
            }
        }
    }
}
