use log::debug;

use crate::cmap::Encoder;
use crate::directory::TableDirectory;
use crate::error::Result;
use crate::glyf::GlyphLoader;
use crate::raster::{self, Bitmap, RasterConfig};
use crate::reader::ByteReader;

/// Loads and renders glyphs from a single in-memory TrueType font.
///
/// Owns its byte buffer; every table view cut from it borrows from `self`.
/// Single-threaded and synchronous: `render` allocates fresh working state
/// per call, so concurrent calls on distinct `Parser`s over distinct buffers
/// are safe, but there is no shared mutable state to make one `Parser`
/// usable from multiple threads at once beyond ordinary `&self` sharing.
pub struct Parser {
    font: Vec<u8>,
    directory: TableDirectory,
    encoder: Encoder,
    units_per_em: f32,
    loca_offset: u32,
    glyf_offset: u32,
    long_loca: bool,
    max_component_depth: u16,
    config: RasterConfig,
}

impl Parser {
    /// Builds the table directory, selects a cmap encoder, and reads the
    /// global metrics (`unitsPerEm`, `indexToLocFormat`, `maxComponentDepth`)
    /// needed by every subsequent `render` call.
    pub fn open(bytes: Vec<u8>) -> Result<Parser> {
        let mut reader = ByteReader::new(&bytes, "sfnt");
        let directory = TableDirectory::parse(&mut reader)?;

        let cmap_offset = directory.offset("cmap")?;
        let encoder = Encoder::select(&bytes, cmap_offset)?;

        let head_offset = directory.offset("head")?;
        let mut head = ByteReader::new(&bytes[head_offset as usize..], "head");
        head.seek(18)?;
        let units_per_em = head.read_u16()? as f32;
        head.seek(50)?;
        let index_to_loc_format = head.read_i16()?;
        let long_loca = index_to_loc_format != 0;

        let maxp_offset = directory.offset("maxp")?;
        let mut maxp = ByteReader::new(&bytes[maxp_offset as usize..], "maxp");
        maxp.seek(30)?;
        let max_component_depth = maxp.read_u16()?;

        let loca_offset = directory.offset("loca")?;
        let glyf_offset = directory.offset("glyf")?;

        debug!(
            "font opened: unitsPerEm={}, long_loca={}, maxComponentDepth={}",
            units_per_em, long_loca, max_component_depth
        );

        Ok(Parser {
            font: bytes,
            directory,
            encoder,
            units_per_em,
            loca_offset,
            glyf_offset,
            long_loca,
            max_component_depth,
            config: RasterConfig::default(),
        })
    }

    /// Overrides the active [`RasterConfig`] (currently just `dpi`).
    pub fn with_config(mut self, config: RasterConfig) -> Parser {
        self.config = config;
        self
    }

    /// Resolves `code_point` to a glyph, loads its outline (recursively
    /// composing compound glyphs), and rasterizes it at `point_size` points
    /// using the parser's active `RasterConfig`.
    pub fn render(&self, code_point: u32, point_size: f32) -> Result<Bitmap> {
        let glyph_index = self.encoder.lookup(code_point)?;

        let loader = GlyphLoader {
            font: &self.font,
            loca_offset: self.loca_offset,
            glyf_offset: self.glyf_offset,
            long_loca: self.long_loca,
            max_component_depth: self.max_component_depth,
        };
        let description = loader.load(glyph_index)?;

        raster::render(
            &description.mesh,
            description.bbox.x_min,
            description.bbox.y_min,
            description.bbox.x_max,
            description.bbox.y_max,
            self.units_per_em,
            point_size,
            self.config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The bytes of glyph 1: a triangle, one contour, 3 on-curve points,
    /// long (16-bit) coordinate deltas. Built standalone so its length can
    /// be measured instead of hand-computed.
    fn triangle_glyph_bytes() -> Vec<u8> {
        let mut g = Vec::new();
        g.extend_from_slice(&1i16.to_be_bytes()); // numberOfContours
        g.extend_from_slice(&0i16.to_be_bytes()); // xMin
        g.extend_from_slice(&0i16.to_be_bytes()); // yMin
        g.extend_from_slice(&1000i16.to_be_bytes()); // xMax
        g.extend_from_slice(&1000i16.to_be_bytes()); // yMax
        g.extend_from_slice(&2u16.to_be_bytes()); // contourEnds[0] = 2
        g.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
        let plain_flag = 1u8; // on-curve only
        g.push(plain_flag);
        g.push(plain_flag);
        g.push(plain_flag);
        // xs deltas: 0 -> 1000 -> -500 (cumulative: 0, 1000, 500)
        g.extend_from_slice(&0i16.to_be_bytes());
        g.extend_from_slice(&1000i16.to_be_bytes());
        g.extend_from_slice(&(-500i16).to_be_bytes());
        // ys deltas: 0 -> 0 -> 1000 (cumulative: 0, 0, 1000)
        g.extend_from_slice(&0i16.to_be_bytes());
        g.extend_from_slice(&0i16.to_be_bytes());
        g.extend_from_slice(&1000i16.to_be_bytes());
        // glyf entries are padded to an even length (the short loca format
        // stores offsets pre-halved).
        if g.len() % 2 != 0 {
            g.push(0);
        }
        g
    }

    fn build_font() -> Vec<u8> {
        // Minimal sfnt: head, maxp, cmap (format 0, identity-ish), loca,
        // glyf with a single triangle glyph at index 1 and an empty .notdef.
        let num_tables = 5u16;
        let header_len = 12 + 16 * num_tables as usize;

        let head_len = 54;
        let maxp_len = 32;
        let cmap_len = 12 + 262; // encoding-record header (12) + format-0 subtable (6 + 256)
        let loca_len = 2 * 3; // 3 entries (short format, 2 glyphs)

        let glyph1_bytes = triangle_glyph_bytes();
        let glyf_len = glyph1_bytes.len();

        let head_off = header_len;
        let maxp_off = head_off + head_len;
        let cmap_off = maxp_off + maxp_len;
        let loca_off = cmap_off + cmap_len;
        let glyf_off = loca_off + loca_len;

        let mut buf = Vec::new();
        buf.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        buf.extend_from_slice(&num_tables.to_be_bytes());
        buf.extend_from_slice(&[0u8; 6]);

        let mut directory_entries: Vec<(&str, u32, u32)> = vec![
            ("head", head_off as u32, head_len as u32),
            ("maxp", maxp_off as u32, maxp_len as u32),
            ("cmap", cmap_off as u32, cmap_len as u32),
            ("loca", loca_off as u32, loca_len as u32),
            ("glyf", glyf_off as u32, glyf_len as u32),
        ];
        directory_entries.sort_by_key(|e| e.0);
        for (tag, off, len) in &directory_entries {
            buf.extend_from_slice(tag.as_bytes());
            buf.extend_from_slice(&0u32.to_be_bytes());
            buf.extend_from_slice(&off.to_be_bytes());
            buf.extend_from_slice(&len.to_be_bytes());
        }

        // head table
        assert_eq!(buf.len(), head_off);
        buf.extend_from_slice(&[0u8; 18]);
        buf.extend_from_slice(&1000u16.to_be_bytes()); // unitsPerEm @18
        buf.extend_from_slice(&[0u8; 30]); // pad to offset 50 (18+2+30=50)
        buf.extend_from_slice(&0i16.to_be_bytes()); // indexToLocFormat @50 = short
        buf.extend_from_slice(&[0u8; 2]);
        assert_eq!(buf.len(), head_off + head_len);

        // maxp table
        assert_eq!(buf.len(), maxp_off);
        buf.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
        buf.extend_from_slice(&2u16.to_be_bytes()); // numGlyphs
        buf.extend_from_slice(&[0u8; 24]); // pad to offset 30 (4+2+24=30)
        buf.extend_from_slice(&1u16.to_be_bytes()); // maxComponentDepth @30
        assert_eq!(buf.len(), maxp_off + maxp_len);

        // cmap table: format 0, maps 'A' (0x41) -> glyph 1.
        assert_eq!(buf.len(), cmap_off);
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&12u32.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes()); // format
        buf.extend_from_slice(&262u16.to_be_bytes()); // length
        buf.extend_from_slice(&0u16.to_be_bytes()); // language
        let mut table = [0u8; 256];
        table[0x41] = 1;
        buf.extend_from_slice(&table);
        assert_eq!(buf.len(), cmap_off + cmap_len);

        // loca table (short format): notdef empty, glyph1 occupies the rest.
        assert_eq!(buf.len(), loca_off);
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&((glyf_len / 2) as u16).to_be_bytes());
        assert_eq!(buf.len(), loca_off + loca_len);

        // glyf table: glyph 1 is a triangle, 3 on-curve points, 1 contour.
        assert_eq!(buf.len(), glyf_off);
        buf.extend_from_slice(&glyph1_bytes);

        buf
    }

    #[test]
    fn open_reads_global_metrics() {
        let font = build_font();
        let parser = Parser::open(font).unwrap();
        assert_eq!(parser.units_per_em, 1000.0);
        assert_eq!(parser.max_component_depth, 1);
        assert!(!parser.long_loca);
    }

    #[test]
    fn render_produces_a_filled_triangle_bitmap() {
        let font = build_font();
        let parser = Parser::open(font).unwrap();
        let bitmap = parser.render('A' as u32, 12.0).unwrap();
        assert!(bitmap.width > 0 && bitmap.height > 0);
        let mut any_filled = false;
        for y in 0..bitmap.height {
            for x in 0..bitmap.width {
                if bitmap.pixel(x, y) == 0xFF {
                    any_filled = true;
                }
            }
        }
        assert!(any_filled);
    }

    #[test]
    fn with_config_overrides_dpi() {
        let font = build_font();
        let parser = Parser::open(font)
            .unwrap()
            .with_config(RasterConfig { dpi: 48.0 });
        let bitmap = parser.render('A' as u32, 12.0).unwrap();
        // half the default dpi halves raster-space extent roughly.
        assert!(bitmap.width < 600);
    }
}
