use bitflags::bitflags;
use log::{debug, trace};

use crate::error::{FontError, Result};
use crate::reader::ByteReader;

const TABLE: &str = "glyf";

bitflags! {
    #[derive(Clone, Copy, Debug)]
    struct PointFlags: u8 {
        const ON_CURVE              = 0b0000_0001;
        const X_SHORT               = 0b0000_0010;
        const Y_SHORT                = 0b0000_0100;
        const REPEAT                 = 0b0000_1000;
        const X_SAME_OR_POSITIVE     = 0b0001_0000;
        const Y_SAME_OR_POSITIVE     = 0b0010_0000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug)]
    struct ComponentFlags: u16 {
        const ARGS_ARE_WORDS            = 0x0001;
        const ARGS_ARE_XY_VALUES        = 0x0002;
        const ROUND_XY_TO_GRID          = 0x0004;
        const WE_HAVE_A_SCALE           = 0x0008;
        const MORE_COMPONENTS           = 0x0020;
        const WE_HAVE_AN_X_AND_Y_SCALE  = 0x0040;
        const WE_HAVE_A_TWO_BY_TWO      = 0x0080;
        const WE_HAVE_INSTRUCTIONS      = 0x0100;
        const USE_MY_METRICS            = 0x0200;
        const OVERLAP_COMPOUND          = 0x0400;
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
    }
}

/// A contour's points, stored as parallel arrays. `flags[i] & 1` is the
/// on-curve bit for point `i`. Invariant: `flags[0]` is always on-curve —
/// the loader rotates or synthesises a point to guarantee this.
#[derive(Debug, Clone, Default)]
pub struct Contour {
    pub flags: Vec<u8>,
    pub xs: Vec<i32>,
    pub ys: Vec<i32>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn on_curve(&self, i: usize) -> bool {
        self.flags[i] & PointFlags::ON_CURVE.bits() != 0
    }
}

/// An ordered sequence of contours. A compound glyph's mesh is the
/// concatenation of its transformed component meshes.
#[derive(Debug, Clone, Default)]
pub struct GlyphMesh {
    pub contours: Vec<Contour>,
}

impl GlyphMesh {
    fn extend(&mut self, other: GlyphMesh) {
        self.contours.extend(other.contours);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

#[derive(Debug, Clone, Default)]
pub struct GlyphDescription {
    pub mesh: GlyphMesh,
    pub bbox: BoundingBox,
}

/// Read-only context a glyph load needs: the font bytes, the `glyf`/`loca`
/// table offsets, the loca width, and the compound recursion bound.
pub struct GlyphLoader<'a> {
    pub font: &'a [u8],
    pub loca_offset: u32,
    pub glyf_offset: u32,
    pub long_loca: bool,
    pub max_component_depth: u16,
}

impl<'a> GlyphLoader<'a> {
    pub fn load(&self, glyph_index: u32) -> Result<GlyphDescription> {
        self.load_depth(glyph_index, 0)
    }

    fn glyph_byte_range(&self, glyph_index: u32) -> Result<(u32, u32)> {
        let loca_bytes = self
            .font
            .get(self.loca_offset as usize..)
            .ok_or_else(|| FontError::parse("loca", self.loca_offset as usize, "table offset past end of font"))?;
        let mut r = ByteReader::new(loca_bytes, "loca");
        if self.long_loca {
            r.seek(4 * glyph_index as usize)?;
            let start = r.read_u32()?;
            let end = r.read_u32()?;
            Ok((start, end))
        } else {
            r.seek(2 * glyph_index as usize)?;
            let start = r.read_u16()? as u32 * 2;
            let end = r.read_u16()? as u32 * 2;
            Ok((start, end))
        }
    }

    fn load_depth(&self, glyph_index: u32, depth: u16) -> Result<GlyphDescription> {
        let (start, end) = self.glyph_byte_range(glyph_index)?;
        if end == start {
            trace!("glyph {} has no outline (zero-length loca entry)", glyph_index);
            return Ok(GlyphDescription::default());
        }

        let glyph_bytes = self
            .font
            .get(self.glyf_offset as usize + start as usize..self.glyf_offset as usize + end as usize)
            .ok_or_else(|| FontError::parse(TABLE, self.glyf_offset as usize + start as usize, "glyph range past end of font"))?;
        let mut reader = ByteReader::new(glyph_bytes, TABLE);

        let contour_count = reader.read_i16()?;
        let x_min = reader.read_i16()? as f32;
        let y_min = reader.read_i16()? as f32;
        let x_max = reader.read_i16()? as f32;
        let y_max = reader.read_i16()? as f32;
        let bbox = BoundingBox { x_min, y_min, x_max, y_max };

        if contour_count >= 0 {
            let mesh = self.load_simple(&mut reader, contour_count as usize)?;
            Ok(GlyphDescription { mesh, bbox })
        } else {
            if depth >= self.max_component_depth {
                return Err(FontError::parse(
                    TABLE,
                    reader.position(),
                    "compound glyph exceeds maxp.maxComponentDepth",
                ));
            }
            let mesh = self.load_compound(&mut reader, depth)?;
            Ok(GlyphDescription { mesh, bbox })
        }
    }

    fn load_simple(&self, reader: &mut ByteReader<'_>, contour_count: usize) -> Result<GlyphMesh> {
        let mut contour_ends = Vec::with_capacity(contour_count);
        for _ in 0..contour_count {
            contour_ends.push(reader.read_u16()?);
        }

        let instruction_length = reader.read_u16()?;
        reader.skip(instruction_length as usize)?;

        if contour_ends.is_empty() {
            return Ok(GlyphMesh::default());
        }
        let total_points = contour_ends[contour_ends.len() - 1] as usize + 1;

        let flags = Self::decode_flags(reader, total_points)?;
        let xs = Self::decode_axis(reader, &flags, PointFlags::X_SHORT, PointFlags::X_SAME_OR_POSITIVE)?;
        let ys = Self::decode_axis(reader, &flags, PointFlags::Y_SHORT, PointFlags::Y_SAME_OR_POSITIVE)?;

        debug!("simple glyph: {} contours, {} points", contour_count, total_points);

        let mut contours = Vec::with_capacity(contour_count);
        let mut start = 0usize;
        for &end in &contour_ends {
            let end = end as usize;
            let raw = Contour {
                flags: flags[start..=end].to_vec(),
                xs: xs[start..=end].to_vec(),
                ys: ys[start..=end].to_vec(),
            };
            contours.push(Self::normalize_contour(raw));
            start = end + 1;
        }

        Ok(GlyphMesh { contours })
    }

    fn decode_flags(reader: &mut ByteReader<'_>, target_len: usize) -> Result<Vec<u8>> {
        let mut flags = Vec::with_capacity(target_len);
        while flags.len() < target_len {
            let f = reader.read_u8()?;
            let repeat = if PointFlags::from_bits_truncate(f).contains(PointFlags::REPEAT) {
                reader.read_u8()?
            } else {
                0
            };
            for _ in 0..=repeat {
                flags.push(f);
            }
        }
        Ok(flags)
    }

    fn decode_axis(
        reader: &mut ByteReader<'_>,
        flags: &[u8],
        short_bit: PointFlags,
        dual_bit: PointFlags,
    ) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(flags.len());
        let mut accumulator: i32 = 0;
        for &raw in flags {
            let f = PointFlags::from_bits_truncate(raw);
            let delta = if f.contains(short_bit) {
                let d = reader.read_u8()? as i32;
                if f.contains(dual_bit) {
                    d
                } else {
                    -d
                }
            } else if f.contains(dual_bit) {
                0
            } else {
                reader.read_i16()? as i32
            };
            accumulator += delta;
            out.push(accumulator);
        }
        Ok(out)
    }

    /// Rotates (or, if every point is off-curve, synthesises) the contour so
    /// its first point is on-curve, then inserts an implicit on-curve
    /// midpoint between every consecutive pair of off-curve points.
    fn normalize_contour(raw: Contour) -> Contour {
        let n = raw.len();
        if n == 0 {
            return raw;
        }

        let first_on_curve = (0..n).find(|&i| raw.flags[i] & PointFlags::ON_CURVE.bits() != 0);

        let (flags, xs, ys): (Vec<u8>, Vec<i32>, Vec<i32>) = match first_on_curve {
            Some(0) => (raw.flags, raw.xs, raw.ys),
            Some(idx) => {
                let mut flags = raw.flags[idx..].to_vec();
                flags.extend_from_slice(&raw.flags[..idx]);
                let mut xs = raw.xs[idx..].to_vec();
                xs.extend_from_slice(&raw.xs[..idx]);
                let mut ys = raw.ys[idx..].to_vec();
                ys.extend_from_slice(&raw.ys[..idx]);
                (flags, xs, ys)
            }
            None => {
                let mx = (raw.xs[n - 1] + raw.xs[0]) / 2;
                let my = (raw.ys[n - 1] + raw.ys[0]) / 2;
                let mut flags = vec![PointFlags::ON_CURVE.bits()];
                flags.extend_from_slice(&raw.flags);
                let mut xs = vec![mx];
                xs.extend_from_slice(&raw.xs);
                let mut ys = vec![my];
                ys.extend_from_slice(&raw.ys);
                (flags, xs, ys)
            }
        };

        // point 0 is now guaranteed on-curve, so a consecutive-pair scan
        // (no wraparound) already covers every off/off boundary.
        let n = flags.len();
        let mut out = Contour {
            flags: Vec::with_capacity(n),
            xs: Vec::with_capacity(n),
            ys: Vec::with_capacity(n),
        };
        for i in 0..n {
            out.flags.push(flags[i]);
            out.xs.push(xs[i]);
            out.ys.push(ys[i]);
            if i + 1 < n {
                let this_on = flags[i] & PointFlags::ON_CURVE.bits() != 0;
                let next_on = flags[i + 1] & PointFlags::ON_CURVE.bits() != 0;
                if !this_on && !next_on {
                    out.flags.push(PointFlags::ON_CURVE.bits());
                    out.xs.push((xs[i] + xs[i + 1]) / 2);
                    out.ys.push((ys[i] + ys[i + 1]) / 2);
                }
            }
        }
        out
    }

    fn load_compound(&self, reader: &mut ByteReader<'_>, depth: u16) -> Result<GlyphMesh> {
        let mut mesh = GlyphMesh::default();

        loop {
            let flags = ComponentFlags::from_bits_truncate(reader.read_u16()?);
            let glyph_index = reader.read_u16()? as u32;

            let (arg1, arg2) = if flags.contains(ComponentFlags::ARGS_ARE_WORDS) {
                (reader.read_i16()? as i32, reader.read_i16()? as i32)
            } else {
                (reader.read_i8()? as i32, reader.read_i8()? as i32)
            };

            if !flags.contains(ComponentFlags::ARGS_ARE_XY_VALUES) {
                return Err(FontError::parse(
                    TABLE,
                    reader.position(),
                    "unsupported: point-alignment compound component",
                ));
            }

            let (a, b, c, d) = if flags.contains(ComponentFlags::WE_HAVE_A_SCALE) {
                let s = f2dot14(reader.read_i16()?);
                (s, 0.0, 0.0, s)
            } else if flags.contains(ComponentFlags::WE_HAVE_AN_X_AND_Y_SCALE) {
                let x = f2dot14(reader.read_i16()?);
                let y = f2dot14(reader.read_i16()?);
                (x, 0.0, 0.0, y)
            } else if flags.contains(ComponentFlags::WE_HAVE_A_TWO_BY_TWO) {
                let a = f2dot14(reader.read_i16()?);
                let b = f2dot14(reader.read_i16()?);
                let c = f2dot14(reader.read_i16()?);
                let d = f2dot14(reader.read_i16()?);
                (a, b, c, d)
            } else {
                (1.0, 0.0, 0.0, 1.0)
            };

            trace!("compound component: glyph {}, matrix ({},{},{},{})", glyph_index, a, b, c, d);

            let child = self.load_depth(glyph_index, depth + 1)?;

            let mut m = a.abs().max(b.abs());
            let mut n = c.abs().max(d.abs());
            if !flags.contains(ComponentFlags::UNSCALED_COMPONENT_OFFSET) {
                if (a.abs() - c.abs()).abs() <= 33.0 / 65536.0 {
                    m *= 2.0;
                }
                if (b.abs() - d.abs()).abs() <= 33.0 / 65536.0 {
                    n *= 2.0;
                }
            }
            let tx = m * arg1 as f32;
            let ty = n * arg2 as f32;

            let mut transformed = child.mesh;
            for contour in &mut transformed.contours {
                for i in 0..contour.len() {
                    let x = contour.xs[i] as f32;
                    let y = contour.ys[i] as f32;
                    contour.xs[i] = (a * x + c * y + tx).round() as i32;
                    contour.ys[i] = (b * x + d * y + ty).round() as i32;
                }
            }
            mesh.extend(transformed);

            if !flags.contains(ComponentFlags::MORE_COMPONENTS) {
                break;
            }
        }

        Ok(mesh)
    }
}

/// Decodes a 2.14 fixed-point value: top two bits are a signed integer part,
/// the low 14 bits an unsigned fraction.
fn f2dot14(raw: i16) -> f32 {
    raw as f32 / 16384.0
}
