use log::{trace, warn};

use crate::error::{FontError, Result};
use crate::glyf::GlyphMesh;

const TABLE: &str = "raster";
const BEZIER_TOLERANCE: f32 = 1.0;
const SCANLINE_STEP: f32 = 1.0;

/// Rasterization knobs that aren't derived from the font itself.
#[derive(Debug, Clone, Copy)]
pub struct RasterConfig {
    pub dpi: f32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        RasterConfig { dpi: 96.0 }
    }
}

/// A row-major 8-bit coverage bitmap. `0x00` is background, `0xFF` is glyph
/// interior.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pixels: Vec<u8>,
}

impl Bitmap {
    fn new(width: usize, height: usize) -> Self {
        Bitmap {
            width,
            height,
            pixels: vec![0u8; width * height],
        }
    }

    fn store(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = value;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Point {
    x: f32,
    y: f32,
}

fn midpoint(a: Point, b: Point) -> Point {
    Point {
        x: 0.5 * (a.x + b.x),
        y: 0.5 * (a.y + b.y),
    }
}

/// A straight segment between two points, classified on construction into
/// apex (higher y) and base (lower y).
#[derive(Debug, Clone, Copy)]
struct Edge {
    apex: Point,
    base: Point,
    is_vertical: bool,
    m: f32,
    c: f32,
    sclx: f32,
    is_active: bool,
}

impl Edge {
    fn new(p0: Point, p1: Point) -> Self {
        let (apex, base) = if p0.y > p1.y { (p0, p1) } else { (p1, p0) };
        let is_vertical = apex.x == base.x;
        Edge {
            apex,
            base,
            is_vertical,
            m: 0.0,
            c: 0.0,
            sclx: 0.0,
            is_active: false,
        }
    }

    /// Translates the glyph origin to the bounding box's (xMin, yMin), scales
    /// into raster units, then derives the slope/intercept used by the
    /// scanline sweep.
    fn transform(&mut self, x_min: f32, y_min: f32, unit_scale: f32) {
        self.apex.x = (self.apex.x - x_min) * unit_scale;
        self.apex.y = (self.apex.y - y_min) * unit_scale;
        self.base.x = (self.base.x - x_min) * unit_scale;
        self.base.y = (self.base.y - y_min) * unit_scale;

        if !self.is_vertical {
            self.m = (self.apex.y - self.base.y) / (self.apex.x - self.base.x);
            self.c = self.base.y - self.m * self.base.x;
        }
    }
}

struct PendingBezier {
    p0: Point,
    ctrl: Point,
    p1: Point,
}

struct EdgeTable {
    edges: Vec<Edge>,
}

impl EdgeTable {
    fn new() -> Self {
        EdgeTable { edges: Vec::new() }
    }

    fn add_edge(&mut self, p0: Point, p1: Point) {
        if p0.y == p1.y {
            trace!("skipping horizontal edge at y={}", p0.y);
            return;
        }
        self.edges.push(Edge::new(p0, p1));
    }

    /// Iterative midpoint subdivision driven by the perpendicular distance
    /// from the control point to the chord `p0`-`p1`.
    fn add_bezier(&mut self, p0: Point, ctrl: Point, p1: Point) {
        let mut stack = vec![PendingBezier { p0, ctrl, p1 }];

        while let Some(curr) = stack.pop() {
            let (x0, y0) = (curr.ctrl.x, curr.ctrl.y);
            let (x1, y1) = (curr.p0.x, curr.p0.y);
            let (x2, y2) = (curr.p1.x, curr.p1.y);

            let k = (y2 - y1) * x0 - (x2 - x1) * y0 + x2 * y1 - y2 * x1;
            let m = (y2 - y1).powi(2) + (x2 - x1).powi(2);

            let dist = if m == 0.0 { 0.0 } else { k.abs() / m.sqrt() };

            if dist <= BEZIER_TOLERANCE {
                self.add_edge(curr.p0, curr.p1);
                continue;
            }

            let m0 = midpoint(curr.p0, curr.ctrl);
            let m2 = midpoint(curr.ctrl, curr.p1);
            let m1 = midpoint(m0, m2);

            stack.push(PendingBezier { p0: curr.p0, ctrl: m0, p1: m1 });
            stack.push(PendingBezier { p0: m1, ctrl: m2, p1: curr.p1 });
        }
    }
}

/// Walks a contour's on/off-curve point sequence (point 0 always on-curve,
/// per [`crate::glyf`]'s normalization) and emits straight edges for
/// on-on runs, flattened Béziers for on-off-on runs.
fn build_edges(mesh: &GlyphMesh, table: &mut EdgeTable) {
    for contour in &mesh.contours {
        let n = contour.len();
        if n < 2 {
            continue;
        }
        let pt = |i: usize| Point {
            x: contour.xs[i] as f32,
            y: contour.ys[i] as f32,
        };

        let mut i = 0;
        while i < n {
            let next = (i + 1) % n;
            if contour.on_curve(next) {
                table.add_edge(pt(i), pt(next));
                i = next;
            } else {
                let after = (next + 1) % n;
                debug_assert!(contour.on_curve(after), "off-curve pair should have been resolved by glyf normalization");
                table.add_bezier(pt(i), pt(next), pt(after));
                i = after;
            }
            if i == 0 {
                break;
            }
        }
    }
}

/// Converts a glyph mesh into an 8-bit coverage bitmap at the given point
/// size. `units_per_em` comes from the font's `head` table.
pub fn render(
    mesh: &GlyphMesh,
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
    units_per_em: f32,
    point_size: f32,
    config: RasterConfig,
) -> Result<Bitmap> {
    let unit_scale = point_size * config.dpi / units_per_em;

    let mut table = EdgeTable::new();
    build_edges(mesh, &mut table);
    for edge in &mut table.edges {
        edge.transform(x_min, y_min, unit_scale);
    }

    let width = ((x_max - x_min) * unit_scale).ceil().max(0.0) as usize;
    let height = ((y_max - y_min) * unit_scale).ceil().max(0.0) as usize;
    let mut bitmap = Bitmap::new(width, height);

    let mut scanline = 0.5f32;
    while scanline < bitmap.height as f32 {
        let mut crossings = Vec::new();

        for edge in &mut table.edges {
            if edge.is_active {
                if scanline >= edge.apex.y {
                    edge.is_active = false;
                } else {
                    if !edge.is_vertical {
                        edge.sclx += SCANLINE_STEP / edge.m;
                    }
                    crossings.push(edge.sclx);
                }
            } else if scanline >= edge.base.y && scanline < edge.apex.y {
                edge.is_active = true;
                edge.sclx = if edge.is_vertical {
                    edge.base.x
                } else {
                    (scanline - edge.c) / edge.m
                };
                crossings.push(edge.sclx);
            }
        }

        if crossings.len() % 2 != 0 {
            warn!("odd crossing count ({}) at scanline {}", crossings.len(), scanline);
            return Err(FontError::parse(
                TABLE,
                scanline as usize,
                format!("odd-parity crossing count ({}) — malformed outline geometry", crossings.len()),
            ));
        }

        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap());

        for pair in crossings.chunks_exact(2) {
            let xs = pair[0].floor() as isize;
            let xe = pair[1].floor() as isize;
            let mut x = xs;
            while x <= xe {
                if x >= 0 {
                    bitmap.store(x as usize, scanline.floor() as usize, 0xFF);
                }
                x += 1;
            }
        }

        scanline += SCANLINE_STEP;
    }

    Ok(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyf::Contour as GlyfContour;

    fn rect_mesh(x0: i32, y0: i32, x1: i32, y1: i32) -> GlyphMesh {
        GlyphMesh {
            contours: vec![GlyfContour {
                flags: vec![1, 1, 1, 1],
                xs: vec![x0, x0, x1, x1],
                ys: vec![y0, y1, y1, y0],
            }],
        }
    }

    #[test]
    fn vertical_rectangle_has_two_crossings_per_interior_scanline() {
        let mesh = rect_mesh(100, 0, 200, 500);
        let bitmap = render(
            &mesh,
            100.0,
            0.0,
            200.0,
            500.0,
            1000.0,
            1000.0,
            RasterConfig { dpi: 1.0 },
        )
        .unwrap();
        // unit_scale = 1000*1/1000 = 1.0, so bitmap is exactly 100x500.
        assert_eq!(bitmap.width, 100);
        assert_eq!(bitmap.height, 500);
        for y in 10..490 {
            assert_eq!(bitmap.pixel(50, y), 0xFF);
        }
        assert_eq!(bitmap.pixel(0, 250), 0x00);
    }

    #[test]
    fn bitmap_starts_zeroed() {
        let bitmap = Bitmap::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(bitmap.pixel(x, y), 0);
            }
        }
    }

    #[test]
    fn bezier_flattening_terminates_and_bounds_distance() {
        let mut table = EdgeTable::new();
        let p0 = Point { x: 0.0, y: 0.0 };
        let ctrl = Point { x: 50.0, y: 100.0 };
        let p1 = Point { x: 100.0, y: 0.0 };
        table.add_bezier(p0, ctrl, p1);
        assert!(!table.edges.is_empty());
        // every chord's endpoints must lie on the path between p0 and p1 in x.
        for e in &table.edges {
            assert!(e.base.x >= -0.01 && e.apex.x <= 100.01);
        }
    }

    #[test]
    fn horizontal_edges_are_excluded() {
        let mut table = EdgeTable::new();
        table.add_edge(Point { x: 0.0, y: 5.0 }, Point { x: 10.0, y: 5.0 });
        assert!(table.edges.is_empty());
    }
}
