use std::fs;
use std::path::PathBuf;

use clap::Parser as ClapParser;
use truetype_raster::{Parser, RasterConfig};

/// Renders a single character from a TrueType font to a PNG.
#[derive(ClapParser)]
struct Args {
    /// Path to a .ttf file.
    font: PathBuf,

    /// Character to render.
    #[arg(short, long, default_value = "A")]
    char: char,

    /// Point size.
    #[arg(short, long, default_value_t = 12.0)]
    point_size: f32,

    /// Output PNG path.
    #[arg(short, long, default_value = "glyph.png")]
    out: PathBuf,

    /// Override dpi (default matches the library's RasterConfig default).
    #[arg(long)]
    dpi: Option<f32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let bytes = fs::read(&args.font)?;
    let mut parser = Parser::open(bytes)?;
    if let Some(dpi) = args.dpi {
        parser = parser.with_config(RasterConfig { dpi });
    }

    let bitmap = parser.render(args.char as u32, args.point_size)?;

    let image = image::GrayImage::from_fn(bitmap.width as u32, bitmap.height as u32, |x, y| {
        image::Luma([bitmap.pixel(x as usize, y as usize)])
    });
    image.save(&args.out)?;

    println!(
        "rendered '{}' at {}pt to {} ({}x{})",
        args.char, args.point_size, args.out.display(), bitmap.width, bitmap.height
    );

    Ok(())
}
