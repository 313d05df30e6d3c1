//! PNG output.
//!
//! The surface is always written as 24-bit RGB first. Palette reduction is a
//! second, optional pass whose result is kept only when it is smaller.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone};
use color_quant::NeuQuant;
use log::{debug, warn};
use tiny_skia::Pixmap;

use crate::Result;

// NeuQuant sampling factor: 1 is slowest/best, 30 fastest
const QUANT_SAMPLE: i32 = 10;

/// Encode `pixmap` as PNG, trying palette reduction when `palette` is set.
pub fn encode(pixmap: &Pixmap, palette: bool) -> Result<Vec<u8>> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let rgb: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue()]
        })
        .collect();
    let raw = write_png(width, height, png::ColorType::Rgb, None, &rgb)?;
    if !palette {
        return Ok(raw);
    }

    match reduce(width, height, &rgb) {
        Ok(reduced) if reduced.len() < raw.len() => {
            debug!("Palette reduction: {} -> {} bytes", raw.len(), reduced.len());
            Ok(reduced)
        }
        Ok(reduced) => {
            debug!("Palette reduction not smaller ({} >= {} bytes), keeping RGB", reduced.len(), raw.len());
            Ok(raw)
        }
        Err(e) => {
            warn!("Palette reduction failed, keeping RGB output: {}", e);
            Ok(raw)
        }
    }
}

fn reduce(width: u32, height: u32, rgb: &[u8]) -> Result<Vec<u8>> {
    let rgba: Vec<u8> = rgb.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect();
    let quant = NeuQuant::new(QUANT_SAMPLE, 256, &rgba);
    let palette = quant.color_map_rgb();

    // mockups reuse few colours; avoid a network search per pixel
    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
    let indices: Vec<u8> = rgb
        .chunks_exact(3)
        .map(|c| {
            let key = [c[0], c[1], c[2]];
            *lookup
                .entry(key)
                .or_insert_with(|| quant.index_of(&[c[0], c[1], c[2], 255]) as u8)
        })
        .collect();

    write_png(width, height, png::ColorType::Indexed, Some(palette), &indices)
}

fn write_png(
    width: u32,
    height: u32,
    color: png::ColorType,
    palette: Option<Vec<u8>>,
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        if let Some(palette) = palette {
            encoder.set_palette(palette);
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(data)?;
        writer.finish()?;
    }
    Ok(out)
}

/// `image-<unix millis>.png`
pub fn filename_for<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    format!("image-{}.png", at.timestamp_millis())
}
