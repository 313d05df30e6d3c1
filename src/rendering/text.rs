//! Font loading, text measurement and glyph rasterization.
//!
//! Faces are resolved once through `fontdb` (configured family list, then the
//! generic sans-serif family, then any face at all) and kept as `ab_glyph`
//! fonts. A [`FontBook`] without faces still measures text with a fixed
//! advance estimate so layout never depends on fonts being installed.

use std::path::PathBuf;

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use log::{debug, warn};
use tiny_skia::{Pixmap, PremultipliedColorU8};

use super::theme::Rgba;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Regular,
    Bold,
}

/// Font size in pixels plus weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub weight: Weight,
}

impl FontSpec {
    pub const fn regular(size: f32) -> Self {
        Self { size, weight: Weight::Regular }
    }

    pub const fn bold(size: f32) -> Self {
        Self { size, weight: Weight::Bold }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self { size: self.size * factor, ..self }
    }
}

/// Font selection for the font book
#[derive(Debug, Clone)]
pub struct FontConfig {
    /// Family names tried in order before the generic sans-serif family
    pub families: Vec<String>,
    /// Explicit font file; overrides the system lookup when readable
    pub path: Option<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            families: ["Arial", "Helvetica", "Liberation Sans", "DejaVu Sans", "Noto Sans"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            path: None,
        }
    }
}

/// Anything that can tell how wide a run of text is.
pub trait TextMeasurer: Send + Sync {
    /// Advance width of `text` in pixels
    fn measure(&self, text: &str, font: FontSpec) -> f32;

    /// `(ascent, descent)` in pixels; descent is negative
    fn vertical_metrics(&self, font: FontSpec) -> (f32, f32);
}

/// Every character advances by `em_ratio × size`.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvance {
    pub em_ratio: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { em_ratio: 0.5 }
    }
}

impl TextMeasurer for FixedAdvance {
    fn measure(&self, text: &str, font: FontSpec) -> f32 {
        text.chars().count() as f32 * font.size * self.em_ratio
    }

    fn vertical_metrics(&self, font: FontSpec) -> (f32, f32) {
        (font.size * 0.8, -font.size * 0.2)
    }
}

pub struct FontBook {
    regular: Option<FontVec>,
    bold: Option<FontVec>,
    estimate: FixedAdvance,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("regular", &self.regular.is_some())
            .field("bold", &self.bold.is_some())
            .finish()
    }
}

impl FontBook {
    /// A font book with no faces. Text is measured by estimate and not drawn.
    pub fn empty() -> Self {
        Self { regular: None, bold: None, estimate: FixedAdvance { em_ratio: 0.55 } }
    }

    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self> {
        let regular = FontVec::try_from_vec(regular)
            .map_err(|e| Error::ConfigError(format!("invalid font data: {e}")))?;
        let bold = match bold {
            Some(data) => Some(
                FontVec::try_from_vec(data)
                    .map_err(|e| Error::ConfigError(format!("invalid bold font data: {e}")))?,
            ),
            None => None,
        };
        Ok(Self { regular: Some(regular), bold, ..Self::empty() })
    }

    /// Resolve faces for `config`. Never fails: a missing font degrades to
    /// estimated metrics and a warning.
    pub fn load(config: &FontConfig) -> Self {
        if let Some(path) = &config.path {
            match std::fs::read(path).map_err(|e| e.to_string()).and_then(|data| {
                Self::from_bytes(data, None).map_err(|e| e.to_string())
            }) {
                Ok(book) => {
                    debug!("Loaded font file {}", path.display());
                    return book;
                }
                Err(e) => warn!("Failed to load font {}: {}; using system fonts", path.display(), e),
            }
        }

        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let mut families: Vec<fontdb::Family> =
            config.families.iter().map(|name| fontdb::Family::Name(name.as_str())).collect();
        families.push(fontdb::Family::SansSerif);

        let load = |weight: fontdb::Weight| -> Option<FontVec> {
            let query = fontdb::Query { families: &families, weight, ..fontdb::Query::default() };
            let id = db.query(&query).or_else(|| db.faces().next().map(|face| face.id))?;
            db.with_face_data(id, |data, index| FontVec::try_from_vec_and_index(data.to_vec(), index).ok())
                .flatten()
        };

        let regular = load(fontdb::Weight::NORMAL);
        let bold = load(fontdb::Weight::BOLD);
        if regular.is_none() {
            warn!("No usable system font found; text will be measured by estimate and not drawn");
        }
        Self { regular, bold, ..Self::empty() }
    }

    /// Whether glyphs can actually be drawn
    pub fn has_glyphs(&self) -> bool {
        self.regular.is_some()
    }

    fn face(&self, weight: Weight) -> Option<&FontVec> {
        match weight {
            Weight::Bold => self.bold.as_ref().or(self.regular.as_ref()),
            Weight::Regular => self.regular.as_ref(),
        }
    }

    /// Draw a single line with its left edge at `x` and baseline at `baseline`,
    /// both in device pixels. `font.size` must already include the surface scale.
    pub fn draw_line(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        font: FontSpec,
        x: f32,
        baseline: f32,
        color: Rgba,
    ) {
        let Some(face) = self.face(font.weight) else {
            return;
        };
        let scale = px_scale(face, font.size);
        let scaled = face.as_scaled(scale);
        let (width, height) = (pixmap.width() as i32, pixmap.height() as i32);
        let pixels = pixmap.pixels_mut();

        let mut caret = x;
        let mut previous = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = face.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let idx = (py * width + px) as usize;
                blend(&mut pixels[idx], color, coverage);
            });
        }
    }
}

impl TextMeasurer for FontBook {
    fn measure(&self, text: &str, font: FontSpec) -> f32 {
        let Some(face) = self.face(font.weight) else {
            return self.estimate.measure(text, font);
        };
        let scaled = face.as_scaled(px_scale(face, font.size));
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        width
    }

    fn vertical_metrics(&self, font: FontSpec) -> (f32, f32) {
        match self.face(font.weight) {
            Some(face) => {
                let scaled = face.as_scaled(px_scale(face, font.size));
                (scaled.ascent(), scaled.descent())
            }
            None => self.estimate.vertical_metrics(font),
        }
    }
}

// ab_glyph scales by ascent-to-descent height; CSS sizes are em sizes.
fn px_scale(face: &FontVec, size: f32) -> PxScale {
    let units_per_em = face.units_per_em().unwrap_or(1000.0);
    PxScale::from(size * face.height_unscaled() / units_per_em)
}

fn blend(dst: &mut PremultipliedColorU8, color: Rgba, coverage: f32) {
    let src_alpha = color.a as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    if src_alpha <= 0.0 {
        return;
    }
    let inv = 1.0 - src_alpha;
    let channel = |s: u8, d: u8| (s as f32 * src_alpha + d as f32 * inv).round().clamp(0.0, 255.0) as u8;
    let a = (src_alpha * 255.0 + dst.alpha() as f32 * inv).round().clamp(0.0, 255.0) as u8;
    let r = channel(color.r, dst.red()).min(a);
    let g = channel(color.g, dst.green()).min(a);
    let b = channel(color.b, dst.blue()).min(a);
    if let Some(out) = PremultipliedColorU8::from_rgba(r, g, b, a) {
        *dst = out;
    }
}
