//! Replays a [`Scene`] onto a `tiny_skia` surface.
//!
//! Shapes are built in logical units and drawn under one uniform scale
//! transform. Text and the avatar image are positioned in device pixels
//! directly since they bypass the path pipeline.

use std::f32::consts::FRAC_PI_2;

use log::trace;
use tiny_skia::{
    FillRule, FilterQuality, Mask, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use super::compose::Scene;
use super::paint::{PaintCommand, PathOp, Shape, TextAlign, TextBaseline};
use super::text::{FontBook, TextMeasurer};
use super::theme::Rgba;
use crate::assets::Avatar;
use crate::{Error, Result};

/// Rasterize `scene` at its own scale factor.
pub fn rasterize(scene: &Scene, fonts: &FontBook, avatar: &Avatar) -> Result<Pixmap> {
    let s = scene.scale as f32;
    let width = (scene.width * s).round() as u32;
    let height = (scene.height * s).round() as u32;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| Error::RenderError(format!("cannot allocate {}x{} surface", width, height)))?;
    let transform = Transform::from_scale(s, s);

    for command in &scene.commands {
        match command {
            PaintCommand::Fill { shape, color } => {
                if let Some(path) = build_path(shape) {
                    pixmap.fill_path(&path, &paint(*color), FillRule::Winding, transform, None);
                }
            }
            PaintCommand::Stroke { shape, color, width } => {
                if let Some(path) = build_path(shape) {
                    let stroke = Stroke { width: *width, ..Stroke::default() };
                    pixmap.stroke_path(&path, &paint(*color), &stroke, transform, None);
                }
            }
            PaintCommand::Text { x, y, text, font, color, align, baseline } => {
                let advance = fonts.measure(text, *font);
                let left = match align {
                    TextAlign::Left => *x,
                    TextAlign::Center => *x - advance / 2.0,
                    TextAlign::Right => *x - advance,
                };
                let (ascent, descent) = fonts.vertical_metrics(*font);
                let base = match baseline {
                    TextBaseline::Top => *y + ascent,
                    TextBaseline::Middle => *y + (ascent + descent) / 2.0,
                    TextBaseline::Bottom => *y + descent,
                };
                fonts.draw_line(&mut pixmap, text, font.scaled(s), left * s, base * s, *color);
            }
            PaintCommand::Avatar { center, radius } => {
                if let Avatar::Image(image) = avatar {
                    draw_avatar(&mut pixmap, image, center.x * s, center.y * s, radius * s)?;
                }
            }
        }
    }
    trace!("Rasterized {} commands onto {}x{}", scene.commands.len(), width, height);
    Ok(pixmap)
}

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// Stretch `image` over the circle's bounding box and clip it to the circle.
fn draw_avatar(target: &mut Pixmap, image: &Pixmap, cx: f32, cy: f32, r: f32) -> Result<()> {
    let mut mask = Mask::new(target.width(), target.height())
        .ok_or_else(|| Error::RenderError("cannot allocate avatar mask".into()))?;
    let circle = PathBuilder::from_circle(cx, cy, r)
        .ok_or_else(|| Error::RenderError(format!("invalid avatar radius {}", r)))?;
    mask.fill_path(&circle, FillRule::Winding, true, Transform::identity());

    let d = 2.0 * r;
    let placement = Transform::from_row(
        d / image.width() as f32,
        0.0,
        0.0,
        d / image.height() as f32,
        cx - r,
        cy - r,
    );
    let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
    target.draw_pixmap(0, 0, image.as_ref(), &paint, placement, Some(&mask));
    Ok(())
}

fn build_path(shape: &Shape) -> Option<Path> {
    let mut pb = PathBuilder::new();
    match shape {
        Shape::Rect { x, y, width, height } => {
            pb.push_rect(tiny_skia::Rect::from_xywh(*x, *y, *width, *height)?);
        }
        Shape::RoundedRect { x, y, width, height, radius } => {
            let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);
            let (l, t, rt, b) = (*x, *y, x + width, y + height);
            pb.move_to(l + r, t);
            pb.line_to(rt - r, t);
            arc_to(&mut pb, rt - r, t + r, r, -FRAC_PI_2, 0.0);
            pb.line_to(rt, b - r);
            arc_to(&mut pb, rt - r, b - r, r, 0.0, FRAC_PI_2);
            pb.line_to(l + r, b);
            arc_to(&mut pb, l + r, b - r, r, FRAC_PI_2, 2.0 * FRAC_PI_2);
            pb.line_to(l, t + r);
            arc_to(&mut pb, l + r, t + r, r, 2.0 * FRAC_PI_2, 3.0 * FRAC_PI_2);
            pb.close();
        }
        Shape::Circle { center, radius } => {
            pb.push_circle(center.x, center.y, *radius);
        }
        Shape::Path(ops) => {
            let mut open = false;
            for op in ops {
                match *op {
                    PathOp::MoveTo(p) => {
                        pb.move_to(p.x, p.y);
                        open = true;
                    }
                    PathOp::LineTo(p) => {
                        if open {
                            pb.line_to(p.x, p.y);
                        } else {
                            pb.move_to(p.x, p.y);
                            open = true;
                        }
                    }
                    PathOp::Arc { center, radius, start, end } => {
                        let (sx, sy) = polar(center.x, center.y, radius, start);
                        if open {
                            pb.line_to(sx, sy);
                        } else {
                            pb.move_to(sx, sy);
                            open = true;
                        }
                        arc_to(&mut pb, center.x, center.y, radius, start, end);
                    }
                    PathOp::Close => {
                        pb.close();
                        open = false;
                    }
                }
            }
        }
    }
    pb.finish()
}

fn polar(cx: f32, cy: f32, r: f32, angle: f32) -> (f32, f32) {
    (cx + r * angle.cos(), cy + r * angle.sin())
}

/// Append a circular arc as cubic segments of at most a quarter turn each.
/// The current point must already sit at the arc's start.
fn arc_to(pb: &mut PathBuilder, cx: f32, cy: f32, r: f32, start: f32, end: f32) {
    let sweep = end - start;
    if r <= 0.0 || sweep == 0.0 {
        return;
    }
    let segments = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
    let step = sweep / segments as f32;
    let k = 4.0 / 3.0 * (step / 4.0).tan();

    let mut a0 = start;
    for _ in 0..segments {
        let a1 = a0 + step;
        let (x0, y0) = polar(cx, cy, r, a0);
        let (x3, y3) = polar(cx, cy, r, a1);
        pb.cubic_to(
            x0 - k * r * a0.sin(),
            y0 + k * r * a0.cos(),
            x3 + k * r * a1.sin(),
            y3 - k * r * a1.cos(),
            x3,
            y3,
        );
        a0 = a1;
    }
}
