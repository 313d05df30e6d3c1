//! Compositor: turns a request plus its wrapped text into a display list.
//!
//! Sections are emitted strictly in z-order: page background, chat area
//! (wallpaper pattern, bubble), status bar, header, input bar. Every position
//! is derived from [`CanvasGeometry`] and the bubble computed from the
//! [`TextBlock`], never from a fixed bubble height.

use std::f32::consts::PI;

use chrono::{DateTime, FixedOffset};
use rand::Rng;

use super::layout::{bubble_geometry, BubbleGeometry, CanvasGeometry, Point, TextBlock};
use super::paint::{PaintCommand, PathSpec, Shape, TextAlign, TextBaseline};
use super::text::{FontSpec, TextMeasurer};
use super::theme::Theme;
use crate::assets::Avatar;
use crate::clock::{message_time, status_bar_time};

const PATTERN_CELL: f32 = 40.0;
const PATTERN_GLYPH: f32 = 10.0;
// 20% of full opacity
const PATTERN_ALPHA: u8 = 51;

/// Inputs shared by every section of one render
pub struct ComposeContext<'a> {
    pub canvas: &'a CanvasGeometry,
    pub theme: &'a Theme,
    pub measurer: &'a dyn TextMeasurer,
    pub now: DateTime<FixedOffset>,
}

/// A composed mockup, ready to rasterize
#[derive(Debug, Clone)]
pub struct Scene {
    pub commands: Vec<PaintCommand>,
    pub block: TextBlock,
    pub bubble: BubbleGeometry,
    pub width: f32,
    pub height: f32,
    pub scale: u32,
}

pub fn compose<R: Rng>(
    ctx: &ComposeContext<'_>,
    display_name: &str,
    block: TextBlock,
    avatar: &Avatar,
    rng: &mut R,
) -> Scene {
    let canvas = ctx.canvas;
    let bubble = bubble_geometry(canvas, &block);
    let mut out = Vec::with_capacity(256);

    out.push(PaintCommand::Fill {
        shape: Shape::Rect { x: 0.0, y: 0.0, width: canvas.width, height: canvas.height },
        color: ctx.theme.palette.surface,
    });
    chat_area(ctx, &block, &bubble, rng, &mut out);
    status_bar(ctx, &mut out);
    header(ctx, display_name, avatar, &mut out);
    input_bar(ctx, &mut out);

    Scene {
        commands: out,
        block,
        bubble,
        width: canvas.width,
        height: canvas.height,
        scale: canvas.scale,
    }
}

fn text(
    x: f32,
    y: f32,
    content: impl Into<String>,
    font: FontSpec,
    color: super::theme::Rgba,
    align: TextAlign,
    baseline: TextBaseline,
) -> PaintCommand {
    PaintCommand::Text { x, y, text: content.into(), font, color, align, baseline }
}

fn chat_area<R: Rng>(
    ctx: &ComposeContext<'_>,
    block: &TextBlock,
    bubble: &BubbleGeometry,
    rng: &mut R,
    out: &mut Vec<PaintCommand>,
) {
    let canvas = ctx.canvas;
    let palette = &ctx.theme.palette;
    let area = canvas.chat_area();

    out.push(PaintCommand::Fill {
        shape: Shape::Rect { x: area.x, y: area.y, width: area.width, height: area.height },
        color: palette.chat_background,
    });
    if ctx.theme.show_pattern {
        wallpaper(ctx, area.y, area.bottom(), rng, out);
    }

    out.push(PaintCommand::Fill {
        shape: Shape::RoundedRect {
            x: bubble.x,
            y: bubble.y,
            width: bubble.width,
            height: bubble.height,
            radius: bubble.corner_radius,
        },
        color: palette.bubble,
    });
    let [a, b, c] = bubble.tail;
    out.push(PaintCommand::Fill {
        shape: PathSpec::new().move_to(a.x, a.y).line_to(b.x, b.y).line_to(c.x, c.y).close().build(),
        color: palette.bubble,
    });

    let pad = canvas.text_padding;
    for (i, line) in block.lines.iter().enumerate() {
        out.push(text(
            bubble.x + pad,
            bubble.y + pad + i as f32 * block.line_height,
            line.as_str(),
            canvas.message_font,
            palette.text,
            TextAlign::Left,
            TextBaseline::Top,
        ));
    }

    out.push(text(
        bubble.x + bubble.width - pad,
        bubble.y + bubble.height - pad,
        message_time(&ctx.now),
        canvas.timestamp_font,
        palette.text_muted,
        TextAlign::Right,
        TextBaseline::Bottom,
    ));
}

/// One randomly placed outline glyph per grid cell.
fn wallpaper<R: Rng>(
    ctx: &ComposeContext<'_>,
    top: f32,
    bottom: f32,
    rng: &mut R,
    out: &mut Vec<PaintCommand>,
) {
    let color = ctx.theme.palette.chat_pattern.with_alpha(PATTERN_ALPHA);
    let s = PATTERN_GLYPH;
    let jitter = PATTERN_CELL - PATTERN_GLYPH;

    let mut y = top;
    while y < bottom {
        let mut x = 0.0;
        while x < ctx.canvas.width {
            let dx = x + rng.gen::<f32>() * jitter;
            let dy = y + rng.gen::<f32>() * jitter;
            let pick = rng.gen::<f32>();
            let shape = if pick < 0.2 {
                Shape::Circle { center: Point::new(dx + s / 2.0, dy + s / 2.0), radius: s / 2.0 }
            } else if pick < 0.4 {
                Shape::Rect { x: dx, y: dy, width: s, height: s }
            } else if pick < 0.6 {
                PathSpec::new().move_to(dx, dy).line_to(dx + s, dy + s).build()
            } else if pick < 0.8 {
                PathSpec::new()
                    .move_to(dx, dy + s)
                    .line_to(dx + s / 2.0, dy)
                    .line_to(dx + s, dy + s)
                    .close()
                    .build()
            } else {
                PathSpec::new()
                    .move_to(dx, dy)
                    .line_to(dx + s, dy + s)
                    .move_to(dx + s, dy)
                    .line_to(dx, dy + s)
                    .build()
            };
            out.push(PaintCommand::Stroke { shape, color, width: 0.5 });
            x += PATTERN_CELL;
        }
        y += PATTERN_CELL;
    }
}

fn status_bar(ctx: &ComposeContext<'_>, out: &mut Vec<PaintCommand>) {
    let canvas = ctx.canvas;
    let theme = ctx.theme;
    let ink = theme.palette.text;
    let bar = canvas.status_bar();
    let v = bar.height / 2.0 + 5.0;
    let label_font = FontSpec::regular(12.0);

    out.push(PaintCommand::Fill {
        shape: Shape::Rect { x: bar.x, y: bar.y, width: bar.width, height: bar.height },
        color: theme.palette.status_bar,
    });

    // signal strength: three filled, two hollow
    let mut x = canvas.padding;
    let (dot_radius, dot_spacing) = (2.0, 5.0);
    for i in 0..5 {
        let shape = Shape::Circle {
            center: Point::new(x + i as f32 * dot_spacing, v - dot_radius),
            radius: dot_radius,
        };
        out.push(if i < 3 {
            PaintCommand::Fill { shape, color: ink }
        } else {
            PaintCommand::Stroke { shape, color: ink, width: 1.0 }
        });
    }
    x += 5.0 * dot_spacing + 5.0;

    out.push(text(x, v, theme.carrier.as_str(), label_font, ink, TextAlign::Left, TextBaseline::Middle));
    x += ctx.measurer.measure(&theme.carrier, label_font) + 10.0;

    for (radius, start, end) in [(8.0, -0.4, -0.1), (5.0, -0.5, 0.0), (2.0, -0.6, -0.05)] {
        out.push(PaintCommand::Stroke {
            shape: PathSpec::new().arc(x, v, radius, PI * start, PI * end).build(),
            color: ink,
            width: 1.5,
        });
    }

    out.push(text(
        canvas.width / 2.0,
        v,
        status_bar_time(&ctx.now),
        FontSpec::bold(14.0),
        ink,
        TextAlign::Center,
        TextBaseline::Middle,
    ));

    let right = canvas.width - canvas.padding;
    let (bw, bh) = (22.0, 11.0);
    let by = v - bh / 2.0;
    let body_x = right - bw - 5.0;
    out.push(PaintCommand::Stroke {
        shape: Shape::Rect { x: body_x, y: by, width: bw, height: bh },
        color: ink,
        width: 1.0,
    });
    out.push(PaintCommand::Fill {
        shape: Shape::Rect { x: right - 5.0, y: by + bh / 4.0, width: 2.0, height: bh / 2.0 },
        color: ink,
    });
    let level = bw * f32::from(theme.battery.min(100)) / 100.0;
    if level > 2.0 {
        out.push(PaintCommand::Fill {
            shape: Shape::Rect {
                x: body_x + (bw - level) + 1.0,
                y: by + 1.5,
                width: level - 2.0,
                height: bh - 3.0,
            },
            color: ink,
        });
    }
    out.push(text(
        body_x - 5.0,
        v,
        format!("{}%", theme.battery.min(100)),
        label_font,
        ink,
        TextAlign::Right,
        TextBaseline::Middle,
    ));
}

fn header(ctx: &ComposeContext<'_>, display_name: &str, avatar: &Avatar, out: &mut Vec<PaintCommand>) {
    let canvas = ctx.canvas;
    let theme = ctx.theme;
    let palette = &theme.palette;
    let bar = canvas.header();
    let v = bar.center_y();
    let pad = canvas.padding;

    out.push(PaintCommand::Fill {
        shape: Shape::Rect { x: bar.x, y: bar.y, width: bar.width, height: bar.height },
        color: palette.header,
    });

    let chevron = 20.0 / 3.0;
    out.push(PaintCommand::Stroke {
        shape: PathSpec::new()
            .move_to(pad + chevron, v - chevron)
            .line_to(pad, v)
            .line_to(pad + chevron, v + chevron)
            .build(),
        color: palette.accent,
        width: 2.0,
    });
    out.push(text(
        pad + 15.0,
        v,
        theme.back_label.as_str(),
        FontSpec::regular(16.0),
        palette.accent,
        TextAlign::Left,
        TextBaseline::Middle,
    ));

    out.push(text(
        canvas.width / 2.0,
        v - 7.0,
        display_name,
        FontSpec::bold(17.0),
        palette.text,
        TextAlign::Center,
        TextBaseline::Middle,
    ));
    out.push(text(
        canvas.width / 2.0,
        v + 10.0,
        theme.presence.as_str(),
        FontSpec::regular(12.0),
        palette.text_muted,
        TextAlign::Center,
        TextBaseline::Middle,
    ));

    if theme.show_avatar {
        let radius = canvas.avatar_radius;
        let center = Point::new(canvas.width - pad - radius, v);
        out.push(match avatar {
            Avatar::Image(_) => PaintCommand::Avatar { center, radius },
            Avatar::Fallback => PaintCommand::Fill {
                shape: Shape::Circle { center, radius },
                color: palette.avatar_fallback,
            },
        });
    }
}

fn input_bar(ctx: &ComposeContext<'_>, out: &mut Vec<PaintCommand>) {
    let canvas = ctx.canvas;
    let theme = ctx.theme;
    let palette = &theme.palette;
    let bar = canvas.input_bar();
    let v = bar.center_y();
    let pad = canvas.padding;

    out.push(PaintCommand::Stroke {
        shape: PathSpec::new().move_to(0.0, bar.y).line_to(canvas.width, bar.y).build(),
        color: palette.separator,
        width: 0.5,
    });
    out.push(PaintCommand::Fill {
        shape: Shape::Rect { x: bar.x, y: bar.y, width: bar.width, height: bar.height },
        color: palette.input_bar,
    });

    // attachment: ring with an upward arrow
    let icon_r = bar.height / 2.0 - 12.0;
    let icon_x = pad + icon_r;
    out.push(PaintCommand::Stroke {
        shape: Shape::Circle { center: Point::new(icon_x, v), radius: icon_r },
        color: palette.icon_ring,
        width: 1.5,
    });
    let arm = icon_r * 0.4;
    out.push(PaintCommand::Stroke {
        shape: PathSpec::new()
            .move_to(icon_x, v - arm)
            .line_to(icon_x, v + arm)
            .move_to(icon_x - arm, v)
            .line_to(icon_x, v - arm)
            .line_to(icon_x + arm, v)
            .build(),
        color: palette.accent,
        width: 2.0,
    });

    let mic = 25.0;
    let field_x = icon_x + icon_r + 10.0;
    let field_w = canvas.width - field_x - pad - mic - 10.0;
    let field_h = bar.height - 16.0;
    let field = Shape::RoundedRect {
        x: field_x,
        y: v - field_h / 2.0,
        width: field_w,
        height: field_h,
        radius: field_h / 2.0,
    };
    out.push(PaintCommand::Fill { shape: field.clone(), color: palette.input_field });
    out.push(PaintCommand::Stroke { shape: field, color: palette.separator, width: 1.0 });
    out.push(text(
        field_x + 12.0,
        v,
        theme.placeholder.as_str(),
        FontSpec::regular(16.0),
        palette.placeholder,
        TextAlign::Left,
        TextBaseline::Middle,
    ));

    let mic_x = canvas.width - pad - mic / 2.0;
    let head = mic * 0.3;
    out.push(PaintCommand::Stroke {
        shape: PathSpec::new()
            .arc(mic_x, v - 3.0, head, 0.0, 2.0 * PI)
            .move_to(mic_x, v - 3.0 + head)
            .line_to(mic_x, v + 4.0)
            .move_to(mic_x - mic * 0.2, v + 6.0)
            .line_to(mic_x + mic * 0.2, v + 6.0)
            .build(),
        color: palette.accent,
        width: 2.0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::{compute_layout, WrapPolicy};
    use crate::rendering::text::FixedAdvance;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx_parts() -> (CanvasGeometry, Theme, FixedAdvance, DateTime<FixedOffset>) {
        let now = DateTime::parse_from_rfc3339("2024-05-01T14:05:09+00:00").unwrap();
        (CanvasGeometry::default(), Theme::lingo(), FixedAdvance::default(), now)
    }

    fn scene_for(message: &str, avatar: &Avatar, theme: Theme, seed: u64) -> Scene {
        let (canvas, _, measurer, now) = ctx_parts();
        let ctx = ComposeContext { canvas: &canvas, theme: &theme, measurer: &measurer, now };
        let block = compute_layout(message, WrapPolicy::default(), &canvas, &measurer);
        compose(&ctx, "Alice", block, avatar, &mut StdRng::seed_from_u64(seed))
    }

    fn texts(scene: &Scene) -> Vec<&str> {
        scene
            .commands
            .iter()
            .filter_map(|c| match c {
                PaintCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn scene_starts_with_background_and_ends_with_input_bar() {
        let scene = scene_for("Hello", &Avatar::Fallback, Theme::lingo(), 1);
        match &scene.commands[0] {
            PaintCommand::Fill { shape: Shape::Rect { width, height, .. }, .. } => {
                assert_eq!((*width, *height), (375.0, 812.0));
            }
            other => panic!("unexpected first command {other:?}"),
        }
        let t = texts(&scene);
        assert_eq!(*t.last().unwrap(), "Message");
        let hello = t.iter().position(|s| *s == "Hello").unwrap();
        let name = t.iter().position(|s| *s == "Alice").unwrap();
        assert!(hello < name, "bubble text must be drawn before the header");
    }

    #[test]
    fn timestamps_come_from_the_clock() {
        let scene = scene_for("Hello", &Avatar::Fallback, Theme::lingo(), 1);
        let t = texts(&scene);
        assert!(t.contains(&"2:05 PM"));
        assert!(t.contains(&"14:05:09"));
        assert!(t.contains(&"69%"));
    }

    #[test]
    fn fallback_avatar_is_a_solid_circle() {
        let scene = scene_for("Hello", &Avatar::Fallback, Theme::lingo(), 1);
        let red = Theme::lingo().palette.avatar_fallback;
        assert!(scene.commands.iter().any(|c| matches!(
            c,
            PaintCommand::Fill { shape: Shape::Circle { radius, .. }, color } if *radius == 20.0 && *color == red
        )));
        assert!(!scene.commands.iter().any(|c| c.is_avatar()));
    }

    #[test]
    fn loaded_avatar_only_swaps_the_avatar_command() {
        let pixmap = tiny_skia::Pixmap::new(4, 4).unwrap();
        let with = scene_for("Hello world", &Avatar::Image(pixmap), Theme::lingo(), 9);
        let without = scene_for("Hello world", &Avatar::Fallback, Theme::lingo(), 9);
        assert_eq!(with.bubble, without.bubble);
        assert_eq!(with.block, without.block);
        assert!(with.commands.iter().any(|c| c.is_avatar()));
        assert_eq!(with.commands.len(), without.commands.len());
    }

    #[test]
    fn plain_theme_hides_pattern_and_avatar() {
        let scene = scene_for("Hello", &Avatar::Fallback, Theme::plain(), 1);
        let faint = scene.commands.iter().filter(|c| {
            matches!(c, PaintCommand::Stroke { color, .. } if color.a == PATTERN_ALPHA)
        });
        assert_eq!(faint.count(), 0);
        let red = Theme::plain().palette.avatar_fallback;
        assert!(!scene.commands.iter().any(|c| matches!(
            c,
            PaintCommand::Fill { shape: Shape::Circle { .. }, color } if *color == red
        )));
    }

    #[test]
    fn pattern_is_reproducible_per_seed() {
        let a = scene_for("Hello", &Avatar::Fallback, Theme::lingo(), 42);
        let b = scene_for("Hello", &Avatar::Fallback, Theme::lingo(), 42);
        let c = scene_for("Hello", &Avatar::Fallback, Theme::lingo(), 43);
        assert_eq!(a.commands, b.commands);
        assert_ne!(a.commands, c.commands);
    }

    #[test]
    fn one_text_command_per_wrapped_line() {
        let message = "x".repeat(95);
        let scene = scene_for(&message, &Avatar::Fallback, Theme::lingo(), 1);
        assert_eq!(scene.block.line_count(), 4);
        let chunks = texts(&scene).into_iter().filter(|t| t.starts_with('x')).count();
        assert_eq!(chunks, 4);
        assert!(scene.bubble.height > CanvasGeometry::default().min_bubble_height);
    }
}
