/// Display list for a mockup scene. The compositor emits these in z-order and
/// the rasterizer replays them; coordinates are logical units.
use super::layout::Point;
use super::text::FontSpec;
use super::theme::Rgba;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(Point),
    LineTo(Point),
    /// Circular arc from `start` to `end` radians, clockwise in screen space
    Arc { center: Point, radius: f32, start: f32, end: f32 },
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect { x: f32, y: f32, width: f32, height: f32 },
    RoundedRect { x: f32, y: f32, width: f32, height: f32, radius: f32 },
    Circle { center: Point, radius: f32 },
    Path(Vec<PathOp>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    Fill {
        shape: Shape,
        color: Rgba,
    },
    Stroke {
        shape: Shape,
        color: Rgba,
        width: f32,
    },
    /// Text anchored at `(x, y)` per `align`/`baseline`
    Text {
        x: f32,
        y: f32,
        text: String,
        font: FontSpec,
        color: Rgba,
        align: TextAlign,
        baseline: TextBaseline,
    },
    /// The loaded profile picture, clipped to a circle
    Avatar {
        center: Point,
        radius: f32,
    },
}

impl PaintCommand {
    pub fn is_avatar(&self) -> bool {
        matches!(self, PaintCommand::Avatar { .. })
    }
}

/// Builder for `Shape::Path`
#[derive(Debug, Default)]
pub struct PathSpec {
    ops: Vec<PathOp>,
}

impl PathSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.ops.push(PathOp::MoveTo(Point::new(x, y)));
        self
    }

    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.ops.push(PathOp::LineTo(Point::new(x, y)));
        self
    }

    pub fn arc(mut self, cx: f32, cy: f32, radius: f32, start: f32, end: f32) -> Self {
        self.ops.push(PathOp::Arc { center: Point::new(cx, cy), radius, start, end });
        self
    }

    pub fn close(mut self) -> Self {
        self.ops.push(PathOp::Close);
        self
    }

    pub fn build(self) -> Shape {
        Shape::Path(self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_spec_records_ops_in_order() {
        let shape = PathSpec::new().move_to(0.0, 0.0).line_to(1.0, 1.0).close().build();
        match shape {
            Shape::Path(ops) => {
                assert_eq!(ops.len(), 3);
                assert_eq!(ops[2], PathOp::Close);
            }
            _ => panic!("unexpected"),
        }
    }

    #[test]
    fn avatar_command_is_tagged() {
        let cmd = PaintCommand::Avatar { center: Point::new(1.0, 2.0), radius: 3.0 };
        assert!(cmd.is_avatar());
        let fill = PaintCommand::Fill {
            shape: Shape::Circle { center: Point::new(0.0, 0.0), radius: 1.0 },
            color: Rgba::rgb(0, 0, 0),
        };
        assert!(!fill.is_avatar());
    }
}
