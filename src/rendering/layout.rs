/// Geometry for the mockup: fixed panel constants, text wrapping and the
/// message bubble derived from the wrapped text.
///
/// Everything here is in logical (pre-scale) units.
use super::text::{FontSpec, TextMeasurer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Fixed layout constants of the phone canvas
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasGeometry {
    pub width: f32,
    pub height: f32,
    /// Super-sampling factor applied once when rasterizing
    pub scale: u32,
    pub status_bar_height: f32,
    pub header_height: f32,
    pub input_bar_height: f32,
    pub padding: f32,
    /// Bubble width as a fraction of canvas width
    pub bubble_width_ratio: f32,
    pub bubble_radius: f32,
    pub tail_size: f32,
    pub text_padding: f32,
    /// Space reserved under the text for the timestamp
    pub timestamp_strip: f32,
    pub line_height: f32,
    pub min_bubble_height: f32,
    pub message_font: FontSpec,
    pub timestamp_font: FontSpec,
    pub avatar_radius: f32,
}

impl Default for CanvasGeometry {
    fn default() -> Self {
        Self {
            width: 375.0,
            height: 812.0,
            scale: 3,
            status_bar_height: 44.0,
            header_height: 56.0,
            input_bar_height: 50.0,
            padding: 15.0,
            bubble_width_ratio: 0.7,
            bubble_radius: 15.0,
            tail_size: 10.0,
            text_padding: 10.0,
            timestamp_strip: 14.0,
            line_height: 20.0,
            min_bubble_height: 45.0,
            message_font: FontSpec::regular(16.0),
            timestamp_font: FontSpec::regular(11.0),
            avatar_radius: 20.0,
        }
    }
}

impl CanvasGeometry {
    pub fn status_bar(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.status_bar_height)
    }

    pub fn header(&self) -> Rect {
        Rect::new(0.0, self.status_bar_height, self.width, self.header_height)
    }

    pub fn chat_area(&self) -> Rect {
        let top = self.status_bar_height + self.header_height;
        Rect::new(0.0, top, self.width, self.height - top - self.input_bar_height)
    }

    pub fn input_bar(&self) -> Rect {
        let top = self.height - self.input_bar_height;
        Rect::new(0.0, top, self.width, self.input_bar_height)
    }

    pub fn bubble_width(&self) -> f32 {
        self.width * self.bubble_width_ratio
    }

    /// Pixel budget for a line of message text inside the bubble
    pub fn text_budget(&self) -> f32 {
        self.bubble_width() - 2.0 * self.text_padding
    }

    /// Output dimensions in device pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width * self.scale as f32).round() as u32,
            (self.height * self.scale as f32).round() as u32,
        )
    }
}

/// How message text is broken into lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPolicy {
    /// Fixed-length character chunks, ignoring word boundaries
    FixedChars(usize),
    /// Whole words while the measured line fits the bubble's text budget
    WordWidth,
}

impl Default for WrapPolicy {
    fn default() -> Self {
        WrapPolicy::FixedChars(30)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub line_height: f32,
    /// Widest line as measured by the text measurer
    pub measured_width: f32,
}

impl TextBlock {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Split `text` into chunks of `max_chars` characters.
pub fn wrap_fixed(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    chars.chunks(max_chars).map(|chunk| chunk.iter().collect()).collect()
}

/// Greedy word wrap against a pixel `budget`. A word wider than the budget
/// gets a line of its own.
pub fn wrap_words(text: &str, budget: f32, font: FontSpec, measurer: &dyn TextMeasurer) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measurer.measure(&candidate, font) <= budget {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrap the message according to `policy` and measure the result.
pub fn compute_layout(
    message: &str,
    policy: WrapPolicy,
    canvas: &CanvasGeometry,
    measurer: &dyn TextMeasurer,
) -> TextBlock {
    let font = canvas.message_font;
    let lines = match policy {
        WrapPolicy::FixedChars(n) => wrap_fixed(message, n),
        WrapPolicy::WordWidth => wrap_words(message, canvas.text_budget(), font, measurer),
    };
    let measured_width = lines
        .iter()
        .map(|line| measurer.measure(line, font))
        .fold(0.0f32, f32::max);
    TextBlock { lines, line_height: canvas.line_height, measured_width }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
    /// Triangle hanging off the bottom-left corner
    pub tail: [Point; 3],
}

impl BubbleGeometry {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

pub fn bubble_height(canvas: &CanvasGeometry, line_count: usize) -> f32 {
    let content = line_count as f32 * canvas.line_height
        + 2.0 * canvas.text_padding
        + canvas.timestamp_strip;
    content.max(canvas.min_bubble_height)
}

/// Place the bubble at the top-left of the chat area, sized to `block`.
pub fn bubble_geometry(canvas: &CanvasGeometry, block: &TextBlock) -> BubbleGeometry {
    let x = canvas.padding;
    let y = canvas.chat_area().y + canvas.padding;
    let width = canvas.bubble_width();
    let height = bubble_height(canvas, block.line_count());
    let r = canvas.bubble_radius;
    let tail = canvas.tail_size;
    BubbleGeometry {
        x,
        y,
        width,
        height,
        corner_radius: r,
        tail: [
            Point::new(x, y + height - r),
            Point::new(x - tail / 2.0, y + height + tail / 2.0),
            Point::new(x + r, y + height),
        ],
    }
}
