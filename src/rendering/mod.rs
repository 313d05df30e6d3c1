//! Rendering pipeline: layout, composition into a display list, rasterization
//! and PNG encoding.

pub mod compose;
pub mod encode;
pub mod layout;
pub mod paint;
pub mod raster;
pub mod text;
pub mod theme;

pub use compose::{compose, ComposeContext, Scene};
pub use encode::{encode, filename_for};
pub use layout::{compute_layout, BubbleGeometry, CanvasGeometry, TextBlock, WrapPolicy};
pub use raster::rasterize;
pub use text::{FixedAdvance, FontBook, FontConfig, FontSpec, TextMeasurer};
pub use theme::{Theme, ThemeKind};
