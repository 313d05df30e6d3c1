//! fakechat
//!
//! Renders fake chat-application screenshots: an iOS-style phone frame with a
//! status bar, a header carrying the contact's name and avatar, a single
//! incoming message bubble and an input bar. The output is a PNG at three
//! times the logical 375×812 resolution.
//!
//! # Features
//!
//! - **Deterministic pipeline**: validate, layout, resolve avatar, compose,
//!   rasterize, encode. Clock, fonts, avatar loader and pattern seed are
//!   injectable.
//! - **Graceful assets**: an unreachable or broken avatar never fails a
//!   render; a solid placeholder circle is drawn instead.
//! - **Server** (default feature): a small HTTP API plus a cleanup timer for
//!   the generated files.
//!
//! # Example
//!
//! ```no_run
//! use fakechat::{MockupConfig, RenderRequest, Renderer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MockupConfig { pattern_seed: Some(7), ..Default::default() };
//! let renderer = Renderer::new(config)?;
//! let image = renderer.render(&RenderRequest::new("Alice", "Hello there!"))?;
//! std::fs::write(&image.filename, &image.bytes)?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, OnceLock};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub mod error;
pub use error::{Error, Result};

pub mod assets;
pub mod clock;
pub mod rendering;
pub mod storage;

// Worker pool facade for async callers
pub mod async_api;

#[cfg(feature = "server")]
pub mod server;

pub use assets::{AssetConfig, Avatar, DefaultLoader, ImageLoader};
pub use async_api::AsyncRenderer;
pub use clock::{Clock, FixedClock, SystemClock};
pub use rendering::{
    BubbleGeometry, CanvasGeometry, FixedAdvance, FontBook, FontConfig, TextMeasurer, Theme, ThemeKind,
    WrapPolicy,
};
pub use storage::DirectoryStore;

use rendering::{compose, compute_layout, encode, filename_for, rasterize, ComposeContext};

/// Configuration for a [`Renderer`]
///
/// The defaults reproduce the stock mockup: the `lingo` theme, 30-character
/// line chunks, system fonts, palette reduction on and a fresh random
/// wallpaper per render.
///
/// # Examples
///
/// ```
/// let cfg = fakechat::MockupConfig::default();
/// assert_eq!(cfg.canvas.pixel_size(), (1125, 2436));
/// assert!(cfg.palette_reduction);
/// ```
#[derive(Debug, Clone)]
pub struct MockupConfig {
    /// Canvas constants (logical size, scale, panel heights, fonts)
    pub canvas: CanvasGeometry,
    /// Theme used when a request does not pick one
    pub theme: Theme,
    /// How message text is broken into lines
    pub wrap: WrapPolicy,
    /// Font lookup
    pub fonts: FontConfig,
    /// Avatar fetching limits
    pub assets: AssetConfig,
    /// Try an indexed-palette PNG and keep it when smaller
    pub palette_reduction: bool,
    /// Seed for the wallpaper pattern; `None` draws from OS entropy
    pub pattern_seed: Option<u64>,
}

impl Default for MockupConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasGeometry::default(),
            theme: Theme::default(),
            wrap: WrapPolicy::default(),
            fonts: FontConfig::default(),
            assets: AssetConfig::default(),
            palette_reduction: true,
            pattern_seed: None,
        }
    }
}

impl MockupConfig {
    pub fn validate(&self) -> Result<()> {
        let c = &self.canvas;
        if c.scale == 0 {
            return Err(Error::ConfigError("scale must be at least 1".into()));
        }
        if !(c.width > 0.0 && c.height > 0.0) {
            return Err(Error::ConfigError(format!("invalid canvas size {}x{}", c.width, c.height)));
        }
        if c.status_bar_height + c.header_height + c.input_bar_height >= c.height {
            return Err(Error::ConfigError("panels leave no room for the chat area".into()));
        }
        if let WrapPolicy::FixedChars(0) = self.wrap {
            return Err(Error::ConfigError("wrap width must be at least one character".into()));
        }
        Ok(())
    }
}

/// What to render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub display_name: String,
    pub message: String,
    /// Avatar reference: URL, `data:` URI or path
    pub profile: Option<String>,
    /// Overrides the configured theme
    pub theme: Option<ThemeKind>,
}

impl RenderRequest {
    pub fn new(display_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), message: message.into(), profile: None, theme: None }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_theme(mut self, theme: ThemeKind) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Reject blank names and messages
    pub fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(Error::ValidationError("display name must not be empty".into()));
        }
        if self.message.trim().is_empty() {
            return Err(Error::ValidationError("message must not be empty".into()));
        }
        Ok(())
    }
}

/// An encoded mockup
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// PNG file contents
    pub bytes: Vec<u8>,
    /// `image-<unix millis>.png`
    pub filename: String,
    /// Pixel width (logical width × scale)
    pub width: u32,
    /// Pixel height (logical height × scale)
    pub height: u32,
    /// Wrapped message lines
    pub lines: Vec<String>,
    /// Bubble placement in logical units
    pub bubble: BubbleGeometry,
    /// Whether the placeholder circle was drawn instead of an avatar
    pub avatar_fallback: bool,
}

/// Runs the mockup pipeline
///
/// A `Renderer` is not shared between threads by the worker pool; each worker
/// owns one. The font book is shared through an `Arc`.
pub struct Renderer {
    config: MockupConfig,
    fonts: Arc<FontBook>,
    loader: Box<dyn ImageLoader>,
    clock: Box<dyn Clock>,
}

impl Renderer {
    /// Create a renderer, loading fonts per `config.fonts`.
    pub fn new(config: MockupConfig) -> Result<Self> {
        let fonts = Arc::new(FontBook::load(&config.fonts));
        Self::from_parts(config, fonts)
    }

    /// Create a renderer around an already loaded font book.
    pub fn from_parts(config: MockupConfig, fonts: Arc<FontBook>) -> Result<Self> {
        config.validate()?;
        let loader = DefaultLoader::new(config.assets.clone())?;
        Ok(Self { config, fonts, loader: Box::new(loader), clock: Box::new(SystemClock) })
    }

    pub fn with_loader(mut self, loader: impl ImageLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &MockupConfig {
        &self.config
    }

    pub fn fonts(&self) -> &Arc<FontBook> {
        &self.fonts
    }

    /// Render one mockup. Only validation and encoding can fail; avatar
    /// problems degrade to the placeholder.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderedImage> {
        request.validate()?;

        let now = self.clock.now();
        let canvas = &self.config.canvas;
        let theme = match request.theme {
            Some(kind) => kind.theme(),
            None => self.config.theme.clone(),
        };
        let measurer: &dyn TextMeasurer = &*self.fonts;

        let block = compute_layout(&request.message, self.config.wrap, canvas, measurer);
        debug!(
            "Wrapped {} chars into {} lines ({:.1}px widest), theme {}",
            request.message.chars().count(),
            block.line_count(),
            block.measured_width,
            theme.name
        );

        let avatar = if theme.show_avatar {
            let diameter = (2.0 * canvas.avatar_radius * canvas.scale as f32).round() as u32;
            assets::resolve_avatar(&*self.loader, request.profile.as_deref(), diameter)
        } else {
            Avatar::Fallback
        };

        let mut rng = match self.config.pattern_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let ctx = ComposeContext { canvas, theme: &theme, measurer, now };
        let scene = compose(&ctx, &request.display_name, block, &avatar, &mut rng);

        let pixmap = rasterize(&scene, &self.fonts, &avatar)?;
        let bytes = encode(&pixmap, self.config.palette_reduction)?;
        let filename = filename_for(&now);
        info!(
            "Rendered {} for {:?}: {} lines, {} bytes{}",
            filename,
            request.display_name,
            scene.block.line_count(),
            bytes.len(),
            if avatar.is_fallback() { ", placeholder avatar" } else { "" }
        );

        Ok(RenderedImage {
            bytes,
            filename,
            width: pixmap.width(),
            height: pixmap.height(),
            lines: scene.block.lines,
            bubble: scene.bubble,
            avatar_fallback: avatar.is_fallback(),
        })
    }
}

fn default_fonts() -> Arc<FontBook> {
    static FONTS: OnceLock<Arc<FontBook>> = OnceLock::new();
    FONTS.get_or_init(|| Arc::new(FontBook::load(&FontConfig::default()))).clone()
}

/// Render with the default configuration.
///
/// Fails with [`Error::ValidationError`] when the name or message is blank.
pub fn render(display_name: &str, message: &str, profile: Option<&str>) -> Result<RenderedImage> {
    let mut request = RenderRequest::new(display_name, message);
    request.profile = profile.map(str::to_string);
    // validate before paying for font discovery
    request.validate()?;
    Renderer::from_parts(MockupConfig::default(), default_fonts())?.render(&request)
}
