/// Color palettes and decorative choices for a mockup.
///
/// Every visual constant that differs between mockup styles lives here; the
/// compositor itself is shared.
use std::str::FromStr;

use crate::{Error, Result};

/// Straight (non-premultiplied) RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub accent: Rgba,
    pub avatar_fallback: Rgba,
    pub surface: Rgba,
    pub bubble: Rgba,
    pub text: Rgba,
    pub text_muted: Rgba,
    pub placeholder: Rgba,
    pub separator: Rgba,
    pub icon_ring: Rgba,
    pub chat_background: Rgba,
    pub chat_pattern: Rgba,
    pub status_bar: Rgba,
    pub header: Rgba,
    pub input_bar: Rgba,
    pub input_field: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub name: &'static str,
    pub palette: Palette,
    /// Label next to the signal dots
    pub carrier: String,
    /// Battery level in percent, 0..=100
    pub battery: u8,
    pub back_label: String,
    pub presence: String,
    pub placeholder: String,
    pub show_pattern: bool,
    pub show_avatar: bool,
}

/// Named presets selectable from the CLI and the HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeKind {
    #[default]
    Lingo,
    Night,
    Plain,
}

impl ThemeKind {
    pub fn theme(self) -> Theme {
        match self {
            ThemeKind::Lingo => Theme::lingo(),
            ThemeKind::Night => Theme::night(),
            ThemeKind::Plain => Theme::plain(),
        }
    }
}

impl FromStr for ThemeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lingo" | "default" => Ok(ThemeKind::Lingo),
            "night" | "dark" => Ok(ThemeKind::Night),
            "plain" => Ok(ThemeKind::Plain),
            other => Err(Error::ConfigError(format!("unknown theme '{other}'"))),
        }
    }
}

impl Theme {
    /// Light iOS look with a cream chat wallpaper
    pub fn lingo() -> Self {
        Self {
            name: "lingo",
            palette: Palette {
                accent: Rgba::rgb(0x00, 0x7A, 0xFF),
                avatar_fallback: Rgba::rgb(0xFF, 0x3B, 0x30),
                surface: Rgba::rgb(0xFF, 0xFF, 0xFF),
                bubble: Rgba::rgb(0xFF, 0xFF, 0xFF),
                text: Rgba::rgb(0x33, 0x33, 0x33),
                text_muted: Rgba::rgb(0x8E, 0x8E, 0x93),
                placeholder: Rgba::rgb(0xC7, 0xC7, 0xCD),
                separator: Rgba::rgb(0xD1, 0xD1, 0xD6),
                icon_ring: Rgba::rgb(0xD1, 0xD1, 0xD6),
                chat_background: Rgba::rgb(0xFD, 0xF7, 0xE4),
                chat_pattern: Rgba::rgb(0xE0, 0xD8, 0xC8),
                status_bar: Rgba::rgb(0xFF, 0xFF, 0xFF),
                header: Rgba::rgb(0xFF, 0xFF, 0xFF),
                input_bar: Rgba::rgb(0xF8, 0xF8, 0xF8),
                input_field: Rgba::rgb(0xFF, 0xFF, 0xFF),
            },
            carrier: "LingoLens".to_string(),
            battery: 69,
            back_label: "Chats".to_string(),
            presence: "online".to_string(),
            placeholder: "Message".to_string(),
            show_pattern: true,
            show_avatar: true,
        }
    }

    pub fn night() -> Self {
        Self {
            name: "night",
            palette: Palette {
                accent: Rgba::rgb(0x0A, 0x84, 0xFF),
                avatar_fallback: Rgba::rgb(0xFF, 0x45, 0x3A),
                surface: Rgba::rgb(0x00, 0x00, 0x00),
                bubble: Rgba::rgb(0x26, 0x2D, 0x31),
                text: Rgba::rgb(0xE9, 0xED, 0xEF),
                text_muted: Rgba::rgb(0x8D, 0x95, 0x98),
                placeholder: Rgba::rgb(0x63, 0x6A, 0x6E),
                separator: Rgba::rgb(0x38, 0x38, 0x3A),
                icon_ring: Rgba::rgb(0x48, 0x48, 0x4A),
                chat_background: Rgba::rgb(0x0B, 0x14, 0x1A),
                chat_pattern: Rgba::rgb(0x2A, 0x33, 0x38),
                status_bar: Rgba::rgb(0x1C, 0x1C, 0x1E),
                header: Rgba::rgb(0x1C, 0x1C, 0x1E),
                input_bar: Rgba::rgb(0x1C, 0x1C, 0x1E),
                input_field: Rgba::rgb(0x2C, 0x2C, 0x2E),
            },
            carrier: "LingoLens".to_string(),
            battery: 42,
            back_label: "Chats".to_string(),
            presence: "online".to_string(),
            placeholder: "Message".to_string(),
            show_pattern: true,
            show_avatar: true,
        }
    }

    /// No wallpaper, no avatar slot
    pub fn plain() -> Self {
        Self {
            name: "plain",
            carrier: "Carrier".to_string(),
            battery: 100,
            show_pattern: false,
            show_avatar: false,
            ..Self::lingo()
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::lingo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_kind_from_str() {
        assert_eq!("Night".parse::<ThemeKind>().unwrap(), ThemeKind::Night);
        assert_eq!("default".parse::<ThemeKind>().unwrap(), ThemeKind::Lingo);
        assert!("neon".parse::<ThemeKind>().is_err());
        let plain = ThemeKind::Plain.theme();
        assert!(!plain.show_avatar && !plain.show_pattern);
    }
}
