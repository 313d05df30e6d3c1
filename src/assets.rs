//! Profile picture loading.
//!
//! An avatar reference may be an `http(s)://` URL, a `data:` URI or a path
//! relative to the configured asset directory. Paths are only read when an
//! asset directory is set, and never outside of it: absolute paths, `file://`
//! URLs and `..` escapes are refused. Whatever goes wrong while fetching or
//! decoding it, [`resolve_avatar`] answers [`Avatar::Fallback`] and the header
//! gets a solid placeholder circle instead.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use image::imageops::FilterType;
use log::{debug, warn};
use reqwest::blocking::Client;
use tiny_skia::{ColorU8, Pixmap};

use crate::{Error, Result};

/// Settings for fetching avatar images
#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Directory avatar paths are confined to; `None` disables local files
    pub base_dir: Option<PathBuf>,
    /// Timeout for remote fetches in milliseconds
    pub timeout_ms: u64,
    /// Largest accepted image body in bytes
    pub max_bytes: u64,
    /// User agent sent with remote fetches
    pub user_agent: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            timeout_ms: 5000,
            max_bytes: 8 * 1024 * 1024,
            user_agent: concat!("fakechat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Outcome of avatar resolution
pub enum Avatar {
    /// Decoded image, already sized to the avatar diameter in device pixels
    Image(Pixmap),
    /// Draw the placeholder circle
    Fallback,
}

impl Avatar {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Avatar::Fallback)
    }
}

impl std::fmt::Debug for Avatar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Avatar::Image(p) => write!(f, "Avatar::Image({}x{})", p.width(), p.height()),
            Avatar::Fallback => write!(f, "Avatar::Fallback"),
        }
    }
}

/// Fetches raw image bytes for a reference
pub trait ImageLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Loader for URLs, data URIs and filesystem paths
pub struct DefaultLoader {
    client: Client,
    config: AssetConfig,
}

impl DefaultLoader {
    pub fn new(config: AssetConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", self.config.user_agent.clone())
            .send()
            .map_err(|e| Error::AssetLoadError(format!("Failed to fetch {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::AssetLoadError(format!("{} answered {}", url, status)));
        }
        if resp.content_length().is_some_and(|len| len > self.config.max_bytes) {
            return Err(Error::AssetLoadError(format!("{} exceeds {} bytes", url, self.config.max_bytes)));
        }

        let mut body = Vec::new();
        resp.take(self.config.max_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|e| Error::AssetLoadError(format!("Failed to read response body: {}", e)))?;
        self.check_size(url, body)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let base = self
            .config
            .base_dir
            .as_ref()
            .ok_or_else(|| Error::AssetLoadError(format!("no asset directory for {}", path.display())))?;
        if !path.is_relative() {
            return Err(Error::AssetLoadError(format!("{} is not relative to the asset directory", path.display())));
        }
        let root = base
            .canonicalize()
            .map_err(|e| Error::AssetLoadError(format!("Asset directory {}: {}", base.display(), e)))?;
        let full = root
            .join(path)
            .canonicalize()
            .map_err(|e| Error::AssetLoadError(format!("Failed to read {}: {}", path.display(), e)))?;
        if !full.starts_with(&root) {
            return Err(Error::AssetLoadError(format!("{} escapes the asset directory", path.display())));
        }
        let body = std::fs::read(&full)
            .map_err(|e| Error::AssetLoadError(format!("Failed to read {}: {}", full.display(), e)))?;
        self.check_size(&full.display().to_string(), body)
    }

    fn check_size(&self, what: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        if body.len() as u64 > self.config.max_bytes {
            return Err(Error::AssetLoadError(format!("{} exceeds {} bytes", what, self.config.max_bytes)));
        }
        Ok(body)
    }
}

impl ImageLoader for DefaultLoader {
    fn load(&self, reference: &str) -> Result<Vec<u8>> {
        if let Some(rest) = reference.strip_prefix("data:") {
            return decode_data_uri(rest).and_then(|body| self.check_size("data URI", body));
        }
        match url::Url::parse(reference) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => self.fetch(reference),
            Ok(u) if u.scheme() == "file" => {
                Err(Error::AssetLoadError(format!("file URLs are not accepted: {}", reference)))
            }
            // one-letter schemes are Windows drive letters
            Ok(u) if u.scheme().len() > 1 => {
                Err(Error::AssetLoadError(format!("unsupported scheme '{}'", u.scheme())))
            }
            _ => self.read_file(Path::new(reference)),
        }
    }
}

fn decode_data_uri(rest: &str) -> Result<Vec<u8>> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::AssetLoadError("malformed data URI".into()))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::AssetLoadError(format!("invalid base64 in data URI: {}", e)))
    } else {
        Ok(percent_encoding::percent_decode_str(payload).collect())
    }
}

/// Decode `bytes` and stretch them to a `diameter`×`diameter` premultiplied
/// pixmap. Aspect ratio is not preserved; the circle clip hides the corners.
pub fn decode_avatar(bytes: &[u8], diameter: u32) -> Result<Pixmap> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::AssetLoadError(format!("Failed to decode image: {}", e)))?;
    let rgba = img.resize_exact(diameter, diameter, FilterType::Triangle).to_rgba8();
    let mut pixmap = Pixmap::new(diameter, diameter)
        .ok_or_else(|| Error::AssetLoadError(format!("invalid avatar size {}", diameter)))?;
    for (dst, px) in pixmap.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = px.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

/// Load and decode an avatar, degrading to the placeholder on any failure.
pub fn resolve_avatar(loader: &dyn ImageLoader, reference: Option<&str>, diameter: u32) -> Avatar {
    let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
        return Avatar::Fallback;
    };
    match loader.load(reference).and_then(|bytes| decode_avatar(&bytes, diameter)) {
        Ok(pixmap) => {
            debug!("Loaded avatar {}", short(reference));
            Avatar::Image(pixmap)
        }
        Err(e) => {
            warn!("Avatar {} unavailable, drawing placeholder: {}", short(reference), e);
            Avatar::Fallback
        }
    }
}

// data URIs can be huge; keep log lines readable
fn short(reference: &str) -> &str {
    match reference.char_indices().nth(80) {
        Some((idx, _)) => &reference[..idx],
        None => reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(color: [u8; 4], w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba(color));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    struct Failing;

    impl ImageLoader for Failing {
        fn load(&self, reference: &str) -> Result<Vec<u8>> {
            Err(Error::AssetLoadError(format!("nope: {reference}")))
        }
    }

    #[test]
    fn absent_or_blank_reference_is_fallback() {
        assert!(resolve_avatar(&Failing, None, 60).is_fallback());
        assert!(resolve_avatar(&Failing, Some("   "), 60).is_fallback());
    }

    #[test]
    fn loader_errors_degrade_to_fallback() {
        assert!(resolve_avatar(&Failing, Some("http://example.invalid/a.png"), 60).is_fallback());
    }

    #[test]
    fn undecodable_bytes_degrade_to_fallback() {
        let loader = DefaultLoader::new(AssetConfig::default()).unwrap();
        let uri = "data:text/plain,hello";
        assert!(resolve_avatar(&loader, Some(uri), 60).is_fallback());
    }

    #[test]
    fn data_uri_avatar_is_stretched_to_diameter() {
        let loader = DefaultLoader::new(AssetConfig::default()).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes([0, 0, 255, 255], 4, 2));
        let uri = format!("data:image/png;base64,{}", encoded);
        match resolve_avatar(&loader, Some(&uri), 60) {
            Avatar::Image(p) => {
                assert_eq!((p.width(), p.height()), (60, 60));
                let c = p.pixel(30, 30).unwrap();
                assert_eq!((c.red(), c.green(), c.blue(), c.alpha()), (0, 0, 255, 255));
            }
            Avatar::Fallback => panic!("expected decoded avatar"),
        }
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("me.png"), png_bytes([255, 0, 0, 255], 3, 3)).unwrap();
        let loader = DefaultLoader::new(AssetConfig {
            base_dir: Some(dir.path().to_path_buf()),
            ..AssetConfig::default()
        })
        .unwrap();
        assert!(!resolve_avatar(&loader, Some("me.png"), 30).is_fallback());
        assert!(resolve_avatar(&loader, Some("missing.png"), 30).is_fallback());
    }

    #[test]
    fn oversized_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.png"), png_bytes([1, 2, 3, 255], 64, 64)).unwrap();
        let loader = DefaultLoader::new(AssetConfig {
            base_dir: Some(dir.path().to_path_buf()),
            max_bytes: 16,
            ..AssetConfig::default()
        })
        .unwrap();
        assert!(loader.load("big.png").is_err());
    }

    #[test]
    fn paths_outside_the_asset_directory_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir(&assets).unwrap();
        std::fs::write(assets.join("me.png"), png_bytes([0, 255, 0, 255], 3, 3)).unwrap();
        let secret = dir.path().join("secret.png");
        std::fs::write(&secret, png_bytes([255, 0, 0, 255], 3, 3)).unwrap();

        let loader = DefaultLoader::new(AssetConfig { base_dir: Some(assets.clone()), ..AssetConfig::default() })
            .unwrap();
        assert!(!resolve_avatar(&loader, Some("me.png"), 30).is_fallback());

        let file_url = url::Url::from_file_path(&secret).unwrap().to_string();
        let absolute = secret.to_str().unwrap().to_string();
        for reference in ["../secret.png", "./../secret.png", absolute.as_str(), file_url.as_str()] {
            assert!(loader.load(reference).is_err(), "{reference}");
            assert!(resolve_avatar(&loader, Some(reference), 30).is_fallback(), "{reference}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_asset_directory_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir(&assets).unwrap();
        let secret = dir.path().join("secret.png");
        std::fs::write(&secret, png_bytes([255, 0, 0, 255], 3, 3)).unwrap();
        std::os::unix::fs::symlink(&secret, assets.join("link.png")).unwrap();

        let loader = DefaultLoader::new(AssetConfig { base_dir: Some(assets), ..AssetConfig::default() }).unwrap();
        assert!(resolve_avatar(&loader, Some("link.png"), 30).is_fallback());
    }

    #[test]
    fn local_files_need_an_asset_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.png");
        std::fs::write(&path, png_bytes([0, 0, 255, 255], 3, 3)).unwrap();
        let loader = DefaultLoader::new(AssetConfig::default()).unwrap();
        assert!(resolve_avatar(&loader, Some(path.to_str().unwrap()), 30).is_fallback());
        assert!(resolve_avatar(&loader, Some("me.png"), 30).is_fallback());
    }

    #[test]
    fn unknown_schemes_are_rejected() {
        let loader = DefaultLoader::new(AssetConfig::default()).unwrap();
        let err = loader.load("ftp://example.com/a.png").unwrap_err();
        assert!(matches!(err, Error::AssetLoadError(_)));
    }

    #[test]
    fn short_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        assert_eq!(short(&long).chars().count(), 80);
        assert_eq!(short("abc"), "abc");
    }
}
