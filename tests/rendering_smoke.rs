use std::sync::Arc;

use fakechat::{FixedClock, FontBook, MockupConfig, RenderRequest, Renderer};

fn renderer(palette_reduction: bool) -> Renderer {
    let config = MockupConfig { pattern_seed: Some(11), palette_reduction, ..Default::default() };
    Renderer::from_parts(config, Arc::new(FontBook::empty()))
        .expect("renderer")
        .with_clock(FixedClock::parse("2024-05-01T14:05:09+00:00").unwrap())
}

fn decode(bytes: &[u8]) -> (u32, u32, Vec<u8>) {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info().expect("png header");
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).expect("png frame");
    buf.truncate(info.buffer_size());
    (info.width, info.height, buf)
}

#[test]
fn smoke_render_dimensions() {
    let image = renderer(false).render(&RenderRequest::new("Alice", "Hello")).unwrap();
    assert_eq!(&image.bytes[0..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!((image.width, image.height), (375 * 3, 812 * 3));
    let (w, h, _) = decode(&image.bytes);
    assert_eq!((w, h), (1125, 2436));
}

#[test]
fn palette_reduced_output_decodes_to_same_size() {
    let raw = renderer(false).render(&RenderRequest::new("Alice", "Hello")).unwrap();
    let reduced = renderer(true).render(&RenderRequest::new("Alice", "Hello")).unwrap();
    assert!(reduced.bytes.len() <= raw.bytes.len());
    let (w, h, _) = decode(&reduced.bytes);
    assert_eq!((w, h), (1125, 2436));
}

#[test]
fn alice_hello_with_default_pipeline() {
    let image = fakechat::render("Alice", "Hello", None).unwrap();
    assert_eq!(image.lines, vec!["Hello".to_string()]);
    assert!(image.avatar_fallback);

    let digits = image
        .filename
        .strip_prefix("image-")
        .and_then(|rest| rest.strip_suffix(".png"))
        .expect("filename shape");
    assert!(!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()), "{}", image.filename);
}

#[test]
fn fallback_avatar_pixels_are_red() {
    let image = renderer(false).render(&RenderRequest::new("Alice", "Hello")).unwrap();
    let (w, _, rgb) = decode(&image.bytes);
    // avatar centre at logical (340, 72)
    let idx = ((216 * w + 1020) * 3) as usize;
    assert_eq!(&rgb[idx..idx + 3], &[0xFF, 0x3B, 0x30]);
}

#[test]
fn empty_fields_are_rejected() {
    for (name, message) in [("", "Hi"), ("Alice", "   ")] {
        let err = renderer(false).render(&RenderRequest::new(name, message)).unwrap_err();
        assert!(err.is_validation(), "{err}");
    }
    assert!(fakechat::render("", "Hi", None).unwrap_err().is_validation());
}

#[test]
fn unreachable_profile_keeps_layout() {
    let r = renderer(false);
    let message = "An unreachable avatar must not move anything around";
    let without = r.render(&RenderRequest::new("Alice", message)).unwrap();
    let with = r
        .render(&RenderRequest::new("Alice", message).with_profile("http://127.0.0.1:9/missing.png"))
        .unwrap();
    assert!(with.avatar_fallback);
    assert_eq!(with.lines, without.lines);
    assert_eq!(with.bubble, without.bubble);
    assert_eq!(with.bytes, without.bytes);
}

#[test]
fn long_messages_grow_the_bubble() {
    let r = renderer(false);
    let short = r.render(&RenderRequest::new("Bob", "Hi")).unwrap();
    let long = r.render(&RenderRequest::new("Bob", "y".repeat(200))).unwrap();
    assert_eq!(short.lines.len(), 1);
    assert_eq!(long.lines.len(), 7);
    assert!(long.bubble.height > short.bubble.height);
    assert!(long.bubble.height >= 7.0 * 20.0 + 20.0);
}

#[test]
fn avatar_paths_stay_inside_the_asset_directory() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    std::fs::create_dir(&assets).unwrap();
    let blue = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 255, 255]));
    blue.save(assets.join("me.png")).unwrap();
    blue.save(dir.path().join("secret.png")).unwrap();

    let mut config = MockupConfig { pattern_seed: Some(11), palette_reduction: false, ..Default::default() };
    config.assets.base_dir = Some(assets);
    let renderer = Renderer::from_parts(config, Arc::new(FontBook::empty())).expect("renderer");

    let inside = renderer.render(&RenderRequest::new("Alice", "Hi").with_profile("me.png")).unwrap();
    assert!(!inside.avatar_fallback);

    let secret = dir.path().join("secret.png");
    for profile in ["../secret.png".to_string(), secret.display().to_string(), format!("file://{}", secret.display())] {
        let image = renderer.render(&RenderRequest::new("Alice", "Hi").with_profile(profile.clone())).unwrap();
        assert!(image.avatar_fallback, "{profile}");
    }
}
