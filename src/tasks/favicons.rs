// src/tasks/favicons.rs

//! Favicon set generation from a single source image.
//!
//! Writes into `<app>/<favicons.output>`:
//!
//! - `favicon-{16,32,48}x{..}.png` and a multi-size `favicon.ico`
//! - `apple-touch-icon.png` (180px, flattened onto the background colour)
//! - `android-chrome-{192,512}x{..}.png`
//! - `manifest.webmanifest`
//! - an HTML snippet (`[favicons].html`) with the matching `<link>` tags

use std::path::Path;

use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::imageops::FilterType as ResizeFilter;
use image::{DynamicImage, ExtendedColorType, ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::FaviconsSection;
use crate::tasks::paths::{write_file, SourceSet};
use crate::tasks::{BuildContext, TaskError, TaskReport};

const FAVICON_SIZES: [u32; 3] = [16, 32, 48];
const APPLE_TOUCH_SIZE: u32 = 180;
const ANDROID_SIZES: [u32; 2] = [192, 512];

pub const MANIFEST_FILE: &str = "manifest.webmanifest";

/// `favicons`: generate the icon set, manifest and HTML snippet.
pub fn generate_favicons(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let cfg = &ctx.config.favicons;
    let sources = SourceSet::new(&cfg.sources)?.collect(ctx.fs.as_ref(), &ctx.root)?;
    let Some(source) = sources.first() else {
        debug!(pattern = %cfg.sources, "no favicon source; skipping");
        return Ok(TaskReport::default());
    };
    if sources.len() > 1 {
        warn!(
            using = ?source,
            ignored = sources.len() - 1,
            "several favicon sources matched; only the first is used"
        );
    }

    let img = image::open(source)
        .map_err(|e| TaskError::transform(source, format!("decode failed: {e}")))?;
    let background = parse_hex_color(&cfg.background)
        .ok_or_else(|| TaskError::transform(source, format!("invalid background colour '{}'", cfg.background)))?;

    let out_dir = ctx.app_path(&cfg.output);
    let mut written = 0;

    let mut ico_frames = Vec::with_capacity(FAVICON_SIZES.len());
    for size in FAVICON_SIZES {
        let icon = square(&img, size);
        save_png(&icon, &out_dir.join(format!("favicon-{size}x{size}.png")))?;
        written += 1;

        let frame = IcoFrame::as_png(icon.as_raw(), size, size, ExtendedColorType::Rgba8)
            .map_err(|e| TaskError::transform(source, format!("ico frame failed: {e}")))?;
        ico_frames.push(frame);
    }

    let mut ico = Vec::new();
    IcoEncoder::new(&mut ico)
        .encode_images(&ico_frames)
        .map_err(|e| TaskError::transform(source, format!("ico encode failed: {e}")))?;
    write_file(&out_dir.join("favicon.ico"), &ico)?;
    written += 1;

    let mut apple = RgbaImage::from_pixel(APPLE_TOUCH_SIZE, APPLE_TOUCH_SIZE, background);
    image::imageops::overlay(&mut apple, &square(&img, APPLE_TOUCH_SIZE), 0, 0);
    save_png(&apple, &out_dir.join("apple-touch-icon.png"))?;
    written += 1;

    for size in ANDROID_SIZES {
        save_png(
            &square(&img, size),
            &out_dir.join(format!("android-chrome-{size}x{size}.png")),
        )?;
        written += 1;
    }

    let manifest = manifest_json(cfg);
    write_file(&out_dir.join(MANIFEST_FILE), manifest.as_bytes())?;
    written += 1;

    write_file(&out_dir.join(&cfg.html), html_snippet(cfg).as_bytes())?;
    written += 1;

    debug!(source = ?source, written, "generated favicons");
    Ok(TaskReport::written(written))
}

fn square(img: &DynamicImage, size: u32) -> RgbaImage {
    img.resize_exact(size, size, ResizeFilter::Lanczos3).to_rgba8()
}

fn save_png(img: &RgbaImage, path: &Path) -> Result<(), TaskError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| TaskError::transform(path, format!("PNG encode failed: {e}")))?;
    write_file(path, buf.get_ref())
}

/// `#rgb` or `#rrggbb` to an opaque pixel.
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => Some(Rgba([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ])),
        _ => None,
    }
}

/// Web app manifest for the Android icons.
pub fn manifest_json(cfg: &FaviconsSection) -> String {
    let icons: Vec<_> = ANDROID_SIZES
        .iter()
        .map(|size| {
            json!({
                "src": format!("{}android-chrome-{size}x{size}.png", cfg.path),
                "sizes": format!("{size}x{size}"),
                "type": "image/png",
            })
        })
        .collect();

    let manifest = json!({
        "name": cfg.app_name,
        "short_name": cfg.app_short_name,
        "description": cfg.app_description,
        "developer": { "name": cfg.developer_name, "url": cfg.developer_url },
        "version": cfg.version,
        "dir": "auto",
        "display": cfg.display,
        "orientation": cfg.orientation,
        "scope": cfg.scope,
        "start_url": cfg.start_url,
        "background_color": cfg.background,
        "theme_color": cfg.theme_color,
        "icons": icons,
    });

    // `Value`'s Display never fails; pretty output keeps diffs readable.
    serde_json::to_string_pretty(&manifest).unwrap_or_else(|_| manifest.to_string())
}

pub fn html_snippet(cfg: &FaviconsSection) -> String {
    let p = &cfg.path;
    let mut lines = vec![
        format!(r#"<link rel="icon" type="image/x-icon" href="{p}favicon.ico">"#),
    ];
    for size in FAVICON_SIZES {
        lines.push(format!(
            r#"<link rel="icon" type="image/png" sizes="{size}x{size}" href="{p}favicon-{size}x{size}.png">"#
        ));
    }
    lines.push(format!(
        r#"<link rel="apple-touch-icon" sizes="{APPLE_TOUCH_SIZE}x{APPLE_TOUCH_SIZE}" href="{p}apple-touch-icon.png">"#
    ));
    lines.push(format!(r#"<link rel="manifest" href="{p}{MANIFEST_FILE}">"#));
    lines.push(format!(
        r#"<meta name="theme-color" content="{}">"#,
        cfg.theme_color
    ));
    lines.push(format!(
        r#"<meta name="application-name" content="{}">"#,
        cfg.app_name
    ));
    let mut html = lines.join("\n");
    html.push('\n');
    html
}
