// src/tasks/images.rs

//! Raster and vector image transforms.
//!
//! All three tasks mirror their sources' layout below `[images].base` into
//! `<app>/<images.output>` and skip sources whose output is already at least
//! as new as the source, so a second run over unchanged inputs writes
//! nothing.
//!
//! | Task | Inputs | Output |
//! |------|--------|--------|
//! | `images` | PNG, JPEG, GIF, SVG | same format, re-encoded / minified |
//! | `avif_images` | PNG, JPEG | `.avif` (rav1e) |
//! | `webp_images` | PNG, JPEG | `.webp` (lossless) |

use std::io::Cursor;
use std::path::Path;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use tracing::{debug, trace};

use crate::tasks::paths::{is_up_to_date, mirror_path, write_file, SourceSet};
use crate::tasks::{svg, BuildContext, TaskError, TaskReport};

/// `images`: optimize every source in its original format.
pub fn optimize_images(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let quality = ctx.config.images.jpeg_quality;
    let pattern = ctx.config.images.sources.clone();
    for_each_stale(ctx, &pattern, None, |source, output| {
        let optimized = optimize(source, quality)?;
        write_file(output, &optimized)
    })
}

/// `avif_images`: convert raster sources to AVIF.
pub fn convert_to_avif(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let images = &ctx.config.images;
    let (speed, quality) = (images.avif_speed, images.avif_quality);
    let pattern = images.raster_sources.clone();
    for_each_stale(ctx, &pattern, Some("avif"), |source, output| {
        let img = decode(source)?;
        let mut buf = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(&mut buf, speed, quality);
        encodable(img)
            .write_with_encoder(encoder)
            .map_err(|e| TaskError::transform(source, format!("AVIF encode failed: {e}")))?;
        write_file(output, &buf)
    })
}

/// `webp_images`: convert raster sources to lossless WebP.
pub fn convert_to_webp(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let pattern = ctx.config.images.raster_sources.clone();
    for_each_stale(ctx, &pattern, Some("webp"), |source, output| {
        let img = decode(source)?;
        let mut buf = Vec::new();
        let encoder = WebPEncoder::new_lossless(&mut buf);
        encodable(img)
            .write_with_encoder(encoder)
            .map_err(|e| TaskError::transform(source, format!("WebP encode failed: {e}")))?;
        write_file(output, &buf)
    })
}

/// Run `convert` for every source matching `pattern` whose output is stale.
fn for_each_stale<F>(
    ctx: &BuildContext,
    pattern: &str,
    ext: Option<&str>,
    mut convert: F,
) -> Result<TaskReport, TaskError>
where
    F: FnMut(&Path, &Path) -> Result<(), TaskError>,
{
    let base = ctx.resolve(&ctx.config.images.base);
    let out_dir = ctx.app_path(&ctx.config.images.output);
    let sources = SourceSet::new(pattern)?.collect(ctx.fs.as_ref(), &ctx.root)?;

    let mut report = TaskReport::default();
    for source in sources {
        let output = mirror_path(&base, &source, &out_dir, ext);
        if is_up_to_date(&source, &output) {
            trace!(source = ?source, "output is fresh; skipping");
            report.skipped += 1;
            continue;
        }
        debug!(source = ?source, output = ?output, "processing image");
        convert(&source, &output)?;
        report.written += 1;
    }
    Ok(report)
}

/// Re-encode `source` in its own format. The original bytes are kept when
/// re-encoding does not make the file smaller.
pub fn optimize(source: &Path, jpeg_quality: u8) -> Result<Vec<u8>, TaskError> {
    let original = std::fs::read(source).map_err(TaskError::io(source))?;
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let encoded = match ext.as_str() {
        "jpg" | "jpeg" => {
            let rgb = decode_bytes(source, &original)?.to_rgb8();
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality)
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(|e| TaskError::transform(source, format!("JPEG encode failed: {e}")))?;
            buf
        }
        "png" => {
            let img = decode_bytes(source, &original)?;
            let mut buf = Vec::new();
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
            img.write_with_encoder(encoder)
                .map_err(|e| TaskError::transform(source, format!("PNG encode failed: {e}")))?;
            buf
        }
        "svg" => {
            let text = String::from_utf8(original.clone())
                .map_err(|e| TaskError::transform(source, e))?;
            svg::minify(source, &text)?.into_bytes()
        }
        // GIF and anything else pass through unchanged.
        _ => return Ok(original),
    };

    if encoded.len() < original.len() {
        Ok(encoded)
    } else {
        Ok(original)
    }
}

fn decode(source: &Path) -> Result<DynamicImage, TaskError> {
    let bytes = std::fs::read(source).map_err(TaskError::io(source))?;
    decode_bytes(source, &bytes)
}

fn decode_bytes(source: &Path, bytes: &[u8]) -> Result<DynamicImage, TaskError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(TaskError::io(source))?
        .decode()
        .map_err(|e| TaskError::transform(source, format!("decode failed: {e}")))
}

/// AVIF and WebP encoders only accept 8-bit RGB(A).
fn encodable(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}
