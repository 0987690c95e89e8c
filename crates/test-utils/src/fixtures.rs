//! Binary fixture writers: small raster images and a minimal TrueType font.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

/// Write a `width` x `height` gradient PNG.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255])
    });
    ensure_parent(path);
    img.save_with_format(path, ImageFormat::Png)
        .expect("writing PNG fixture");
}

/// Write a `width` x `height` gradient JPEG.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, 64, (y * 255 / height.max(1)) as u8])
    });
    ensure_parent(path);
    img.save_with_format(path, ImageFormat::Jpeg)
        .expect("writing JPEG fixture");
}

/// A structurally valid sfnt with a handful of tables.
///
/// Table contents are filler; only the container layout matters to the
/// WOFF encoders.
pub fn minimal_ttf() -> Vec<u8> {
    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"OS/2", vec![0x11; 12]),
        (b"glyf", vec![0x22; 30]),
        (b"head", vec![0x33; 54]),
        (b"loca", vec![0x44; 6]),
        (b"maxp", vec![0x55; 6]),
    ];

    let num_tables = tables.len() as u16;
    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    // searchRange, entrySelector, rangeShift for 5 tables.
    out.extend_from_slice(&64u16.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&16u16.to_be_bytes());

    let mut offset = 12 + 16 * tables.len();
    let mut data = Vec::new();
    for (tag, body) in &tables {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&checksum(body).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());

        data.extend_from_slice(body);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        offset = 12 + 16 * tables.len() + data.len();
    }
    out.extend_from_slice(&data);
    out
}

pub fn write_ttf(path: &Path) {
    ensure_parent(path);
    std::fs::write(path, minimal_ttf()).expect("writing TTF fixture");
}

fn checksum(body: &[u8]) -> u32 {
    body.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("creating fixture dir");
    }
}
