// src/tasks/fonts.rs

//! TrueType / OpenType to WOFF and WOFF2.
//!
//! Both encoders work on the parsed sfnt table list and store table data
//! unchanged apart from compression:
//!
//! - WOFF 1.0: each table zlib-compressed on its own (kept raw when that
//!   does not shrink it), 4-byte aligned.
//! - WOFF2: one brotli stream over all tables. `glyf`/`loca` use the null
//!   transform (version 3), every other table version 0.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;
use tracing::{debug, trace};

use crate::tasks::paths::{is_up_to_date, mirror_path, write_file, SourceSet};
use crate::tasks::{BuildContext, TaskError, TaskReport};

const WOFF_SIGNATURE: u32 = 0x774F_4646; // 'wOFF'
const WOFF2_SIGNATURE: u32 = 0x774F_4632; // 'wOF2'
const WOFF_HEADER_LEN: usize = 44;
const WOFF_DIR_ENTRY_LEN: usize = 20;
const WOFF2_HEADER_LEN: usize = 48;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_RECORD_LEN: usize = 16;

/// Table tags with a one-byte code in the WOFF2 table directory, by index.
const WOFF2_KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

#[derive(Error, Debug)]
pub enum FontError {
    #[error("file is too short for an sfnt header")]
    Truncated,

    #[error("unsupported sfnt version 0x{0:08x}")]
    UnsupportedFlavor(u32),

    #[error("table '{tag}' lies outside the file")]
    TableOutOfBounds { tag: String },

    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfntTable {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub data: Vec<u8>,
}

impl SfntTable {
    fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// A parsed sfnt font: flavor plus tables in tag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfntFont {
    pub flavor: u32,
    pub tables: Vec<SfntTable>,
}

impl SfntFont {
    pub fn parse(bytes: &[u8]) -> Result<Self, FontError> {
        if bytes.len() < SFNT_HEADER_LEN {
            return Err(FontError::Truncated);
        }
        let flavor = read_u32(bytes, 0);
        // TrueType, CFF ('OTTO') and legacy Apple ('true').
        if !matches!(flavor, 0x0001_0000 | 0x4F54_544F | 0x7472_7565) {
            return Err(FontError::UnsupportedFlavor(flavor));
        }
        let num_tables = read_u16(bytes, 4) as usize;
        if bytes.len() < SFNT_HEADER_LEN + num_tables * SFNT_RECORD_LEN {
            return Err(FontError::Truncated);
        }

        let mut tables = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let rec = SFNT_HEADER_LEN + i * SFNT_RECORD_LEN;
            let mut tag = [0u8; 4];
            tag.copy_from_slice(&bytes[rec..rec + 4]);
            let checksum = read_u32(bytes, rec + 4);
            let offset = read_u32(bytes, rec + 8) as usize;
            let length = read_u32(bytes, rec + 12) as usize;

            let data = offset
                .checked_add(length)
                .and_then(|end| bytes.get(offset..end))
                .ok_or_else(|| FontError::TableOutOfBounds {
                    tag: String::from_utf8_lossy(&tag).into_owned(),
                })?;

            tables.push(SfntTable {
                tag,
                checksum,
                data: data.to_vec(),
            });
        }
        tables.sort_by(|a, b| a.tag.cmp(&b.tag));

        Ok(Self { flavor, tables })
    }

    /// Size of the font when decoded back to sfnt.
    pub fn total_sfnt_size(&self) -> u32 {
        let tables: usize = self.tables.iter().map(|t| padded_len(t.data.len())).sum();
        (SFNT_HEADER_LEN + SFNT_RECORD_LEN * self.tables.len() + tables) as u32
    }
}

/// Encode `font` as WOFF 1.0.
pub fn encode_woff(font: &SfntFont) -> Result<Vec<u8>, FontError> {
    let num_tables = font.tables.len();
    let mut offset = WOFF_HEADER_LEN + WOFF_DIR_ENTRY_LEN * num_tables;

    let mut directory = Vec::with_capacity(WOFF_DIR_ENTRY_LEN * num_tables);
    let mut data = Vec::new();

    for table in &font.tables {
        let compressed = zlib(&table.data)?;
        let stored = if compressed.len() < table.data.len() {
            compressed.as_slice()
        } else {
            table.data.as_slice()
        };
        trace!(
            tag = %table.tag_str(),
            orig = table.data.len(),
            stored = stored.len(),
            "woff table"
        );

        directory.extend_from_slice(&table.tag);
        push_u32(&mut directory, offset as u32);
        push_u32(&mut directory, stored.len() as u32);
        push_u32(&mut directory, table.data.len() as u32);
        push_u32(&mut directory, table.checksum);

        data.extend_from_slice(stored);
        pad4(&mut data);
        offset += padded_len(stored.len());
    }

    let total_len = WOFF_HEADER_LEN + directory.len() + data.len();
    let mut out = Vec::with_capacity(total_len);
    push_u32(&mut out, WOFF_SIGNATURE);
    push_u32(&mut out, font.flavor);
    push_u32(&mut out, total_len as u32);
    push_u16(&mut out, num_tables as u16);
    push_u16(&mut out, 0); // reserved
    push_u32(&mut out, font.total_sfnt_size());
    push_u16(&mut out, 1); // majorVersion
    push_u16(&mut out, 0); // minorVersion
    for _ in 0..5 {
        push_u32(&mut out, 0); // no metadata or private block
    }
    out.extend_from_slice(&directory);
    out.extend_from_slice(&data);

    Ok(out)
}

/// Encode `font` as WOFF2.
pub fn encode_woff2(font: &SfntFont) -> Result<Vec<u8>, FontError> {
    // `loca` must directly follow `glyf`.
    let mut ordered: Vec<&SfntTable> = Vec::with_capacity(font.tables.len());
    let loca = font.tables.iter().find(|t| &t.tag == b"loca");
    for table in &font.tables {
        match &table.tag {
            b"loca" if font.tables.iter().any(|t| &t.tag == b"glyf") => {}
            b"glyf" => {
                ordered.push(table);
                if let Some(loca) = loca {
                    ordered.push(loca);
                }
            }
            _ => ordered.push(table),
        }
    }

    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for table in &ordered {
        let null_transform_version: u8 = if matches!(&table.tag, b"glyf" | b"loca") {
            3
        } else {
            0
        };
        let version_bits = null_transform_version << 6;

        match WOFF2_KNOWN_TAGS.iter().position(|t| *t == &table.tag) {
            Some(idx) => directory.push(idx as u8 | version_bits),
            None => {
                directory.push(0x3F | version_bits);
                directory.extend_from_slice(&table.tag);
            }
        }
        push_base128(&mut directory, table.data.len() as u32);
        stream.extend_from_slice(&table.data);
    }

    let compressed = brotli_compress(&stream)?;
    debug!(
        tables = ordered.len(),
        raw = stream.len(),
        compressed = compressed.len(),
        "woff2 stream"
    );

    let unpadded = WOFF2_HEADER_LEN + directory.len() + compressed.len();
    let total_len = padded_len(unpadded);

    let mut out = Vec::with_capacity(total_len);
    push_u32(&mut out, WOFF2_SIGNATURE);
    push_u32(&mut out, font.flavor);
    push_u32(&mut out, total_len as u32);
    push_u16(&mut out, ordered.len() as u16);
    push_u16(&mut out, 0); // reserved
    push_u32(&mut out, font.total_sfnt_size());
    push_u32(&mut out, compressed.len() as u32);
    push_u16(&mut out, 1); // majorVersion
    push_u16(&mut out, 0); // minorVersion
    for _ in 0..5 {
        push_u32(&mut out, 0);
    }
    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    pad4(&mut out);

    Ok(out)
}

/// `woff`: convert every TTF source to WOFF.
pub fn convert_to_woff(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    convert_fonts(ctx, "woff", encode_woff)
}

/// `woff2`: convert every TTF source to WOFF2.
pub fn convert_to_woff2(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    convert_fonts(ctx, "woff2", encode_woff2)
}

fn convert_fonts(
    ctx: &BuildContext,
    ext: &str,
    encode: fn(&SfntFont) -> Result<Vec<u8>, FontError>,
) -> Result<TaskReport, TaskError> {
    let fonts = &ctx.config.fonts;
    let base = ctx.resolve(&fonts.base);
    let out_dir = ctx.app_path(&fonts.output);
    let sources = SourceSet::new(&fonts.sources)?.collect(ctx.fs.as_ref(), &ctx.root)?;

    let mut report = TaskReport::default();
    for source in sources {
        let output = mirror_path(&base, &source, &out_dir, Some(ext));
        if is_up_to_date(&source, &output) {
            report.skipped += 1;
            continue;
        }
        let encoded = encode_file(&source, encode)?;
        write_file(&output, &encoded)?;
        debug!(source = ?source, output = ?output, bytes = encoded.len(), "converted font");
        report.written += 1;
    }
    Ok(report)
}

fn encode_file(
    source: &Path,
    encode: fn(&SfntFont) -> Result<Vec<u8>, FontError>,
) -> Result<Vec<u8>, TaskError> {
    let bytes = std::fs::read(source).map_err(TaskError::io(source))?;
    let font = SfntFont::parse(&bytes).map_err(|e| TaskError::transform(source, e))?;
    encode(&font).map_err(|e| TaskError::transform(source, e))
}

fn zlib(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn brotli_compress(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 11, 22);
        writer.write_all(data)?;
        writer.flush()?;
    }
    Ok(out)
}

/// UIntBase128: big-endian 7-bit groups, continuation in the high bit.
pub fn push_base128(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut v = value;
    loop {
        groups[len] = (v & 0x7F) as u8;
        len += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for (i, group) in groups[..len].iter().enumerate().rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(group | continuation);
    }
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn pad4(buf: &mut Vec<u8>) {
    buf.resize(padded_len(buf.len()), 0);
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}
