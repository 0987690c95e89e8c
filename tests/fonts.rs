// tests/fonts.rs

use std::error::Error;
use std::io::Read;

use sitepipe::tasks::fonts::{self, FontError, SfntFont};
use sitepipe_test_utils::builders::TestProject;
use sitepipe_test_utils::fixtures::{minimal_ttf, write_ttf};

type TestResult = Result<(), Box<dyn Error>>;

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[test]
fn one_output_per_input_and_format() -> TestResult {
    let project = TestProject::new();
    write_ttf(&project.path("src/fonts/a.ttf"));
    write_ttf(&project.path("src/fonts/b.ttf"));
    project.write("src/fonts/readme.txt", "not a font");

    let woff = fonts::convert_to_woff(project.ctx())?;
    let woff2 = fonts::convert_to_woff2(project.ctx())?;
    assert_eq!(woff.written, 2);
    assert_eq!(woff2.written, 2);

    assert_eq!(
        project.files_under("app/fonts"),
        ["a.woff", "a.woff2", "b.woff", "b.woff2"]
    );
    Ok(())
}

#[test]
fn nested_fonts_keep_their_directory() -> TestResult {
    let project = TestProject::new();
    write_ttf(&project.path("src/fonts/display/c.ttf"));

    fonts::convert_to_woff(project.ctx())?;
    assert_eq!(project.files_under("app/fonts"), ["display/c.woff"]);
    Ok(())
}

#[test]
fn unchanged_fonts_are_skipped() -> TestResult {
    let project = TestProject::new();
    write_ttf(&project.path("src/fonts/a.ttf"));

    fonts::convert_to_woff2(project.ctx())?;
    let again = fonts::convert_to_woff2(project.ctx())?;
    assert_eq!(again.written, 0);
    assert_eq!(again.skipped, 1);
    Ok(())
}

#[test]
fn woff_header_and_tables_are_consistent() -> TestResult {
    let ttf = minimal_ttf();
    let font = SfntFont::parse(&ttf)?;
    let woff = fonts::encode_woff(&font)?;

    assert_eq!(&woff[..4], b"wOFF");
    assert_eq!(u32_at(&woff, 4), 0x0001_0000);
    assert_eq!(u32_at(&woff, 8) as usize, woff.len());
    assert_eq!(u16_at(&woff, 12), 5);
    assert_eq!(u32_at(&woff, 16), font.total_sfnt_size());

    // Every table decodes back to the original bytes.
    for (idx, table) in font.tables.iter().enumerate() {
        let entry = 44 + idx * 20;
        assert_eq!(&woff[entry..entry + 4], &table.tag);
        let offset = u32_at(&woff, entry + 4) as usize;
        let comp_len = u32_at(&woff, entry + 8) as usize;
        let orig_len = u32_at(&woff, entry + 12) as usize;
        assert_eq!(orig_len, table.data.len());
        assert_eq!(offset % 4, 0);

        let stored = &woff[offset..offset + comp_len];
        let decoded = if comp_len < orig_len {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(stored).read_to_end(&mut out)?;
            out
        } else {
            stored.to_vec()
        };
        assert_eq!(decoded, table.data);
    }
    Ok(())
}

#[test]
fn woff2_stream_holds_every_table() -> TestResult {
    let font = SfntFont::parse(&minimal_ttf())?;
    let woff2 = fonts::encode_woff2(&font)?;

    assert_eq!(&woff2[..4], b"wOF2");
    assert_eq!(u32_at(&woff2, 8) as usize, woff2.len());
    assert_eq!(woff2.len() % 4, 0);
    assert_eq!(u16_at(&woff2, 12), 5);

    let compressed_len = u32_at(&woff2, 20) as usize;
    // Directory: five known tags, one flag byte plus a one-byte length each.
    let stream_start = 48 + 5 * 2;
    let mut stream = Vec::new();
    brotli::Decompressor::new(&woff2[stream_start..stream_start + compressed_len], 4096)
        .read_to_end(&mut stream)?;

    let expected: usize = font.tables.iter().map(|t| t.data.len()).sum();
    assert_eq!(stream.len(), expected);
    Ok(())
}

#[test]
fn woff2_places_loca_right_after_glyf() -> TestResult {
    let font = SfntFont::parse(&minimal_ttf())?;
    let woff2 = fonts::encode_woff2(&font)?;

    // Known-tag indices: OS/2 = 6, glyf = 10, loca = 11, head = 1, maxp = 4.
    let flags: Vec<u8> = woff2[48..58].iter().step_by(2).map(|b| b & 0x3F).collect();
    assert_eq!(flags, [6, 10, 11, 1, 4]);

    // glyf and loca carry the null transform (version 3).
    let versions: Vec<u8> = woff2[48..58].iter().step_by(2).map(|b| b >> 6).collect();
    assert_eq!(versions, [0, 3, 3, 0, 0]);
    Ok(())
}

#[test]
fn base128_uses_minimal_big_endian_groups() {
    let encode = |v: u32| {
        let mut out = Vec::new();
        fonts::push_base128(&mut out, v);
        out
    };
    assert_eq!(encode(0), [0x00]);
    assert_eq!(encode(63), [0x3F]);
    assert_eq!(encode(128), [0x81, 0x00]);
    assert_eq!(encode(16_384), [0x81, 0x80, 0x00]);
    assert_eq!(encode(u32::MAX), [0x8F, 0xFF, 0xFF, 0xFF, 0x7F]);
}

#[test]
fn malformed_fonts_are_rejected() {
    assert!(matches!(SfntFont::parse(b"abc"), Err(FontError::Truncated)));

    let mut bad_flavor = minimal_ttf();
    bad_flavor[..4].copy_from_slice(b"WXYZ");
    assert!(matches!(
        SfntFont::parse(&bad_flavor),
        Err(FontError::UnsupportedFlavor(_))
    ));

    let mut bad_offset = minimal_ttf();
    // Push the first table's offset past the end of the file.
    bad_offset[12 + 8..12 + 12].copy_from_slice(&u32::MAX.to_be_bytes());
    assert!(matches!(
        SfntFont::parse(&bad_offset),
        Err(FontError::TableOutOfBounds { .. })
    ));
}

#[test]
fn corrupt_ttf_fails_the_task() {
    let project = TestProject::new();
    project.write("src/fonts/broken.ttf", b"garbage!garbage!");

    let err = fonts::convert_to_woff(project.ctx()).expect_err("corrupt font must fail");
    assert!(err.to_string().contains("broken.ttf"));
}
