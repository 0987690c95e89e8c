// src/tasks/svg.rs

//! Minimal SVG rewriting on top of `quick-xml`.
//!
//! Used by `images` (minify in place) and `svg_sprites` (extract each icon's
//! body and `viewBox`). Comments, declarations, doctypes, processing
//! instructions, `<metadata>` subtrees and whitespace-only text are dropped.

use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::tasks::TaskError;

const DROPPED_ELEMENTS: &[&[u8]] = &[b"metadata"];

/// A parsed SVG file: the root element's attributes and its serialized
/// children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgDocument {
    pub root_attributes: Vec<(String, String)>,
    pub body: String,
}

impl SvgDocument {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.root_attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize back to a standalone `<svg>` document.
    pub fn to_svg(&self) -> String {
        let mut out = String::from("<svg");
        for (key, value) in &self.root_attributes {
            out.push_str(&format!(" {key}=\"{}\"", escape(value.as_str())));
        }
        if self.body.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&self.body);
            out.push_str("</svg>");
        }
        out
    }
}

/// Parse `source`, removing every attribute named in `strip` from the
/// root's descendants.
pub fn parse(path: &Path, source: &str, strip: &[String]) -> Result<SvgDocument, TaskError> {
    let fail = |msg: String| TaskError::transform(path, msg);

    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut root: Option<Vec<(String, String)>> = None;
    let mut depth = 0usize;
    let mut skip_from: Option<usize> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| fail(format!("{e} at byte {}", reader.buffer_position())))?;

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                if root.is_none() {
                    root = Some(root_attributes(path, &e)?);
                    continue;
                }
                depth += 1;
                if skip_from.is_some() {
                    continue;
                }
                if DROPPED_ELEMENTS.contains(&e.name().as_ref()) {
                    skip_from = Some(depth);
                    continue;
                }
                writer
                    .write_event(Event::Start(filtered(path, &e, strip)?))
                    .map_err(|e| fail(e.to_string()))?;
            }
            Event::End(e) => {
                if depth == 0 {
                    continue;
                }
                let closing = depth;
                depth -= 1;
                if let Some(start) = skip_from {
                    if start == closing {
                        skip_from = None;
                    }
                    continue;
                }
                writer
                    .write_event(Event::End(e))
                    .map_err(|e| fail(e.to_string()))?;
            }
            Event::Empty(e) => {
                if root.is_none() {
                    root = Some(root_attributes(path, &e)?);
                    continue;
                }
                if skip_from.is_some() || DROPPED_ELEMENTS.contains(&e.name().as_ref()) {
                    continue;
                }
                writer
                    .write_event(Event::Empty(filtered(path, &e, strip)?))
                    .map_err(|e| fail(e.to_string()))?;
            }
            Event::Text(_) | Event::CData(_) if root.is_none() || skip_from.is_some() => {}
            Event::Text(t) => writer
                .write_event(Event::Text(t))
                .map_err(|e| fail(e.to_string()))?,
            Event::CData(c) => writer
                .write_event(Event::CData(c))
                .map_err(|e| fail(e.to_string()))?,
            _ => {}
        }
    }

    let root_attributes = root.ok_or_else(|| fail("no <svg> root element".to_string()))?;
    let body = String::from_utf8(writer.into_inner()).map_err(|e| fail(e.to_string()))?;

    Ok(SvgDocument {
        root_attributes,
        body,
    })
}

/// Minify a standalone SVG document.
pub fn minify(path: &Path, source: &str) -> Result<String, TaskError> {
    Ok(parse(path, source, &[])?.to_svg())
}

fn root_attributes(path: &Path, e: &BytesStart<'_>) -> Result<Vec<(String, String)>, TaskError> {
    if e.name().as_ref() != b"svg" {
        return Err(TaskError::transform(path, "root element is not <svg>"));
    }
    attributes(path, e)
        .map(|attrs| attrs.filter(|(key, _)| !is_editor_attribute(key)).collect())
}

fn filtered(
    path: &Path,
    e: &BytesStart<'_>,
    strip: &[String],
) -> Result<BytesStart<'static>, TaskError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| TaskError::transform(path, err))?
        .to_string();
    let mut out = BytesStart::new(name);
    for (key, value) in attributes(path, e)? {
        if is_editor_attribute(&key) || strip.iter().any(|s| *s == key) {
            continue;
        }
        out.push_attribute((key.as_str(), value.as_str()));
    }
    Ok(out)
}

fn attributes(
    path: &Path,
    e: &BytesStart<'_>,
) -> Result<impl Iterator<Item = (String, String)>, TaskError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| TaskError::transform(path, err))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| TaskError::transform(path, err))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| TaskError::transform(path, err))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out.into_iter())
}

/// Namespaced attributes left behind by drawing tools.
fn is_editor_attribute(key: &str) -> bool {
    ["sodipodi:", "inkscape:", "xmlns:sodipodi", "xmlns:inkscape", "sketch:", "xmlns:sketch"]
        .iter()
        .any(|prefix| key.starts_with(prefix))
}
