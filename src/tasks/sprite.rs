// src/tasks/sprite.rs

use std::path::Path;

use quick_xml::escape::escape;
use tracing::{debug, warn};

use crate::tasks::paths::SourceSet;
use crate::tasks::svg::{self, SvgDocument};
use crate::tasks::{BuildContext, TaskError, TaskReport};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Shows only the icon addressed by the URL fragment (`sprite.svg#name`).
const STACK_STYLE: &str = ":root>svg{display:none}:root>svg:target{display:block}";

/// `svg_sprites`: merge every icon into one stacked sprite.
///
/// Each icon becomes a nested `<svg id="<file stem>">` keeping its
/// `viewBox`; presentation attributes from `[sprite].strip_attributes` are
/// removed so icons can be recoloured from CSS.
pub fn build_sprite(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let sprite = &ctx.config.sprite;
    let icons = SourceSet::new(&sprite.icons)?.collect(ctx.fs.as_ref(), &ctx.root)?;
    if icons.is_empty() {
        debug!(pattern = %sprite.icons, "no icons matched; skipping sprite");
        return Ok(TaskReport::default());
    }

    let mut parsed = Vec::with_capacity(icons.len());
    for path in &icons {
        let source = ctx
            .fs
            .read_to_string(path)
            .map_err(|e| TaskError::transform(path, e))?;
        let doc = svg::parse(path, &source, &sprite.strip_attributes)?;
        parsed.push((icon_id(path), doc));
    }

    let out = ctx.app_path(&sprite.output);
    ctx.fs
        .write(&out, render_stack(&parsed).as_bytes())
        .map_err(|e| TaskError::transform(&out, e))?;

    debug!(icons = parsed.len(), output = ?out, "wrote sprite");
    Ok(TaskReport::written(1))
}

fn icon_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(' ', "-"))
        .unwrap_or_default()
}

/// Render the stacked sprite document.
pub fn render_stack(icons: &[(String, SvgDocument)]) -> String {
    let mut out = format!("<svg xmlns=\"{SVG_NS}\"><style>{STACK_STYLE}</style>");

    for (id, doc) in icons {
        let view_box = match doc.attribute("viewBox") {
            Some(vb) => vb.to_string(),
            None => {
                let width = doc.attribute("width");
                let height = doc.attribute("height");
                match (width, height) {
                    (Some(w), Some(h)) => format!("0 0 {} {}", strip_units(w), strip_units(h)),
                    _ => {
                        warn!(icon = %id, "icon has neither viewBox nor width/height");
                        String::new()
                    }
                }
            }
        };

        out.push_str(&format!("<svg id=\"{}\"", escape(id.as_str())));
        if !view_box.is_empty() {
            out.push_str(&format!(" viewBox=\"{}\"", escape(view_box.as_str())));
        }
        out.push('>');
        out.push_str(&doc.body);
        out.push_str("</svg>");
    }

    out.push_str("</svg>");
    out
}

fn strip_units(value: &str) -> &str {
    value.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
}
