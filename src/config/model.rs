// src/config/model.rs

use serde::Deserialize;

use crate::types::{HashStorageMode, TriggerWhileRunningBehaviour};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [paths]
/// app = "app"
/// dist = "dist"
///
/// [styles]
/// browsers = ["last 10 versions"]
///
/// [[watch.binding]]
/// watch = ["src/scss/**/*.scss"]
/// run = "styles"
/// ```
///
/// All sections are optional; the defaults reproduce the stock project
/// layout (`src/` sources, `app/` dev output, `dist/` release output).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub html: HtmlSection,
    #[serde(default)]
    pub styles: StylesSection,
    #[serde(default)]
    pub scripts: ScriptsSection,
    #[serde(default)]
    pub images: ImagesSection,
    #[serde(default)]
    pub sprite: SpriteSection,
    #[serde(default)]
    pub fonts: FontsSection,
    #[serde(default)]
    pub favicons: FaviconsSection,
    #[serde(default)]
    pub release: ReleaseSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub watch: WatchSection,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holders of a `ConfigFile` can rely on its invariants.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub html: HtmlSection,
    pub styles: StylesSection,
    pub scripts: ScriptsSection,
    pub images: ImagesSection,
    pub sprite: SpriteSection,
    pub fonts: FontsSection,
    pub favicons: FaviconsSection,
    pub release: ReleaseSection,
    pub server: ServerSection,
    pub watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            paths: raw.paths,
            html: raw.html,
            styles: raw.styles,
            scripts: raw.scripts,
            images: raw.images,
            sprite: raw.sprite,
            fonts: raw.fonts,
            favicons: raw.favicons,
            release: raw.release,
            server: raw.server,
            watch: raw.watch,
        }
    }
}

/// `[paths]` section: top-level directories, relative to the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
    /// Development output directory (served by `serve`).
    pub app: String,
    /// Release output directory.
    pub dist: String,
    /// Directory receiving the release archive.
    pub archive_dir: String,
    /// File name of the release archive.
    pub archive_name: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            app: "app".to_string(),
            dist: "dist".to_string(),
            archive_dir: "dist-zip".to_string(),
            archive_name: "dist.zip".to_string(),
        }
    }
}

/// `[html]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlSection {
    /// Page sources; each match becomes `<app>/<file name>`.
    pub pages: String,
    /// Directive prefix, so `@include(...)` and `@title` with the default.
    pub include_prefix: String,
    /// Pages minified in place by `html_minify` (relative to `app`).
    pub minify: String,
}

impl Default for HtmlSection {
    fn default() -> Self {
        Self {
            pages: "src/module/*.html".to_string(),
            include_prefix: "@".to_string(),
            minify: "*.html".to_string(),
        }
    }
}

/// `[styles]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesSection {
    pub entry: String,
    /// Output path relative to `app`.
    pub output: String,
    /// Browserslist queries used for vendor prefixing.
    pub browsers: Vec<String>,
}

impl Default for StylesSection {
    fn default() -> Self {
        Self {
            entry: "src/scss/main.scss".to_string(),
            output: "css/main.min.css".to_string(),
            browsers: vec!["last 10 versions".to_string()],
        }
    }
}

/// `[scripts]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsSection {
    /// Entry files, concatenated in order.
    pub entries: Vec<String>,
    /// Output path relative to `app`.
    pub output: String,
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            entries: vec!["src/js/main.js".to_string()],
            output: "js/main.min.js".to_string(),
        }
    }
}

/// `[images]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesSection {
    /// Base directory; outputs mirror paths relative to it.
    pub base: String,
    /// Sources for `images` (optimization in original format).
    pub sources: String,
    /// Raster sources for `avif_images` / `webp_images`.
    pub raster_sources: String,
    /// Output directory relative to `app`.
    pub output: String,
    pub jpeg_quality: u8,
    pub avif_quality: u8,
    /// rav1e speed preset, 1 (slowest) to 10 (fastest).
    pub avif_speed: u8,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            base: "src/images".to_string(),
            sources: "src/images/**/*.{png,jpg,jpeg,gif,svg}".to_string(),
            raster_sources: "src/images/**/*.{png,jpg,jpeg}".to_string(),
            output: "images".to_string(),
            jpeg_quality: 90,
            avif_quality: 50,
            avif_speed: 6,
        }
    }
}

/// `[sprite]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpriteSection {
    pub icons: String,
    /// Output path relative to `app`.
    pub output: String,
    /// Presentation attributes removed from every icon element.
    pub strip_attributes: Vec<String>,
}

impl Default for SpriteSection {
    fn default() -> Self {
        Self {
            icons: "src/images/icons/*.svg".to_string(),
            output: "images/sprite/sprite.svg".to_string(),
            strip_attributes: vec![
                "fill".to_string(),
                "stroke".to_string(),
                "style".to_string(),
            ],
        }
    }
}

/// `[fonts]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsSection {
    pub base: String,
    pub sources: String,
    /// Output directory relative to `app`.
    pub output: String,
}

impl Default for FontsSection {
    fn default() -> Self {
        Self {
            base: "src/fonts".to_string(),
            sources: "src/fonts/**/*.ttf".to_string(),
            output: "fonts".to_string(),
        }
    }
}

/// `[favicons]` section: source images plus web app metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaviconsSection {
    pub sources: String,
    /// Output directory relative to `app`.
    pub output: String,
    pub app_name: String,
    pub app_short_name: String,
    pub app_description: String,
    pub developer_name: String,
    pub developer_url: String,
    /// Background colour (`#rrggbb`) for opaque icons and the manifest.
    pub background: String,
    pub theme_color: String,
    /// URL prefix used in the generated `<link>` tags.
    pub path: String,
    pub display: String,
    pub orientation: String,
    pub scope: String,
    pub start_url: String,
    pub version: String,
    /// File name of the generated HTML snippet.
    pub html: String,
}

impl Default for FaviconsSection {
    fn default() -> Self {
        Self {
            sources: "src/favicons/*.{png,jpg,jpeg}".to_string(),
            output: "favicons".to_string(),
            app_name: "My App".to_string(),
            app_short_name: "App".to_string(),
            app_description: "This is my application".to_string(),
            developer_name: "Hayden Bleasel".to_string(),
            developer_url: "http://haydenbleasel.com/".to_string(),
            background: "#020307".to_string(),
            theme_color: "#ffffff".to_string(),
            path: "favicons/".to_string(),
            display: "standalone".to_string(),
            orientation: "portrait".to_string(),
            scope: "/".to_string(),
            start_url: "/?homescreen=1".to_string(),
            version: "1.0".to_string(),
            html: "index.html".to_string(),
        }
    }
}

/// `[release]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseSection {
    /// Globs relative to `app` copied into `dist`.
    pub include: Vec<String>,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            include: vec![
                "css/main.min.css".to_string(),
                "fonts/**/*".to_string(),
                "js/main.min.js".to_string(),
                "*.html".to_string(),
                "images/**/*".to_string(),
                "favicons/**/*".to_string(),
            ],
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    /// `"queue"` (default) or `"cancel"`.
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,
    /// Maximum number of queued runs to remember.
    pub queue_length: usize,
    /// Default `use_hash` for bindings that don't set it.
    pub use_hash: bool,
    pub hash_storage_mode: HashStorageMode,
    /// Binding table; replaces the built-in table when present.
    #[serde(rename = "binding")]
    pub bindings: Vec<WatchBindingConfig>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::Queue,
            queue_length: 1,
            use_hash: false,
            hash_storage_mode: HashStorageMode::Memory,
            bindings: default_bindings(),
        }
    }
}

/// `[[watch.binding]]` entry.
///
/// Exactly one of `run` / `reload = true` must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchBindingConfig {
    pub watch: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Leaf task re-run when a matching path changes.
    #[serde(default)]
    pub run: Option<String>,
    /// Emit a full reload to connected browsers instead of running a task.
    #[serde(default)]
    pub reload: bool,
    /// Per-binding override of `[watch].use_hash`.
    #[serde(default)]
    pub use_hash: Option<bool>,
}

impl WatchBindingConfig {
    pub fn run(task: &str, watch: &[&str]) -> Self {
        Self {
            watch: watch.iter().map(|s| s.to_string()).collect(),
            run: Some(task.to_string()),
            ..Self::default()
        }
    }

    pub fn reload(watch: &[&str]) -> Self {
        Self {
            watch: watch.iter().map(|s| s.to_string()).collect(),
            reload: true,
            ..Self::default()
        }
    }

    pub fn excluding(mut self, pattern: &str) -> Self {
        self.exclude.push(pattern.to_string());
        self
    }

    /// Effective `use_hash`, falling back to the section default.
    pub fn effective_use_hash(&self, default_use_hash: bool) -> bool {
        self.use_hash.unwrap_or(default_use_hash)
    }
}

/// The stock binding table.
pub fn default_bindings() -> Vec<WatchBindingConfig> {
    vec![
        WatchBindingConfig::run("styles", &["src/scss/**/*.scss"]),
        WatchBindingConfig::run("scripts", &["src/js/**/*.js"]).excluding("app/js/main.min.js"),
        WatchBindingConfig::reload(&["src/**/*.html"]),
        WatchBindingConfig::run("html_include", &["src/module/**/*.html"]),
        WatchBindingConfig::run("avif_images", &["src/images/**"]),
        WatchBindingConfig::run("webp_images", &["src/images/**"]),
        WatchBindingConfig::run("images", &["src/images/**"]),
        WatchBindingConfig::run("svg_sprites", &["src/images/icons/*.svg"]),
    ]
}
