// tests/favicons.rs

use std::error::Error;

use image::Rgba;

use sitepipe::config::FaviconsSection;
use sitepipe::tasks::favicons::{self, MANIFEST_FILE};
use sitepipe_test_utils::builders::TestProject;
use sitepipe_test_utils::fixtures::write_png;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn hex_colours_parse_in_short_and_long_form() {
    assert_eq!(favicons::parse_hex_color("#020307"), Some(Rgba([2, 3, 7, 255])));
    assert_eq!(favicons::parse_hex_color("#fff"), Some(Rgba([255, 255, 255, 255])));
    assert_eq!(favicons::parse_hex_color("#A0b"), Some(Rgba([170, 0, 187, 255])));

    assert_eq!(favicons::parse_hex_color("020307"), None);
    assert_eq!(favicons::parse_hex_color("#12345"), None);
    assert_eq!(favicons::parse_hex_color("#zzzzzz"), None);
}

#[test]
fn manifest_lists_android_icons_under_the_configured_path() -> TestResult {
    let cfg = FaviconsSection::default();
    let manifest: serde_json::Value = serde_json::from_str(&favicons::manifest_json(&cfg))?;

    assert_eq!(manifest["name"], "My App");
    assert_eq!(manifest["short_name"], "App");
    assert_eq!(manifest["display"], "standalone");
    assert_eq!(manifest["start_url"], "/?homescreen=1");
    assert_eq!(manifest["background_color"], "#020307");

    let icons = manifest["icons"].as_array().ok_or("icons is not an array")?;
    assert_eq!(icons.len(), 2);
    assert_eq!(icons[0]["src"], "favicons/android-chrome-192x192.png");
    assert_eq!(icons[1]["sizes"], "512x512");
    Ok(())
}

#[test]
fn snippet_links_every_generated_icon() {
    let cfg = FaviconsSection {
        path: "/static/icons/".to_string(),
        ..FaviconsSection::default()
    };
    let html = favicons::html_snippet(&cfg);

    assert!(html.contains(r#"href="/static/icons/favicon.ico""#));
    assert!(html.contains(r#"sizes="32x32" href="/static/icons/favicon-32x32.png""#));
    assert!(html.contains(r#"rel="apple-touch-icon" sizes="180x180""#));
    assert!(html.contains(r#"<link rel="manifest" href="/static/icons/manifest.webmanifest">"#));
    assert!(html.contains(r##"<meta name="theme-color" content="#ffffff">"##));
}

#[test]
fn generate_writes_the_full_icon_set() -> TestResult {
    let project = TestProject::new();
    write_png(&project.path("src/favicons/logo.png"), 64, 64);

    let report = favicons::generate_favicons(project.ctx())?;
    assert_eq!(report.written, 9);

    assert_eq!(
        project.files_under("app/favicons"),
        [
            "android-chrome-192x192.png",
            "android-chrome-512x512.png",
            "apple-touch-icon.png",
            "favicon-16x16.png",
            "favicon-32x32.png",
            "favicon-48x48.png",
            "favicon.ico",
            "index.html",
            MANIFEST_FILE,
        ]
    );

    let icon = image::open(project.path("app/favicons/favicon-32x32.png"))?;
    assert_eq!((icon.width(), icon.height()), (32, 32));
    let apple = image::open(project.path("app/favicons/apple-touch-icon.png"))?;
    assert_eq!((apple.width(), apple.height()), (180, 180));

    let ico = project.read("app/favicons/favicon.ico");
    assert_eq!(&ico[..4], &[0, 0, 1, 0]);
    assert_eq!(u16::from_le_bytes([ico[4], ico[5]]), 3, "three ico frames");
    Ok(())
}

#[test]
fn no_source_means_nothing_to_do() -> TestResult {
    let project = TestProject::new();
    let report = favicons::generate_favicons(project.ctx())?;
    assert_eq!(report.written, 0);
    assert!(!project.exists("app/favicons"));
    Ok(())
}
