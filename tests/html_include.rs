// tests/html_include.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use sitepipe::fs::mock::MockFileSystem;
use sitepipe::tasks::html::{self, IncludeResolver};
use sitepipe::tasks::{BuildContext, TaskError};
use sitepipe_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn site() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(
        "site/src/module/index.html",
        r#"<html>@include('../partials/head.html', {"title": "Home", "meta": {"author": "Ann"}})<main>@title</main></html>"#,
    );
    fs.add_file(
        "site/src/partials/head.html",
        "<head><title>@title</title><meta content=\"@meta.author\">@include('nav.html')</head>",
    );
    fs.add_file(
        "site/src/partials/nav.html",
        "<nav>@title | @missing | mail@example.com</nav>",
    );
    fs
}

#[test]
fn nested_includes_inherit_context() -> TestResult {
    let fs = site();
    let resolver = IncludeResolver::new("@")?;

    let out = resolver.render_file(&fs, Path::new("site/src/module/index.html"))?;

    assert!(out.contains("<title>Home</title>"));
    assert!(out.contains("<meta content=\"Ann\">"));
    assert!(out.contains("<nav>Home | @missing | mail@example.com</nav>"));
    assert!(!out.contains("@include"));
    Ok(())
}

#[test]
fn placeholders_outside_included_files_are_untouched() -> TestResult {
    let fs = site();
    let resolver = IncludeResolver::new("@")?;

    let out = resolver.render_file(&fs, Path::new("site/src/module/index.html"))?;
    assert!(out.ends_with("<main>@title</main></html>"));
    Ok(())
}

#[test]
fn rendering_is_deterministic() -> TestResult {
    let fs = site();
    let resolver = IncludeResolver::new("@")?;
    let page = Path::new("site/src/module/index.html");

    assert_eq!(resolver.render_file(&fs, page)?, resolver.render_file(&fs, page)?);
    Ok(())
}

#[test]
fn custom_prefix_is_honoured() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("p/page.html", r#"<b>##include("part.html", {"x": 1})</b>"#);
    fs.add_file("p/part.html", "value=##x, @x");

    let resolver = IncludeResolver::new("##")?;
    let out = resolver.render_file(&fs, Path::new("p/page.html"))?;
    assert_eq!(out, "<b>value=1, @x</b>");
    Ok(())
}

#[test]
fn missing_include_is_reported() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("p/page.html", "@include('gone.html')");

    let resolver = IncludeResolver::new("@")?;
    let err = resolver
        .render_file(&fs, Path::new("p/page.html"))
        .expect_err("missing partial must fail");
    assert!(matches!(err, TaskError::MissingInput(ref path) if path.ends_with("gone.html")));
    Ok(())
}

#[test]
fn cyclic_include_is_an_error() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("p/a.html", "@include('b.html')");
    fs.add_file("p/b.html", "@include('a.html')");

    let resolver = IncludeResolver::new("@")?;
    let err = resolver
        .render_file(&fs, Path::new("p/a.html"))
        .expect_err("cycle must fail");
    assert!(matches!(err, TaskError::Transform { .. }));
    Ok(())
}

#[test]
fn malformed_directive_is_an_error() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("p/page.html", "@include(part.html)");

    let resolver = IncludeResolver::new("@")?;
    let err = resolver
        .render_file(&fs, Path::new("p/page.html"))
        .expect_err("unquoted path must fail");
    assert!(err.to_string().contains("quoted"));
    Ok(())
}

#[test]
fn include_pages_writes_top_level_pages_into_app() -> TestResult {
    let fs = site();
    fs.add_file("site/src/module/about.html", "<p>about</p>");
    fs.add_file("site/src/module/nested/skip.html", "<p>nested</p>");

    let config = Arc::new(ConfigFileBuilder::new().build());
    let ctx = BuildContext::with_fs("site", config, Arc::new(fs.clone()));

    let report = html::include_pages(&ctx)?;
    assert_eq!(report.written, 2);

    let index = fs
        .contents("site/app/index.html")
        .ok_or("index.html not written")?;
    assert!(String::from_utf8(index)?.contains("<title>Home</title>"));
    assert_eq!(
        fs.contents("site/app/about.html").as_deref(),
        Some(&b"<p>about</p>"[..])
    );
    assert!(fs.contents("site/app/skip.html").is_none());
    Ok(())
}

#[test]
fn minify_pages_shrinks_app_pages_in_place() -> TestResult {
    let fs = MockFileSystem::new();
    let page = "<!DOCTYPE html>\n<html>\n  <head>\n    <title>x</title>\n  </head>\n  <body>\n    <p>hi</p>\n  </body>\n</html>\n";
    fs.add_file("site/app/index.html", page);

    let config = Arc::new(ConfigFileBuilder::new().build());
    let ctx = BuildContext::with_fs("site", config, Arc::new(fs.clone()));

    let report = html::minify_pages(&ctx)?;
    assert_eq!(report.written, 1);

    let minified = String::from_utf8(fs.contents("site/app/index.html").ok_or("page vanished")?)?;
    assert!(minified.len() < page.len());
    assert!(minified.contains("<p>hi</p>"));
    assert!(!minified.contains("\n    "));
    Ok(())
}
