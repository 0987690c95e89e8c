// tests/release.rs

use std::error::Error;
use std::fs::File;
use std::io::Read;

use sitepipe::tasks::{release, TaskError};
use sitepipe_test_utils::builders::{ConfigFileBuilder, TestProject};

type TestResult = Result<(), Box<dyn Error>>;

const RELEASED: [&str; 8] = [
    "about.html",
    "css/main.min.css",
    "favicons/favicon.ico",
    "fonts/a.woff2",
    "images/a.png",
    "images/sprite/sprite.svg",
    "index.html",
    "js/main.min.js",
];

fn built_project() -> TestProject {
    let project = TestProject::new();
    for rel in RELEASED {
        project.write(&format!("app/{rel}"), format!("contents of {rel}"));
    }
    // Not covered by the stock include list.
    project.write("app/css/scratch.css", "scratch");
    project.write("app/notes.txt", "notes");
    project.write("app/drafts/page.html", "draft");
    project
}

fn run_release(project: &TestProject) -> Result<(), TaskError> {
    release::clean_dist(project.ctx())?;
    release::copy_dist(project.ctx())?;
    release::zip_dist(project.ctx())?;
    Ok(())
}

fn archive_entries(project: &TestProject) -> Result<Vec<(String, String)>, Box<dyn Error>> {
    let file = File::open(project.path("dist-zip/dist.zip"))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entries = Vec::new();
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx)?;
        let mut contents = String::new();
        entry.read_to_string(&mut contents)?;
        entries.push((entry.name().to_string(), contents));
    }
    Ok(entries)
}

#[test]
fn copy_preserves_relative_paths_of_included_files() -> TestResult {
    let project = built_project();

    let report = release::copy_dist(project.ctx())?;
    assert_eq!(report.written, RELEASED.len());
    assert_eq!(project.files_under("dist"), RELEASED);
    assert_eq!(
        project.read_string("dist/images/sprite/sprite.svg"),
        "contents of images/sprite/sprite.svg"
    );
    Ok(())
}

#[test]
fn custom_include_list_narrows_the_copy() -> TestResult {
    let project = TestProject::with_config(
        ConfigFileBuilder::new()
            .with_release_include(&["*.html", "js/*.js"])
            .build(),
    );
    project.write("app/index.html", "i");
    project.write("app/js/main.min.js", "j");
    project.write("app/css/main.min.css", "c");

    release::copy_dist(project.ctx())?;
    assert_eq!(project.files_under("dist"), ["index.html", "js/main.min.js"]);
    Ok(())
}

#[test]
fn clean_tolerates_a_missing_directory() -> TestResult {
    let project = TestProject::new();
    release::clean_dist(project.ctx())?;
    release::clean_dist(project.ctx())?;
    assert!(!project.exists("dist"));
    Ok(())
}

#[test]
fn clean_removes_stale_release_files() -> TestResult {
    let project = built_project();
    project.write("dist/old-build.js", "stale");

    release::clean_dist(project.ctx())?;
    release::copy_dist(project.ctx())?;

    assert!(!project.exists("dist/old-build.js"));
    assert_eq!(project.files_under("dist"), RELEASED);
    Ok(())
}

#[test]
fn archive_contains_every_released_file() -> TestResult {
    let project = built_project();
    run_release(&project)?;

    let entries = archive_entries(&project)?;
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, RELEASED);

    for (name, contents) in &entries {
        assert!(!name.contains('\\'));
        assert_eq!(*contents, format!("contents of {name}"));
    }
    Ok(())
}

#[test]
fn archive_without_release_directory_is_missing_input() {
    let project = built_project();
    let err = release::zip_dist(project.ctx()).expect_err("nothing to archive");
    assert!(matches!(err, TaskError::MissingInput(ref p) if p.ends_with("dist")));
}

#[test]
fn rebuilding_after_deleting_dist_gives_the_same_tree() -> TestResult {
    let project = built_project();

    run_release(&project)?;
    let first_files = project.files_under("dist");
    let first_archive = archive_entries(&project)?;

    std::fs::remove_dir_all(project.path("dist"))?;
    assert!(!project.exists("dist"));

    run_release(&project)?;
    assert_eq!(project.files_under("dist"), first_files);
    assert_eq!(archive_entries(&project)?, first_archive);

    for rel in &first_files {
        assert_eq!(
            project.read(&format!("dist/{rel}")),
            project.read(&format!("app/{rel}"))
        );
    }
    Ok(())
}
