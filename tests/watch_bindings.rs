// tests/watch_bindings.rs

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use sitepipe::config::{WatchBindingConfig, WatchSection};
use sitepipe::engine::{RuntimeEvent, TriggerReason};
use sitepipe::fs::RealFileSystem;
use sitepipe::server::{ReloadHub, ReloadSignal};
use sitepipe::types::ReloadKind;
use sitepipe::watch::cache::FileCache;
use sitepipe::watch::{
    build_bindings, collect_matching_files, process_file_change, BindingAction, MemoryHashStore,
    WatchBinding, WatchContext,
};
use sitepipe_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn default_bindings() -> Vec<WatchBinding> {
    build_bindings(&WatchSection::default()).expect("stock bindings compile")
}

/// Actions of every binding that matches `rel`, in table order.
fn fired(bindings: &[WatchBinding], rel: &str) -> Vec<BindingAction> {
    bindings
        .iter()
        .filter(|b| b.matches(rel))
        .map(|b| b.action().clone())
        .collect()
}

fn run(task: &str) -> BindingAction {
    BindingAction::RunTask(task.to_string())
}

#[test]
fn stock_table_routes_sources_to_their_tasks() {
    let bindings = default_bindings();

    assert_eq!(fired(&bindings, "src/scss/main.scss"), [run("styles")]);
    assert_eq!(fired(&bindings, "src/scss/parts/_nav.scss"), [run("styles")]);
    assert_eq!(fired(&bindings, "src/js/main.js"), [run("scripts")]);
    assert_eq!(fired(&bindings, "src/index.html"), [BindingAction::Reload]);
    assert_eq!(
        fired(&bindings, "src/module/header.html"),
        [BindingAction::Reload, run("html_include")]
    );
    assert_eq!(
        fired(&bindings, "src/images/photos/a.png"),
        [run("avif_images"), run("webp_images"), run("images")]
    );
    assert_eq!(
        fired(&bindings, "src/images/icons/home.svg"),
        [
            run("avif_images"),
            run("webp_images"),
            run("images"),
            run("svg_sprites")
        ]
    );

    assert!(fired(&bindings, "app/css/main.min.css").is_empty());
    assert!(fired(&bindings, "README.md").is_empty());
}

#[test]
fn binding_ids_combine_position_and_action() {
    let ids: Vec<String> = default_bindings()
        .iter()
        .map(|b| b.id().to_string())
        .collect();
    assert_eq!(ids[0], "0:styles");
    assert_eq!(ids[2], "2:reload");
    assert_eq!(ids[7], "7:svg_sprites");
}

#[test]
fn single_star_stays_within_one_segment() {
    let bindings = default_bindings();
    // svg_sprites watches `src/images/icons/*.svg` only.
    let nested = fired(&bindings, "src/images/icons/extra/x.svg");
    assert!(!nested.contains(&run("svg_sprites")));
}

#[test]
fn exclude_patterns_win_over_watch_patterns() -> TestResult {
    let section = WatchSection {
        bindings: vec![WatchBindingConfig::run("scripts", &["src/js/**/*.js"])
            .excluding("src/js/vendor/**")],
        ..WatchSection::default()
    };
    let bindings = build_bindings(&section)?;

    assert!(bindings[0].matches("src/js/app.js"));
    assert!(!bindings[0].matches("src/js/vendor/jquery.js"));
    Ok(())
}

#[test]
fn per_binding_use_hash_overrides_the_section_default() -> TestResult {
    let mut hashed = WatchBindingConfig::reload(&["src/**/*.html"]);
    hashed.use_hash = Some(true);
    let section = WatchSection {
        use_hash: false,
        bindings: vec![hashed, WatchBindingConfig::run("styles", &["src/scss/**"])],
        ..WatchSection::default()
    };
    let bindings = build_bindings(&section)?;

    assert!(bindings[0].use_hash());
    assert!(!bindings[1].use_hash());
    Ok(())
}

#[test]
fn invalid_glob_is_reported() {
    let section = WatchSection {
        bindings: vec![WatchBindingConfig::run("styles", &["src/[scss"])],
        ..WatchSection::default()
    };
    assert!(build_bindings(&section).is_err());
}

struct WatchHarness {
    _dir: TempDir,
    root: PathBuf,
    ctx: WatchContext,
    runtime_rx: mpsc::Receiver<RuntimeEvent>,
    reload_rx: broadcast::Receiver<ReloadSignal>,
}

impl WatchHarness {
    fn new(section: WatchSection) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().canonicalize().expect("canonical tempdir");
        let (runtime_tx, runtime_rx) = mpsc::channel(16);
        let reload = ReloadHub::new();
        let reload_rx = reload.subscribe();

        let ctx = WatchContext {
            root: root.clone(),
            fs: Arc::new(RealFileSystem),
            bindings: Arc::new(build_bindings(&section).expect("bindings compile")),
            runtime_tx,
            reload,
            hash_store: Arc::new(Mutex::new(Box::new(MemoryHashStore::new()))),
            file_cache: Arc::new(Mutex::new(FileCache::new())),
        };

        Self {
            _dir: dir,
            root,
            ctx,
            runtime_rx,
            reload_rx,
        }
    }

    fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("creating parent dirs");
        }
        std::fs::write(&path, contents).expect("writing watched file");
        path
    }

    fn triggered(&mut self) -> Vec<String> {
        let mut tasks = Vec::new();
        while let Ok(event) = self.runtime_rx.try_recv() {
            if let RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::FileWatch,
            } = event
            {
                tasks.push(task);
            }
        }
        tasks
    }
}

#[tokio::test]
async fn change_triggers_isolated_runs_and_reloads() -> TestResult {
    init_tracing();
    let mut h = WatchHarness::new(WatchSection::default());

    let scss = h.write("src/scss/main.scss", ".a { color: red; }");
    assert!(process_file_change(&h.ctx, &scss).await);
    assert_eq!(h.triggered(), ["styles"]);
    assert!(h.reload_rx.try_recv().is_err());

    let module = h.write("src/module/header.html", "<header></header>");
    assert!(process_file_change(&h.ctx, &module).await);
    assert_eq!(h.triggered(), ["html_include"]);

    let signal = timeout(Duration::from_secs(1), h.reload_rx.recv()).await??;
    assert_eq!(signal.kind, ReloadKind::Full);
    assert_eq!(signal.reason, "src/module/header.html");
    Ok(())
}

#[tokio::test]
async fn unrelated_paths_are_ignored() -> TestResult {
    init_tracing();
    let mut h = WatchHarness::new(WatchSection::default());

    let notes = h.write("notes/todo.txt", "nothing to build");
    assert!(process_file_change(&h.ctx, &notes).await);
    assert!(h.triggered().is_empty());
    assert!(h.reload_rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn hashed_binding_skips_unchanged_content() -> TestResult {
    init_tracing();
    let section = WatchSection {
        use_hash: true,
        bindings: vec![WatchBindingConfig::run("styles", &["src/scss/**/*.scss"])],
        ..WatchSection::default()
    };
    let mut h = WatchHarness::new(section);

    let scss = h.write("src/scss/main.scss", ".a { color: red; }");
    assert!(process_file_change(&h.ctx, &scss).await);
    assert_eq!(h.triggered(), ["styles"]);

    // Touched without a content change.
    h.write("src/scss/main.scss", ".a { color: red; }");
    assert!(process_file_change(&h.ctx, &scss).await);
    assert!(h.triggered().is_empty());

    h.write("src/scss/main.scss", ".a { color: blue; }");
    assert!(process_file_change(&h.ctx, &scss).await);
    assert_eq!(h.triggered(), ["styles"]);
    Ok(())
}

#[tokio::test]
async fn matching_files_cover_the_whole_binding() -> TestResult {
    let h = WatchHarness::new(WatchSection::default());
    h.write("src/scss/main.scss", "");
    h.write("src/scss/parts/_nav.scss", "");
    h.write("src/js/main.js", "");

    let styles = &h.ctx.bindings[0];
    let files = collect_matching_files(h.ctx.fs.as_ref(), &h.root, styles)?;
    assert_eq!(
        files,
        [
            h.root.join("src/scss/main.scss"),
            h.root.join("src/scss/parts/_nav.scss")
        ]
    );
    Ok(())
}

#[tokio::test]
async fn closed_runtime_channel_stops_the_watcher() -> TestResult {
    init_tracing();
    let h = WatchHarness::new(WatchSection::default());
    let scss = h.write("src/scss/main.scss", "");

    let WatchHarness { ctx, runtime_rx, .. } = h;
    drop(runtime_rx);

    assert!(!process_file_change(&ctx, &scss).await);
    Ok(())
}
