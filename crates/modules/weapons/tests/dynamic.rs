//! Loads module libraries built by this workspace through the full pipeline.
//!
//! Cargo places the `cdylib` of this crate and of the fixture modules next to
//! the test binary; each test copies the ones it needs into a fresh data root.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use content_loader::{ContentConfig, ContentPipeline, LoaderOutcome, LoaderState};
use tempfile::TempDir;

/// Shared buffer the test subscriber writes into.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Finds the built library of `crate_name` next to the test binary.
fn library(crate_name: &str) -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let prefix = format!("{}{}", DLL_PREFIX, crate_name);
    let suffix = format!(".{}", DLL_EXTENSION);

    [deps, deps.parent().unwrap()]
        .into_iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flatten()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            name.starts_with(&prefix) && name.ends_with(&suffix)
        })
        .unwrap_or_else(|| panic!("no {} library next to {}", crate_name, exe.display()))
}

fn install(root: &Path, crate_name: &str) {
    let source = library(crate_name);
    let target = root.join("modules").join(source.file_name().unwrap());
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::copy(source, target).unwrap();
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Runs the pipeline over `root` with host loaders disabled, capturing logs.
fn run(root: &Path) -> (ContentPipeline, String) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let mut config = ContentConfig::with_root(root);
    config.builtin_loaders = false;
    let mut pipeline = ContentPipeline::new(config);

    tracing::subscriber::with_default(subscriber, || {
        pipeline.run(&mut |_: &str, _: f32| {}).unwrap();
    });
    (pipeline, captured.text())
}

#[test]
fn module_library_registers_and_reports_through_host() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "weapons_module");
    write(
        temp.path(),
        "weapons/melee.weapon.json",
        r#"[{"id": "sword", "name": "Sword", "damage": 7, "icon": "icons/sword"}]"#,
    );
    write(
        temp.path(),
        "weapons/spare.weapon.json",
        r#"[{"id": "club", "name": "Club", "damage": "oops"}]"#,
    );
    write(temp.path(), "lore/origins.lore", "Origins\nIn the beginning.");

    let (pipeline, logs) = run(temp.path());

    let module = pipeline.modules().get("weapons").unwrap();
    assert!(module.is_dynamic());

    let registry = pipeline.registry();
    let weapons = registry.find("WeaponLoader").unwrap();
    assert_eq!(weapons.module, "weapons");
    assert_eq!(weapons.state, LoaderState::Aborted);

    let lore = registry.find("LoreLoader").unwrap();
    assert_eq!(lore.state, LoaderState::Completed);
    assert_eq!(lore.loaded, Some(1));

    // Failure reported by the host engine.
    assert!(logs.contains("DeserializationError"), "{}", logs);
    assert!(logs.contains("spare.weapon.json"), "{}", logs);
    // Warning emitted inside the library, forwarded to the host subscriber.
    assert!(logs.contains("references icon icons/sword"), "{}", logs);
}

#[test]
fn panicking_module_registration_is_contained() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "faulty_module");
    write(temp.path(), "stray.orphan", "unused");

    let (pipeline, logs) = run(temp.path());

    assert!(pipeline.is_finished());
    assert!(pipeline.modules().get("faulty").is_some());
    assert!(pipeline.registry().find("OrphanLoader").is_none());
    assert!(pipeline.registry().is_empty());
    assert!(logs.contains("refuses to finish registering"), "{}", logs);
}

#[test]
fn panicking_module_loader_is_aborted() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "brittle_module");
    write(temp.path(), "a.brittle", "fine");
    write(temp.path(), "b.brittle", "crash now");
    write(temp.path(), "c.brittle", "never read");

    let (pipeline, logs) = run(temp.path());

    assert!(pipeline.is_finished());
    let brittle = pipeline.registry().find("BrittleLoader").unwrap();
    assert_eq!(brittle.state, LoaderState::Aborted);
    assert_eq!(brittle.loaded, None);

    let report = pipeline
        .reports()
        .iter()
        .find(|r| r.name == "BrittleLoader")
        .unwrap();
    assert_eq!(report.outcome, LoaderOutcome::Aborted);

    assert!(logs.contains("LoaderPanic"), "{}", logs);
    assert!(logs.contains("b.brittle cracked"), "{}", logs);
}
