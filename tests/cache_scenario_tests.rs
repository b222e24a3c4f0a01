//! End-to-end behavior of the render cache across repeated invocations.

use filetime::FileTime;
use mdv::cache::ArtifactStore;
use mdv::fingerprint::Fingerprint;
use mdv::render::{
    CacheController, CacheSettings, CacheStatus, ConversionJob, ConvertError, Converter,
    RenderRequest,
};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Converter that wraps the source in HTML and counts invocations.
#[derive(Default)]
struct CountingConverter {
    calls: Cell<usize>,
}

impl Converter for CountingConverter {
    fn convert(&self, job: &ConversionJob<'_>) -> Result<(), ConvertError> {
        self.calls.set(self.calls.get() + 1);
        let body = fs::read_to_string(job.source).expect("source readable");
        fs::write(job.output, format!("<html><body>{body}</body></html>")).expect("output writable");
        Ok(())
    }
}

struct Workspace {
    root: TempDir,
    doc: PathBuf,
}

impl Workspace {
    fn new(content: &str) -> Self {
        let root = tempdir().unwrap();
        let doc = root.path().join("doc.md");
        fs::write(&doc, content).unwrap();
        Self { root, doc }
    }

    fn settings(&self) -> CacheSettings {
        let mut settings = CacheSettings::new(self.store_dir());
        settings.output_root = Some(self.root.path().join("artifacts"));
        settings
    }

    fn store_dir(&self) -> PathBuf {
        self.root.path().join("store")
    }

    fn lookup(&self, content: &[u8]) -> Option<PathBuf> {
        let store = ArtifactStore::open(&self.store_dir()).unwrap();
        let path = store.lookup(&Fingerprint::of_bytes(content)).unwrap();
        store.close().unwrap();
        path
    }

    fn entry_count(&self) -> usize {
        let store = ArtifactStore::open(&self.store_dir()).unwrap();
        store.len().unwrap()
    }
}

#[test]
fn test_full_scenario() {
    let ws = Workspace::new("# Hi");
    let converter = CountingConverter::default();
    let controller = CacheController::new(ws.settings(), &converter);
    let request = RenderRequest::new(&ws.doc);

    // First run: empty store, miss.
    let first = controller.render(&request).unwrap();
    assert_eq!(first.status, CacheStatus::Miss);
    assert_eq!(converter.calls.get(), 1);
    assert_eq!(first.fingerprint, Fingerprint::of_bytes(b"# Hi"));
    assert_eq!(ws.entry_count(), 1);
    assert_eq!(ws.lookup(b"# Hi"), Some(first.artifact.clone()));

    // Second run, same content: hit, converter not invoked.
    let second = controller.render(&request).unwrap();
    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(second.artifact, first.artifact);
    assert_eq!(converter.calls.get(), 1);

    // Content changes: new fingerprint, miss, old entry kept.
    fs::write(&ws.doc, "# Bye").unwrap();
    let third = controller.render(&request).unwrap();
    assert_eq!(third.status, CacheStatus::Miss);
    assert_ne!(third.artifact, first.artifact);
    assert_eq!(converter.calls.get(), 2);
    assert_eq!(ws.entry_count(), 2);
    assert_eq!(ws.lookup(b"# Hi"), Some(first.artifact.clone()));

    // Forced run on the modified file: rendered again, entry overwritten.
    let forced = controller
        .render(&RenderRequest::new(&ws.doc).with_force(true))
        .unwrap();
    assert_eq!(forced.status, CacheStatus::Forced);
    assert_eq!(converter.calls.get(), 3);
    assert_ne!(forced.artifact, third.artifact);
    assert_eq!(ws.lookup(b"# Bye"), Some(forced.artifact.clone()));
    assert_eq!(ws.entry_count(), 2);
}

#[test]
fn test_repeated_hits_are_stable() {
    let ws = Workspace::new("stable content");
    let converter = CountingConverter::default();
    let controller = CacheController::new(ws.settings(), &converter);
    let request = RenderRequest::new(&ws.doc);

    let first = controller.render(&request).unwrap();
    for _ in 0..5 {
        let outcome = controller.render(&request).unwrap();
        assert_eq!(outcome.status, CacheStatus::Hit);
        assert_eq!(outcome.artifact, first.artifact);
    }
    assert_eq!(converter.calls.get(), 1);
}

#[test]
fn test_hits_survive_controller_restarts() {
    let ws = Workspace::new("# Hi");
    let converter = CountingConverter::default();

    let first = CacheController::new(ws.settings(), &converter)
        .render(&RenderRequest::new(&ws.doc))
        .unwrap();
    let second = CacheController::new(ws.settings(), &converter)
        .render(&RenderRequest::new(&ws.doc))
        .unwrap();

    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(second.artifact, first.artifact);
    assert_eq!(converter.calls.get(), 1);
}

#[test]
fn test_identical_content_at_other_path_hits() {
    let ws = Workspace::new("# Shared");
    let copy = ws.root.path().join("elsewhere").join("copy.markdown");
    fs::create_dir_all(copy.parent().unwrap()).unwrap();
    fs::copy(&ws.doc, &copy).unwrap();

    let converter = CountingConverter::default();
    let controller = CacheController::new(ws.settings(), &converter);

    let first = controller.render(&RenderRequest::new(&ws.doc)).unwrap();
    let second = controller.render(&RenderRequest::new(&copy)).unwrap();

    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(second.artifact, first.artifact);
    assert_eq!(converter.calls.get(), 1);
}

#[test]
fn test_mtime_change_does_not_invalidate() {
    let ws = Workspace::new("# Hi");
    let converter = CountingConverter::default();
    let controller = CacheController::new(ws.settings(), &converter);
    let request = RenderRequest::new(&ws.doc);

    let first = controller.render(&request).unwrap();
    filetime::set_file_mtime(&ws.doc, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

    let second = controller.render(&request).unwrap();
    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(second.artifact, first.artifact);
    assert_eq!(converter.calls.get(), 1);
}

#[cfg(unix)]
#[test]
fn test_permission_change_does_not_invalidate() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new("# Hi");
    let converter = CountingConverter::default();
    let controller = CacheController::new(ws.settings(), &converter);
    let request = RenderRequest::new(&ws.doc);

    controller.render(&request).unwrap();
    fs::set_permissions(&ws.doc, fs::Permissions::from_mode(0o444)).unwrap();

    assert_eq!(controller.render(&request).unwrap().status, CacheStatus::Hit);
    assert_eq!(converter.calls.get(), 1);
}

#[test]
fn test_store_not_locked_after_any_outcome() {
    struct Failing;
    impl Converter for Failing {
        fn convert(&self, job: &ConversionJob<'_>) -> Result<(), ConvertError> {
            Err(ConvertError::MissingOutput(job.output.to_path_buf()))
        }
    }

    let ws = Workspace::new("# Hi");

    // Failure mid-flow.
    assert!(CacheController::new(ws.settings(), Failing)
        .render(&RenderRequest::new(&ws.doc))
        .is_err());
    assert_eq!(ws.entry_count(), 0);

    // Miss, then hit.
    let converter = CountingConverter::default();
    let controller = CacheController::new(ws.settings(), &converter);
    controller.render(&RenderRequest::new(&ws.doc)).unwrap();
    controller.render(&RenderRequest::new(&ws.doc)).unwrap();

    // Unreadable source.
    assert!(controller
        .render(&RenderRequest::new(Path::new("/definitely/not/here.md")))
        .is_err());

    assert!(ArtifactStore::open(&ws.store_dir()).is_ok());
}
