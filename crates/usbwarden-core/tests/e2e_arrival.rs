/// End-to-end arrival-processing tests.
///
/// These exercise the real `ArrivalProcessor` + `FolderIndexer` code paths
/// against a real temporary filesystem, with a `ChannelSink` standing in for
/// the event store.
///
/// **Why a `tests/` integration test (not unit test)?**
///
/// The processor sleeps through a real settle delay, stats real paths, and
/// walks real directory trees. Exercising it with `tempfile` fixtures covers
/// every code path — separator filtering, dedupe, settlement, folder
/// indexing — with zero mocking.
use crossbeam_channel::Receiver;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use usbwarden_core::arrival::ArrivalProcessor;
use usbwarden_core::model::{CopyEvent, EventKind};
use usbwarden_core::sink::ChannelSink;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Short settle delay so the suite stays fast; the semantics do not depend
/// on the exact duration.
const SETTLE: Duration = Duration::from_millis(40);

fn processor(root: &Path) -> (ArrivalProcessor, Receiver<CopyEvent>) {
    let (sink, rx) = ChannelSink::bounded();
    (
        ArrivalProcessor::new('E', root.to_path_buf(), SETTLE, Arc::new(sink)),
        rx,
    )
}

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Notifications for nested paths describe changes inside an already-arrived
/// item and must never produce an event.
#[test]
fn nested_names_never_produce_events() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("docs")).unwrap();
    write_bytes(&tmp.path().join("docs").join("inner.txt"), 10);

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("docs\\inner.txt");
    proc.handle_created("docs/inner.txt");

    assert!(rx.try_recv().is_err(), "nested notification leaked an event");
}

/// Duplicate notifications for the same top-level path emit exactly one event.
#[test]
fn duplicate_notifications_emit_once() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("report.pdf"), 2048);

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("report.pdf");
    proc.handle_created("report.pdf");
    proc.handle_created("report.pdf");

    let event = rx.try_recv().expect("first notification must emit");
    assert_eq!(event.kind, EventKind::FileArrived);
    assert_eq!(event.file_name, "report.pdf");
    assert_eq!(event.file_size, 2048);
    assert!(!event.is_folder);
    assert_eq!(event.drive_letter, 'E');

    assert!(rx.try_recv().is_err(), "duplicate notification emitted again");
}

/// A path that disappears during the settle delay is dropped silently.
#[test]
fn path_deleted_during_settle_is_dropped() {
    let tmp = TempDir::new().unwrap();
    let victim = tmp.path().join("fleeting.bin");
    write_bytes(&victim, 64);

    // Delete the file while the processor is sleeping through the settle.
    let delete_target = victim.clone();
    let deleter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        let _ = fs::remove_file(&delete_target);
    });

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("fleeting.bin");
    deleter.join().unwrap();

    assert!(rx.try_recv().is_err(), "vanished path still emitted");
}

/// A notification for a path that never materializes emits nothing.
#[test]
fn never_materialized_path_is_dropped() {
    let tmp = TempDir::new().unwrap();

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("ghost.tmp");

    assert!(rx.try_recv().is_err());
}

/// File arrivals carry size, extension label, and an unstamped identity.
#[test]
fn file_arrival_event_fields() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("report.pdf"), 2048);

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("report.pdf");

    let event = rx.try_recv().unwrap();
    assert_eq!(event.action, "file copied in (.pdf)");
    assert!(event.username.is_empty(), "identity is stamped by the monitor");
    assert_eq!(event.session_id, 0);
    assert!(!event.timestamp.is_empty());
    assert!(event.file_path.ends_with("report.pdf"));
    assert!(event.folder_structure.is_none());
}

/// Folder arrivals index the whole tree: one node per directory, aggregate
/// size from the files alone, empty subfolders included.
#[test]
fn folder_arrival_builds_structural_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(docs.join("sub")).unwrap();
    write_bytes(&docs.join("a.txt"), 100);

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("docs");

    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::FolderArrived);
    assert_eq!(event.file_name, "docs");
    assert_eq!(event.file_size, 100);
    assert!(event.is_folder);
    assert_eq!(event.action, "folder copied in (1 files, 1 folders)");

    let nodes = event.folder_structure.expect("folder arrival carries an index");
    assert_eq!(nodes.len(), 2);

    assert_eq!(nodes[0].path, "");
    assert_eq!(nodes[0].files.len(), 1);
    assert_eq!(nodes[0].files[0].name, "a.txt");
    assert_eq!(nodes[0].files[0].size, 100);
    assert_eq!(nodes[0].subfolders, vec!["sub"]);

    assert_eq!(nodes[1].path, "sub");
    assert!(nodes[1].files.is_empty());
    assert!(nodes[1].subfolders.is_empty());
}

/// The dedupe guard is keyed on the full path, so distinct top-level items
/// each get their own event.
#[test]
fn distinct_items_each_emit() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("one.txt"), 1);
    write_bytes(&tmp.path().join("two.txt"), 2);

    let (mut proc, rx) = processor(tmp.path());
    proc.handle_created("one.txt");
    proc.handle_created("two.txt");

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(first.file_name, "one.txt");
    assert_eq!(second.file_name, "two.txt");
    assert!(rx.try_recv().is_err());
}
