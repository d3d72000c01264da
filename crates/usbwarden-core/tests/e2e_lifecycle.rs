/// End-to-end lifecycle tests.
///
/// These drive the real `MonitorService` poll loop with simulated volumes
/// (plain temp directories behind the `VolumeEnumerator` seam), a scripted
/// identity gate, and a `ChannelSink`, covering the full insert → identity →
/// arrival → removal path with real watcher threads.
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use usbwarden_core::config::SensorConfig;
use usbwarden_core::gate::{GateOutcome, IdentityGate};
use usbwarden_core::model::{CopyEvent, EventKind};
use usbwarden_core::monitor::MonitorService;
use usbwarden_core::platform::{RemovableVolume, VolumeEnumerator, VolumeKind};
use usbwarden_core::sink::ChannelSink;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Simulated volume set the monitor enumerates each tick.
#[derive(Default)]
struct FakeVolumes {
    present: Mutex<Vec<RemovableVolume>>,
}

impl FakeVolumes {
    fn insert(&self, letter: char, root: PathBuf) {
        self.present.lock().push(RemovableVolume {
            letter,
            root,
            kind: VolumeKind::Removable,
        });
    }

    fn remove(&self, letter: char) {
        self.present.lock().retain(|v| v.letter != letter);
    }
}

impl VolumeEnumerator for FakeVolumes {
    fn removable_volumes(&self) -> Vec<RemovableVolume> {
        self.present.lock().clone()
    }
}

/// Gate that replays a scripted sequence of outcomes and counts prompts.
struct ScriptedGate {
    outcomes: Mutex<VecDeque<GateOutcome>>,
    prompts: AtomicUsize,
}

impl ScriptedGate {
    fn new(outcomes: Vec<GateOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            prompts: AtomicUsize::new(0),
        }
    }

    fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::Relaxed)
    }
}

impl IdentityGate for ScriptedGate {
    fn prompt(&self, _drive_letter: char) -> GateOutcome {
        self.prompts.fetch_add(1, Ordering::Relaxed);
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(GateOutcome::Cancelled)
    }
}

fn accepted(username: &str, session_id: i64) -> GateOutcome {
    GateOutcome::Accepted {
        username: username.to_owned(),
        session_id,
    }
}

fn fast_config() -> SensorConfig {
    SensorConfig {
        poll_interval_ms: 50,
        settle_delay_ms: 25,
        ..SensorConfig::default()
    }
}

fn service(
    gate: Arc<ScriptedGate>,
) -> (MonitorService, Arc<FakeVolumes>, Receiver<CopyEvent>) {
    let volumes = Arc::new(FakeVolumes::default());
    let (sink, rx) = ChannelSink::bounded();
    let service = MonitorService::new(fast_config(), volumes.clone(), gate, Arc::new(sink));
    (service, volumes, rx)
}

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

fn recv(rx: &Receiver<CopyEvent>) -> CopyEvent {
    rx.recv_timeout(Duration::from_secs(10))
        .expect("expected an event within 10 s")
}

/// Give the freshly-started loop time to take its initial volume snapshot,
/// or a freshly-started watcher time to prime its baseline listing.
fn let_it_settle() {
    std::thread::sleep(Duration::from_millis(300));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// The full story: insert, capture identity, copy a file, copy a folder,
/// remove — with identity stamped on every event and strict per-volume order.
#[test]
fn insert_copy_remove_emits_ordered_session_events() {
    let volume_root = TempDir::new().unwrap();
    let gate = Arc::new(ScriptedGate::new(vec![accepted("alice", 7)]));
    let (mut service, volumes, rx) = service(gate.clone());

    service.start();
    let_it_settle();

    volumes.insert('E', volume_root.path().to_path_buf());

    let inserted = recv(&rx);
    assert_eq!(inserted.kind, EventKind::VolumeInserted);
    assert_eq!(inserted.username, "alice");
    assert_eq!(inserted.session_id, 7);
    assert_eq!(inserted.drive_letter, 'E');
    assert_eq!(inserted.action, "USB inserted");

    let_it_settle();
    assert!(service.is_watching('E'));
    assert_eq!(service.watched_volumes(), vec!['E']);

    // Copy a file onto the volume.
    write_bytes(&volume_root.path().join("report.pdf"), 2048);

    let file = recv(&rx);
    assert_eq!(file.kind, EventKind::FileArrived);
    assert_eq!(file.file_name, "report.pdf");
    assert_eq!(file.file_size, 2048);
    assert_eq!(file.username, "alice");
    assert_eq!(file.session_id, 7);

    // Copy a folder: stage it elsewhere and move it in as one item, the way
    // a finished copy lands.
    let staging = TempDir::new().unwrap();
    let staged = staging.path().join("docs");
    fs::create_dir_all(staged.join("sub")).unwrap();
    write_bytes(&staged.join("a.txt"), 100);
    fs::rename(&staged, volume_root.path().join("docs")).unwrap();

    let folder = recv(&rx);
    assert_eq!(folder.kind, EventKind::FolderArrived);
    assert_eq!(folder.file_name, "docs");
    assert_eq!(folder.file_size, 100);
    assert_eq!(folder.username, "alice");
    let nodes = folder.folder_structure.as_ref().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].path, "");
    assert_eq!(nodes[0].files[0].name, "a.txt");
    assert_eq!(nodes[0].subfolders, vec!["sub"]);
    assert_eq!(nodes[1].path, "sub");

    // Pull the device.
    volumes.remove('E');

    let removed = recv(&rx);
    assert_eq!(removed.kind, EventKind::VolumeRemoved);
    assert_eq!(removed.username, "alice");
    assert_eq!(removed.session_id, 7);
    assert!(!service.is_watching('E'));

    service.stop();

    // Nothing else may arrive: the kinds above were, in order,
    // inserted → file → folder → removed.
    assert!(rx.try_recv().is_err());
    assert_eq!(gate.prompt_count(), 1);
}

/// A cancelled identity capture leaves the volume unmonitored: no watcher,
/// no events — even when files are copied onto it afterwards.
#[test]
fn cancelled_gate_never_monitors() {
    let volume_root = TempDir::new().unwrap();
    let gate = Arc::new(ScriptedGate::new(vec![GateOutcome::Cancelled]));
    let (mut service, volumes, rx) = service(gate.clone());

    service.start();
    let_it_settle();

    volumes.insert('E', volume_root.path().to_path_buf());
    std::thread::sleep(Duration::from_millis(400));

    assert_eq!(gate.prompt_count(), 1);
    assert!(!service.is_watching('E'));

    // Copies land on the unmonitored volume without a trace.
    write_bytes(&volume_root.path().join("secret.doc"), 512);
    std::thread::sleep(Duration::from_millis(600));
    assert!(rx.try_recv().is_err());

    // Removal of a never-monitored volume is equally silent.
    volumes.remove('E');
    std::thread::sleep(Duration::from_millis(300));
    assert!(rx.try_recv().is_err());

    service.stop();
}

/// After a cancelled capture the volume is not re-prompted while it stays
/// mounted; only a full remove/insert cycle counts as a fresh insertion.
#[test]
fn cancelled_volume_is_reprompted_only_after_reinsertion() {
    let volume_root = TempDir::new().unwrap();
    let gate = Arc::new(ScriptedGate::new(vec![
        GateOutcome::Cancelled,
        accepted("bob", 9),
    ]));
    let (mut service, volumes, rx) = service(gate.clone());

    service.start();
    let_it_settle();

    volumes.insert('E', volume_root.path().to_path_buf());
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(gate.prompt_count(), 1, "still-mounted volume must not re-prompt");

    volumes.remove('E');
    std::thread::sleep(Duration::from_millis(200));

    volumes.insert('E', volume_root.path().to_path_buf());
    let inserted = recv(&rx);
    assert_eq!(inserted.kind, EventKind::VolumeInserted);
    assert_eq!(inserted.username, "bob");
    assert_eq!(inserted.session_id, 9);
    assert_eq!(gate.prompt_count(), 2);

    service.stop();
}

/// Volumes already mounted when the service starts were not inserted on our
/// watch; they are not prompted for and not monitored.
#[test]
fn preexisting_volume_is_ignored() {
    let volume_root = TempDir::new().unwrap();
    let gate = Arc::new(ScriptedGate::new(vec![accepted("carol", 3)]));
    let (mut service, volumes, rx) = service(gate.clone());

    volumes.insert('E', volume_root.path().to_path_buf());
    service.start();
    std::thread::sleep(Duration::from_millis(400));

    assert_eq!(gate.prompt_count(), 0);
    assert!(!service.is_watching('E'));
    assert!(rx.try_recv().is_err());

    service.stop();
}

/// Stopping the service is idempotent and leaves no watched volumes behind.
#[test]
fn stop_is_idempotent() {
    let gate = Arc::new(ScriptedGate::new(Vec::new()));
    let (mut service, _volumes, _rx) = service(gate);

    service.start();
    assert!(service.is_running());
    service.stop();
    assert!(!service.is_running());
    service.stop();
    assert!(service.watched_volumes().is_empty());
}
