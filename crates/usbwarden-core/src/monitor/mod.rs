/// Device lifecycle monitor — the top-level poll loop.
///
/// Every tick it re-enumerates removable volumes, diffs against the previous
/// snapshot, and on each change drives the identity gate and the per-volume
/// watcher pair. It is the only writer of the session map; watcher-side code
/// reads sessions through [`SessionSink`] at event-emission time.
///
/// Per volume, events are delivered in the order *inserted → arrivals →
/// removed*. No ordering holds across volumes.
///
/// The identity prompt blocks this loop: insertion and removal handling for
/// other volumes waits until it returns. Device insertion is a rare,
/// human-paced action, so one pending prompt at a time is an accepted
/// serialization point. A device pulled mid-prompt is handled on the tick
/// after the prompt returns.
use crate::arrival::ArrivalProcessor;
use crate::config::SensorConfig;
use crate::gate::{GateOutcome, IdentityGate};
use crate::model::{CopyEvent, Session};
use crate::platform::{RemovableVolume, SystemVolumes, VolumeEnumerator};
use crate::sink::{EventSink, StorageError};
use crate::watcher::{self, WatcherHandle};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Shared volume → session map. Written only by the monitor loop.
pub type SessionMap = Arc<RwLock<HashMap<char, Session>>>;

/// Sink wrapper that stamps the owning volume's current session identity
/// onto every event before delegating to the real sink.
pub struct SessionSink {
    letter: char,
    sessions: SessionMap,
    inner: Arc<dyn EventSink>,
}

impl EventSink for SessionSink {
    fn record(&self, mut event: CopyEvent) -> Result<(), StorageError> {
        if let Some(session) = self.sessions.read().get(&self.letter) {
            event.username = session.username.clone();
            event.session_id = session.session_id;
        }
        self.inner.record(event)
    }
}

/// The monitoring service. Constructed once at process start and passed by
/// reference to whoever needs it; start/stop are explicit methods.
pub struct MonitorService {
    config: SensorConfig,
    volumes: Arc<dyn VolumeEnumerator>,
    gate: Arc<dyn IdentityGate>,
    sink: Arc<dyn EventSink>,
    sessions: SessionMap,
    /// Letters with a live watcher; mirror of the loop-local watcher map so
    /// outer layers can distinguish "idle" from "nothing monitored".
    watched: Arc<RwLock<HashSet<char>>>,
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MonitorService {
    pub fn new(
        config: SensorConfig,
        volumes: Arc<dyn VolumeEnumerator>,
        gate: Arc<dyn IdentityGate>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            volumes,
            gate,
            sink,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            watched: Arc::new(RwLock::new(HashSet::new())),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Service over the host's real drives, with the configured
    /// system-letter allowlist.
    pub fn with_system_volumes(
        config: SensorConfig,
        gate: Arc<dyn IdentityGate>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let volumes = Arc::new(SystemVolumes::new(config.system_letters.clone()));
        Self::new(config, volumes, gate, sink)
    }

    /// Start the poll loop on a background thread. A second call while
    /// running is a no-op.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let loop_state = LoopState {
            poll_interval: self.config.poll_interval(),
            settle_delay: self.config.settle_delay(),
            volumes: Arc::clone(&self.volumes),
            gate: Arc::clone(&self.gate),
            sink: Arc::clone(&self.sink),
            sessions: Arc::clone(&self.sessions),
            watched: Arc::clone(&self.watched),
            running: Arc::clone(&self.running),
        };

        let thread = thread::Builder::new()
            .name("usbwarden-monitor".to_owned())
            .spawn(move || run_loop(loop_state))
            .expect("failed to spawn monitor thread");
        self.thread = Some(thread);
    }

    /// Stop the poll loop and all watchers. Waits for the loop thread to
    /// exit (bounded by one poll interval); watcher threads are signalled
    /// but not joined, so in-flight arrivals may still drain.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        info!("monitor service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Whether `letter` currently has a live watcher.
    pub fn is_watching(&self, letter: char) -> bool {
        self.watched.read().contains(&letter.to_ascii_uppercase())
    }

    /// All currently-watched letters, sorted.
    pub fn watched_volumes(&self) -> Vec<char> {
        let mut letters: Vec<char> = self.watched.read().iter().copied().collect();
        letters.sort_unstable();
        letters
    }
}

/// Everything the loop thread owns or shares with the service handle.
struct LoopState {
    poll_interval: Duration,
    settle_delay: Duration,
    volumes: Arc<dyn VolumeEnumerator>,
    gate: Arc<dyn IdentityGate>,
    sink: Arc<dyn EventSink>,
    sessions: SessionMap,
    watched: Arc<RwLock<HashSet<char>>>,
    running: Arc<AtomicBool>,
}

fn run_loop(state: LoopState) {
    info!("device lifecycle monitor started");

    // Volumes already mounted when the service starts were not inserted on
    // our watch; they are left unmonitored rather than prompted for.
    let mut previous: HashSet<char> = state
        .volumes
        .removable_volumes()
        .iter()
        .map(|v| v.letter)
        .collect();

    // Live watchers, owned by this thread alone.
    let mut watchers: HashMap<char, WatcherHandle> = HashMap::new();

    while state.running.load(Ordering::Relaxed) {
        thread::sleep(state.poll_interval);
        if !state.running.load(Ordering::Relaxed) {
            break;
        }

        let present_volumes = state.volumes.removable_volumes();
        let present: HashSet<char> = present_volumes.iter().map(|v| v.letter).collect();

        let mut inserted: Vec<&RemovableVolume> = present_volumes
            .iter()
            .filter(|v| !previous.contains(&v.letter))
            .collect();
        inserted.sort_by_key(|v| v.letter);
        for volume in inserted {
            handle_insertion(&state, volume, &mut watchers);
        }

        let mut removed: Vec<char> = previous.difference(&present).copied().collect();
        removed.sort_unstable();
        for letter in removed {
            handle_removal(&state, letter, &mut watchers);
        }

        // A watcher whose thread exited without being stopped lost its
        // notification channel. Treat the volume as removed; if it is still
        // mounted, the next tick rediscovers it as a fresh insertion.
        let lost: Vec<char> = watchers
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(letter, _)| *letter)
            .collect();

        previous = present;
        for letter in lost {
            warn!("watcher for {letter}: exited unexpectedly");
            handle_removal(&state, letter, &mut watchers);
            previous.remove(&letter);
        }
    }

    // Shutdown: signal every watcher; in-flight arrivals may still drain.
    for (_, handle) in watchers.drain() {
        handle.stop();
    }
    state.watched.write().clear();
    info!("device lifecycle monitor exiting");
}

fn handle_insertion(
    state: &LoopState,
    volume: &RemovableVolume,
    watchers: &mut HashMap<char, WatcherHandle>,
) {
    let letter = volume.letter;
    info!("volume inserted: {letter}: ({:?})", volume.kind);

    match state.gate.prompt(letter) {
        GateOutcome::Accepted {
            username,
            session_id,
        } => {
            info!("identity captured for {letter}: {username} (session {session_id})");
            let session = Session {
                drive_letter: letter,
                username,
                session_id,
            };
            let inserted_event = CopyEvent::volume_inserted(&session);
            state.sessions.write().insert(letter, session);

            // The insertion event goes out before the watcher starts, so
            // no arrival can ever precede it.
            if let Err(e) = state.sink.record(inserted_event) {
                warn!("failed to record insertion event: {e}");
            }

            let session_sink = Arc::new(SessionSink {
                letter,
                sessions: Arc::clone(&state.sessions),
                inner: Arc::clone(&state.sink),
            });
            let processor = ArrivalProcessor::new(
                letter,
                volume.root.clone(),
                state.settle_delay,
                session_sink,
            );
            let handle = watcher::start_watcher(letter, volume.root.clone(), processor);
            if let Some(old) = watchers.insert(letter, handle) {
                old.stop();
            }
            state.watched.write().insert(letter);
        }
        GateOutcome::Cancelled => {
            info!("identity capture cancelled for {letter}: — volume left unmonitored");
        }
    }
}

fn handle_removal(state: &LoopState, letter: char, watchers: &mut HashMap<char, WatcherHandle>) {
    info!("volume removed: {letter}:");

    if let Some(handle) = watchers.remove(&letter) {
        handle.stop();
    }
    state.watched.write().remove(&letter);

    // The removal event still carries the outgoing session's identity. A
    // volume whose identity capture was cancelled has no session and ends
    // without a removal event, keeping inserted/removed strictly paired.
    let session = state.sessions.read().get(&letter).cloned();
    if let Some(session) = session {
        if let Err(e) = state.sink.record(CopyEvent::volume_removed(&session)) {
            warn!("failed to record removal event: {e}");
        }
    }
    state.sessions.write().remove(&letter);
}
