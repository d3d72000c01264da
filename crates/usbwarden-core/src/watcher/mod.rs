/// Per-volume change watcher — owns one background thread that forwards
/// copy-in notifications to an [`ArrivalProcessor`].
///
/// Two backends behind the same start/stop contract:
///
/// - [`rdcw`] (Windows): asynchronous `ReadDirectoryChangesW` on the volume
///   root, cancellable without blocking.
/// - [`poll`] (elsewhere, and for tests): diffs the top-level directory
///   listing at a short fixed interval.
///
/// # Cancellation
///
/// [`WatcherHandle::stop`] sets an atomic flag; the thread observes it
/// within one bounded wait and exits. Stopping never joins the thread, so an
/// arrival being processed at stop time still completes and emits its event.
pub mod poll;
#[cfg(windows)]
pub mod rdcw;

use crate::arrival::ArrivalProcessor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Handle to a running per-volume watcher.
pub struct WatcherHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WatcherHandle {
    /// Signal the background thread to stop. Non-blocking and idempotent.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether the background thread has exited. A finished thread that was
    /// never told to stop means the notification channel failed; the
    /// lifecycle monitor treats the volume as removed.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

/// Start watching `root` for copy-in notifications on a dedicated thread,
/// using the platform's native notification channel.
pub fn start_watcher(letter: char, root: PathBuf, processor: ArrivalProcessor) -> WatcherHandle {
    spawn(letter, root, processor, false)
}

/// Start a watcher on the poll-diff backend regardless of platform.
///
/// The lifecycle monitor uses [`start_watcher`]; this entry point exists for
/// environments without a native notification channel.
pub fn start_poll_watcher(
    letter: char,
    root: PathBuf,
    processor: ArrivalProcessor,
) -> WatcherHandle {
    spawn(letter, root, processor, true)
}

fn spawn(
    letter: char,
    root: PathBuf,
    processor: ArrivalProcessor,
    force_poll: bool,
) -> WatcherHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);

    let thread = thread::Builder::new()
        .name(format!("usbwarden-watch-{letter}"))
        .spawn(move || run_backend(root, cancel_clone, processor, force_poll))
        .expect("failed to spawn watcher thread");

    WatcherHandle {
        cancel,
        thread: Some(thread),
    }
}

#[cfg(windows)]
fn run_backend(
    root: PathBuf,
    cancel: Arc<AtomicBool>,
    processor: ArrivalProcessor,
    force_poll: bool,
) {
    if force_poll {
        poll::run_watcher(root, cancel, processor);
    } else {
        rdcw::run_watcher(root, cancel, processor);
    }
}

#[cfg(not(windows))]
fn run_backend(
    root: PathBuf,
    cancel: Arc<AtomicBool>,
    processor: ArrivalProcessor,
    _force_poll: bool,
) {
    poll::run_watcher(root, cancel, processor);
}
