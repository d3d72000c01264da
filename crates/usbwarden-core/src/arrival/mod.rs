/// Arrival processing — turns raw created-name notifications from a watcher
/// into discrete copy-in events.
///
/// One processor per watcher, owned by the watcher thread. It filters out
/// nested notifications, deduplicates per watcher lifetime, waits for the
/// copy to settle, classifies the result as file or folder, and emits one
/// event through the injected sink.
///
/// Nothing here may panic the watcher thread: every filesystem race is
/// logged and the arrival dropped.
use crate::indexer;
use crate::model::size::format_size;
use crate::model::CopyEvent;
use crate::sink::EventSink;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ArrivalProcessor {
    drive_letter: char,
    drive_root: PathBuf,
    settle_delay: Duration,
    /// Paths already processed in this watcher's lifetime. Grows
    /// monotonically and is dropped with the watcher.
    processed: HashSet<PathBuf>,
    sink: Arc<dyn EventSink>,
}

impl ArrivalProcessor {
    pub fn new(
        drive_letter: char,
        drive_root: PathBuf,
        settle_delay: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            drive_letter,
            drive_root,
            settle_delay,
            processed: HashSet::new(),
            sink,
        }
    }

    /// Handle one raw `(created, name)` notification.
    ///
    /// `name` is relative to the volume root, exactly as the OS reported it.
    pub fn handle_created(&mut self, name: &str) {
        // A separator means the change happened inside an already-arrived
        // top-level item; one nested copy would otherwise fan out into
        // dozens of spurious events.
        if name.contains('\\') || name.contains('/') {
            return;
        }

        let full_path = self.drive_root.join(name);
        // Claim the path before any inspection so later duplicate
        // notifications for the same creation are rejected outright.
        if !self.processed.insert(full_path.clone()) {
            return;
        }

        // Let the OS finish materializing the copy before looking at it.
        std::thread::sleep(self.settle_delay);

        let metadata = match std::fs::metadata(&full_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Transient or already gone again; not worth an event.
                debug!("arrival vanished during settle: {}", full_path.display());
                return;
            }
            Err(e) => {
                warn!("cannot stat arrival {}: {e}", full_path.display());
                return;
            }
        };

        let event = if metadata.is_dir() {
            let index = indexer::index(&full_path);
            info!(
                "folder copied in: {} ({} files, {} folders, {})",
                name,
                index.total_files,
                index.total_folders,
                format_size(index.total_size)
            );
            CopyEvent::folder_arrival(self.drive_letter, name, &full_path, index)
        } else {
            let extension = indexer::file_extension(name);
            info!(
                "file copied in: {} ({})",
                name,
                format_size(metadata.len())
            );
            CopyEvent::file_arrival(
                self.drive_letter,
                name,
                &full_path,
                metadata.len(),
                &extension,
            )
        };

        if let Err(e) = self.sink.record(event) {
            warn!("failed to record arrival event: {e}");
        }
    }
}
