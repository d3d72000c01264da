/// Poll-diff watcher backend.
///
/// Snapshots the top-level names under the volume root at a short fixed
/// interval and forwards newly-appeared names to the arrival processor. Only
/// top-level items are observed, which is all the processor acts on anyway.
use crate::arrival::ArrivalProcessor;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Listing cadence. Short enough that an arrival is picked up well inside
/// the settle delay that follows it.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run until the cancel flag is set or the root becomes unreadable.
pub fn run_watcher(root: PathBuf, cancel: Arc<AtomicBool>, mut processor: ArrivalProcessor) {
    debug!("watcher (poll): starting on {}", root.display());

    // Items present before the watcher starts are not arrivals.
    let mut seen = match list_names(&root) {
        Ok(names) => names,
        Err(e) => {
            warn!("watcher (poll): cannot read {}: {e}", root.display());
            return;
        }
    };

    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let names = match list_names(&root) {
            Ok(names) => names,
            Err(e) => {
                // Root gone or unreadable — same terminal condition as a
                // failed notification handle on the native backend.
                warn!("watcher (poll): cannot read {}: {e}", root.display());
                break;
            }
        };

        let mut created: Vec<&String> = names.difference(&seen).collect();
        created.sort();
        for name in created {
            processor.handle_created(name);
        }
        seen = names;
    }

    debug!("watcher (poll): stopped for {}", root.display());
}

fn list_names(root: &Path) -> std::io::Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in std::fs::read_dir(root)? {
        // An entry vanishing mid-listing is not a listing failure.
        let Ok(entry) = entry else { continue };
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
