/// Sensor configuration — loaded once at startup, read-only afterwards.
///
/// Stored as a JSON file next to the service. A missing file is created with
/// the defaults on first run; a malformed file is logged and replaced by the
/// defaults in memory (the file itself is left untouched for inspection).
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Volume enumeration cadence of the lifecycle monitor, in milliseconds.
    pub poll_interval_ms: u64,
    /// Pause before inspecting a newly-notified path, letting the OS finish
    /// materializing a multi-part copy.
    pub settle_delay_ms: u64,
    /// Fixed-disk letters never treated as removable by the classifier
    /// heuristic. Case-insensitive.
    pub system_letters: Vec<char>,
    /// Path of the append-only JSON-lines event log.
    pub event_log: PathBuf,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            settle_delay_ms: 500,
            system_letters: vec!['C', 'D'],
            event_log: PathBuf::from("usbwarden-events.jsonl"),
        }
    }
}

impl SensorConfig {
    /// Load the configuration from `path`, writing the defaults there when no
    /// file exists yet.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("malformed config {}: {e} — using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = config.write(path) {
                    warn!("failed to write default config {}: {e}", path.display());
                }
                config
            }
            Err(e) => {
                warn!("failed to read config {}: {e} — using defaults", path.display());
                Self::default()
            }
        }
    }

    fn write(&self, path: &Path) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, text)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
