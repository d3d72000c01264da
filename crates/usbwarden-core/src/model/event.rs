/// Copy-in event records — the immutable values handed to an
/// [`EventSink`](crate::sink::EventSink).
///
/// An event is constructed fully formed and never mutated after it has been
/// recorded. Arrival events are created with an empty identity; the monitor's
/// session-stamping sink fills in `username` / `session_id` before delivery.
use crate::model::{FolderIndex, FolderNode, Session};
use serde::Serialize;
use std::path::Path;

/// Address recorded for locally-sensed events. The sensor only observes its
/// own host; remote ingestion carries its own source address.
const LOCAL_IP: &str = "127.0.0.1";

/// What an event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    VolumeInserted,
    VolumeRemoved,
    FileArrived,
    FolderArrived,
}

/// A single recorded observation: a volume session boundary or a top-level
/// item copied onto a monitored volume.
#[derive(Clone, Debug, Serialize)]
pub struct CopyEvent {
    /// ISO-8601 wall-clock timestamp at construction time.
    pub timestamp: String,
    pub machine_name: String,
    pub ip_address: String,
    /// Identity captured for the volume's session; empty until stamped.
    pub username: String,
    pub session_id: i64,
    pub drive_letter: char,
    /// Item name for arrivals; empty for volume events.
    pub file_name: String,
    pub file_path: String,
    pub kind: EventKind,
    /// Short human label; presentation detail, not a protocol field.
    pub action: String,
    pub file_size: u64,
    pub is_folder: bool,
    /// Structural index, present only for folder arrivals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_structure: Option<Vec<FolderNode>>,
}

impl CopyEvent {
    /// A volume was inserted and its identity captured.
    pub fn volume_inserted(session: &Session) -> Self {
        Self::volume_boundary(session, EventKind::VolumeInserted, "USB inserted")
    }

    /// A monitored volume disappeared; carries the outgoing session identity.
    pub fn volume_removed(session: &Session) -> Self {
        Self::volume_boundary(session, EventKind::VolumeRemoved, "USB removed")
    }

    fn volume_boundary(session: &Session, kind: EventKind, action: &str) -> Self {
        Self {
            timestamp: timestamp_now(),
            machine_name: machine_name(),
            ip_address: LOCAL_IP.to_owned(),
            username: session.username.clone(),
            session_id: session.session_id,
            drive_letter: session.drive_letter,
            file_name: String::new(),
            file_path: format!("{}:\\", session.drive_letter),
            kind,
            action: action.to_owned(),
            file_size: 0,
            is_folder: false,
            folder_structure: None,
        }
    }

    /// A single file arrived at the top level of a monitored volume.
    pub fn file_arrival(
        drive_letter: char,
        name: &str,
        path: &Path,
        size: u64,
        extension: &str,
    ) -> Self {
        let action = if extension.is_empty() {
            "file copied in".to_owned()
        } else {
            format!("file copied in (.{extension})")
        };
        Self {
            timestamp: timestamp_now(),
            machine_name: machine_name(),
            ip_address: LOCAL_IP.to_owned(),
            username: String::new(),
            session_id: 0,
            drive_letter,
            file_name: name.to_owned(),
            file_path: path.to_string_lossy().into_owned(),
            kind: EventKind::FileArrived,
            action,
            file_size: size,
            is_folder: false,
            folder_structure: None,
        }
    }

    /// A folder arrived at the top level; carries its structural index.
    pub fn folder_arrival(drive_letter: char, name: &str, path: &Path, index: FolderIndex) -> Self {
        let action = format!(
            "folder copied in ({} files, {} folders)",
            index.total_files, index.total_folders
        );
        Self {
            timestamp: timestamp_now(),
            machine_name: machine_name(),
            ip_address: LOCAL_IP.to_owned(),
            username: String::new(),
            session_id: 0,
            drive_letter,
            file_name: name.to_owned(),
            file_path: path.to_string_lossy().into_owned(),
            kind: EventKind::FolderArrived,
            action,
            file_size: index.total_size,
            is_folder: true,
            folder_structure: Some(index.nodes),
        }
    }
}

fn timestamp_now() -> String {
    chrono::Local::now().to_rfc3339()
}

fn machine_name() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "Unknown".to_owned())
}
