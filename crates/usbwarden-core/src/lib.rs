/// UsbWarden Core — removable-media lifecycle monitoring and copy-in detection.
///
/// This crate contains all sensor logic with zero UI dependencies.
/// It is designed to be reusable across different frontends (console
/// service, tray application, remote agent).
///
/// # Modules
///
/// - [`model`] — Event and folder-index value types plus size formatting.
/// - [`platform`] — Windows drive enumeration and removable-volume classification.
/// - [`watcher`] — Per-volume change watcher built on Windows ReadDirectoryChangesW.
/// - [`arrival`] — Turns raw created-name notifications into copy-in events.
/// - [`indexer`] — Recursive structural index of copied-in folders.
/// - [`monitor`] — Device lifecycle monitor: poll loop, identity gate, sessions.
/// - [`gate`] — Identity-capture contract consumed by the monitor.
/// - [`sink`] — Event delivery contract and bundled sinks.
/// - [`config`] — Sensor configuration loaded at startup.
pub mod arrival;
pub mod config;
pub mod gate;
pub mod indexer;
pub mod model;
pub mod monitor;
pub mod platform;
pub mod sink;
pub mod watcher;
