//! UsbWarden — removable-media copy sensor.
//!
//! Thin binary entry point. All monitoring logic lives in the
//! `usbwarden-core` crate; this binary wires a JSON-lines event log and a
//! console identity prompt into the lifecycle monitor and lets it run.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use usbwarden_core::config::SensorConfig;
use usbwarden_core::gate::{GateOutcome, IdentityGate};
use usbwarden_core::monitor::MonitorService;
use usbwarden_core::sink::JsonlSink;

/// Line-oriented identity prompt on the controlling console.
///
/// An empty user name cancels the capture, leaving the volume unmonitored.
/// Session identifiers are handed out sequentially for the process lifetime.
struct ConsoleGate {
    next_session: AtomicI64,
}

impl IdentityGate for ConsoleGate {
    fn prompt(&self, drive_letter: char) -> GateOutcome {
        print!("volume {drive_letter}: inserted — user name (empty cancels): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return GateOutcome::Cancelled;
        }
        let username = line.trim();
        if username.is_empty() {
            return GateOutcome::Cancelled;
        }

        GateOutcome::Accepted {
            username: username.to_owned(),
            session_id: self.next_session.fetch_add(1, Ordering::Relaxed),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("UsbWarden starting");

    let config = SensorConfig::load(Path::new("usbwarden.json"));
    tracing::info!(
        "poll every {} ms, settle {} ms, event log {}",
        config.poll_interval_ms,
        config.settle_delay_ms,
        config.event_log.display()
    );

    let sink = Arc::new(JsonlSink::open(&config.event_log)?);
    let gate = Arc::new(ConsoleGate {
        next_session: AtomicI64::new(1),
    });

    let mut service = MonitorService::with_system_volumes(config, gate, sink);
    service.start();

    // The sensor runs until the process is terminated.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
