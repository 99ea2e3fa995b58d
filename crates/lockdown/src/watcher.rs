//! Device hotplug watcher.
//!
//! Polls `idevice_id -l` and turns changes in the attached set into
//! [`DeviceEvent`]s. Devices already attached when the watcher starts are
//! reported as `Connected` on the first poll.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::WatchError;
use crate::types::DeviceEvent;

/// Default delay between two device listings.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Watches for devices being attached and detached.
pub struct DeviceWatcher {
    program: PathBuf,
    interval: Duration,
    known: BTreeSet<String>,
}

impl DeviceWatcher {
    /// Creates a watcher running `program` (normally `idevice_id`).
    pub fn new(program: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            program: program.into(),
            interval,
            known: BTreeSet::new(),
        }
    }

    /// Lists the UDIDs of currently attached devices.
    pub async fn list_devices(&self) -> Result<BTreeSet<String>, WatchError> {
        let output = tokio::process::Command::new(&self.program)
            .arg("-l")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchError::Listing(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Polls one listing and returns the events it implies.
    ///
    /// A failed listing yields no events: an unreachable usbmuxd is not
    /// evidence that devices went away.
    pub async fn poll(&mut self) -> Vec<DeviceEvent> {
        match self.list_devices().await {
            Ok(current) => {
                let events = diff_devices(&self.known, &current);
                self.known = current;
                events
            }
            Err(e) => {
                tracing::warn!(error = %e, "device listing failed");
                Vec::new()
            }
        }
    }

    /// Runs the watch loop until `cancel` fires or the receiver is dropped.
    pub async fn run(mut self, events_tx: mpsc::Sender<DeviceEvent>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "device watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for event in self.poll().await {
                        tracing::debug!(?event, "device event");
                        if events_tx.send(event).await.is_err() {
                            tracing::debug!("event receiver dropped, stopping watcher");
                            return;
                        }
                    }
                }
            }
        }

        tracing::info!("device watcher stopped");
    }

    /// Spawns [`run`](Self::run) on the current tokio runtime.
    pub fn spawn(
        self,
        events_tx: mpsc::Sender<DeviceEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events_tx, cancel))
    }
}

/// Parses `idevice_id -l` output: one UDID per line.
pub fn parse_device_list(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            // Newer tool versions append " (USB)" or " (Network)".
            line.split_whitespace().next().unwrap_or(line).to_string()
        })
        .collect()
}

/// Computes the events that turn `previous` into `current`.
///
/// Disconnects are reported before connects.
pub fn diff_devices(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> Vec<DeviceEvent> {
    let removed = previous
        .difference(current)
        .map(|id| DeviceEvent::Disconnected(id.clone()));
    let added = current
        .difference(previous)
        .map(|id| DeviceEvent::Connected(id.clone()));
    removed.chain(added).collect()
}
