//! Maps hotplug events to per-device monitor tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use idevtray_lockdown::{DeviceEvent, SessionError, SessionGateway};
use idevtray_tray::{IndicatorStatus, PresentationSink};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::monitor::{DeviceMonitor, MonitorConfig, MonitorPhase, MonitorSummary};

type MonitorTask = JoinHandle<Result<MonitorSummary, SessionError>>;

/// Result of a connect event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A monitor was started.
    Started,
    /// A monitor was started after the previous run for the same device
    /// finishes its teardown.
    Superseded,
    /// A live monitor already exists; nothing was started.
    Duplicate,
}

struct MonitorEntry {
    cancel: CancellationToken,
    handle: MonitorTask,
    phase: watch::Receiver<MonitorPhase>,
}

impl MonitorEntry {
    /// Not asked to stop and not finished yet.
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Owns one monitor task per connected device.
pub struct MonitorRegistry {
    gateway: Arc<dyn SessionGateway>,
    sink: Arc<dyn PresentationSink>,
    config: MonitorConfig,
    entries: Mutex<HashMap<String, MonitorEntry>>,
}

impl MonitorRegistry {
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        sink: Arc<dyn PresentationSink>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            gateway,
            sink,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, MonitorEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one hotplug event. Must be called from within a tokio runtime.
    pub fn handle_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected(id) => {
                self.connect(&id);
            }
            DeviceEvent::Disconnected(id) => {
                self.disconnect(&id);
            }
        }
    }

    /// Starts a monitor for `device_id` unless a live one exists.
    pub fn connect(&self, device_id: &str) -> ConnectOutcome {
        let mut entries = self.entries();
        prune(&mut entries);

        let previous = match entries.remove(device_id) {
            Some(entry) if entry.is_live() => {
                tracing::warn!(udid = %device_id, "device already monitored, ignoring connect");
                entries.insert(device_id.to_string(), entry);
                return ConnectOutcome::Duplicate;
            }
            Some(entry) => Some(entry.handle),
            None => None,
        };

        let monitor = DeviceMonitor::new(
            device_id,
            Arc::clone(&self.gateway),
            Arc::clone(&self.sink),
            self.config.clone(),
        );
        let phase = monitor.phase();
        let cancel = CancellationToken::new();

        let outcome = if previous.is_some() {
            tracing::info!(udid = %device_id, "device reconnected, waiting for previous monitor");
            ConnectOutcome::Superseded
        } else {
            tracing::info!(udid = %device_id, "device connected, starting monitor");
            ConnectOutcome::Started
        };

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::error!(error = %e, "previous monitor task failed");
                }
            }
            monitor.run(token).await
        });

        entries.insert(
            device_id.to_string(),
            MonitorEntry {
                cancel,
                handle,
                phase,
            },
        );
        drop(entries);

        self.sink.set_indicator(IndicatorStatus::Active);
        outcome
    }

    /// Asks the monitor of `device_id` to stop. Returns `false` if no live
    /// monitor existed.
    ///
    /// The monitor notices at the top of its next poll; its slots stay up
    /// until then.
    pub fn disconnect(&self, device_id: &str) -> bool {
        let mut entries = self.entries();
        prune(&mut entries);

        let cancelled = match entries.get(device_id) {
            Some(entry) if entry.is_live() => {
                tracing::info!(udid = %device_id, "device disconnected, stopping monitor");
                entry.cancel.cancel();
                true
            }
            _ => {
                tracing::debug!(udid = %device_id, "disconnect for unmonitored device");
                false
            }
        };

        let remaining = entries.values().filter(|e| e.is_live()).count();
        drop(entries);

        if remaining == 0 {
            self.sink.set_indicator(IndicatorStatus::Passive);
        }
        cancelled
    }

    /// Number of monitors neither cancelled nor finished.
    pub fn active_count(&self) -> usize {
        self.entries().values().filter(|e| e.is_live()).count()
    }

    /// Current phase of the newest monitor for `device_id`.
    pub fn phase(&self, device_id: &str) -> Option<MonitorPhase> {
        self.entries()
            .get(device_id)
            .map(|entry| *entry.phase.borrow())
    }

    /// Cancels every monitor and waits for all of them to tear down.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, MonitorEntry)> = self.entries().drain().collect();
        tracing::info!(monitors = drained.len(), "shutting down monitors");

        for (_, entry) in &drained {
            entry.cancel.cancel();
        }
        for (udid, entry) in drained {
            match entry.handle.await {
                Ok(Ok(summary)) => {
                    tracing::debug!(udid = %udid, polls = summary.polls, "monitor finished");
                }
                Ok(Err(e)) => tracing::debug!(udid = %udid, error = %e, "monitor never started"),
                Err(e) => tracing::error!(udid = %udid, error = %e, "monitor task failed"),
            }
        }
    }
}

/// Drops entries whose task has already completed.
fn prune(entries: &mut HashMap<String, MonitorEntry>) {
    entries.retain(|udid, entry| {
        let keep = !entry.handle.is_finished();
        if !keep {
            tracing::trace!(udid = %udid, "pruning finished monitor");
        }
        keep
    });
}
