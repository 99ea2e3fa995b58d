//! Per-device monitor: one-shot extraction followed by a polling loop.

use std::sync::Arc;
use std::time::Duration;

use idevtray_lockdown::{
    DeviceSession, Domain, SessionError, SessionGateway, extract_bool, extract_int, fields,
};
use idevtray_tray::{PresentationSink, Slot};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::snapshot::{DeviceSnapshot, StorageSnapshot, VolatileStatus};

/// Delay between two polls of the volatile fields.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Monitor settings shared by every device.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub refresh_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Lifecycle of one monitor run.
///
/// `Idle → Connecting → Active → Terminating → Gone`, or
/// `Connecting → Gone` when the session cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Connecting,
    Active,
    Terminating,
    Gone,
}

/// What a completed run observed.
#[derive(Debug, Clone)]
pub struct MonitorSummary {
    /// Number of poll iterations executed.
    pub polls: u64,
    pub snapshot: DeviceSnapshot,
    pub storage: StorageSnapshot,
}

/// Observes one device from session open to teardown.
pub struct DeviceMonitor {
    device_id: String,
    gateway: Arc<dyn SessionGateway>,
    sink: Arc<dyn PresentationSink>,
    config: MonitorConfig,
    phase: Arc<watch::Sender<MonitorPhase>>,
}

impl DeviceMonitor {
    pub fn new(
        device_id: impl Into<String>,
        gateway: Arc<dyn SessionGateway>,
        sink: Arc<dyn PresentationSink>,
        config: MonitorConfig,
    ) -> Self {
        let (phase, _) = watch::channel(MonitorPhase::Idle);
        Self {
            device_id: device_id.into(),
            gateway,
            sink,
            config,
            phase: Arc::new(phase),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Subscribes to phase changes of this monitor.
    pub fn phase(&self) -> watch::Receiver<MonitorPhase> {
        self.phase.subscribe()
    }

    /// Runs the monitor until `cancel` is observed at the top of a poll.
    ///
    /// Cancellation never interrupts the sleep between polls, so the
    /// monitor reacts within one refresh interval. Returns the open error
    /// if no session could be established; nothing is shown in that case.
    pub async fn run(self, cancel: CancellationToken) -> Result<MonitorSummary, SessionError> {
        let udid = self.device_id.as_str();
        self.phase.send_replace(MonitorPhase::Connecting);

        let session = match self.gateway.open(udid).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(udid = %udid, error = %e, "failed to open device session");
                self.phase.send_replace(MonitorPhase::Gone);
                return Err(e);
            }
        };

        // From here on every exit path goes through the guard's teardown.
        let mut active = ActiveSession {
            session,
            sink: Arc::clone(&self.sink),
            device_id: udid.to_string(),
            phase: Arc::clone(&self.phase),
        };
        self.phase.send_replace(MonitorPhase::Active);

        tracing::info!(udid = %udid, "getting device info");
        let snapshot = match active.session.query(Domain::General).await {
            Ok(bag) => DeviceSnapshot::from_bag(&bag),
            Err(e) => {
                tracing::warn!(udid = %udid, error = %e, "failed to get device information");
                DeviceSnapshot::default()
            }
        };
        self.publish_snapshot(&snapshot);

        tracing::info!(udid = %udid, "getting storage info");
        let storage = match active.session.query(Domain::DiskUsage).await {
            Ok(bag) => StorageSnapshot::from_bag(&bag),
            Err(e) => {
                tracing::warn!(udid = %udid, error = %e, "failed to get storage information");
                StorageSnapshot::default()
            }
        };
        self.publish_storage(&storage);

        tracing::info!(udid = %udid, "monitoring started");
        let mut polls = 0u64;
        loop {
            if cancel.is_cancelled() {
                tracing::info!(udid = %udid, polls, "monitoring stopped");
                break;
            }

            let status = self.poll(active.session.as_mut()).await;
            tracing::trace!(udid = %udid, ?status, "poll complete");
            polls += 1;

            tokio::time::sleep(self.config.refresh_interval).await;
        }

        drop(active);
        Ok(MonitorSummary {
            polls,
            snapshot,
            storage,
        })
    }

    fn publish_snapshot(&self, snapshot: &DeviceSnapshot) {
        for (slot, label) in snapshot.labels() {
            self.publish_or_hide(slot, label);
        }
    }

    fn publish_storage(&self, storage: &StorageSnapshot) {
        let label = storage.label();
        if label.is_none() {
            tracing::warn!(
                udid = %self.device_id,
                total = ?storage.total,
                available = ?storage.available,
                "disk capacity missing or invalid"
            );
        }
        self.publish_or_hide(Slot::Storage, label);
    }

    fn publish_or_hide(&self, slot: Slot, label: Option<String>) {
        match label {
            Some(text) => self.sink.publish(&self.device_id, slot, &text),
            None => self.sink.hide(&self.device_id, slot),
        }
    }

    /// One poll of the volatile fields.
    ///
    /// A failed general query keeps the password slot as it was; a failed
    /// battery query hides the battery slot.
    async fn poll(&self, session: &mut dyn DeviceSession) -> VolatileStatus {
        let mut status = VolatileStatus::default();
        let udid = self.device_id.as_str();

        match session.query(Domain::General).await {
            Ok(bag) => {
                status.password_protected = extract_bool(&bag, fields::PASSWORD_PROTECTED);
                match status.password_label() {
                    Some(label) => self.sink.publish(udid, Slot::IsPasswd, &label),
                    None => tracing::debug!(udid = %udid, "reply lacks PasswordProtected"),
                }
            }
            Err(e) => {
                tracing::warn!(udid = %udid, error = %e, "failed to refresh device information");
            }
        }

        match session.query(Domain::Battery).await {
            Ok(bag) => {
                status.battery_level = extract_int(&bag, fields::BATTERY_CURRENT_CAPACITY);
                self.publish_or_hide(Slot::Battery, status.battery_label());
            }
            Err(e) => {
                tracing::debug!(udid = %udid, error = %e, "battery unavailable");
                self.sink.hide(udid, Slot::Battery);
            }
        }

        status
    }
}

/// An open session plus the slots it feeds.
///
/// Dropping it is the teardown: every slot of the device is hidden and the
/// session is closed, exactly once, whichever way the run ends.
struct ActiveSession {
    session: Box<dyn DeviceSession>,
    sink: Arc<dyn PresentationSink>,
    device_id: String,
    phase: Arc<watch::Sender<MonitorPhase>>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.phase.send_replace(MonitorPhase::Terminating);
        self.sink.hide_all(&self.device_id);
        self.session.close();
        self.phase.send_replace(MonitorPhase::Gone);
        tracing::info!(udid = %self.device_id, "device session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, FakeGateway, disk_bag, full_device, general_bag};
    use idevtray_tray::MenuSink;

    const UDID: &str = "00008030-001A2B3C4D5E802E";

    fn monitor(gateway: &FakeGateway, sink: &MenuSink) -> DeviceMonitor {
        DeviceMonitor::new(
            UDID,
            Arc::new(gateway.clone()),
            Arc::new(sink.clone()),
            MonitorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_baseline_and_volatile_labels() {
        let gateway = FakeGateway::default();
        gateway.add_device(UDID, full_device());
        let sink = MenuSink::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(monitor(&gateway, &sink).run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;

        {
            let state = sink.state();
            let text = |slot| state.slot(UDID, slot).map(|s| s.text.clone());
            assert_eq!(text(Slot::Info).as_deref(), Some("📱 Kim's iPhone (IOS 17.4.1)"));
            assert_eq!(text(Slot::Meid).as_deref(), Some(" MEID: 35345678901234"));
            assert_eq!(text(Slot::Storage).as_deref(), Some(" Storage: 32.0GB / 64GB used"));
            assert_eq!(text(Slot::IsPasswd).as_deref(), Some(" Password Protected: yes"));
            assert_eq!(text(Slot::Battery).as_deref(), Some(" Battery: 87%"));
            assert!(Slot::ALL.iter().all(|s| state.is_visible(UDID, *s)));
        }

        cancel.cancel();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.polls, 1);
        assert_eq!(summary.snapshot.device_class.as_deref(), Some("iPhone"));
        assert_eq!(summary.storage.total, Some(64_000_000_000));

        assert_eq!(gateway.queries(UDID, Domain::DiskUsage), 1);
        assert_eq!(gateway.queries(UDID, Domain::General), 2);
        assert_eq!(gateway.queries(UDID, Domain::Battery), 1);

        assert!(!sink.state().has_visible_slots(UDID));
        assert_eq!(gateway.closed(UDID), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_failure_shows_nothing() {
        let gateway = FakeGateway::default();
        gateway.add_device(
            UDID,
            FakeDevice {
                open_error: Some(SessionError::Handshake {
                    device_id: UDID.into(),
                    reason: "Pairing dialog response pending".into(),
                }),
                ..full_device()
            },
        );
        let sink = MenuSink::default();
        let monitor = monitor(&gateway, &sink);
        let phase = monitor.phase();

        let err = monitor.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Handshake { .. }));
        assert_eq!(*phase.borrow(), MonitorPhase::Gone);
        assert!(Slot::ALL.iter().all(|s| sink.state().slot(UDID, *s).is_none()));
        assert_eq!(gateway.closed(UDID), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn baseline_failure_still_monitors() {
        let gateway = FakeGateway::default();
        gateway.add_device(
            UDID,
            FakeDevice {
                general: None,
                ..full_device()
            },
        );
        let sink = MenuSink::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(monitor(&gateway, &sink).run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(11)).await;

        {
            let state = sink.state();
            assert!(!state.is_visible(UDID, Slot::Info));
            assert!(!state.is_visible(UDID, Slot::Imei));
            assert!(state.is_visible(UDID, Slot::Storage));
            assert!(state.is_visible(UDID, Slot::Battery));
        }

        cancel.cancel();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.polls, 3);
        assert_eq!(summary.snapshot, DeviceSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_storage_stays_hidden() {
        let gateway = FakeGateway::default();
        gateway.add_device(
            UDID,
            FakeDevice {
                disk: Some(disk_bag(0, 32_000_000_000)),
                ..full_device()
            },
        );
        let sink = MenuSink::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(monitor(&gateway, &sink).run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!sink.state().is_visible(UDID, Slot::Storage));
        assert!(sink.state().is_visible(UDID, Slot::Info));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn battery_failure_hides_only_battery() {
        let gateway = FakeGateway::default();
        gateway.add_device(UDID, full_device());
        let sink = MenuSink::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(monitor(&gateway, &sink).run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.state().is_visible(UDID, Slot::Battery));

        gateway.update_device(UDID, |d| d.battery = None);
        tokio::time::sleep(Duration::from_secs(5)).await;

        {
            let state = sink.state();
            assert!(!state.is_visible(UDID, Slot::Battery));
            for slot in Slot::ALL.iter().filter(|s| **s != Slot::Battery) {
                assert!(state.is_visible(UDID, *slot), "{} should stay visible", slot.name());
            }
        }

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn password_failure_keeps_previous_label() {
        let gateway = FakeGateway::default();
        gateway.add_device(UDID, full_device());
        let sink = MenuSink::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(monitor(&gateway, &sink).run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;

        gateway.update_device(UDID, |d| d.general = None);
        tokio::time::sleep(Duration::from_secs(5)).await;

        {
            let state = sink.state();
            let slot = state.slot(UDID, Slot::IsPasswd).unwrap();
            assert!(slot.visible);
            assert_eq!(slot.text, " Password Protected: yes");
        }

        gateway.update_device(UDID, |d| d.general = Some(general_bag(false)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            sink.state().slot(UDID, Slot::IsPasswd).unwrap().text,
            " Password Protected: no"
        );

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_observed_after_the_sleep() {
        let gateway = FakeGateway::default();
        gateway.add_device(UDID, full_device());
        let sink = MenuSink::default();
        let monitor = monitor(&gateway, &sink);
        let phase = monitor.phase();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(monitor.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        // Still sleeping: the slots stay up until the next iteration.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*phase.borrow(), MonitorPhase::Active);
        assert!(sink.state().is_visible(UDID, Slot::Info));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*phase.borrow(), MonitorPhase::Gone);
        assert!(!sink.state().has_visible_slots(UDID));

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.polls, 1);
        assert_eq!(gateway.closed(UDID), 1);
    }
}
