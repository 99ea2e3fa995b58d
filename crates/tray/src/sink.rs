//! Presentation sink: where monitors publish device labels.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::menu::{MenuState, Slot};
use crate::tray::TrayUpdate;

/// Tray icon status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorStatus {
    /// Icon shown.
    Active,
    /// Icon hidden.
    Passive,
}

/// Named display slots that can be shown, hidden, or relabelled.
///
/// Every call is independent and idempotent; concurrent writers follow
/// last-writer-wins.
pub trait PresentationSink: Send + Sync {
    fn set_text(&self, device_id: &str, slot: Slot, text: &str);

    fn show(&self, device_id: &str, slot: Slot);

    fn hide(&self, device_id: &str, slot: Slot);

    fn set_indicator(&self, status: IndicatorStatus);

    /// Sets the label of `slot` and shows it.
    fn publish(&self, device_id: &str, slot: Slot, text: &str) {
        self.set_text(device_id, slot, text);
        self.show(device_id, slot);
    }

    /// Hides every slot of `device_id`.
    fn hide_all(&self, device_id: &str) {
        for slot in Slot::ALL {
            self.hide(device_id, slot);
        }
    }
}

/// Sink that applies updates straight to a shared [`MenuState`].
///
/// Used when the menu lives in the same process without a tray loop, and
/// by tests that need to inspect what was published.
#[derive(Debug, Clone, Default)]
pub struct MenuSink {
    state: Arc<Mutex<MenuState>>,
}

impl MenuSink {
    pub fn new(state: MenuState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Locks the menu state for inspection.
    pub fn state(&self) -> MutexGuard<'_, MenuState> {
        // A panicking publisher cannot leave the menu half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, update: TrayUpdate) {
        self.state().apply(&update);
    }
}

impl PresentationSink for MenuSink {
    fn set_text(&self, device_id: &str, slot: Slot, text: &str) {
        self.apply(TrayUpdate::SetText {
            device_id: device_id.to_string(),
            slot,
            text: text.to_string(),
        });
    }

    fn show(&self, device_id: &str, slot: Slot) {
        self.apply(TrayUpdate::Show {
            device_id: device_id.to_string(),
            slot,
        });
    }

    fn hide(&self, device_id: &str, slot: Slot) {
        self.apply(TrayUpdate::Hide {
            device_id: device_id.to_string(),
            slot,
        });
    }

    fn set_indicator(&self, status: IndicatorStatus) {
        self.apply(TrayUpdate::Indicator(status));
    }
}
