//! Tray handle, events, and update types.
//!
//! The actual system tray implementation depends on platform libraries
//! (AppIndicator / StatusNotifierItem). This module defines the
//! channel-based interface that monitors use to talk to the tray,
//! independent of the GUI backend.

use std::sync::mpsc;

use crate::menu::{MenuState, Slot};
use crate::sink::{IndicatorStatus, PresentationSink};

/// Configuration for the system tray.
///
/// Handed to the GUI backend together with the channel pair from
/// [`TrayHandle::new`]; the headless update loop only uses `app_name`.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Application name shown in the tray tooltip.
    pub app_name: String,
    /// Freedesktop icon name the backend shows while the indicator is
    /// [`IndicatorStatus::Active`].
    pub icon_name: String,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            app_name: "idevtray".into(),
            icon_name: "phone-apple-iphone".into(),
        }
    }
}

/// Events emitted by the tray to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayEvent {
    /// User clicked "Quit" in the context menu.
    QuitRequested,
}

/// Updates sent from monitors to the tray.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    /// Replace the label of a slot.
    SetText {
        device_id: String,
        slot: Slot,
        text: String,
    },
    /// Make a slot visible.
    Show { device_id: String, slot: Slot },
    /// Hide a slot.
    Hide { device_id: String, slot: Slot },
    /// Switch the tray icon on or off.
    Indicator(IndicatorStatus),
    /// Request tray shutdown.
    Shutdown,
}

/// Handle for communicating with the system tray from the application.
///
/// The tray event loop runs on its own thread and communicates via channels.
pub struct TrayHandle {
    /// Send updates to the tray.
    update_tx: mpsc::Sender<TrayUpdate>,
    /// Receive events from the tray.
    event_rx: mpsc::Receiver<TrayEvent>,
    config: TrayConfig,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_sender, update_receiver)`; the sender/receiver
    /// pair is given to the tray event loop.
    pub fn new(config: TrayConfig) -> (Self, mpsc::Sender<TrayEvent>, mpsc::Receiver<TrayUpdate>) {
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = Self {
            update_tx,
            event_rx,
            config,
        };

        (handle, event_tx, update_rx)
    }

    /// Returns a cloneable sink that publishes into this tray.
    pub fn sink(&self) -> TraySink {
        TraySink {
            update_tx: self.update_tx.clone(),
        }
    }

    /// Returns the tray configuration.
    pub fn config(&self) -> &TrayConfig {
        &self.config
    }

    /// Requests the tray to shut down.
    pub fn shutdown(&self) {
        let _ = self.update_tx.send(TrayUpdate::Shutdown);
    }

    /// Tries to receive a tray event (non-blocking).
    pub fn try_recv_event(&self) -> Option<TrayEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// [`PresentationSink`] that forwards every call to the tray loop.
#[derive(Debug, Clone)]
pub struct TraySink {
    update_tx: mpsc::Sender<TrayUpdate>,
}

impl TraySink {
    fn send(&self, update: TrayUpdate) {
        if self.update_tx.send(update).is_err() {
            tracing::trace!("tray loop gone, dropping update");
        }
    }
}

impl PresentationSink for TraySink {
    fn set_text(&self, device_id: &str, slot: Slot, text: &str) {
        self.send(TrayUpdate::SetText {
            device_id: device_id.to_string(),
            slot,
            text: text.to_string(),
        });
    }

    fn show(&self, device_id: &str, slot: Slot) {
        self.send(TrayUpdate::Show {
            device_id: device_id.to_string(),
            slot,
        });
    }

    fn hide(&self, device_id: &str, slot: Slot) {
        self.send(TrayUpdate::Hide {
            device_id: device_id.to_string(),
            slot,
        });
    }

    fn set_indicator(&self, status: IndicatorStatus) {
        self.send(TrayUpdate::Indicator(status));
    }
}

/// Drives a [`MenuState`] from the update channel.
///
/// Calls `on_change` after every update that changed the rendered menu.
/// Returns when [`TrayUpdate::Shutdown`] arrives or every sender is gone.
pub fn run_update_loop(
    update_rx: mpsc::Receiver<TrayUpdate>,
    state: &mut MenuState,
    mut on_change: impl FnMut(&MenuState),
) {
    for update in update_rx {
        if update == TrayUpdate::Shutdown {
            tracing::debug!("tray shutdown requested");
            break;
        }
        if state.apply(&update) {
            on_change(state);
        }
    }
}
