//! System tray model for idevtray.
//!
//! Provides the menu model of the tray applet (one section of named slots
//! per connected device, plus a quit action) and the sinks that monitors
//! publish into.
//!
//! The tray communicates with the rest of the application via channels:
//! - [`TrayEvent`]: events from tray to application (e.g. quit requested)
//! - [`TrayUpdate`]: updates from monitors to tray (slot text, visibility,
//!   indicator status)
//!
//! # Platform notes
//! - Linux: AppIndicator / StatusNotifierItem backends consume
//!   [`MenuState::build_menu`]
//! - The tray event loop must run on its own thread on some platforms

mod menu;
mod sink;
mod tray;

pub use menu::{MenuAction, MenuItem, MenuState, Slot, SlotState};
pub use sink::{IndicatorStatus, MenuSink, PresentationSink};
pub use tray::{TrayConfig, TrayEvent, TrayHandle, TraySink, TrayUpdate, run_update_loop};
