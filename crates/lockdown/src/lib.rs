//! Lockdown access for idevtray.
//!
//! Opens sessions to USB-connected iOS devices, queries lockdown domains,
//! pulls typed fields out of the returned property bags and watches for
//! devices being plugged in or removed.
//!
//! The lockdown and usbmux protocols themselves are not implemented here:
//! [`IdeviceinfoGateway`] and [`DeviceWatcher`] drive the libimobiledevice
//! command-line tools (`ideviceinfo`, `idevice_id`).

pub mod fields;
pub mod gateway;
pub mod ideviceinfo;
pub mod types;
pub mod watcher;

pub use fields::{extract, extract_bool, extract_int, extract_string};
pub use gateway::{DeviceSession, GatewayFuture, SessionGateway};
pub use ideviceinfo::{IdeviceinfoConfig, IdeviceinfoGateway};
pub use types::{DeviceEvent, Domain, PropertyBag};
pub use watcher::{DeviceWatcher, diff_devices};

/// Errors reported by a session gateway.
///
/// `Connect` and `Handshake` are fatal to the monitor that hit them;
/// `Query` only affects the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("could not reach device {device_id}: {reason}")]
    Connect { device_id: String, reason: String },

    #[error("lockdown handshake with {device_id} failed: {reason}")]
    Handshake { device_id: String, reason: String },

    #[error("query of {domain} failed: {reason}")]
    Query { domain: Domain, reason: String },
}

/// Errors produced while listing attached devices.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device listing failed: {0}")]
    Listing(String),
}
