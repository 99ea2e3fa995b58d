//! Device monitoring for idevtray.
//!
//! A [`DeviceMonitor`] owns one lockdown session for the lifetime of a
//! connected device: it publishes the static device information once, then
//! refreshes the lock state and battery level every refresh interval until
//! it is cancelled. The [`MonitorRegistry`] starts and stops monitors in
//! response to hotplug events.

mod monitor;
mod registry;
mod snapshot;
#[cfg(test)]
mod testing;

pub use monitor::{
    DEFAULT_REFRESH_INTERVAL, DeviceMonitor, MonitorConfig, MonitorPhase, MonitorSummary,
};
pub use registry::{ConnectOutcome, MonitorRegistry};
pub use snapshot::{DeviceSnapshot, StorageSnapshot, StorageUsage, VolatileStatus};
