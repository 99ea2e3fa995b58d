//! Device readings and their menu labels.

use idevtray_lockdown::{PropertyBag, extract_int, extract_string, fields};
use idevtray_tray::Slot;

const BYTES_PER_GB: i64 = 1_000_000_000;

/// Identity fields read once per monitor run from the general domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub device_class: Option<String>,
    pub product_name: Option<String>,
    pub product_version: Option<String>,
    pub device_name: Option<String>,
    pub meid: Option<String>,
    pub imei: Option<String>,
    pub color: Option<String>,
    pub msisdn: Option<String>,
    pub activation_state: Option<String>,
}

impl DeviceSnapshot {
    pub fn from_bag(bag: &PropertyBag) -> Self {
        Self {
            device_class: extract_string(bag, fields::DEVICE_CLASS),
            product_name: extract_string(bag, fields::PRODUCT_NAME),
            product_version: extract_string(bag, fields::PRODUCT_VERSION),
            device_name: extract_string(bag, fields::DEVICE_NAME),
            meid: extract_string(bag, fields::MEID),
            imei: extract_string(bag, fields::IMEI),
            color: extract_string(bag, fields::DEVICE_COLOR),
            msisdn: extract_string(bag, fields::PHONE_NUMBER),
            activation_state: extract_string(bag, fields::ACTIVATION_STATE),
        }
    }

    /// Header line; needs both the device name and the OS version.
    pub fn info_label(&self) -> Option<String> {
        let name = self.device_name.as_deref()?;
        let version = self.product_version.as_deref()?;
        Some(format!("📱 {name} (IOS {version})"))
    }

    /// Label for every identity slot. `None` means the slot stays hidden.
    pub fn labels(&self) -> [(Slot, Option<String>); 6] {
        let line = |prefix: &str, value: &Option<String>| {
            value.as_deref().map(|v| format!(" {prefix}: {v}"))
        };
        [
            (Slot::Info, self.info_label()),
            (Slot::Meid, line("MEID", &self.meid)),
            (Slot::Imei, line("IMEI", &self.imei)),
            (Slot::Color, line("Color", &self.color)),
            (Slot::Msisdn, line("Phone", &self.msisdn)),
            (Slot::IsActivated, line("Activation", &self.activation_state)),
        ]
    }
}

/// Disk capacity read once per monitor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageSnapshot {
    /// Total capacity in bytes.
    pub total: Option<i64>,
    /// Free capacity in bytes.
    pub available: Option<i64>,
}

/// Derived storage usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageUsage {
    pub used_gb: f64,
    pub total_gb: i64,
}

impl StorageSnapshot {
    pub fn from_bag(bag: &PropertyBag) -> Self {
        Self {
            total: extract_int(bag, fields::TOTAL_DISK_CAPACITY),
            available: extract_int(bag, fields::AMOUNT_DATA_AVAILABLE),
        }
    }

    /// Usage in decimal gigabytes; only defined when both capacities are
    /// strictly positive.
    pub fn usage(&self) -> Option<StorageUsage> {
        let total = self.total.filter(|v| *v > 0)?;
        let available = self.available.filter(|v| *v > 0)?;
        Some(StorageUsage {
            used_gb: (total - available) as f64 / BYTES_PER_GB as f64,
            total_gb: total / BYTES_PER_GB,
        })
    }

    pub fn label(&self) -> Option<String> {
        self.usage().map(|u| {
            format!(" Storage: {:.1}GB / {}GB used", u.used_gb, u.total_gb)
        })
    }
}

/// Fields re-read on every poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolatileStatus {
    pub password_protected: Option<bool>,
    /// Battery charge in percent.
    pub battery_level: Option<i64>,
}

impl VolatileStatus {
    pub fn password_label(&self) -> Option<String> {
        self.password_protected.map(|locked| {
            format!(" Password Protected: {}", if locked { "yes" } else { "no" })
        })
    }

    /// Negative levels are the device's "unknown" marker.
    pub fn battery_label(&self) -> Option<String> {
        self.battery_level
            .filter(|level| *level >= 0)
            .map(|level| format!(" Battery: {level}%"))
    }
}
