use std::fmt;

/// Key/value reply of a lockdown query.
pub type PropertyBag = plist::Dictionary;

/// Lockdown information domains queried by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// The default domain: identity, versions, activation and lock state.
    General,
    /// `com.apple.disk_usage`
    DiskUsage,
    /// `com.apple.mobile.battery`
    Battery,
}

impl Domain {
    /// Domain token passed to lockdown, `None` for the default domain.
    pub fn token(self) -> Option<&'static str> {
        match self {
            Domain::General => None,
            Domain::DiskUsage => Some("com.apple.disk_usage"),
            Domain::Battery => Some("com.apple.mobile.battery"),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token() {
            Some(token) => f.write_str(token),
            None => f.write_str("general"),
        }
    }
}

/// A hotplug notification for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(String),
    Disconnected(String),
}

impl DeviceEvent {
    /// Identifier (UDID) of the device the event refers to.
    pub fn device_id(&self) -> &str {
        match self {
            DeviceEvent::Connected(id) | DeviceEvent::Disconnected(id) => id,
        }
    }
}
