//! Applet configuration management.
//!
//! Configuration is stored as TOML at `~/.config/idevtray/config.toml` and
//! created with defaults on first start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use idevtray_lockdown::ideviceinfo::DEFAULT_QUERY_TIMEOUT;
use idevtray_lockdown::watcher::DEFAULT_WATCH_INTERVAL;
use idevtray_monitor::DEFAULT_REFRESH_INTERVAL;
use serde::{Deserialize, Serialize};

/// Applet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between two polls of a device's lock state and battery.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Seconds between two device listings.
    #[serde(default = "default_watch_interval")]
    pub watch_interval: u64,

    /// Upper bound in seconds for one `ideviceinfo` call.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    #[serde(default = "default_ideviceinfo_path")]
    pub ideviceinfo_path: PathBuf,

    #[serde(default = "default_idevice_id_path")]
    pub idevice_id_path: PathBuf,

    /// Freedesktop icon name of the indicator, passed to the tray backend.
    #[serde(default = "default_icon_name")]
    pub icon_name: String,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_watch_interval() -> u64 {
    DEFAULT_WATCH_INTERVAL.as_secs()
}

fn default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT.as_secs()
}

fn default_ideviceinfo_path() -> PathBuf {
    PathBuf::from("ideviceinfo")
}

fn default_idevice_id_path() -> PathBuf {
    PathBuf::from("idevice_id")
}

fn default_icon_name() -> String {
    "phone-apple-iphone".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            watch_interval: default_watch_interval(),
            query_timeout: default_query_timeout(),
            ideviceinfo_path: default_ideviceinfo_path(),
            idevice_id_path: default_idevice_id_path(),
            icon_name: default_icon_name(),
        }
    }
}

/// Zero means "use the default".
fn seconds_or(value: u64, default: Duration) -> Duration {
    if value == 0 {
        default
    } else {
        Duration::from_secs(value)
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        seconds_or(self.refresh_interval, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn watch_interval(&self) -> Duration {
        seconds_or(self.watch_interval, DEFAULT_WATCH_INTERVAL)
    }

    pub fn query_timeout(&self) -> Duration {
        seconds_or(self.query_timeout, DEFAULT_QUERY_TIMEOUT)
    }

    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, writing the defaults there first if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME").unwrap_or_else(|| "/tmp".into());
            PathBuf::from(home).join(".config")
        });
    base.join("idevtray").join("config.toml")
}
